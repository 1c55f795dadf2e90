// ==========================================
// 市场主体关系引擎 - 流程委托仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: (delegator, message_type) 唯一;revision 乐观锁
// ==========================================

use crate::domain::actor::ActorId;
use crate::domain::delegation::{DelegationKey, DelegationPeriod, ProcessDelegation};
use crate::domain::relation::RelationPeriod;
use crate::domain::types::DelegationMessageType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    bump_revision, get_actor_id, get_interval, get_parsed, get_uuid, RevisionTable,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DELEGATION_TABLE: RevisionTable = RevisionTable {
    aggregate: "ProcessDelegation",
    table: "process_delegation",
    id_column: "delegation_id",
};

// ==========================================
// ProcessDelegationStore Trait
// ==========================================
#[async_trait]
pub trait ProcessDelegationStore: Send + Sync {
    async fn get(
        &self,
        delegator: ActorId,
        message_type: DelegationMessageType,
    ) -> RepositoryResult<Option<ProcessDelegation>>;

    async fn list_for_delegator(&self, delegator: ActorId) -> RepositoryResult<Vec<ProcessDelegation>>;

    /// 保存聚合变更 (IMMEDIATE 事务 + revision 校验)
    async fn save(&self, delegation: &ProcessDelegation) -> RepositoryResult<()>;
}

// ==========================================
// ProcessDelegationRepository - SQLite 实现
// ==========================================
pub struct ProcessDelegationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessDelegationRepository {
    /// 创建新的仓储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn load_periods(
        tx: &Transaction<'_>,
        delegation_id: Uuid,
        delegator: ActorId,
        message_type: DelegationMessageType,
    ) -> RepositoryResult<Vec<DelegationPeriod>> {
        let mut stmt = tx.prepare(
            r#"
            SELECT period_id, delegated_to_id, grid_area, starts_at, stops_at, closed_at
            FROM delegation_period
            WHERE delegation_id = ?1
            ORDER BY starts_at
            "#,
        )?;
        let periods = stmt
            .query_map(params![delegation_id.to_string()], |row| {
                Ok(RelationPeriod {
                    id: get_uuid(row, 0)?,
                    partition_key: DelegationKey {
                        delegator,
                        message_type,
                        grid_area: get_parsed(row, 2)?,
                    },
                    counterparty: get_actor_id(row, 1)?,
                    interval: get_interval(row, 3, 4)?,
                    closed_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(periods)
    }

    fn load_where(
        &self,
        delegator: ActorId,
        message_type: Option<DelegationMessageType>,
    ) -> RepositoryResult<Vec<ProcessDelegation>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let heads = {
            let mut stmt = tx.prepare(
                r#"
                SELECT delegation_id, message_type, revision
                FROM process_delegation
                WHERE delegator_id = ?1 AND (?2 IS NULL OR message_type = ?2)
                ORDER BY message_type
                "#,
            )?;
            let rows = stmt.query_map(
                params![delegator.to_string(), message_type.map(|m| m.to_db_str())],
                |row| {
                    Ok((
                        get_uuid(row, 0)?,
                        get_parsed::<DelegationMessageType>(row, 1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut delegations = Vec::with_capacity(heads.len());
        for (id, message_type, revision) in heads {
            let periods = Self::load_periods(&tx, id, delegator, message_type)?;
            delegations.push(ProcessDelegation::restore(
                id,
                delegator,
                message_type,
                periods,
                revision,
            ));
        }
        tx.commit()?;
        Ok(delegations)
    }
}

#[async_trait]
impl ProcessDelegationStore for ProcessDelegationRepository {
    async fn get(
        &self,
        delegator: ActorId,
        message_type: DelegationMessageType,
    ) -> RepositoryResult<Option<ProcessDelegation>> {
        Ok(self.load_where(delegator, Some(message_type))?.into_iter().next())
    }

    async fn list_for_delegator(&self, delegator: ActorId) -> RepositoryResult<Vec<ProcessDelegation>> {
        self.load_where(delegator, None)
    }

    async fn save(&self, delegation: &ProcessDelegation) -> RepositoryResult<()> {
        if !delegation.has_changes() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let delegation_id = delegation.id().to_string();
        let expected = delegation.revision();

        if expected == 0 {
            let inserted = tx.execute(
                r#"INSERT INTO process_delegation (delegation_id, delegator_id, message_type, revision)
                   VALUES (?1, ?2, ?3, 1) ON CONFLICT DO NOTHING"#,
                params![
                    delegation_id,
                    delegation.delegator().to_string(),
                    delegation.message_type().to_db_str()
                ],
            )?;
            if inserted == 0 {
                // 并发创建: 同 (delegator, message_type) 已由其他写入方创建
                let actual: Option<i64> = tx
                    .query_row(
                        "SELECT revision FROM process_delegation WHERE delegator_id = ?1 AND message_type = ?2",
                        params![
                            delegation.delegator().to_string(),
                            delegation.message_type().to_db_str()
                        ],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(RepositoryError::OptimisticLockFailure {
                    aggregate: DELEGATION_TABLE.aggregate.to_string(),
                    id: delegation_id,
                    expected,
                    actual: actual.unwrap_or(0),
                });
            }
        } else {
            bump_revision(&tx, &DELEGATION_TABLE, &delegation_id, expected)?;
        }

        for period in delegation.changed_periods() {
            tx.execute(
                r#"
                INSERT INTO delegation_period (
                    period_id, delegation_id, delegated_to_id, grid_area, starts_at, stops_at, closed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(period_id) DO UPDATE SET
                    stops_at = excluded.stops_at,
                    closed_at = excluded.closed_at
                "#,
                params![
                    period.id.to_string(),
                    delegation_id,
                    period.counterparty.to_string(),
                    period.partition_key.grid_area.as_str(),
                    period.interval.start(),
                    period.interval.stop(),
                    period.closed_at,
                ],
            )?;
        }

        tx.commit()?;
        tracing::debug!(
            "流程委托已保存: delegation_id={}, revision={}",
            delegation_id,
            expected + 1
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::{Actor, ActorNumber, GridAreaCode};
    use crate::domain::interval::TimePoint;
    use crate::domain::types::{ActorStatus, MarketRole};
    use crate::repository::actor_repo::ActorRepository;
    use chrono::{TimeZone, Utc};

    fn day(m: u32, d: u32) -> TimePoint {
        Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
    }

    fn setup() -> (ProcessDelegationRepository, Actor, Actor) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let actors = ActorRepository::from_connection(conn.clone());
        let delegator = Actor::new(ActorNumber::parse("5790000000401").unwrap(), ActorStatus::Active)
            .with_role(MarketRole::GridAccessProvider);
        let target = Actor::new(ActorNumber::parse("5790000000501").unwrap(), ActorStatus::Active)
            .with_role(MarketRole::Delegated);
        actors.insert(&delegator).unwrap();
        actors.insert(&target).unwrap();

        (ProcessDelegationRepository::from_connection(conn), delegator, target)
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let (repo, delegator, target) = setup();
        let mut delegation =
            ProcessDelegation::new(&delegator, DelegationMessageType::Rsm012Inbound).unwrap();
        delegation
            .delegate_to(&target, GridAreaCode::parse("804").unwrap(), day(1, 1), None)
            .unwrap();
        repo.save(&delegation).await.unwrap();
        delegation.mark_persisted();

        let loaded = repo
            .get(delegator.id, DelegationMessageType::Rsm012Inbound)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id(), delegation.id());
        assert_eq!(loaded.revision(), 1);
        assert_eq!(loaded.periods(), delegation.periods());
        assert!(repo
            .get(delegator.id, DelegationMessageType::Rsm020Outbound)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creation_rejected() {
        let (repo, delegator, target) = setup();
        let area = GridAreaCode::parse("804").unwrap();

        let mut first = ProcessDelegation::new(&delegator, DelegationMessageType::Rsm012Inbound).unwrap();
        first.delegate_to(&target, area.clone(), day(1, 1), Some(day(3, 1))).unwrap();
        let mut second = ProcessDelegation::new(&delegator, DelegationMessageType::Rsm012Inbound).unwrap();
        second.delegate_to(&target, area, day(2, 1), None).unwrap();

        repo.save(&first).await.unwrap();
        let err = repo.save(&second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { actual: 1, .. }));
        assert_eq!(repo.list_for_delegator(delegator.id).await.unwrap().len(), 1);
    }
}
