// ==========================================
// 市场主体关系引擎 - 余额责任关系仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发: 读取 = 单个读事务内的快照;写入 = IMMEDIATE 事务 + 聚合 revision 校验
// ==========================================

use crate::domain::actor::ActorId;
use crate::domain::interval::TimePoint;
use crate::domain::relation::{
    BalanceResponsibilityKey, BalanceResponsibilityPeriod, BalanceResponsibilityRelations,
    RelationPeriod,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    bump_revision, get_actor_id, get_interval, get_parsed, get_uuid, revision_conflict,
    RevisionTable,
};
use crate::repository::unrecognized_actor_repo::upsert_unrecognized;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

const RELATIONS_TABLE: RevisionTable = RevisionTable {
    aggregate: "BalanceResponsibilityRelations",
    table: "balance_responsibility_relations",
    id_column: "energy_supplier_id",
};

// ==========================================
// BalanceResponsibilityStore Trait
// ==========================================
#[async_trait]
pub trait BalanceResponsibilityStore: Send + Sync {
    /// 读取售电商的关系聚合 (不存在时返回空聚合, revision = 0)
    async fn get_relations(&self, energy_supplier: ActorId)
        -> RepositoryResult<BalanceResponsibilityRelations>;

    /// 已有关系记录的售电商
    async fn list_energy_supplier_ids(&self) -> RepositoryResult<Vec<ActorId>>;

    /// 在一个事务内保存多个聚合的变更;任一 revision 冲突则全部回滚
    ///
    /// 成功后由调用方对每个聚合调用 `mark_persisted`
    async fn save_all(&self, aggregates: &[&BalanceResponsibilityRelations]) -> RepositoryResult<()>;

    /// 来件处理提交: 聚合变更与未识别编号在同一事务内写入,任一失败则全部回滚
    async fn save_intake(
        &self,
        aggregates: &[&BalanceResponsibilityRelations],
        unrecognized_numbers: &[String],
        seen_at: TimePoint,
    ) -> RepositoryResult<()>;
}

// ==========================================
// BalanceResponsibilityRepository - SQLite 实现
// ==========================================
pub struct BalanceResponsibilityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BalanceResponsibilityRepository {
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
        energy_supplier: ActorId,
    ) -> RepositoryResult<Vec<BalanceResponsibilityPeriod>> {
        let mut stmt = tx.prepare(
            r#"
            SELECT period_id, balance_responsible_id, grid_area, metering_point_type,
                   valid_from, valid_to, closed_at
            FROM balance_responsibility_period
            WHERE energy_supplier_id = ?1
            ORDER BY valid_from
            "#,
        )?;

        let periods = stmt
            .query_map(params![energy_supplier.to_string()], |row| {
                Ok(RelationPeriod {
                    id: get_uuid(row, 0)?,
                    partition_key: BalanceResponsibilityKey {
                        energy_supplier,
                        grid_area: get_parsed(row, 2)?,
                        metering_point_type: get_parsed(row, 3)?,
                    },
                    counterparty: get_actor_id(row, 1)?,
                    interval: get_interval(row, 4, 5)?,
                    closed_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(periods)
    }

    fn save_one(tx: &Transaction<'_>, aggregate: &BalanceResponsibilityRelations) -> RepositoryResult<()> {
        let supplier_id = aggregate.energy_supplier().to_string();
        let expected = aggregate.revision();

        if expected == 0 {
            let inserted = tx.execute(
                r#"INSERT INTO balance_responsibility_relations (energy_supplier_id, revision)
                   VALUES (?1, 1) ON CONFLICT DO NOTHING"#,
                params![supplier_id],
            )?;
            if inserted == 0 {
                return Err(revision_conflict(tx, &RELATIONS_TABLE, &supplier_id, expected)?);
            }
        } else {
            bump_revision(tx, &RELATIONS_TABLE, &supplier_id, expected)?;
        }

        for period in aggregate.changed_periods() {
            tx.execute(
                r#"
                INSERT INTO balance_responsibility_period (
                    period_id, energy_supplier_id, balance_responsible_id, grid_area,
                    metering_point_type, valid_from, valid_to, closed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(period_id) DO UPDATE SET
                    valid_to = excluded.valid_to,
                    closed_at = excluded.closed_at
                "#,
                params![
                    period.id.to_string(),
                    supplier_id,
                    period.counterparty.to_string(),
                    period.partition_key.grid_area.as_str(),
                    period.partition_key.metering_point_type.code(),
                    period.interval.start(),
                    period.interval.stop(),
                    period.closed_at,
                ],
            )?;
        }
        Ok(())
    }
}

impl BalanceResponsibilityRepository {
    /// 单个 IMMEDIATE 事务: 聚合变更 (+ 未识别编号)
    fn write_changes(
        &self,
        aggregates: &[&BalanceResponsibilityRelations],
        unrecognized: Option<(&[String], TimePoint)>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut saved = 0usize;
        for aggregate in aggregates.iter().filter(|a| a.has_changes()) {
            Self::save_one(&tx, aggregate)?;
            saved += 1;
        }
        let mut recorded = 0usize;
        if let Some((numbers, seen_at)) = unrecognized {
            upsert_unrecognized(&tx, numbers, seen_at)?;
            recorded = numbers.len();
        }

        tx.commit()?;
        tracing::debug!(
            "余额责任关系已保存: aggregates={}, unrecognized={}",
            saved,
            recorded
        );
        Ok(())
    }
}

#[async_trait]
impl BalanceResponsibilityStore for BalanceResponsibilityRepository {
    async fn get_relations(
        &self,
        energy_supplier: ActorId,
    ) -> RepositoryResult<BalanceResponsibilityRelations> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let revision: Option<i64> = tx
            .query_row(
                "SELECT revision FROM balance_responsibility_relations WHERE energy_supplier_id = ?1",
                params![energy_supplier.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let periods = Self::load_periods(&tx, energy_supplier)?;
        tx.commit()?;

        Ok(BalanceResponsibilityRelations::restore(
            energy_supplier,
            periods,
            revision.unwrap_or(0),
        ))
    }

    async fn list_energy_supplier_ids(&self) -> RepositoryResult<Vec<ActorId>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT energy_supplier_id FROM balance_responsibility_relations ORDER BY energy_supplier_id",
        )?;
        let ids = stmt
            .query_map([], |row| get_actor_id(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn save_all(&self, aggregates: &[&BalanceResponsibilityRelations]) -> RepositoryResult<()> {
        self.write_changes(aggregates, None)
    }

    async fn save_intake(
        &self,
        aggregates: &[&BalanceResponsibilityRelations],
        unrecognized_numbers: &[String],
        seen_at: TimePoint,
    ) -> RepositoryResult<()> {
        self.write_changes(aggregates, Some((unrecognized_numbers, seen_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::{Actor, ActorNumber, GridAreaCode};
    use crate::domain::interval::{TimeInterval, TimePoint};
    use crate::domain::relation::RelationRequest;
    use crate::domain::types::{ActorStatus, MarketRole, MeteringPointType};
    use crate::repository::actor_repo::ActorRepository;
    use crate::repository::unrecognized_actor_repo::{
        UnrecognizedActorRepository, UnrecognizedActorStore,
    };
    use chrono::{TimeZone, Utc};

    fn day(m: u32, d: u32) -> TimePoint {
        Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
    }

    struct Fixture {
        conn: Arc<Mutex<Connection>>,
        repo: BalanceResponsibilityRepository,
        supplier: ActorId,
        brp: ActorId,
    }

    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let actors = ActorRepository::from_connection(conn.clone());
        let supplier = Actor::new(ActorNumber::parse("5790000000201").unwrap(), ActorStatus::Active)
            .with_role(MarketRole::EnergySupplier);
        let brp = Actor::new(ActorNumber::parse("5790000000301").unwrap(), ActorStatus::Active)
            .with_role(MarketRole::BalanceResponsibleParty);
        actors.insert(&supplier).unwrap();
        actors.insert(&brp).unwrap();

        Fixture {
            repo: BalanceResponsibilityRepository::from_connection(conn.clone()),
            conn,
            supplier: supplier.id,
            brp: brp.id,
        }
    }

    fn request(brp: ActorId, from: TimePoint, to: Option<TimePoint>) -> RelationRequest {
        RelationRequest {
            balance_responsible: brp,
            grid_area: GridAreaCode::parse("804").unwrap(),
            metering_point_type: MeteringPointType::Consumption,
            interval: TimeInterval::try_new(from, to).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_revision() {
        let f = fixture();
        let mut relations = f.repo.get_relations(f.supplier).await.unwrap();
        assert_eq!(relations.revision(), 0);

        relations.apply_request(&request(f.brp, day(1, 1), None), day(1, 1)).unwrap();
        f.repo.save_all(&[&relations]).await.unwrap();
        relations.mark_persisted();

        let loaded = f.repo.get_relations(f.supplier).await.unwrap();
        assert_eq!(loaded.revision(), 1);
        assert_eq!(loaded.periods(), relations.periods());
        assert_eq!(f.repo.list_energy_supplier_ids().await.unwrap(), vec![f.supplier]);
    }

    #[tokio::test]
    async fn test_stale_writer_rejected() {
        let f = fixture();
        let mut base = f.repo.get_relations(f.supplier).await.unwrap();
        base.apply_request(&request(f.brp, day(1, 1), Some(day(6, 1))), day(1, 1)).unwrap();
        f.repo.save_all(&[&base]).await.unwrap();

        let mut first = f.repo.get_relations(f.supplier).await.unwrap();
        let mut second = f.repo.get_relations(f.supplier).await.unwrap();

        first.apply_request(&request(f.brp, day(6, 1), None), day(5, 1)).unwrap();
        f.repo.save_all(&[&first]).await.unwrap();

        second.apply_request(&request(f.brp, day(6, 1), Some(day(9, 1))), day(5, 1)).unwrap();
        let err = f.repo.save_all(&[&second]).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::OptimisticLockFailure { expected: 1, actual: 2, .. }
        ));

        let stored = f.repo.get_relations(f.supplier).await.unwrap();
        assert_eq!(stored.periods().len(), 2);
        assert!(stored.periods()[1].interval.is_open_ended());
    }

    #[tokio::test]
    async fn test_stop_update_persists_closed_at() {
        let f = fixture();
        let mut relations = f.repo.get_relations(f.supplier).await.unwrap();
        relations.apply_request(&request(f.brp, day(1, 1), None), day(1, 1)).unwrap();
        f.repo.save_all(&[&relations]).await.unwrap();
        relations.mark_persisted();

        relations
            .apply_request(&request(f.brp, day(1, 1), Some(day(6, 1))), day(5, 1))
            .unwrap();
        f.repo.save_all(&[&relations]).await.unwrap();

        let stored = f.repo.get_relations(f.supplier).await.unwrap();
        assert_eq!(stored.periods()[0].interval.stop(), Some(day(6, 1)));
        assert_eq!(stored.periods()[0].closed_at, Some(day(5, 1)));
    }

    #[tokio::test]
    async fn test_intake_rolls_back_unrecognized_on_conflict() {
        let f = fixture();
        let unrecognized = UnrecognizedActorRepository::from_connection(f.conn.clone());
        let numbers = vec!["5790000000999".to_string()];

        let mut base = f.repo.get_relations(f.supplier).await.unwrap();
        base.apply_request(&request(f.brp, day(1, 1), Some(day(6, 1))), day(1, 1)).unwrap();
        f.repo.save_all(&[&base]).await.unwrap();

        let mut stale = f.repo.get_relations(f.supplier).await.unwrap();
        let mut winner = f.repo.get_relations(f.supplier).await.unwrap();
        winner.apply_request(&request(f.brp, day(6, 1), None), day(5, 1)).unwrap();
        f.repo.save_all(&[&winner]).await.unwrap();

        stale.apply_request(&request(f.brp, day(6, 1), Some(day(9, 1))), day(5, 1)).unwrap();
        let err = f
            .repo
            .save_intake(&[&stale], &numbers, day(5, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { .. }));
        assert!(unrecognized.list_numbers().await.unwrap().is_empty());

        // 无冲突时编号与关系一并提交
        let mut fresh = f.repo.get_relations(f.supplier).await.unwrap();
        fresh.apply_request(&request(f.brp, day(1, 1), Some(day(5, 1))), day(5, 2)).unwrap();
        f.repo.save_intake(&[&fresh], &numbers, day(5, 2)).await.unwrap();
        assert_eq!(unrecognized.list_numbers().await.unwrap(), numbers);
    }
}
