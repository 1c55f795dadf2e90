// ==========================================
// 市场主体关系引擎 - 市场主体目录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 主体主数据由外部 CRUD 流程维护,本引擎以只读为主;insert 用于初始化与测试
// ==========================================

use crate::domain::actor::{Actor, ActorId, ActorNumber};
use crate::domain::types::{ActorStatus, MarketRole};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{get_actor_id, get_parsed};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ActorDirectory Trait
// ==========================================
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// 全部主体 (含角色与电网区域)
    async fn get_all_actors(&self) -> RepositoryResult<Vec<Actor>>;

    /// 按主体编号查询
    async fn find_by_number(&self, actor_number: &ActorNumber) -> RepositoryResult<Option<Actor>>;
}

// ==========================================
// ActorRepository - SQLite 实现
// ==========================================
pub struct ActorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActorRepository {
    /// 创建新的 ActorRepository 实例
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

    /// 写入主体 (含角色、电网区域),单事务
    pub fn insert(&self, actor: &Actor) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let actor_id = actor.id.to_string();
        tx.execute(
            "INSERT INTO actor (actor_id, actor_number, status) VALUES (?1, ?2, ?3)",
            params![actor_id, actor.actor_number.as_str(), actor.status.to_db_str()],
        )?;
        for role in &actor.roles {
            tx.execute(
                "INSERT INTO actor_role (actor_id, role) VALUES (?1, ?2)",
                params![actor_id, role.to_db_str()],
            )?;
        }
        for grid_area in &actor.grid_areas {
            tx.execute(
                "INSERT INTO actor_grid_area (actor_id, grid_area) VALUES (?1, ?2)",
                params![actor_id, grid_area.as_str()],
            )?;
        }

        tx.commit()?;
        tracing::debug!("主体已写入: actor_number={}", actor.actor_number);
        Ok(())
    }

    /// 更新主体状态
    pub fn update_status(&self, actor_id: ActorId, status: ActorStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE actor SET status = ?1 WHERE actor_id = ?2",
            params![status.to_db_str(), actor_id.to_string()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Actor".to_string(),
                id: actor_id.to_string(),
            });
        }
        Ok(())
    }

    fn load_actors(conn: &Connection, filter_number: Option<&str>) -> RepositoryResult<Vec<Actor>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT actor_id, actor_number, status
            FROM actor
            WHERE (?1 IS NULL OR actor_number = ?1)
            ORDER BY actor_number
            "#,
        )?;
        let mut actors = stmt
            .query_map(params![filter_number], |row| {
                Ok(Actor {
                    id: get_actor_id(row, 0)?,
                    actor_number: get_parsed(row, 1)?,
                    status: get_parsed(row, 2)?,
                    roles: Default::default(),
                    grid_areas: Default::default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if actors.is_empty() {
            return Ok(actors);
        }

        let index: HashMap<ActorId, usize> =
            actors.iter().enumerate().map(|(i, a)| (a.id, i)).collect();

        let mut role_stmt = conn.prepare("SELECT actor_id, role FROM actor_role")?;
        let roles = role_stmt.query_map([], |row| {
            Ok((get_actor_id(row, 0)?, get_parsed::<MarketRole>(row, 1)?))
        })?;
        for row in roles {
            let (actor_id, role) = row?;
            if let Some(&i) = index.get(&actor_id) {
                actors[i].roles.insert(role);
            }
        }

        let mut area_stmt = conn.prepare("SELECT actor_id, grid_area FROM actor_grid_area")?;
        let areas = area_stmt.query_map([], |row| Ok((get_actor_id(row, 0)?, get_parsed(row, 1)?)))?;
        for row in areas {
            let (actor_id, grid_area) = row?;
            if let Some(&i) = index.get(&actor_id) {
                actors[i].grid_areas.insert(grid_area);
            }
        }

        Ok(actors)
    }
}

#[async_trait]
impl ActorDirectory for ActorRepository {
    async fn get_all_actors(&self) -> RepositoryResult<Vec<Actor>> {
        let conn = self.get_conn()?;
        Self::load_actors(&conn, None)
    }

    async fn find_by_number(&self, actor_number: &ActorNumber) -> RepositoryResult<Option<Actor>> {
        let conn = self.get_conn()?;
        Ok(Self::load_actors(&conn, Some(actor_number.as_str()))?
            .into_iter()
            .next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::GridAreaCode;

    fn repo() -> ActorRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        ActorRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_insert_and_load_with_roles() {
        let repo = repo();
        let actor = Actor::new(ActorNumber::parse("5790000000201").unwrap(), ActorStatus::Active)
            .with_role(MarketRole::EnergySupplier)
            .with_role(MarketRole::BalanceResponsibleParty)
            .with_grid_area(GridAreaCode::parse("804").unwrap());
        repo.insert(&actor).unwrap();

        let all = repo.get_all_actors().await.unwrap();
        assert_eq!(all, vec![actor.clone()]);

        let found = repo.find_by_number(&actor.actor_number).await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(actor.id));
    }

    #[tokio::test]
    async fn test_duplicate_actor_number_rejected() {
        let repo = repo();
        let number = ActorNumber::parse("5790000000201").unwrap();
        repo.insert(&Actor::new(number.clone(), ActorStatus::Active)).unwrap();

        let err = repo.insert(&Actor::new(number, ActorStatus::New)).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_update_status() {
        let repo = repo();
        let actor = Actor::new(ActorNumber::parse("5790000000201").unwrap(), ActorStatus::New);
        repo.insert(&actor).unwrap();
        repo.update_status(actor.id, ActorStatus::Inactive).unwrap();

        let all = repo.get_all_actors().await.unwrap();
        assert_eq!(all[0].status, ActorStatus::Inactive);
    }
}
