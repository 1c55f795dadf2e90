// ==========================================
// 市场主体关系引擎 - 未识别主体编号仓储
// ==========================================
// 职责: 记录来件请求中无法解析的主体编号,供通知决策引擎上报
// ==========================================

use crate::domain::interval::TimePoint;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait UnrecognizedActorStore: Send + Sync {
    /// 记录编号 (重复出现时累加次数并刷新 last_seen_at)
    async fn record(&self, actor_numbers: &[String], seen_at: TimePoint) -> RepositoryResult<()>;

    /// 全部已记录的编号 (按编号排序)
    async fn list_numbers(&self) -> RepositoryResult<Vec<String>>;
}

pub struct UnrecognizedActorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UnrecognizedActorRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 在调用方事务内写入未识别编号 (与关系写入同一事务时保证全有或全无)
pub(crate) fn upsert_unrecognized(
    conn: &Connection,
    actor_numbers: &[String],
    seen_at: TimePoint,
) -> RepositoryResult<()> {
    for number in actor_numbers {
        conn.execute(
            r#"
            INSERT INTO unrecognized_actor (actor_number, first_seen_at, last_seen_at, occurrences)
            VALUES (?1, ?2, ?2, 1)
            ON CONFLICT(actor_number) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                occurrences = occurrences + 1
            "#,
            params![number, seen_at],
        )?;
    }
    Ok(())
}

#[async_trait]
impl UnrecognizedActorStore for UnrecognizedActorRepository {
    async fn record(&self, actor_numbers: &[String], seen_at: TimePoint) -> RepositoryResult<()> {
        if actor_numbers.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        upsert_unrecognized(&tx, actor_numbers, seen_at)?;
        tx.commit()?;

        tracing::info!("记录未识别主体编号: count={}", actor_numbers.len());
        Ok(())
    }

    async fn list_numbers(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT actor_number FROM unrecognized_actor ORDER BY actor_number")?;
        let numbers = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(numbers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_record_is_idempotent_per_number() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize_schema(&conn).unwrap();
        let repo = UnrecognizedActorRepository::from_connection(Arc::new(Mutex::new(conn)));

        let numbers = vec!["5799999999999".to_string(), "UNKNOWN-1".to_string()];
        repo.record(&numbers, Utc::now()).await.unwrap();
        repo.record(&numbers[..1], Utc::now()).await.unwrap();

        assert_eq!(repo.list_numbers().await.unwrap(), numbers);
    }
}
