// ==========================================
// 市场主体关系引擎 - 领域事件发件箱
// ==========================================
// 职责: 通知事件持久化 (outbox),由外部投递进程拉取并标记已投递
// 格式: payload_json = serde_json 序列化的 NotificationEvent
// ==========================================

use crate::domain::interval::TimePoint;
use crate::domain::notification::NotificationEvent;
use crate::engine::events::{NotificationEventSink, SinkError};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct DomainEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DomainEventRepository {
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

    /// 写入一条事件
    pub fn insert(&self, event: &NotificationEvent) -> RepositoryResult<()> {
        let payload = serde_json::to_string(event)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO domain_event (event_id, event_type, recipient_id, payload_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                event.event_id().to_string(),
                event.event_type(),
                event.recipient().to_string(),
                payload,
                event.created_at(),
            ],
        )?;
        Ok(())
    }

    /// 未投递的事件 (按创建时间)
    pub fn list_pending(&self, limit: usize) -> RepositoryResult<Vec<NotificationEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT payload_json FROM domain_event
            WHERE dispatched_at IS NULL
            ORDER BY created_at, event_id
            LIMIT ?1
            "#,
        )?;
        let payloads = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(RepositoryError::from))
            .collect()
    }

    /// 标记已投递
    pub fn mark_dispatched(&self, event_id: Uuid, dispatched_at: TimePoint) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE domain_event SET dispatched_at = ?1 WHERE event_id = ?2 AND dispatched_at IS NULL",
            params![dispatched_at, event_id.to_string()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PendingDomainEvent".to_string(),
                id: event_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationEventSink for DomainEventRepository {
    async fn enqueue(&self, event: NotificationEvent) -> Result<(), SinkError> {
        self.insert(&event)?;
        Ok(())
    }
}
