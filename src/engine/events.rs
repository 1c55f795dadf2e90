// ==========================================
// 市场主体关系引擎 - 通知事件出口
// ==========================================
// 职责: 定义通知事件入队 trait,实现依赖倒置
// 说明: Engine/API 层只依赖 trait,Repository 层提供 SQLite outbox 实现
// ==========================================

use crate::domain::notification::NotificationEvent;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

pub type SinkError = Box<dyn Error + Send + Sync>;

/// 通知事件出口 Trait
///
/// # 实现说明
/// - `DomainEventRepository` 将事件写入 domain_event 表,由外部投递进程消费
/// - `NoOpEventSink` 丢弃事件
#[async_trait]
pub trait NotificationEventSink: Send + Sync {
    /// 事件入队
    ///
    /// # 返回
    /// - `Ok(())`: 入队成功
    /// - `Err`: 入队失败
    async fn enqueue(&self, event: NotificationEvent) -> Result<(), SinkError>;
}

/// 空操作事件出口
#[derive(Debug, Clone, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl NotificationEventSink for NoOpEventSink {
    async fn enqueue(&self, event: NotificationEvent) -> Result<(), SinkError> {
        tracing::debug!(
            "NoOpEventSink: 跳过事件入队 - event_id={}, event_type={}",
            event.event_id(),
            event.event_type()
        );
        Ok(())
    }
}

#[async_trait]
impl<T: NotificationEventSink + ?Sized> NotificationEventSink for Arc<T> {
    async fn enqueue(&self, event: NotificationEvent) -> Result<(), SinkError> {
        (**self).enqueue(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::ActorId;
    use chrono::Utc;

    #[tokio::test]
    async fn test_noop_sink_accepts_events() {
        let sink: Arc<dyn NotificationEventSink> = Arc::new(NoOpEventSink);
        let event = NotificationEvent::coverage_gap(ActorId::new_v4(), "5790000000201", false, Utc::now());

        assert!(sink.enqueue(event).await.is_ok());
    }
}
