// ==========================================
// 市场主体关系引擎 - 通知领域事件
// ==========================================
// 职责: 覆盖缺口通知事件 (由通知决策引擎产生,写入事件发件箱)
// 说明: 投递 (邮件等) 由外部分发组件完成
// ==========================================

use crate::domain::actor::ActorId;
use crate::domain::interval::TimePoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 覆盖缺口通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGapDetected {
    pub event_id: Uuid,
    /// 接收通知的管理员主体
    pub recipient: ActorId,
    /// 受影响的主体编号 (未识别编号可能不符合 GLN/EIC 格式,故为字符串)
    pub affected_actor_number: String,
    /// true: 编号无法解析为已知主体
    pub is_unrecognized: bool,
    pub detected_at: TimePoint,
}

/// 通知事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum NotificationEvent {
    CoverageGapDetected(CoverageGapDetected),
}

impl NotificationEvent {
    pub fn coverage_gap(
        recipient: ActorId,
        affected_actor_number: impl Into<String>,
        is_unrecognized: bool,
        detected_at: TimePoint,
    ) -> Self {
        NotificationEvent::CoverageGapDetected(CoverageGapDetected {
            event_id: Uuid::new_v4(),
            recipient,
            affected_actor_number: affected_actor_number.into(),
            is_unrecognized,
            detected_at,
        })
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            NotificationEvent::CoverageGapDetected(e) => e.event_id,
        }
    }

    pub fn recipient(&self) -> ActorId {
        match self {
            NotificationEvent::CoverageGapDetected(e) => e.recipient,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::CoverageGapDetected(_) => "CoverageGapDetected",
        }
    }

    pub fn created_at(&self) -> TimePoint {
        match self {
            NotificationEvent::CoverageGapDetected(e) => e.detected_at,
        }
    }
}
