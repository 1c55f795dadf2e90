// ==========================================
// 市场主体关系引擎 - 引擎层
// ==========================================
// 职责: 纯规则计算 (重叠检测 / 连续性分析 / 通知决策 / 角色规则)
// 红线: Engine 不拼 SQL, 不做 I/O;异步与持久化由 API/Repository 层负责
// ==========================================

pub mod continuity;
pub mod events;
pub mod notification;
pub mod overlap;
pub mod role_rules;

// 重导出核心引擎
pub use continuity::{CoverageGapAnalyzer, CoverageVerdict, GroupVerdict};
pub use events::{NoOpEventSink, NotificationEventSink, SinkError};
pub use notification::{CoverageEvaluation, NotificationDecisionEngine};
pub use overlap::OverlapDetector;
pub use role_rules::{rule_for, RoleRule, ROLE_RULES};
