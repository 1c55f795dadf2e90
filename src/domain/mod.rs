// ==========================================
// 市场主体关系引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象、聚合与领域事件
// 红线: 不含数据访问逻辑
// ==========================================

pub mod actor;
pub mod delegation;
pub mod error;
pub mod interval;
pub mod notification;
pub mod relation;
pub mod types;

// 重导出核心类型
pub use actor::{Actor, ActorId, ActorNumber, GridAreaCode};
pub use delegation::{DelegationKey, DelegationPeriod, ProcessDelegation};
pub use error::{DomainError, DomainResult};
pub use interval::{TimeInterval, TimePoint};
pub use notification::{CoverageGapDetected, NotificationEvent};
pub use relation::{
    AppliedChange, BalanceResponsibilityKey, BalanceResponsibilityPeriod,
    BalanceResponsibilityRelations, PartitionKey, PeriodCollection, RelationPeriod,
    RelationRequest,
};
pub use types::{ActorStatus, DelegationMessageType, MarketRole, MeteringPointType};
