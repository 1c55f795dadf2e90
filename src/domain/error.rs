// ==========================================
// 市场主体关系引擎 - 领域错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 错误信息必须携带可定位的标识 (主体编号/电网区域/时间范围)
// ==========================================

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    // ===== 区间错误 =====
    #[error("无效时间区间: stop={stop} 早于 start={start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },

    // ===== 时序一致性错误 =====
    #[error("时间区间重叠 (分区键 {partition_key}): 候选区间 [{start}, {stop}) 与已有区间 {conflicting_period} 冲突")]
    OverlapConflict {
        partition_key: String,
        start: DateTime<Utc>,
        /// 开放式结束显示为 "∞"
        stop: String,
        conflicting_period: Uuid,
    },

    #[error("委托区间已取消,不可再修改: period_id={period_id}")]
    CancelledDelegationReuse { period_id: Uuid },

    #[error("区间不存在: period_id={period_id}")]
    PeriodNotFound { period_id: Uuid },

    // ===== 委托规则错误 =====
    #[error("角色不允许委托: actor={actor_number}, message_type={message_type}")]
    DelegationNotAllowed {
        actor_number: String,
        message_type: String,
    },

    #[error("无效的委托目标: actor={actor_number}, 原因: {reason}")]
    InvalidDelegationTarget { actor_number: String, reason: String },

    // ===== 值对象错误 =====
    #[error("无效的主体编号: {0} (需为13位GLN或16位EIC)")]
    InvalidActorNumber(String),

    #[error("无效的电网区域编码: {0} (需为3位数字)")]
    InvalidGridAreaCode(String),

    #[error("未知的 {kind} 编码: {value}")]
    UnknownCode { kind: &'static str, value: String },
}

impl DomainError {
    /// 稳定错误码 (供调用方程序化识别)
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidInterval { .. } => "INVALID_INTERVAL",
            DomainError::OverlapConflict { .. } => "OVERLAP_CONFLICT",
            DomainError::CancelledDelegationReuse { .. } => "CANCELLED_DELEGATION_REUSE",
            DomainError::PeriodNotFound { .. } => "PERIOD_NOT_FOUND",
            DomainError::DelegationNotAllowed { .. } => "DELEGATION_NOT_ALLOWED",
            DomainError::InvalidDelegationTarget { .. } => "INVALID_DELEGATION_TARGET",
            DomainError::InvalidActorNumber(_) => "INVALID_ACTOR_NUMBER",
            DomainError::InvalidGridAreaCode(_) => "INVALID_GRID_AREA_CODE",
            DomainError::UnknownCode { .. } => "UNKNOWN_CODE",
        }
    }
}

/// Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
