// ==========================================
// 市场主体关系引擎 - 流程委托领域模型
// ==========================================
// 职责: 委托方将某类消息/流程在某电网区域的处理责任委托给被委托方
// 分区键: (委托方, 消息类型, 电网区域)
// 红线: 同分区键下委托区间不得重叠;已取消区间 (stop == start) 为终态
// ==========================================

use crate::domain::actor::{Actor, ActorId, GridAreaCode};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::interval::{TimeInterval, TimePoint};
use crate::domain::relation::{PartitionKey, PeriodCollection, RelationPeriod};
use crate::domain::types::{DelegationMessageType, MarketRole};
use crate::engine::role_rules;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 委托分区键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DelegationKey {
    pub delegator: ActorId,
    pub message_type: DelegationMessageType,
    pub grid_area: GridAreaCode,
}

impl PartitionKey for DelegationKey {}

impl fmt::Display for DelegationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delegator={}, message_type={}, grid_area={}",
            self.delegator, self.message_type, self.grid_area
        )
    }
}

pub type DelegationPeriod = RelationPeriod<DelegationKey>;

// ==========================================
// ProcessDelegation - 流程委托聚合
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDelegation {
    id: Uuid,
    delegator: ActorId,
    message_type: DelegationMessageType,
    periods: PeriodCollection<DelegationKey>,
    revision: i64,
}

impl ProcessDelegation {
    /// 创建新的委托聚合
    ///
    /// # 错误
    /// - `DelegationNotAllowed`: 委托方的角色均不允许委托该消息类型
    pub fn new(delegator: &Actor, message_type: DelegationMessageType) -> DomainResult<Self> {
        if !role_rules::can_delegate(delegator, message_type) {
            return Err(DomainError::DelegationNotAllowed {
                actor_number: delegator.actor_number.to_string(),
                message_type: message_type.to_string(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            delegator: delegator.id,
            message_type,
            periods: PeriodCollection::default(),
            revision: 0,
        })
    }

    pub fn restore(
        id: Uuid,
        delegator: ActorId,
        message_type: DelegationMessageType,
        periods: Vec<DelegationPeriod>,
        revision: i64,
    ) -> Self {
        Self {
            id,
            delegator,
            message_type,
            periods: PeriodCollection::restore(periods),
            revision,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn delegator(&self) -> ActorId {
        self.delegator
    }

    pub fn message_type(&self) -> DelegationMessageType {
        self.message_type
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn periods(&self) -> &[DelegationPeriod] {
        self.periods.as_slice()
    }

    pub fn changed_periods(&self) -> impl Iterator<Item = &DelegationPeriod> {
        self.periods.dirty_periods()
    }

    pub fn has_changes(&self) -> bool {
        self.periods.has_changes()
    }

    pub fn mark_persisted(&mut self) {
        if self.periods.has_changes() {
            self.revision += 1;
            self.periods.clear_changes();
        }
    }

    /// 委托给目标主体
    ///
    /// # 规则
    /// - 目标必须持有 Delegated 角色且处于 Active 状态
    /// - 不可委托给自己
    /// - 同 (委托方, 消息类型, 电网区域) 下不得与已有区间重叠
    pub fn delegate_to(
        &mut self,
        target: &Actor,
        grid_area: GridAreaCode,
        starts_at: TimePoint,
        stops_at: Option<TimePoint>,
    ) -> DomainResult<Uuid> {
        if target.id == self.delegator {
            return Err(DomainError::InvalidDelegationTarget {
                actor_number: target.actor_number.to_string(),
                reason: "不可委托给自身".to_string(),
            });
        }
        if !target.has_role(MarketRole::Delegated) {
            return Err(DomainError::InvalidDelegationTarget {
                actor_number: target.actor_number.to_string(),
                reason: "目标主体未持有 Delegated 角色".to_string(),
            });
        }
        if !target.is_active() {
            return Err(DomainError::InvalidDelegationTarget {
                actor_number: target.actor_number.to_string(),
                reason: format!("目标主体状态为 {}", target.status),
            });
        }

        let interval = TimeInterval::try_new(starts_at, stops_at)?;
        let key = DelegationKey {
            delegator: self.delegator,
            message_type: self.message_type,
            grid_area,
        };
        self.periods.add_period(key, target.id, interval)
    }

    /// 结束委托 (stops_at == start 即取消)
    ///
    /// # 错误
    /// - `PeriodNotFound` / `CancelledDelegationReuse` / `InvalidInterval` / `OverlapConflict`
    pub fn stop_delegation(
        &mut self,
        period_id: Uuid,
        stops_at: TimePoint,
        now: TimePoint,
    ) -> DomainResult<()> {
        self.periods.assign_stop(period_id, Some(stops_at), now)
    }

    /// 取消委托: 将 stop 设为 start
    pub fn cancel(&mut self, period_id: Uuid, now: TimePoint) -> DomainResult<()> {
        let start = self
            .periods
            .find(period_id)
            .map(|p| p.interval.start())
            .ok_or(DomainError::PeriodNotFound { period_id })?;
        self.stop_delegation(period_id, start, now)
    }
}
