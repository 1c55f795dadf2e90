// ==========================================
// 市场主体关系引擎 - 流程委托 API
// ==========================================
// 职责: 创建 / 结束 / 取消委托,查询委托方的全部委托
// 流程: 加载聚合 → 应用领域操作 → 单事务保存 (revision 乐观锁)
// ==========================================

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::actor::{Actor, ActorNumber, GridAreaCode};
use crate::domain::delegation::ProcessDelegation;
use crate::domain::error::DomainError;
use crate::domain::interval::TimePoint;
use crate::domain::types::DelegationMessageType;
use crate::engine::role_rules;
use crate::repository::{ActorDirectory, ProcessDelegationStore};

/// 新建委托请求
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDelegationRequest {
    pub delegator: ActorNumber,
    pub delegated_to: ActorNumber,
    pub message_type: DelegationMessageType,
    pub grid_area: GridAreaCode,
    pub starts_at: TimePoint,
    pub stops_at: Option<TimePoint>,
}

pub struct DelegationApi {
    actors: Arc<dyn ActorDirectory>,
    store: Arc<dyn ProcessDelegationStore>,
}

impl DelegationApi {
    pub fn new(actors: Arc<dyn ActorDirectory>, store: Arc<dyn ProcessDelegationStore>) -> Self {
        Self { actors, store }
    }

    async fn require_actor(&self, actor_number: &ActorNumber) -> ApiResult<Actor> {
        self.actors
            .find_by_number(actor_number)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("主体 {} 不存在", actor_number)))
    }

    async fn require_delegation(
        &self,
        delegator: &Actor,
        message_type: DelegationMessageType,
    ) -> ApiResult<ProcessDelegation> {
        self.store
            .get(delegator.id, message_type)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "委托不存在: delegator={}, message_type={}",
                    delegator.actor_number, message_type
                ))
            })
    }

    /// 创建委托区间
    ///
    /// # 返回
    /// - 新区间ID
    ///
    /// # 错误
    /// - `DELEGATION_NOT_ALLOWED`: 委托方角色不允许委托该消息类型
    /// - `INVALID_DELEGATION_TARGET`: 目标非 Delegated 角色 / 非 Active / 为自身
    /// - `OVERLAP_CONFLICT`: 同 (委托方, 消息类型, 电网区域) 下区间重叠
    /// - `OPTIMISTIC_LOCK_FAILURE`: 并发写入
    pub async fn create_delegation(&self, request: &CreateDelegationRequest) -> ApiResult<Uuid> {
        let delegator = self.require_actor(&request.delegator).await?;
        let target = self.require_actor(&request.delegated_to).await?;

        if !role_rules::can_delegate(&delegator, request.message_type) {
            return Err(DomainError::DelegationNotAllowed {
                actor_number: delegator.actor_number.to_string(),
                message_type: request.message_type.to_string(),
            }
            .into());
        }

        let mut delegation = match self.store.get(delegator.id, request.message_type).await? {
            Some(existing) => existing,
            None => ProcessDelegation::new(&delegator, request.message_type)?,
        };
        let period_id = delegation.delegate_to(
            &target,
            request.grid_area.clone(),
            request.starts_at,
            request.stops_at,
        )?;
        self.store.save(&delegation).await?;

        info!(
            "委托已创建: delegator={}, delegated_to={}, message_type={}, grid_area={}, period_id={}",
            request.delegator, request.delegated_to, request.message_type, request.grid_area, period_id
        );
        Ok(period_id)
    }

    /// 结束委托区间 (stops_at == start 即取消)
    pub async fn stop_delegation(
        &self,
        delegator: &ActorNumber,
        message_type: DelegationMessageType,
        period_id: Uuid,
        stops_at: TimePoint,
        now: TimePoint,
    ) -> ApiResult<()> {
        let delegator = self.require_actor(delegator).await?;
        let mut delegation = self.require_delegation(&delegator, message_type).await?;
        delegation.stop_delegation(period_id, stops_at, now)?;
        self.store.save(&delegation).await?;

        info!(
            "委托已结束: delegator={}, period_id={}, stops_at={}",
            delegator.actor_number, period_id, stops_at
        );
        Ok(())
    }

    /// 取消委托区间
    pub async fn cancel_delegation(
        &self,
        delegator: &ActorNumber,
        message_type: DelegationMessageType,
        period_id: Uuid,
        now: TimePoint,
    ) -> ApiResult<()> {
        let delegator = self.require_actor(delegator).await?;
        let mut delegation = self.require_delegation(&delegator, message_type).await?;
        delegation.cancel(period_id, now)?;
        self.store.save(&delegation).await?;

        info!("委托已取消: delegator={}, period_id={}", delegator.actor_number, period_id);
        Ok(())
    }

    /// 委托方的全部委托
    pub async fn list_delegations(&self, delegator: &ActorNumber) -> ApiResult<Vec<ProcessDelegation>> {
        let delegator = self.require_actor(delegator).await?;
        Ok(self.store.list_for_delegator(delegator.id).await?)
    }
}
