// ==========================================
// 市场主体关系引擎 - 角色规则表
// ==========================================
// 职责: 按市场角色登记的只读规则 (可委托消息类型 / 是否接收覆盖通知 / 是否发起余额责任关系)
// 约束: 编译期初始化,进程内只读,并发评估无需加锁
// 说明: 角色相关判断统一查表,不在业务代码中按角色分支
// ==========================================

use crate::domain::actor::Actor;
use crate::domain::types::{DelegationMessageType, MarketRole};

/// 单个角色的规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRule {
    pub role: MarketRole,
    /// 该角色可委托的消息类型
    pub delegable_message_types: &'static [DelegationMessageType],
    /// 是否为覆盖缺口通知的接收方
    pub receives_coverage_notifications: bool,
    /// 是否发起余额责任关系 (覆盖检查的对象)
    pub originates_balance_relations: bool,
}

use DelegationMessageType::*;

const GRID_ACCESS_PROVIDER_DELEGABLE: &[DelegationMessageType] = &[
    Rsm012Inbound,
    Rsm012Outbound,
    Rsm014Inbound,
    Rsm016Inbound,
    Rsm016Outbound,
    Rsm017Inbound,
    Rsm017Outbound,
    Rsm018Inbound,
    Rsm020Inbound,
    Rsm020Outbound,
];

const ENERGY_SUPPLIER_DELEGABLE: &[DelegationMessageType] = &[
    Rsm012Inbound,
    Rsm014Inbound,
    Rsm016Inbound,
    Rsm017Inbound,
    Rsm019Inbound,
];

const BALANCE_RESPONSIBLE_DELEGABLE: &[DelegationMessageType] =
    &[Rsm014Inbound, Rsm016Inbound, Rsm019Inbound];

const NONE: &[DelegationMessageType] = &[];

const fn rule(
    role: MarketRole,
    delegable_message_types: &'static [DelegationMessageType],
    receives_coverage_notifications: bool,
    originates_balance_relations: bool,
) -> RoleRule {
    RoleRule {
        role,
        delegable_message_types,
        receives_coverage_notifications,
        originates_balance_relations,
    }
}

/// 全部角色规则,按 MarketRole 声明顺序排列 (下标即角色序号)
pub static ROLE_RULES: [RoleRule; 16] = [
    rule(MarketRole::BalanceResponsibleParty, BALANCE_RESPONSIBLE_DELEGABLE, false, false),
    rule(MarketRole::BillingAgent, NONE, false, false),
    rule(MarketRole::EnergySupplier, ENERGY_SUPPLIER_DELEGABLE, false, true),
    rule(MarketRole::GridAccessProvider, GRID_ACCESS_PROVIDER_DELEGABLE, false, false),
    rule(MarketRole::ImbalanceSettlementResponsible, NONE, false, false),
    rule(MarketRole::MeterOperator, NONE, false, false),
    rule(MarketRole::MeteredDataAdministrator, NONE, false, false),
    rule(MarketRole::MeteredDataResponsible, NONE, false, false),
    rule(MarketRole::MeteringPointAdministrator, NONE, false, false),
    rule(MarketRole::SystemOperator, NONE, false, false),
    rule(MarketRole::DanishEnergyAgency, NONE, false, false),
    rule(MarketRole::DataHubAdministrator, NONE, true, false),
    rule(MarketRole::IndependentAggregator, NONE, false, false),
    rule(MarketRole::SerialEnergyTrader, NONE, false, false),
    rule(MarketRole::Delegated, NONE, false, false),
    rule(MarketRole::ItSupplier, NONE, false, false),
];

/// 查询角色规则 (按角色序号直接取表)
pub fn rule_for(role: MarketRole) -> RoleRule {
    ROLE_RULES[role as usize]
}

/// 主体的任一角色允许委托该消息类型
pub fn can_delegate(actor: &Actor, message_type: DelegationMessageType) -> bool {
    actor
        .roles
        .iter()
        .any(|role| rule_for(*role).delegable_message_types.contains(&message_type))
}

/// 是否为覆盖缺口通知目标: 状态 Active 且持有接收通知的角色
pub fn is_notification_target(actor: &Actor) -> bool {
    actor.is_active()
        && actor
            .roles
            .iter()
            .any(|role| rule_for(*role).receives_coverage_notifications)
}

/// 是否需要接受覆盖检查 (持有发起余额责任关系的角色)
pub fn originates_balance_relations(actor: &Actor) -> bool {
    actor
        .roles
        .iter()
        .any(|role| rule_for(*role).originates_balance_relations)
}
