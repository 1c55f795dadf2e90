// ==========================================
// 市场主体关系引擎 - 领域类型定义
// ==========================================
// 职责: 市场主体状态、市场角色、计量点类型、可委托消息类型
// 序列化格式: 与数据库存储字符串一致
// ==========================================

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 市场主体状态 (Actor Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorStatus {
    New,      // 新建,尚未启用
    Active,   // 启用
    Inactive, // 停用
    Passive,  // 被动(仅保留历史)
}

impl ActorStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActorStatus::New => "New",
            ActorStatus::Active => "Active",
            ActorStatus::Inactive => "Inactive",
            ActorStatus::Passive => "Passive",
        }
    }
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl FromStr for ActorStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "New" => Ok(ActorStatus::New),
            "Active" => Ok(ActorStatus::Active),
            "Inactive" => Ok(ActorStatus::Inactive),
            "Passive" => Ok(ActorStatus::Passive),
            other => Err(DomainError::UnknownCode {
                kind: "ActorStatus",
                value: other.to_string(),
            }),
        }
    }
}

// ==========================================
// 市场角色 (Market Role / EIC Function)
// ==========================================
// 注: 角色相关的业务规则不在此处分支判断,统一见 engine::role_rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketRole {
    BalanceResponsibleParty,
    BillingAgent,
    EnergySupplier,
    GridAccessProvider,
    ImbalanceSettlementResponsible,
    MeterOperator,
    MeteredDataAdministrator,
    MeteredDataResponsible,
    MeteringPointAdministrator,
    SystemOperator,
    DanishEnergyAgency,
    DataHubAdministrator,
    IndependentAggregator,
    SerialEnergyTrader,
    Delegated,
    ItSupplier,
}

impl MarketRole {
    pub const ALL: [MarketRole; 16] = [
        MarketRole::BalanceResponsibleParty,
        MarketRole::BillingAgent,
        MarketRole::EnergySupplier,
        MarketRole::GridAccessProvider,
        MarketRole::ImbalanceSettlementResponsible,
        MarketRole::MeterOperator,
        MarketRole::MeteredDataAdministrator,
        MarketRole::MeteredDataResponsible,
        MarketRole::MeteringPointAdministrator,
        MarketRole::SystemOperator,
        MarketRole::DanishEnergyAgency,
        MarketRole::DataHubAdministrator,
        MarketRole::IndependentAggregator,
        MarketRole::SerialEnergyTrader,
        MarketRole::Delegated,
        MarketRole::ItSupplier,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MarketRole::BalanceResponsibleParty => "BalanceResponsibleParty",
            MarketRole::BillingAgent => "BillingAgent",
            MarketRole::EnergySupplier => "EnergySupplier",
            MarketRole::GridAccessProvider => "GridAccessProvider",
            MarketRole::ImbalanceSettlementResponsible => "ImbalanceSettlementResponsible",
            MarketRole::MeterOperator => "MeterOperator",
            MarketRole::MeteredDataAdministrator => "MeteredDataAdministrator",
            MarketRole::MeteredDataResponsible => "MeteredDataResponsible",
            MarketRole::MeteringPointAdministrator => "MeteringPointAdministrator",
            MarketRole::SystemOperator => "SystemOperator",
            MarketRole::DanishEnergyAgency => "DanishEnergyAgency",
            MarketRole::DataHubAdministrator => "DataHubAdministrator",
            MarketRole::IndependentAggregator => "IndependentAggregator",
            MarketRole::SerialEnergyTrader => "SerialEnergyTrader",
            MarketRole::Delegated => "Delegated",
            MarketRole::ItSupplier => "ItSupplier",
        }
    }
}

impl fmt::Display for MarketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl FromStr for MarketRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        MarketRole::ALL
            .iter()
            .copied()
            .find(|role| role.to_db_str() == trimmed)
            .ok_or_else(|| DomainError::UnknownCode {
                kind: "MarketRole",
                value: trimmed.to_string(),
            })
    }
}

// ==========================================
// 计量点类型 (Metering Point Type)
// ==========================================
// 编码: E17 消费 / E18 生产 / E20 交换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeteringPointType {
    #[serde(rename = "E17")]
    Consumption,
    #[serde(rename = "E18")]
    Production,
    #[serde(rename = "E20")]
    Exchange,
}

impl MeteringPointType {
    pub fn code(&self) -> &'static str {
        match self {
            MeteringPointType::Consumption => "E17",
            MeteringPointType::Production => "E18",
            MeteringPointType::Exchange => "E20",
        }
    }
}

impl fmt::Display for MeteringPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MeteringPointType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E17" => Ok(MeteringPointType::Consumption),
            "E18" => Ok(MeteringPointType::Production),
            "E20" => Ok(MeteringPointType::Exchange),
            other => Err(DomainError::UnknownCode {
                kind: "MeteringPointType",
                value: other.to_string(),
            }),
        }
    }
}

// ==========================================
// 可委托消息类型 (Delegation Message Type)
// ==========================================
// 对应 RSM 消息族,Inbound = 由被委托方代为接收, Outbound = 代为发送
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DelegationMessageType {
    Rsm012Inbound,
    Rsm012Outbound,
    Rsm014Inbound,
    Rsm016Inbound,
    Rsm016Outbound,
    Rsm017Inbound,
    Rsm017Outbound,
    Rsm018Inbound,
    Rsm019Inbound,
    Rsm020Inbound,
    Rsm020Outbound,
}

impl DelegationMessageType {
    pub const ALL: [DelegationMessageType; 11] = [
        DelegationMessageType::Rsm012Inbound,
        DelegationMessageType::Rsm012Outbound,
        DelegationMessageType::Rsm014Inbound,
        DelegationMessageType::Rsm016Inbound,
        DelegationMessageType::Rsm016Outbound,
        DelegationMessageType::Rsm017Inbound,
        DelegationMessageType::Rsm017Outbound,
        DelegationMessageType::Rsm018Inbound,
        DelegationMessageType::Rsm019Inbound,
        DelegationMessageType::Rsm020Inbound,
        DelegationMessageType::Rsm020Outbound,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DelegationMessageType::Rsm012Inbound => "Rsm012Inbound",
            DelegationMessageType::Rsm012Outbound => "Rsm012Outbound",
            DelegationMessageType::Rsm014Inbound => "Rsm014Inbound",
            DelegationMessageType::Rsm016Inbound => "Rsm016Inbound",
            DelegationMessageType::Rsm016Outbound => "Rsm016Outbound",
            DelegationMessageType::Rsm017Inbound => "Rsm017Inbound",
            DelegationMessageType::Rsm017Outbound => "Rsm017Outbound",
            DelegationMessageType::Rsm018Inbound => "Rsm018Inbound",
            DelegationMessageType::Rsm019Inbound => "Rsm019Inbound",
            DelegationMessageType::Rsm020Inbound => "Rsm020Inbound",
            DelegationMessageType::Rsm020Outbound => "Rsm020Outbound",
        }
    }
}

impl fmt::Display for DelegationMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl FromStr for DelegationMessageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        DelegationMessageType::ALL
            .iter()
            .copied()
            .find(|t| t.to_db_str() == trimmed)
            .ok_or_else(|| DomainError::UnknownCode {
                kind: "DelegationMessageType",
                value: trimmed.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metering_point_type_codes() {
        assert_eq!("e17".parse::<MeteringPointType>().unwrap(), MeteringPointType::Consumption);
        assert_eq!(" E18 ".parse::<MeteringPointType>().unwrap(), MeteringPointType::Production);
        assert_eq!(MeteringPointType::Exchange.to_string(), "E20");
        assert!("E99".parse::<MeteringPointType>().is_err());
    }

    #[test]
    fn test_market_role_db_roundtrip_covers_all_variants() {
        for role in MarketRole::ALL {
            assert_eq!(role.to_db_str().parse::<MarketRole>().unwrap(), role);
        }
        assert!("Janitor".parse::<MarketRole>().is_err());
    }

    #[test]
    fn test_delegation_message_type_parse() {
        assert_eq!(
            "Rsm017Outbound".parse::<DelegationMessageType>().unwrap(),
            DelegationMessageType::Rsm017Outbound
        );
        assert!("Rsm999".parse::<DelegationMessageType>().is_err());
    }
}
