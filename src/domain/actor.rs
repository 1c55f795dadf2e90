// ==========================================
// 市场主体关系引擎 - 市场主体领域模型
// ==========================================
// 职责: 市场主体 (Actor) 及其值对象 (主体ID、主体编号、电网区域编码)
// 说明: 主体的增删改属于外部 CRUD 流程,此处只承载引擎所需的只读视图
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::{ActorStatus, MarketRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ==========================================
// ActorId - 主体内部ID
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ==========================================
// ActorNumber - 主体编号 (GLN / EIC)
// ==========================================
// GLN: 13位数字; EIC: 16位字母数字
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorNumber(String);

impl ActorNumber {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim();
        let is_gln = value.len() == 13 && value.chars().all(|c| c.is_ascii_digit());
        let is_eic = value.len() == 16 && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if is_gln || is_eic {
            Ok(Self(value.to_string()))
        } else {
            Err(DomainError::InvalidActorNumber(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ActorNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActorNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActorNumber> for String {
    fn from(value: ActorNumber) -> Self {
        value.0
    }
}

impl fmt::Display for ActorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==========================================
// GridAreaCode - 电网区域编码 (3位数字)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridAreaCode(String);

impl GridAreaCode {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim();
        if value.len() == 3 && value.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(DomainError::InvalidGridAreaCode(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GridAreaCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GridAreaCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GridAreaCode> for String {
    fn from(value: GridAreaCode) -> Self {
        value.0
    }
}

impl fmt::Display for GridAreaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==========================================
// Actor - 市场主体
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub actor_number: ActorNumber,
    pub status: ActorStatus,
    pub roles: BTreeSet<MarketRole>,
    pub grid_areas: BTreeSet<GridAreaCode>,
}

impl Actor {
    pub fn new(actor_number: ActorNumber, status: ActorStatus) -> Self {
        Self {
            id: ActorId::new_v4(),
            actor_number,
            status,
            roles: BTreeSet::new(),
            grid_areas: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: MarketRole) -> Self {
        self.roles.insert(role);
        self
    }

    pub fn with_grid_area(mut self, grid_area: GridAreaCode) -> Self {
        self.grid_areas.insert(grid_area);
        self
    }

    pub fn has_role(&self, role: MarketRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_active(&self) -> bool {
        self.status == ActorStatus::Active
    }
}
