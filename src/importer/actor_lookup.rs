// ==========================================
// 市场主体关系引擎 - 主体编号解析
// ==========================================
// 职责: 一次加载主体目录,按 (编号, 角色) 解析主体ID
// 说明: 解析不看主体状态,停用主体的历史关系仍可导入
// ==========================================

use crate::domain::actor::{Actor, ActorId, ActorNumber};
use crate::domain::types::MarketRole;
use std::collections::HashMap;

pub struct ActorLookup {
    // 仅按编号建键: 依赖 db.rs 中 actor.actor_number 的 UNIQUE 约束
    by_number: HashMap<ActorNumber, Actor>,
}

impl ActorLookup {
    pub fn new(actors: Vec<Actor>) -> Self {
        Self {
            by_number: actors
                .into_iter()
                .map(|a| (a.actor_number.clone(), a))
                .collect(),
        }
    }

    /// 解析持有指定角色的主体
    pub fn resolve(&self, actor_number: &ActorNumber, role: MarketRole) -> Option<ActorId> {
        self.by_number
            .get(actor_number)
            .filter(|a| a.has_role(role))
            .map(|a| a.id)
    }

    /// 解析未校验格式的编号 (来件请求)
    pub fn resolve_raw(&self, raw_number: &str, role: MarketRole) -> Option<ActorId> {
        ActorNumber::parse(raw_number)
            .ok()
            .and_then(|number| self.resolve(&number, role))
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}
