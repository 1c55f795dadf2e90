// ==========================================
// 市场主体关系引擎 - 时序关系领域模型
// ==========================================
// 职责: 分区键、关系区间 (RelationPeriod)、区间集合、余额责任关系聚合
// 红线: 区间只增不删;只允许新增区间或为已有区间设置 stop/closed_at
// 红线: 区间不可在分区键之间移动
// ==========================================

use crate::domain::actor::{ActorId, GridAreaCode};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::interval::{TimeInterval, TimePoint};
use crate::domain::types::MeteringPointType;
use crate::engine::overlap::OverlapDetector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

// ==========================================
// PartitionKey - 分区键
// ==========================================
// 两个区间只有分区键相同时才参与重叠/连续性比较
pub trait PartitionKey: Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display {}

/// 余额责任分区键: (售电商, 电网区域, 计量点类型)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceResponsibilityKey {
    pub energy_supplier: ActorId,
    pub grid_area: GridAreaCode,
    pub metering_point_type: MeteringPointType,
}

impl PartitionKey for BalanceResponsibilityKey {}

impl fmt::Display for BalanceResponsibilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "energy_supplier={}, grid_area={}, metering_point_type={}",
            self.energy_supplier, self.grid_area, self.metering_point_type
        )
    }
}

// ==========================================
// RelationPeriod - 关系区间
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationPeriod<K> {
    pub id: Uuid,
    pub partition_key: K,
    /// 余额责任方 或 被委托方
    pub counterparty: ActorId,
    pub interval: TimeInterval,
    /// 最近一次设置 stop 的时间 (驱动冷却期规则)
    pub closed_at: Option<TimePoint>,
}

impl<K: PartitionKey> RelationPeriod<K> {
    pub fn new(partition_key: K, counterparty: ActorId, interval: TimeInterval) -> Self {
        Self {
            id: Uuid::new_v4(),
            partition_key,
            counterparty,
            interval,
            closed_at: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.interval.is_cancelled()
    }
}

// ==========================================
// PeriodCollection - 聚合内的区间集合
// ==========================================
/// 聚合内部持有的有序区间集合
///
/// 所有写操作都经过 OverlapDetector 校验;
/// 对外只暴露只读切片,分析器拿到的是不可变快照。
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodCollection<K> {
    periods: Vec<RelationPeriod<K>>,
    dirty: BTreeSet<Uuid>,
}

impl<K: PartitionKey> Default for PeriodCollection<K> {
    fn default() -> Self {
        Self {
            periods: Vec::new(),
            dirty: BTreeSet::new(),
        }
    }
}

impl<K: PartitionKey> PeriodCollection<K> {
    /// 从持久化数据恢复 (不标记为已修改)
    pub fn restore(mut periods: Vec<RelationPeriod<K>>) -> Self {
        periods.sort_by_key(|p| p.interval.start());
        Self {
            periods,
            dirty: BTreeSet::new(),
        }
    }

    pub fn as_slice(&self) -> &[RelationPeriod<K>] {
        &self.periods
    }

    pub fn find(&self, period_id: Uuid) -> Option<&RelationPeriod<K>> {
        self.periods.iter().find(|p| p.id == period_id)
    }

    /// 新增区间
    ///
    /// # 错误
    /// - `OverlapConflict`: 与同分区键下未取消的区间重叠
    pub fn add_period(
        &mut self,
        partition_key: K,
        counterparty: ActorId,
        interval: TimeInterval,
    ) -> DomainResult<Uuid> {
        if let Some(conflict) =
            OverlapDetector.find_conflict(&interval, &partition_key, self.periods.iter())
        {
            return Err(overlap_conflict(&partition_key, &interval, conflict.id));
        }

        let period = RelationPeriod::new(partition_key, counterparty, interval);
        let id = period.id;
        let position = self
            .periods
            .partition_point(|p| p.interval.start() <= interval.start());
        self.periods.insert(position, period);
        self.dirty.insert(id);
        Ok(id)
    }

    /// 为已有区间设置 stop (None 表示重新开放)
    ///
    /// # 错误
    /// - `PeriodNotFound`: 区间不存在
    /// - `CancelledDelegationReuse`: 区间已取消,属终态
    /// - `InvalidInterval`: stop < start
    /// - `OverlapConflict`: 调整后的区间与同分区键其他区间重叠
    pub fn assign_stop(
        &mut self,
        period_id: Uuid,
        stop: Option<TimePoint>,
        now: TimePoint,
    ) -> DomainResult<()> {
        let index = self
            .periods
            .iter()
            .position(|p| p.id == period_id)
            .ok_or(DomainError::PeriodNotFound { period_id })?;

        let current = &self.periods[index];
        if current.is_cancelled() {
            return Err(DomainError::CancelledDelegationReuse { period_id });
        }

        let adjusted = TimeInterval::try_new(current.interval.start(), stop)?;
        let others = self.periods.iter().filter(|p| p.id != period_id);
        if let Some(conflict) = OverlapDetector.find_conflict(&adjusted, &current.partition_key, others) {
            return Err(overlap_conflict(&current.partition_key, &adjusted, conflict.id));
        }

        let period = &mut self.periods[index];
        period.interval = adjusted;
        period.closed_at = stop.map(|_| now);
        self.dirty.insert(period_id);
        Ok(())
    }

    /// 自上次持久化以来新增或修改过的区间
    pub fn dirty_periods(&self) -> impl Iterator<Item = &RelationPeriod<K>> {
        self.periods.iter().filter(move |p| self.dirty.contains(&p.id))
    }

    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn clear_changes(&mut self) {
        self.dirty.clear();
    }
}

fn overlap_conflict<K: PartitionKey>(
    partition_key: &K,
    interval: &TimeInterval,
    conflicting_period: Uuid,
) -> DomainError {
    DomainError::OverlapConflict {
        partition_key: partition_key.to_string(),
        start: interval.start(),
        stop: interval
            .stop()
            .map(|s| s.to_rfc3339())
            .unwrap_or_else(|| "∞".to_string()),
        conflicting_period,
    }
}

// ==========================================
// BalanceResponsibilityRelations - 余额责任关系聚合
// ==========================================
pub type BalanceResponsibilityPeriod = RelationPeriod<BalanceResponsibilityKey>;

/// 一条余额责任请求 (已解析主体编号)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRequest {
    pub balance_responsible: ActorId,
    pub grid_area: GridAreaCode,
    pub metering_point_type: MeteringPointType,
    pub interval: TimeInterval,
}

/// 请求应用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedChange {
    /// 新增区间
    Added(Uuid),
    /// 已有区间的 stop 被更新
    StopAssigned(Uuid),
    /// 与已有区间完全一致,无变化
    Unchanged(Uuid),
}

/// 售电商名下的全部余额责任关系
///
/// 并发控制: revision 用于乐观锁,保存时校验并递增
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceResponsibilityRelations {
    energy_supplier: ActorId,
    periods: PeriodCollection<BalanceResponsibilityKey>,
    revision: i64,
}

impl BalanceResponsibilityRelations {
    pub fn new(energy_supplier: ActorId) -> Self {
        Self {
            energy_supplier,
            periods: PeriodCollection::default(),
            revision: 0,
        }
    }

    pub fn restore(
        energy_supplier: ActorId,
        periods: Vec<BalanceResponsibilityPeriod>,
        revision: i64,
    ) -> Self {
        Self {
            energy_supplier,
            periods: PeriodCollection::restore(periods),
            revision,
        }
    }

    pub fn energy_supplier(&self) -> ActorId {
        self.energy_supplier
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn periods(&self) -> &[BalanceResponsibilityPeriod] {
        self.periods.as_slice()
    }

    pub fn changed_periods(&self) -> impl Iterator<Item = &BalanceResponsibilityPeriod> {
        self.periods.dirty_periods()
    }

    pub fn has_changes(&self) -> bool {
        self.periods.has_changes()
    }

    /// 持久化成功后调用: 清空变更标记并推进 revision
    pub fn mark_persisted(&mut self) {
        if self.periods.has_changes() {
            self.revision += 1;
            self.periods.clear_changes();
        }
    }

    pub fn key_for(&self, request: &RelationRequest) -> BalanceResponsibilityKey {
        BalanceResponsibilityKey {
            energy_supplier: self.energy_supplier,
            grid_area: request.grid_area.clone(),
            metering_point_type: request.metering_point_type,
        }
    }

    /// 应用一条余额责任请求
    ///
    /// # 规则
    /// 1. 同分区键、同余额责任方、同 start 的未取消区间已存在 → 视为更新,改写其 stop
    /// 2. 否则新增区间
    /// 3. 任何残留重叠 → OverlapConflict
    pub fn apply_request(
        &mut self,
        request: &RelationRequest,
        now: TimePoint,
    ) -> DomainResult<AppliedChange> {
        let key = self.key_for(request);
        let existing = self
            .periods
            .as_slice()
            .iter()
            .find(|p| {
                p.partition_key == key
                    && p.counterparty == request.balance_responsible
                    && p.interval.start() == request.interval.start()
                    && !p.is_cancelled()
            })
            .map(|p| (p.id, p.interval.stop()));

        match existing {
            Some((id, stop)) if stop == request.interval.stop() => Ok(AppliedChange::Unchanged(id)),
            Some((id, _)) => {
                self.periods.assign_stop(id, request.interval.stop(), now)?;
                Ok(AppliedChange::StopAssigned(id))
            }
            None => {
                let id = self
                    .periods
                    .add_period(key, request.balance_responsible, request.interval)?;
                Ok(AppliedChange::Added(id))
            }
        }
    }

    /// 为指定区间设置结束时间
    pub fn close_period(&mut self, period_id: Uuid, stop: TimePoint, now: TimePoint) -> DomainResult<()> {
        self.periods.assign_stop(period_id, Some(stop), now)
    }
}
