// ==========================================
// 市场主体关系引擎 - 重叠检测器
// ==========================================
// 职责: 判断候选区间是否与同分区键下已有的有效区间重叠
// 语义: 半开区间,首尾相接合法;已取消区间不参与判断
// 用途: 新建委托、追溯性设置 stop、应用余额责任请求
// ==========================================

use crate::domain::interval::{TimeInterval, TimePoint};
use crate::domain::relation::{PartitionKey, RelationPeriod};

/// 重叠检测器 (无状态)
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapDetector;

impl OverlapDetector {
    /// 候选区间 [candidate_start, candidate_stop) 是否与已有区间重叠
    ///
    /// candidate_stop 为 None 视为无限未来;
    /// candidate_stop < candidate_start 的区间不覆盖任何时刻,返回 false
    pub fn has_overlap<K: PartitionKey>(
        &self,
        candidate_start: TimePoint,
        candidate_stop: Option<TimePoint>,
        partition_key: &K,
        existing: &[RelationPeriod<K>],
    ) -> bool {
        match TimeInterval::try_new(candidate_start, candidate_stop) {
            Ok(candidate) => self
                .find_conflict(&candidate, partition_key, existing.iter())
                .is_some(),
            Err(_) => false,
        }
    }

    /// 返回第一个与候选区间冲突的已有区间
    pub fn find_conflict<'a, K, I>(
        &self,
        candidate: &TimeInterval,
        partition_key: &K,
        existing: I,
    ) -> Option<&'a RelationPeriod<K>>
    where
        K: PartitionKey + 'a,
        I: IntoIterator<Item = &'a RelationPeriod<K>>,
    {
        existing
            .into_iter()
            .filter(|p| &p.partition_key == partition_key)
            .filter(|p| !p.is_cancelled())
            .find(|p| p.interval.overlaps(candidate))
    }
}
