// ==========================================
// 市场主体关系引擎 - 连续性/缺口分析器
// ==========================================
// 职责: 判断每个分区键从 now 起是否存在不间断、最终开放式的区间链
// 输入: 某主体的全部区间 (不可变快照) + 当前时间
// 输出: 每个分区键的判定结果
// 红线: 纯同步计算,不做 I/O
// ==========================================

use crate::config::CoverageCheckConfig;
use crate::domain::interval::TimePoint;
use crate::domain::relation::{PartitionKey, RelationPeriod};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

// ==========================================
// CoverageVerdict - 单个分区键的判定
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoverageVerdict {
    /// 当前有效区间链最终开放式,无缺口
    Continuous,
    /// now 时刻无有效区间 (不由本分析器报告)
    NoActiveCoverage,
    /// 处于冷却期,暂不报缺口
    CooldownSuppressed,
    /// 区间链在 uncovered_from 处断开
    Gap { uncovered_from: TimePoint },
    /// 开放式区间之后仍有其他区间 (矛盾,按缺口处理)
    Inconsistent { open_period: Uuid },
}

impl CoverageVerdict {
    pub fn is_gap(&self) -> bool {
        matches!(
            self,
            CoverageVerdict::Gap { .. } | CoverageVerdict::Inconsistent { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupVerdict<K> {
    pub partition_key: K,
    pub verdict: CoverageVerdict,
}

// ==========================================
// CoverageGapAnalyzer - 覆盖缺口分析器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CoverageGapAnalyzer {
    config: CoverageCheckConfig,
}

impl CoverageGapAnalyzer {
    pub fn new(config: CoverageCheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoverageCheckConfig {
        &self.config
    }

    /// 任一分区键存在缺口即返回 true
    pub fn has_coverage_gap<K: PartitionKey>(&self, periods: &[RelationPeriod<K>], now: TimePoint) -> bool {
        self.analyze(periods, now).iter().any(|g| g.verdict.is_gap())
    }

    /// 按分区键分组后逐组判定 (按分区键有序输出)
    pub fn analyze<K: PartitionKey>(
        &self,
        periods: &[RelationPeriod<K>],
        now: TimePoint,
    ) -> Vec<GroupVerdict<K>> {
        let mut groups: BTreeMap<&K, Vec<&RelationPeriod<K>>> = BTreeMap::new();
        for period in periods {
            groups.entry(&period.partition_key).or_default().push(period);
        }

        groups
            .into_iter()
            .map(|(key, group)| GroupVerdict {
                partition_key: key.clone(),
                verdict: self.analyze_group(&group, now),
            })
            .collect()
    }

    /// 判定单个分区键 (调用方保证 group 内分区键一致)
    ///
    /// # 规则
    /// 1. 剔除已取消区间,找到包含 now 的区间;没有 → NoActiveCoverage
    /// 2. 有效区间开放式 → Continuous
    /// 3. 冷却期: now - closed_at < 窗口 且 stop - now > 最小剩余 → CooldownSuppressed
    /// 4. 按 start 排序向后遍历: 后继 start 必须等于前驱 stop;
    ///    链终止于开放式区间 → Continuous,否则 → Gap
    pub fn analyze_group<K: PartitionKey>(
        &self,
        group: &[&RelationPeriod<K>],
        now: TimePoint,
    ) -> CoverageVerdict {
        let mut ordered: Vec<&RelationPeriod<K>> =
            group.iter().copied().filter(|p| !p.is_cancelled()).collect();
        ordered.sort_by_key(|p| p.interval.start());

        let Some(active_index) = ordered.iter().position(|p| p.interval.contains(now)) else {
            return CoverageVerdict::NoActiveCoverage;
        };

        let active = ordered[active_index];
        let Some(active_stop) = active.interval.stop() else {
            return CoverageVerdict::Continuous;
        };

        if self.in_cooldown(active.closed_at, active_stop, now) {
            return CoverageVerdict::CooldownSuppressed;
        }

        let mut current = active;
        for next in &ordered[active_index + 1..] {
            let Some(current_stop) = current.interval.stop() else {
                return CoverageVerdict::Inconsistent {
                    open_period: current.id,
                };
            };
            if next.interval.start() != current_stop {
                return CoverageVerdict::Gap {
                    uncovered_from: current_stop,
                };
            }
            current = next;
        }

        match current.interval.stop() {
            None => CoverageVerdict::Continuous,
            Some(stop) => CoverageVerdict::Gap {
                uncovered_from: stop,
            },
        }
    }

    /// closed_at 缺失时不适用冷却期
    fn in_cooldown(&self, closed_at: Option<TimePoint>, stop: TimePoint, now: TimePoint) -> bool {
        match closed_at {
            Some(closed_at) => {
                now - closed_at < self.config.cooldown_window()
                    && stop - now > self.config.cooldown_min_remaining()
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::{ActorId, GridAreaCode};
    use crate::domain::interval::TimeInterval;
    use crate::domain::relation::BalanceResponsibilityKey;
    use crate::domain::types::MeteringPointType;
    use chrono::{Duration, TimeZone, Utc};

    type Period = RelationPeriod<BalanceResponsibilityKey>;

    fn day(m: u32, d: u32) -> TimePoint {
        Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
    }

    fn key(supplier: ActorId, mpt: MeteringPointType) -> BalanceResponsibilityKey {
        BalanceResponsibilityKey {
            energy_supplier: supplier,
            grid_area: GridAreaCode::parse("804").unwrap(),
            metering_point_type: mpt,
        }
    }

    fn period(
        k: &BalanceResponsibilityKey,
        from: TimePoint,
        to: Option<TimePoint>,
        closed_at: Option<TimePoint>,
    ) -> Period {
        let mut p = RelationPeriod::new(
            k.clone(),
            ActorId::new_v4(),
            TimeInterval::try_new(from, to).unwrap(),
        );
        p.closed_at = closed_at;
        p
    }

    fn analyzer() -> CoverageGapAnalyzer {
        CoverageGapAnalyzer::default()
    }

    #[test]
    fn test_single_open_ended_period_has_no_gap() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let periods = vec![period(&k, day(1, 1), None, None)];
        assert!(!analyzer().has_coverage_gap(&periods, day(5, 1)));
    }

    #[test]
    fn test_open_ended_terminal_chain_has_no_gap_at_any_now() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let periods = vec![
            period(&k, day(1, 1), Some(day(2, 1)), None),
            period(&k, day(2, 1), Some(day(3, 1)), None),
            period(&k, day(3, 1), None, None),
        ];
        for now in [day(1, 1), day(1, 31), day(2, 1), day(2, 15), day(3, 1), day(12, 31)] {
            assert!(!analyzer().has_coverage_gap(&periods, now), "now={}", now);
        }
    }

    #[test]
    fn test_single_hole_is_gap() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let periods = vec![
            period(&k, day(1, 1), Some(day(3, 1)), Some(day(1, 1))),
            period(&k, day(4, 1), Some(day(6, 1)), None),
        ];
        let verdicts = analyzer().analyze(&periods, day(2, 1));
        assert_eq!(
            verdicts[0].verdict,
            CoverageVerdict::Gap {
                uncovered_from: day(3, 1)
            }
        );
    }

    #[test]
    fn test_hole_far_in_future_is_still_gap() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let periods = vec![
            period(&k, day(1, 1), Some(day(2, 1)), None),
            period(&k, day(2, 1), Some(day(10, 1)), None),
            period(&k, day(11, 1), None, None),
        ];
        assert!(analyzer().has_coverage_gap(&periods, day(1, 15)));
    }

    #[test]
    fn test_single_closed_period_without_successor_is_gap() {
        let k = key(ActorId::new_v4(), MeteringPointType::Production);
        let periods = vec![period(&k, day(1, 1), Some(day(6, 1)), None)];
        assert!(analyzer().has_coverage_gap(&periods, day(5, 1)));
    }

    #[test]
    fn test_cooldown_suppresses_recent_close() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let now = day(5, 1) + Duration::hours(12);

        let recent = vec![period(&k, day(1, 1), Some(now + Duration::days(2)), Some(now - Duration::hours(1)))];
        assert_eq!(
            analyzer().analyze(&recent, now)[0].verdict,
            CoverageVerdict::CooldownSuppressed
        );

        let stale = vec![period(&k, day(1, 1), Some(now + Duration::days(2)), Some(now - Duration::hours(3)))];
        assert!(analyzer().has_coverage_gap(&stale, now));
    }

    #[test]
    fn test_cooldown_requires_distant_stop() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let now = day(5, 1);
        let periods = vec![period(
            &k,
            day(1, 1),
            Some(now + Duration::hours(12)),
            Some(now - Duration::minutes(10)),
        )];
        assert!(analyzer().has_coverage_gap(&periods, now));
    }

    #[test]
    fn test_cooldown_thresholds_are_configurable() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let now = day(5, 1);
        let periods = vec![period(
            &k,
            day(1, 1),
            Some(now + Duration::days(2)),
            Some(now - Duration::hours(3)),
        )];
        let relaxed = CoverageGapAnalyzer::new(CoverageCheckConfig {
            cooldown_window_minutes: 4 * 60,
            cooldown_min_remaining_minutes: 24 * 60,
        });
        assert!(!relaxed.has_coverage_gap(&periods, now));
    }

    #[test]
    fn test_no_active_period_is_not_reported() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let periods = vec![period(&k, day(6, 1), None, None)];
        let verdicts = analyzer().analyze(&periods, day(5, 1));
        assert_eq!(verdicts[0].verdict, CoverageVerdict::NoActiveCoverage);
        assert!(!analyzer().has_coverage_gap(&periods, day(5, 1)));
        assert!(!analyzer().has_coverage_gap::<BalanceResponsibilityKey>(&[], day(5, 1)));
    }

    #[test]
    fn test_cancelled_periods_are_ignored() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let periods = vec![
            period(&k, day(1, 1), Some(day(3, 1)), None),
            // 已取消的同起点区间不能"补"上缺口
            period(&k, day(3, 1), Some(day(3, 1)), None),
            period(&k, day(4, 1), None, None),
        ];
        assert!(analyzer().has_coverage_gap(&periods, day(2, 1)));
    }

    #[test]
    fn test_open_ended_followed_by_more_periods_is_inconsistent() {
        let k = key(ActorId::new_v4(), MeteringPointType::Consumption);
        let first = period(&k, day(1, 1), Some(day(2, 1)), None);
        let dangling = period(&k, day(2, 1), None, None);
        let dangling_id = dangling.id;
        let after = period(&k, day(5, 1), None, None);
        let verdicts = analyzer().analyze(&[first, dangling, after], day(1, 15));
        assert_eq!(
            verdicts[0].verdict,
            CoverageVerdict::Inconsistent {
                open_period: dangling_id
            }
        );
    }

    #[test]
    fn test_groups_are_evaluated_independently() {
        let supplier = ActorId::new_v4();
        let consumption = key(supplier, MeteringPointType::Consumption);
        let production = key(supplier, MeteringPointType::Production);
        let periods = vec![
            period(&consumption, day(1, 1), None, None),
            period(&production, day(1, 1), Some(day(6, 1)), None),
        ];
        let verdicts = analyzer().analyze(&periods, day(2, 1));
        assert_eq!(verdicts.len(), 2);
        let gaps: Vec<_> = verdicts.iter().filter(|v| v.verdict.is_gap()).collect();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].partition_key, production);
        assert!(analyzer().has_coverage_gap(&periods, day(2, 1)));
    }
}
