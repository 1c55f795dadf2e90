// ==========================================
// 市场主体关系引擎 - 时间区间原语
// ==========================================
// 语义: 半开区间 [start, stop)
// - stop 为 None 表示开放式 (持续有效,无计划结束)
// - stop == start 表示已取消 (零长度,逻辑作废,但保留用于审计)
// ==========================================

use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 时间点
pub type TimePoint = DateTime<Utc>;

/// 开放式结束在比较运算中的哨兵值
///
/// 仅在本模块内部使用,对外一律以 Option 表达"无结束"
const UNBOUNDED: TimePoint = DateTime::<Utc>::MAX_UTC;

fn normalized_stop(stop: Option<TimePoint>) -> TimePoint {
    stop.unwrap_or(UNBOUNDED)
}

// ==========================================
// TimeInterval - 半开时间区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    start: TimePoint,        // 包含
    stop: Option<TimePoint>, // 不包含, None = 无限未来
}

impl TimeInterval {
    /// 创建区间
    ///
    /// # 错误
    /// - `DomainError::InvalidInterval`: stop < start
    pub fn try_new(start: TimePoint, stop: Option<TimePoint>) -> Result<Self, DomainError> {
        if let Some(stop) = stop {
            if stop < start {
                return Err(DomainError::InvalidInterval { start, stop });
            }
        }
        Ok(Self { start, stop })
    }

    /// 创建开放式区间 [start, ∞)
    pub fn open_ended(start: TimePoint) -> Self {
        Self { start, stop: None }
    }

    pub fn start(&self) -> TimePoint {
        self.start
    }

    pub fn stop(&self) -> Option<TimePoint> {
        self.stop
    }

    /// 是否开放式 (无结束时间)
    pub fn is_open_ended(&self) -> bool {
        self.stop.is_none()
    }

    /// 是否已取消 (stop == start)
    pub fn is_cancelled(&self) -> bool {
        self.stop == Some(self.start)
    }

    /// start <= point 且 (stop 为空 或 point < stop)
    pub fn contains(&self, point: TimePoint) -> bool {
        self.start <= point && point < normalized_stop(self.stop)
    }

    /// 两个区间是否重叠
    ///
    /// 半开语义: [t0,t1) 与 [t1,t2) 首尾相接,不算重叠。
    /// 已取消的区间不与任何区间重叠。
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        if self.is_cancelled() || other.is_cancelled() {
            return false;
        }
        self.start < normalized_stop(other.stop) && other.start < normalized_stop(self.stop)
    }

    /// 以新的结束时间生成区间 (用于追溯性设置 stop)
    pub fn with_stop(&self, stop: TimePoint) -> Result<Self, DomainError> {
        Self::try_new(self.start, Some(stop))
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stop {
            Some(stop) => write!(f, "[{}, {})", self.start.to_rfc3339(), stop.to_rfc3339()),
            None => write!(f, "[{}, ∞)", self.start.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(day: u32) -> TimePoint {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn closed(a: u32, b: u32) -> TimeInterval {
        TimeInterval::try_new(t(a), Some(t(b))).unwrap()
    }

    #[test]
    fn test_try_new_rejects_stop_before_start() {
        let result = TimeInterval::try_new(t(5), Some(t(4)));
        assert!(matches!(result, Err(DomainError::InvalidInterval { .. })));
    }

    #[test]
    fn test_contains_is_half_open() {
        let interval = closed(1, 10);
        assert!(interval.contains(t(1)));
        assert!(interval.contains(t(9)));
        assert!(!interval.contains(t(10)));
        assert!(!interval.contains(t(1) - Duration::seconds(1)));

        let open = TimeInterval::open_ended(t(1));
        assert!(open.contains(t(31)));
    }

    #[test]
    fn test_back_to_back_does_not_overlap() {
        for (t0, t1, t2) in [(1, 2, 3), (1, 15, 31), (3, 4, 20)] {
            let a = closed(t0, t1);
            let b = closed(t1, t2);
            assert!(!a.overlaps(&b));
            assert!(!b.overlaps(&a));
        }
        let a = closed(1, 5);
        let b = TimeInterval::open_ended(t(5));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let intervals = [
            closed(1, 5),
            closed(3, 8),
            closed(5, 5),
            closed(8, 12),
            TimeInterval::open_ended(t(10)),
            TimeInterval::open_ended(t(1)),
        ];
        for a in &intervals {
            for b in &intervals {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_open_ended_intervals_overlap() {
        let a = TimeInterval::open_ended(t(1));
        let b = TimeInterval::open_ended(t(20));
        assert!(a.overlaps(&b));
        assert!(a.overlaps(&closed(25, 26)));
    }

    #[test]
    fn test_cancelled_never_overlaps() {
        let cancelled = closed(5, 5);
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.contains(t(5)));
        for other in [closed(1, 10), TimeInterval::open_ended(t(1)), closed(5, 5)] {
            assert!(!cancelled.overlaps(&other));
        }
    }
}
