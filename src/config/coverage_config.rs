// ==========================================
// 市场主体关系引擎 - 覆盖检查配置
// ==========================================
// 职责: 冷却期阈值 (最近关闭的区间在宽限期内不报缺口)
// 默认: 关闭后 2 小时内,且距 stop 仍超过 1 天
// ==========================================

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// 冷却窗口默认值 (分钟)
pub const DEFAULT_COOLDOWN_WINDOW_MINUTES: i64 = 2 * 60;

/// 冷却期要求的距 stop 最小剩余时长默认值 (分钟)
pub const DEFAULT_COOLDOWN_MIN_REMAINING_MINUTES: i64 = 24 * 60;

/// 分钟配置上限 (10 年);超出视为非法值
pub const MAX_COOLDOWN_MINUTES: i64 = 10 * 366 * 24 * 60;

/// 分钟值是否在允许范围内
pub fn is_valid_minutes(minutes: i64) -> bool {
    (0..=MAX_COOLDOWN_MINUTES).contains(&minutes)
}

/// 越界分钟值回落到默认值,避免时长换算溢出
fn bounded_minutes(minutes: i64, default: i64) -> Duration {
    Some(minutes)
        .filter(|m| is_valid_minutes(*m))
        .and_then(Duration::try_minutes)
        .unwrap_or_else(|| Duration::minutes(default))
}

/// 覆盖检查配置
///
/// 冷却规则: `now - closed_at < cooldown_window` 且 `stop - now > cooldown_min_remaining`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCheckConfig {
    pub cooldown_window_minutes: i64,
    pub cooldown_min_remaining_minutes: i64,
}

impl CoverageCheckConfig {
    pub fn cooldown_window(&self) -> Duration {
        bounded_minutes(self.cooldown_window_minutes, DEFAULT_COOLDOWN_WINDOW_MINUTES)
    }

    pub fn cooldown_min_remaining(&self) -> Duration {
        bounded_minutes(
            self.cooldown_min_remaining_minutes,
            DEFAULT_COOLDOWN_MIN_REMAINING_MINUTES,
        )
    }
}

impl Default for CoverageCheckConfig {
    fn default() -> Self {
        Self {
            cooldown_window_minutes: DEFAULT_COOLDOWN_WINDOW_MINUTES,
            cooldown_min_remaining_minutes: DEFAULT_COOLDOWN_MIN_REMAINING_MINUTES,
        }
    }
}
