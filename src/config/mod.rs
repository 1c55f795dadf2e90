// ==========================================
// 市场主体关系引擎 - 配置层
// ==========================================
// 职责: 覆盖检查阈值及其覆写管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod coverage_config;
pub mod coverage_config_trait;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use coverage_config::{
    is_valid_minutes, CoverageCheckConfig, DEFAULT_COOLDOWN_MIN_REMAINING_MINUTES,
    DEFAULT_COOLDOWN_WINDOW_MINUTES, MAX_COOLDOWN_MINUTES,
};
pub use coverage_config_trait::{ConfigReadError, CoverageConfigReader};
