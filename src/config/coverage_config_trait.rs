// ==========================================
// 市场主体关系引擎 - 覆盖检查配置读取 Trait
// ==========================================
// 职责: 定义覆盖检查所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::coverage_config::CoverageCheckConfig;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigReadError = Box<dyn Error + Send + Sync>;

// ==========================================
// CoverageConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait CoverageConfigReader: Send + Sync {
    /// 冷却窗口（分钟）
    ///
    /// # 默认值
    /// - 120
    async fn get_cooldown_window_minutes(&self) -> Result<i64, ConfigReadError>;

    /// 冷却期要求的距 stop 最小剩余时长（分钟）
    ///
    /// # 默认值
    /// - 1440
    async fn get_cooldown_min_remaining_minutes(&self) -> Result<i64, ConfigReadError>;

    /// 组装完整的覆盖检查配置
    async fn load_coverage_config(&self) -> Result<CoverageCheckConfig, ConfigReadError> {
        Ok(CoverageCheckConfig {
            cooldown_window_minutes: self.get_cooldown_window_minutes().await?,
            cooldown_min_remaining_minutes: self.get_cooldown_min_remaining_minutes().await?,
        })
    }
}
