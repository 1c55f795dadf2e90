// ==========================================
// 市场主体关系引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id + key → value)
// 说明: 未配置或格式错误时回落到默认值,并记录告警
// ==========================================

use crate::config::coverage_config::{
    is_valid_minutes, DEFAULT_COOLDOWN_MIN_REMAINING_MINUTES, DEFAULT_COOLDOWN_WINDOW_MINUTES,
};
use crate::config::coverage_config_trait::{ConfigReadError, CoverageConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, ConfigReadError> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigReadError> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigReadError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), ConfigReadError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, ConfigReadError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }

    /// 读取分钟配置，缺失、非法或超过上限时回落到默认值
    fn get_minutes_or_default(&self, key: &str, default: i64) -> Result<i64, ConfigReadError> {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<i64>() {
            Ok(v) if is_valid_minutes(v) => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    "分钟配置格式错误，使用默认值 {}",
                    default
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// CoverageConfigReader Trait 实现
// ==========================================
#[async_trait]
impl CoverageConfigReader for ConfigManager {
    async fn get_cooldown_window_minutes(&self) -> Result<i64, ConfigReadError> {
        self.get_minutes_or_default(
            config_keys::COOLDOWN_WINDOW_MINUTES,
            DEFAULT_COOLDOWN_WINDOW_MINUTES,
        )
    }

    async fn get_cooldown_min_remaining_minutes(&self) -> Result<i64, ConfigReadError> {
        self.get_minutes_or_default(
            config_keys::COOLDOWN_MIN_REMAINING_MINUTES,
            DEFAULT_COOLDOWN_MIN_REMAINING_MINUTES,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 覆盖检查冷却期
    pub const COOLDOWN_WINDOW_MINUTES: &str = "coverage.cooldown_window_minutes";
    pub const COOLDOWN_MIN_REMAINING_MINUTES: &str = "coverage.cooldown_min_remaining_minutes";
}
