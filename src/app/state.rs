// ==========================================
// 市场主体关系引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{BalanceResponsibilityApi, DelegationApi};
use crate::config::ConfigManager;
use crate::db::{initialize_schema, open_sqlite_connection};
use crate::repository::{
    ActorRepository, BalanceResponsibilityRepository, DomainEventRepository,
    ProcessDelegationRepository, UnrecognizedActorRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "MARKET_RELATIONS_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 余额责任关系API (导入 / 查询 / 覆盖检查)
    pub balance_responsibility_api: Arc<BalanceResponsibilityApi>,

    /// 流程委托API
    pub delegation_api: Arc<DelegationApi>,

    /// 主体仓储 (主体登记与状态维护)
    pub actor_repo: Arc<ActorRepository>,

    /// 事件发件箱
    pub event_repo: Arc<DomainEventRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 1. 打开共享连接并初始化表结构
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        initialize_schema(&conn).map_err(|e| format!("无法初始化表结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let actor_repo = Arc::new(ActorRepository::from_connection(conn.clone()));
        let relation_repo = Arc::new(BalanceResponsibilityRepository::from_connection(conn.clone()));
        let delegation_repo = Arc::new(ProcessDelegationRepository::from_connection(conn.clone()));
        let unrecognized_repo = Arc::new(UnrecognizedActorRepository::from_connection(conn.clone()));
        let event_repo = Arc::new(DomainEventRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let balance_responsibility_api = Arc::new(BalanceResponsibilityApi::new(
            actor_repo.clone(),
            relation_repo,
            unrecognized_repo,
            event_repo.clone(),
            config_manager.clone(),
        ));
        let delegation_api = Arc::new(DelegationApi::new(actor_repo.clone(), delegation_repo));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            balance_responsibility_api,
            delegation_api,
            actor_repo,
            event_repo,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 `MARKET_RELATIONS_DB_PATH` → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./market_relations.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("market-relations");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => path = dir.join("market_relations.db"),
            Err(e) => tracing::warn!("无法创建数据目录 {}，回退到当前目录: {}", dir.display(), e),
        }
    }

    path.to_string_lossy().to_string()
}
