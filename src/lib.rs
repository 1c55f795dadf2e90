// ==========================================
// 市场主体关系引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 能源市场数据中心的时序关系一致性引擎
// 范围: 余额责任关系 / 流程委托 / 覆盖缺口通知
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、聚合与时间区间
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 重叠检测 / 连续性分析 / 通知决策
pub mod engine;

// 导入层 - 批量导入与来件处理
pub mod importer;

// 配置层 - 冷却期配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/表结构）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ActorStatus, DelegationMessageType, MarketRole, MeteringPointType};

// 领域实体
pub use domain::{
    Actor, ActorId, ActorNumber, BalanceResponsibilityPeriod, BalanceResponsibilityRelations,
    DomainError, GridAreaCode, NotificationEvent, ProcessDelegation, TimeInterval, TimePoint,
};

// 引擎
pub use engine::{CoverageGapAnalyzer, NotificationDecisionEngine, OverlapDetector};

// API
pub use api::{BalanceResponsibilityApi, DelegationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "市场主体关系引擎";
