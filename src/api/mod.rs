// ==========================================
// 市场主体关系引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行入口与集成方调用
// ==========================================

pub mod balance_responsibility_api;
pub mod delegation_api;
pub mod error;

// 重导出核心类型
pub use balance_responsibility_api::{BalanceResponsibilityApi, CoverageCheckReport};
pub use delegation_api::{CreateDelegationRequest, DelegationApi};
pub use error::{ApiError, ApiResult};
