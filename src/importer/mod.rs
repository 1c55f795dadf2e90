// ==========================================
// 市场主体关系引擎 - 导入层
// ==========================================
// 职责: 外部余额责任数据 (CSV 批量 / 来件请求) 校验并写入关系聚合
// 支持: CSV
// ==========================================

pub mod actor_lookup;
pub mod balance_responsibility_importer;
pub mod csv_parser;
pub mod error;

// 重导出核心类型
pub use actor_lookup::ActorLookup;
pub use balance_responsibility_importer::{
    BalanceResponsibilityImporter, ImportSummary, IncomingRelationRequest, IntakeSummary,
};
pub use csv_parser::{parse_time_point, BalanceResponsibilityRecord, RawRelationRow, RelationCsvParser};
pub use error::{ImportError, ImportResult};
