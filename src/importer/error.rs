// ==========================================
// 市场主体关系引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 行号从 1 开始计 (不含表头)
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::MarketRole;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("记录格式错误 (行 {row}, 字段 {field}): {message}")]
    MalformedRecord {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 引用解析错误 =====
    #[error("无法解析主体引用 (行 {row}): actor_number={actor_number}, role={role}")]
    UnresolvedReference {
        actor_number: String,
        role: MarketRole,
        row: usize,
    },

    // ===== 业务规则错误 =====
    #[error("领域规则违反 (行 {row}): {source}")]
    Domain {
        row: usize,
        #[source]
        source: DomainError,
    },

    // ===== 数据库错误 =====
    #[error("仓储操作失败: {0}")]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::FileNotFound(_) => "FILE_NOT_FOUND",
            ImportError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ImportError::FileReadError(_) => "FILE_READ_ERROR",
            ImportError::CsvParseError(_) => "CSV_PARSE_ERROR",
            ImportError::MalformedRecord { .. } => "MALFORMED_RECORD",
            ImportError::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            ImportError::Domain { source, .. } => source.code(),
            ImportError::Repository(RepositoryError::OptimisticLockFailure { .. }) => {
                "OPTIMISTIC_LOCK_FAILURE"
            }
            ImportError::Repository(_) => "REPOSITORY_ERROR",
            ImportError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// 将工作单元返回的仓储错误归类 (领域错误带上行号)
    pub fn at_row(row: usize, err: RepositoryError) -> Self {
        match err {
            RepositoryError::Domain(source) => ImportError::Domain { row, source },
            other => ImportError::Repository(other),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
