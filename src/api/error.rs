// ==========================================
// 市场主体关系引擎 - API层错误类型
// ==========================================
// 职责: 汇总领域/仓储/导入错误,对外提供稳定错误码
// 约束: 错误信息必须带出相关标识 (主体编号、区间ID、行号)
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::MarketRole;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 重叠 / 取消区间复用 / 委托不允许 等
    #[error("领域规则违反: {0}")]
    DomainRuleViolation(#[from] DomainError),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("无法解析主体引用 (行 {row}): actor_number={actor_number}, role={role}")]
    UnresolvedReference {
        actor_number: String,
        role: MarketRole,
        row: usize,
    },

    #[error("记录格式错误 (行 {row}, 字段 {field}): {message}")]
    MalformedRecord {
        row: usize,
        field: String,
        message: String,
    },

    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DomainRuleViolation(e) => e.code(),
            ApiError::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            ApiError::MalformedRecord { .. } => "MALFORMED_RECORD",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::OptimisticLockFailure(_) => "OPTIMISTIC_LOCK_FAILURE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::ConfigError(_) => "CONFIG_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                aggregate,
                id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "{}({})已被其他写入方修改（期望revision={}，实际revision={}）",
                aggregate, id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::Domain(e) => ApiError::DomainRuleViolation(e),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnresolvedReference {
                actor_number,
                role,
                row,
            } => ApiError::UnresolvedReference {
                actor_number,
                role,
                row,
            },
            ImportError::MalformedRecord {
                row,
                field,
                message,
            } => ApiError::MalformedRecord {
                row,
                field,
                message,
            },
            ImportError::Domain { source, .. } => ApiError::DomainRuleViolation(source),
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::Other(e) => ApiError::Other(e),
            other @ (ImportError::FileNotFound(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::FileReadError(_)
            | ImportError::CsvParseError(_)) => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_codes_are_stable() {
        let err: ApiError = ImportError::UnresolvedReference {
            actor_number: "5790000000999".to_string(),
            role: MarketRole::BalanceResponsibleParty,
            row: 3,
        }
        .into();
        assert_eq!(err.code(), "UNRESOLVED_REFERENCE");
        assert!(err.to_string().contains("5790000000999"));

        let err: ApiError = RepositoryError::Domain(DomainError::CancelledDelegationReuse {
            period_id: Uuid::nil(),
        })
        .into();
        assert_eq!(err.code(), "CANCELLED_DELEGATION_REUSE");

        let err: ApiError = RepositoryError::OptimisticLockFailure {
            aggregate: "ProcessDelegation".to_string(),
            id: "x".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert_eq!(err.code(), "OPTIMISTIC_LOCK_FAILURE");
    }
}
