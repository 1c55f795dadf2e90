// ==========================================
// 市场主体关系引擎 - 行映射与乐观锁工具
// ==========================================
// 职责: 列值解析 (uuid / 枚举代码 / 时间区间) + 聚合 revision 校验递增
// ==========================================

use crate::domain::actor::ActorId;
use crate::domain::interval::{TimeInterval, TimePoint};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::error::Error;
use std::str::FromStr;
use uuid::Uuid;

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub fn get_actor_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<ActorId> {
    get_uuid(row, idx).map(ActorId)
}

/// 解析以代码存储的值 (枚举 / 主体编号 / 电网区域)
pub fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

/// 从 (start, stop) 两列恢复时间区间
pub fn get_interval(row: &Row<'_>, start_idx: usize, stop_idx: usize) -> rusqlite::Result<TimeInterval> {
    let start: TimePoint = row.get(start_idx)?;
    let stop: Option<TimePoint> = row.get(stop_idx)?;
    TimeInterval::try_new(start, stop).map_err(|e| conversion_error(stop_idx, e))
}

/// 聚合根 revision 表描述
pub struct RevisionTable {
    pub aggregate: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
}

/// 校验并递增已持久化聚合的 revision (须在写事务内调用)
///
/// 首次持久化 (expected == 0) 由调用方插入聚合行,插入未生效时用 `revision_conflict` 报告冲突
///
/// # 错误
/// - `OptimisticLockFailure`: 其他写入方已先提交
/// - `NotFound`: 记录不存在
pub fn bump_revision(
    tx: &Transaction<'_>,
    table: &RevisionTable,
    id: &str,
    expected: i64,
) -> RepositoryResult<()> {
    let affected = tx.execute(
        &format!(
            "UPDATE {} SET revision = revision + 1 WHERE {} = ?1 AND revision = ?2",
            table.table, table.id_column
        ),
        params![id, expected],
    )?;

    if affected == 1 {
        return Ok(());
    }
    Err(revision_conflict(tx, table, id, expected)?)
}

/// 读取当前 revision 并构造冲突错误
pub fn revision_conflict(
    tx: &Transaction<'_>,
    table: &RevisionTable,
    id: &str,
    expected: i64,
) -> RepositoryResult<RepositoryError> {
    let actual: Option<i64> = tx
        .query_row(
            &format!("SELECT revision FROM {} WHERE {} = ?1", table.table, table.id_column),
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match actual {
        Some(actual) => RepositoryError::OptimisticLockFailure {
            aggregate: table.aggregate.to_string(),
            id: id.to_string(),
            expected,
            actual,
        },
        None => RepositoryError::NotFound {
            entity: table.aggregate.to_string(),
            id: id.to_string(),
        },
    })
}
