// ==========================================
// 市场主体关系引擎 - CSV 记录解析
// ==========================================
// 职责: CSV 文件 → 原始行 → 校验后的余额责任记录
// 列: energy_supplier, balance_responsible, grid_area, metering_point_type, valid_from, valid_to
// 时间: RFC 3339 或 YYYY-MM-DD (按 UTC 零点);valid_to 为空表示无限期
// ==========================================

use crate::domain::actor::{ActorNumber, GridAreaCode};
use crate::domain::interval::{TimeInterval, TimePoint};
use crate::domain::types::MeteringPointType;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

/// CSV 原始行 (未校验)
#[derive(Debug, Clone, Deserialize)]
pub struct RawRelationRow {
    pub energy_supplier: String,
    pub balance_responsible: String,
    pub grid_area: String,
    pub metering_point_type: String,
    pub valid_from: String,
    #[serde(default)]
    pub valid_to: Option<String>,
}

/// 校验后的余额责任记录
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceResponsibilityRecord {
    pub energy_supplier: ActorNumber,
    pub balance_responsible: ActorNumber,
    pub grid_area: GridAreaCode,
    pub metering_point_type: MeteringPointType,
    pub interval: TimeInterval,
}

/// 解析时间点: RFC 3339 优先,其次 YYYY-MM-DD
pub fn parse_time_point(raw: &str) -> Option<TimePoint> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn malformed(row: usize, field: &str, message: impl Into<String>) -> ImportError {
    ImportError::MalformedRecord {
        row,
        field: field.to_string(),
        message: message.into(),
    }
}

fn parse_field<T>(row: usize, field: &str, raw: &str) -> ImportResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| malformed(row, field, e.to_string()))
}

impl RawRelationRow {
    /// 校验并转换
    ///
    /// # 参数
    /// - `row`: 行号 (从 1 开始,不含表头)
    pub fn validate(&self, row: usize) -> ImportResult<BalanceResponsibilityRecord> {
        let valid_from = parse_time_point(&self.valid_from).ok_or_else(|| {
            malformed(row, "valid_from", format!("无法解析时间: {}", self.valid_from))
        })?;

        let valid_to = match self.valid_to.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                parse_time_point(raw)
                    .ok_or_else(|| malformed(row, "valid_to", format!("无法解析时间: {}", raw)))?,
            ),
        };

        let interval = TimeInterval::try_new(valid_from, valid_to)
            .map_err(|e| malformed(row, "valid_to", e.to_string()))?;

        Ok(BalanceResponsibilityRecord {
            energy_supplier: parse_field(row, "energy_supplier", &self.energy_supplier)?,
            balance_responsible: parse_field(row, "balance_responsible", &self.balance_responsible)?,
            grid_area: parse_field(row, "grid_area", &self.grid_area)?,
            metering_point_type: parse_field(row, "metering_point_type", &self.metering_point_type)?,
            interval,
        })
    }
}

/// 余额责任 CSV 解析器
pub struct RelationCsvParser;

impl RelationCsvParser {
    /// 读取 CSV 文件中的全部原始行
    pub fn read_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRelationRow>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        if let Some(ext) = file_path.extension() {
            if ext != "csv" {
                return Err(ImportError::UnsupportedFormat(ext.to_string_lossy().to_string()));
            }
        }

        let file = File::open(file_path)?;
        self.read_from(file)
    }

    /// 从任意 reader 读取原始行
    pub fn read_from<R: std::io::Read>(&self, reader: R) -> ImportResult<Vec<RawRelationRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (idx, result) in reader.deserialize::<RawRelationRow>().enumerate() {
            let row = result.map_err(|e| ImportError::CsvParseError(format!("行 {}: {}", idx + 1, e)))?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// 读取并校验;任一行格式错误则整体失败
    pub fn parse_file(&self, file_path: &Path) -> ImportResult<Vec<BalanceResponsibilityRecord>> {
        self.read_rows(file_path)?
            .iter()
            .enumerate()
            .map(|(idx, row)| row.validate(idx + 1))
            .collect()
    }
}
