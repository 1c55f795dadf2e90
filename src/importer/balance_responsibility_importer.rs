// ==========================================
// 市场主体关系引擎 - 余额责任关系导入器
// ==========================================
// 职责: 批量导入 / 来件请求 → 解析主体引用 → 写入工作单元 → 一次提交
// 红线: 批量导入全有或全无;任一引用无法解析或区间冲突,数据库不产生任何变化
// 说明: 来件请求中无法解析的主体编号不视为失败,记录为未识别编号
//       未识别编号与关系变更同一事务提交,来件处理同样全有或全无
// ==========================================

use crate::domain::actor::{ActorId, GridAreaCode};
use crate::domain::interval::{TimeInterval, TimePoint};
use crate::domain::relation::{AppliedChange, RelationRequest};
use crate::domain::types::{MarketRole, MeteringPointType};
use crate::importer::actor_lookup::ActorLookup;
use crate::importer::csv_parser::{BalanceResponsibilityRecord, RelationCsvParser};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{ActorDirectory, BalanceResponsibilityStore, RelationUnitOfWork};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// 导入汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total_records: usize,
    pub periods_added: usize,
    pub stops_assigned: usize,
    pub unchanged: usize,
    /// 提交的售电商聚合数
    pub aggregates_committed: usize,
    pub elapsed_ms: u64,
}

impl ImportSummary {
    fn count(&mut self, change: AppliedChange) {
        match change {
            AppliedChange::Added(_) => self.periods_added += 1,
            AppliedChange::StopAssigned(_) => self.stops_assigned += 1,
            AppliedChange::Unchanged(_) => self.unchanged += 1,
        }
    }
}

/// 来自消息管道的余额责任请求 (主体编号未校验)
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRelationRequest {
    pub energy_supplier: String,
    pub balance_responsible: String,
    pub grid_area: GridAreaCode,
    pub metering_point_type: MeteringPointType,
    pub interval: TimeInterval,
}

/// 来件处理汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeSummary {
    pub applied: ImportSummary,
    /// 本次记录的未识别编号 (去重)
    pub unrecognized_actor_numbers: Vec<String>,
}

// ==========================================
// BalanceResponsibilityImporter
// ==========================================
pub struct BalanceResponsibilityImporter {
    actors: Arc<dyn ActorDirectory>,
    store: Arc<dyn BalanceResponsibilityStore>,
    parser: RelationCsvParser,
}

impl BalanceResponsibilityImporter {
    pub fn new(actors: Arc<dyn ActorDirectory>, store: Arc<dyn BalanceResponsibilityStore>) -> Self {
        Self {
            actors,
            store,
            parser: RelationCsvParser,
        }
    }

    async fn load_lookup(&self) -> ImportResult<ActorLookup> {
        let actors = self.actors.get_all_actors().await?;
        Ok(ActorLookup::new(actors))
    }

    /// 批量导入并应用
    ///
    /// # 步骤
    /// 1. 解析售电商 (EnergySupplier) 与余额责任方 (BalanceResponsibleParty) 编号
    /// 2. 写入工作单元 (后续记录可见前序变更)
    /// 3. 全部成功后一次提交
    ///
    /// # 错误
    /// - `UnresolvedReference`: 任一编号无法解析,整体失败
    /// - `Domain`: 区间重叠等,整体失败
    /// - `Repository`: 提交失败 (含乐观锁冲突)
    pub async fn import_and_apply(
        &self,
        records: &[BalanceResponsibilityRecord],
        now: TimePoint,
    ) -> ImportResult<ImportSummary> {
        let started = Instant::now();
        let lookup = self.load_lookup().await?;
        let mut uow = RelationUnitOfWork::new(self.store.clone());
        let mut summary = ImportSummary {
            total_records: records.len(),
            ..Default::default()
        };

        for (idx, record) in records.iter().enumerate() {
            let row = idx + 1;
            let supplier = resolve(&lookup, record.energy_supplier.as_str(), MarketRole::EnergySupplier, row)?;
            let brp = resolve(
                &lookup,
                record.balance_responsible.as_str(),
                MarketRole::BalanceResponsibleParty,
                row,
            )?;

            let request = RelationRequest {
                balance_responsible: brp,
                grid_area: record.grid_area.clone(),
                metering_point_type: record.metering_point_type,
                interval: record.interval,
            };
            let change = uow
                .enqueue(supplier, &request, now)
                .await
                .map_err(|e| ImportError::at_row(row, e))?;
            tracing::debug!("行 {} 已应用: supplier={}, change={:?}", row, record.energy_supplier, change);
            summary.count(change);
        }

        summary.aggregates_committed = uow.commit().await?;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            total = summary.total_records,
            added = summary.periods_added,
            stops_assigned = summary.stops_assigned,
            aggregates = summary.aggregates_committed,
            elapsed_ms = summary.elapsed_ms,
            "余额责任关系导入完成"
        );
        Ok(summary)
    }

    /// 从 CSV 文件导入
    pub async fn import_from_csv<P: AsRef<Path>>(&self, file_path: P, now: TimePoint) -> ImportResult<ImportSummary> {
        let file_path = file_path.as_ref();
        tracing::info!("开始导入余额责任关系: {}", file_path.display());

        let records = self.parser.parse_file(file_path)?;
        self.import_and_apply(&records, now).await
    }

    /// 处理来件请求
    ///
    /// # 规则
    /// - 两端编号都可解析的请求按导入规则应用,随后一次提交
    /// - 任一端无法解析的请求跳过,其无法解析的编号记录为未识别编号
    /// - 可解析请求的区间冲突仍使整批失败
    /// - 关系变更与未识别编号一次提交;提交失败时两者均不落库
    pub async fn record_incoming_requests(
        &self,
        requests: &[IncomingRelationRequest],
        now: TimePoint,
    ) -> ImportResult<IntakeSummary> {
        let started = Instant::now();
        let lookup = self.load_lookup().await?;
        let mut uow = RelationUnitOfWork::new(self.store.clone());
        let mut intake = IntakeSummary {
            applied: ImportSummary {
                total_records: requests.len(),
                ..Default::default()
            },
            ..Default::default()
        };

        for (idx, incoming) in requests.iter().enumerate() {
            let supplier = lookup.resolve_raw(&incoming.energy_supplier, MarketRole::EnergySupplier);
            let brp = lookup.resolve_raw(&incoming.balance_responsible, MarketRole::BalanceResponsibleParty);

            let (supplier, brp) = match (supplier, brp) {
                (Some(supplier), Some(brp)) => (supplier, brp),
                (supplier, brp) => {
                    if supplier.is_none() {
                        push_unique(&mut intake.unrecognized_actor_numbers, &incoming.energy_supplier);
                    }
                    if brp.is_none() {
                        push_unique(&mut intake.unrecognized_actor_numbers, &incoming.balance_responsible);
                    }
                    tracing::warn!(
                        "来件请求引用无法解析,已记录: supplier={}, balance_responsible={}",
                        incoming.energy_supplier,
                        incoming.balance_responsible
                    );
                    continue;
                }
            };

            let request = RelationRequest {
                balance_responsible: brp,
                grid_area: incoming.grid_area.clone(),
                metering_point_type: incoming.metering_point_type,
                interval: incoming.interval,
            };
            let change = uow
                .enqueue(supplier, &request, now)
                .await
                .map_err(|e| ImportError::at_row(idx + 1, e))?;
            intake.applied.count(change);
        }

        intake.applied.aggregates_committed = uow
            .commit_intake(&intake.unrecognized_actor_numbers, now)
            .await?;
        intake.applied.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            total = intake.applied.total_records,
            added = intake.applied.periods_added,
            unrecognized = intake.unrecognized_actor_numbers.len(),
            "来件请求处理完成"
        );
        Ok(intake)
    }
}

fn resolve(lookup: &ActorLookup, actor_number: &str, role: MarketRole, row: usize) -> ImportResult<ActorId> {
    lookup
        .resolve_raw(actor_number, role)
        .ok_or_else(|| ImportError::UnresolvedReference {
            actor_number: actor_number.to_string(),
            role,
            row,
        })
}

fn push_unique(numbers: &mut Vec<String>, number: &str) {
    if !numbers.iter().any(|n| n == number) {
        numbers.push(number.to_string());
    }
}
