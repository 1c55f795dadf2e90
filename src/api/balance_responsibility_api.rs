// ==========================================
// 市场主体关系引擎 - 余额责任关系 API
// ==========================================
// 职责: 导入 / 来件处理 / 关系查询 / 覆盖检查
// 覆盖检查: 读取主体与各售电商快照 → 通知决策引擎 → 事件入队
// 红线: 单个售电商读取失败只影响该售电商 (强制通知),不得中断整轮检查
// ==========================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{CoverageCheckConfig, CoverageConfigReader};
use crate::domain::actor::{Actor, ActorNumber};
use crate::domain::interval::TimePoint;
use crate::domain::relation::{BalanceResponsibilityKey, BalanceResponsibilityPeriod};
use crate::domain::types::MarketRole;
use crate::engine::continuity::{CoverageGapAnalyzer, GroupVerdict};
use crate::engine::events::NotificationEventSink;
use crate::engine::notification::NotificationDecisionEngine;
use crate::engine::role_rules;
use crate::importer::{
    BalanceResponsibilityImporter, BalanceResponsibilityRecord, ImportSummary,
    IncomingRelationRequest, IntakeSummary,
};
use crate::repository::{ActorDirectory, BalanceResponsibilityStore, UnrecognizedActorStore};

// ==========================================
// CoverageCheckReport - 覆盖检查报告
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct CoverageCheckReport {
    pub checked_at: TimePoint,
    pub config: CoverageCheckConfig,
    pub suppliers_checked: usize,
    pub suppliers_with_gap: Vec<String>,
    pub read_failures: Vec<String>,
    pub unrecognized_reported: usize,
    pub notification_targets: usize,
    pub events_enqueued: usize,
    pub enqueue_failures: usize,
}

// ==========================================
// BalanceResponsibilityApi
// ==========================================
pub struct BalanceResponsibilityApi {
    actors: Arc<dyn ActorDirectory>,
    store: Arc<dyn BalanceResponsibilityStore>,
    unrecognized: Arc<dyn UnrecognizedActorStore>,
    sink: Arc<dyn NotificationEventSink>,
    config_reader: Arc<dyn CoverageConfigReader>,
    importer: BalanceResponsibilityImporter,
}

impl BalanceResponsibilityApi {
    /// 创建新的 BalanceResponsibilityApi 实例
    ///
    /// # 参数
    /// - actors: 主体目录
    /// - store: 余额责任关系存储
    /// - unrecognized: 未识别主体编号存储
    /// - sink: 通知事件出口
    /// - config_reader: 冷却期配置
    pub fn new(
        actors: Arc<dyn ActorDirectory>,
        store: Arc<dyn BalanceResponsibilityStore>,
        unrecognized: Arc<dyn UnrecognizedActorStore>,
        sink: Arc<dyn NotificationEventSink>,
        config_reader: Arc<dyn CoverageConfigReader>,
    ) -> Self {
        let importer = BalanceResponsibilityImporter::new(actors.clone(), store.clone());
        Self {
            actors,
            store,
            unrecognized,
            sink,
            config_reader,
            importer,
        }
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 批量导入 (全有或全无)
    pub async fn import_records(
        &self,
        records: &[BalanceResponsibilityRecord],
        now: TimePoint,
    ) -> ApiResult<ImportSummary> {
        Ok(self.importer.import_and_apply(records, now).await?)
    }

    /// 从 CSV 文件导入
    pub async fn import_csv<P: AsRef<Path>>(&self, file_path: P, now: TimePoint) -> ApiResult<ImportSummary> {
        Ok(self.importer.import_from_csv(file_path, now).await?)
    }

    /// 处理来件请求;无法解析的编号被记录而非报错
    pub async fn record_incoming_requests(
        &self,
        requests: &[IncomingRelationRequest],
        now: TimePoint,
    ) -> ApiResult<IntakeSummary> {
        Ok(self.importer.record_incoming_requests(requests, now).await?)
    }

    // ==========================================
    // 查询与维护
    // ==========================================

    async fn require_supplier(&self, energy_supplier: &ActorNumber) -> ApiResult<Actor> {
        let actor = self
            .actors
            .find_by_number(energy_supplier)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("主体 {} 不存在", energy_supplier)))?;
        if !actor.has_role(MarketRole::EnergySupplier) {
            return Err(ApiError::InvalidInput(format!(
                "主体 {} 未持有 EnergySupplier 角色",
                energy_supplier
            )));
        }
        Ok(actor)
    }

    /// 售电商名下的全部区间 (含已取消)
    pub async fn list_periods(
        &self,
        energy_supplier: &ActorNumber,
    ) -> ApiResult<Vec<BalanceResponsibilityPeriod>> {
        let supplier = self.require_supplier(energy_supplier).await?;
        let relations = self.store.get_relations(supplier.id).await?;
        Ok(relations.periods().to_vec())
    }

    /// 为指定区间设置 stop (追溯性缩短需通过重叠复检)
    pub async fn close_period(
        &self,
        energy_supplier: &ActorNumber,
        period_id: Uuid,
        stop: TimePoint,
        now: TimePoint,
    ) -> ApiResult<()> {
        let supplier = self.require_supplier(energy_supplier).await?;
        let mut relations = self.store.get_relations(supplier.id).await?;
        relations.close_period(period_id, stop, now)?;
        self.store.save_all(&[&relations]).await?;

        info!(
            "余额责任区间已关闭: supplier={}, period_id={}, stop={}",
            energy_supplier, period_id, stop
        );
        Ok(())
    }

    /// 单个售电商的分组明细判定
    pub async fn analyze_supplier(
        &self,
        energy_supplier: &ActorNumber,
        now: TimePoint,
    ) -> ApiResult<Vec<GroupVerdict<BalanceResponsibilityKey>>> {
        let supplier = self.require_supplier(energy_supplier).await?;
        let config = self.load_config().await;
        let relations = self.store.get_relations(supplier.id).await?;
        Ok(CoverageGapAnalyzer::new(config).analyze(relations.periods(), now))
    }

    // ==========================================
    // 覆盖检查
    // ==========================================

    async fn load_config(&self) -> CoverageCheckConfig {
        match self.config_reader.load_coverage_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!("读取冷却期配置失败,使用默认值: {}", e);
                CoverageCheckConfig::default()
            }
        }
    }

    /// 执行一轮覆盖检查并将通知事件入队
    ///
    /// # 步骤
    /// 1. 加载冷却期配置 (失败时使用默认值)
    /// 2. 读取全部主体,并发读取每个售电商的关系快照
    /// 3. 读取未识别主体编号
    /// 4. 通知决策引擎评估
    /// 5. 事件逐条入队 (入队失败记录告警并计数)
    pub async fn check_coverage(&self, now: TimePoint) -> ApiResult<CoverageCheckReport> {
        let config = self.load_config().await;
        let actors = self.actors.get_all_actors().await?;

        let suppliers: Vec<&Actor> = actors
            .iter()
            .filter(|a| role_rules::originates_balance_relations(a))
            .collect();
        let reads = join_all(suppliers.iter().map(|supplier| {
            let store = self.store.clone();
            let supplier_id = supplier.id;
            async move {
                let periods = store
                    .get_relations(supplier_id)
                    .await
                    .map(|relations| relations.periods().to_vec());
                (supplier_id, periods)
            }
        }))
        .await;
        let periods_by_actor: HashMap<_, _> = reads.into_iter().collect();

        let unrecognized = match self.unrecognized.list_numbers().await {
            Ok(numbers) => numbers,
            Err(e) => {
                warn!("读取未识别主体编号失败,本轮跳过: {}", e);
                Vec::new()
            }
        };

        let engine = NotificationDecisionEngine::new(CoverageGapAnalyzer::new(config));
        let evaluation = engine.evaluate(&actors, &periods_by_actor, &unrecognized, now);

        let mut events_enqueued = 0usize;
        let mut enqueue_failures = 0usize;
        for event in evaluation.events {
            let event_id = event.event_id();
            match self.sink.enqueue(event).await {
                Ok(()) => events_enqueued += 1,
                Err(e) => {
                    warn!("通知事件入队失败: event_id={}, error={}", event_id, e);
                    enqueue_failures += 1;
                }
            }
        }
        debug!("覆盖检查事件入队: ok={}, failed={}", events_enqueued, enqueue_failures);

        let report = CoverageCheckReport {
            checked_at: now,
            config,
            suppliers_checked: evaluation.suppliers_checked,
            suppliers_with_gap: evaluation.suppliers_with_gap,
            read_failures: evaluation.read_failures,
            unrecognized_reported: unrecognized.len(),
            notification_targets: evaluation.notification_targets,
            events_enqueued,
            enqueue_failures,
        };
        info!(
            suppliers_checked = report.suppliers_checked,
            gaps = report.suppliers_with_gap.len(),
            read_failures = report.read_failures.len(),
            events = report.events_enqueued,
            "覆盖检查完成"
        );
        Ok(report)
    }
}
