// ==========================================
// 市场主体关系引擎 - 余额责任关系工作单元
// ==========================================
// 职责: 批量请求期间缓存已加载的聚合,所有变更在 commit 时一次性提交
// 规则: 后续请求看到前序请求更新后的内存聚合;commit 之前数据库不可见
// ==========================================

use crate::domain::actor::ActorId;
use crate::domain::interval::TimePoint;
use crate::domain::relation::{
    AppliedChange, BalanceResponsibilityPeriod, BalanceResponsibilityRelations, RelationRequest,
};
use crate::repository::balance_responsibility_repo::BalanceResponsibilityStore;
use crate::repository::error::RepositoryResult;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct RelationUnitOfWork {
    store: Arc<dyn BalanceResponsibilityStore>,
    loaded: BTreeMap<ActorId, BalanceResponsibilityRelations>,
}

impl RelationUnitOfWork {
    pub fn new(store: Arc<dyn BalanceResponsibilityStore>) -> Self {
        Self {
            store,
            loaded: BTreeMap::new(),
        }
    }

    async fn aggregate_mut(
        &mut self,
        energy_supplier: ActorId,
    ) -> RepositoryResult<&mut BalanceResponsibilityRelations> {
        match self.loaded.entry(energy_supplier) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let relations = self.store.get_relations(energy_supplier).await?;
                Ok(entry.insert(relations))
            }
        }
    }

    /// 售电商当前 (含未提交变更) 的区间
    pub async fn get_periods(
        &mut self,
        energy_supplier: ActorId,
    ) -> RepositoryResult<&[BalanceResponsibilityPeriod]> {
        Ok(self.aggregate_mut(energy_supplier).await?.periods())
    }

    /// 将请求应用到内存聚合
    ///
    /// # 错误
    /// - `RepositoryError::Domain`: 重叠 / 非法区间等领域规则违反
    pub async fn enqueue(
        &mut self,
        energy_supplier: ActorId,
        request: &RelationRequest,
        now: TimePoint,
    ) -> RepositoryResult<AppliedChange> {
        let aggregate = self.aggregate_mut(energy_supplier).await?;
        Ok(aggregate.apply_request(request, now)?)
    }

    /// 有未提交变更的聚合数量
    pub fn pending_aggregates(&self) -> usize {
        self.loaded.values().filter(|a| a.has_changes()).count()
    }

    /// 一次性提交全部变更 (单事务);失败时数据库无任何变化
    ///
    /// # 返回
    /// - 提交的聚合数量
    pub async fn commit(&mut self) -> RepositoryResult<usize> {
        let count = self.pending_aggregates();
        if count == 0 {
            return Ok(0);
        }

        let changed: Vec<&BalanceResponsibilityRelations> =
            self.loaded.values().filter(|a| a.has_changes()).collect();
        self.store.save_all(&changed).await?;
        self.mark_all_persisted();
        Ok(count)
    }

    /// 来件处理提交: 聚合变更与未识别编号同一事务写入
    ///
    /// # 返回
    /// - 提交的聚合数量
    pub async fn commit_intake(
        &mut self,
        unrecognized_numbers: &[String],
        seen_at: TimePoint,
    ) -> RepositoryResult<usize> {
        let count = self.pending_aggregates();
        if count == 0 && unrecognized_numbers.is_empty() {
            return Ok(0);
        }

        let changed: Vec<&BalanceResponsibilityRelations> =
            self.loaded.values().filter(|a| a.has_changes()).collect();
        self.store
            .save_intake(&changed, unrecognized_numbers, seen_at)
            .await?;
        self.mark_all_persisted();
        Ok(count)
    }

    fn mark_all_persisted(&mut self) {
        for aggregate in self.loaded.values_mut() {
            aggregate.mark_persisted();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::GridAreaCode;
    use crate::domain::interval::TimeInterval;
    use crate::domain::types::MeteringPointType;
    use crate::repository::error::RepositoryError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// 内存实现,记录保存调用
    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<BalanceResponsibilityRelations>>,
        unrecognized: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BalanceResponsibilityStore for MemoryStore {
        async fn get_relations(&self, supplier: ActorId) -> RepositoryResult<BalanceResponsibilityRelations> {
            Ok(BalanceResponsibilityRelations::new(supplier))
        }

        async fn list_energy_supplier_ids(&self) -> RepositoryResult<Vec<ActorId>> {
            Ok(Vec::new())
        }

        async fn save_all(&self, aggregates: &[&BalanceResponsibilityRelations]) -> RepositoryResult<()> {
            let mut saved = self.saved.lock().unwrap();
            saved.extend(aggregates.iter().map(|a| (*a).clone()));
            Ok(())
        }

        async fn save_intake(
            &self,
            aggregates: &[&BalanceResponsibilityRelations],
            unrecognized_numbers: &[String],
            _seen_at: TimePoint,
        ) -> RepositoryResult<()> {
            self.save_all(aggregates).await?;
            self.unrecognized
                .lock()
                .unwrap()
                .extend(unrecognized_numbers.iter().cloned());
            Ok(())
        }
    }

    fn request(brp: ActorId, from: u32, to: Option<u32>) -> RelationRequest {
        let day = |m| Utc.with_ymd_and_hms(2024, m, 1, 0, 0, 0).unwrap();
        RelationRequest {
            balance_responsible: brp,
            grid_area: GridAreaCode::parse("804").unwrap(),
            metering_point_type: MeteringPointType::Consumption,
            interval: TimeInterval::try_new(day(from), to.map(day)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_later_requests_see_earlier_ones() {
        let store = Arc::new(MemoryStore::default());
        let mut uow = RelationUnitOfWork::new(store.clone());
        let supplier = ActorId::new_v4();
        let brp = ActorId::new_v4();

        uow.enqueue(supplier, &request(brp, 1, Some(6)), Utc::now()).await.unwrap();
        let err = uow.enqueue(supplier, &request(brp, 3, None), Utc::now()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(_)));

        assert_eq!(uow.get_periods(supplier).await.unwrap().len(), 1);
        assert_eq!(uow.commit().await.unwrap(), 1);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert_eq!(uow.pending_aggregates(), 0);
    }

    #[tokio::test]
    async fn test_commit_without_changes_is_noop() {
        let store = Arc::new(MemoryStore::default());
        let mut uow = RelationUnitOfWork::new(store.clone());
        uow.get_periods(ActorId::new_v4()).await.unwrap();

        assert_eq!(uow.commit().await.unwrap(), 0);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_intake_writes_numbers_without_changes() {
        let store = Arc::new(MemoryStore::default());
        let mut uow = RelationUnitOfWork::new(store.clone());
        let numbers = vec!["5790000000999".to_string()];

        assert_eq!(uow.commit_intake(&numbers, Utc::now()).await.unwrap(), 0);
        assert!(store.saved.lock().unwrap().is_empty());
        assert_eq!(*store.unrecognized.lock().unwrap(), numbers);
    }
}
