// ==========================================
// 来件处理集成测试
// ==========================================
// 职责: 验证来件处理全有或全无 (含未识别编号)
// ==========================================


#[cfg(test)]
mod incoming_intake_test {
    use async_trait::async_trait;
    use market_relations::db::open_sqlite_connection;
    use market_relations::domain::types::MeteringPointType;
    use market_relations::domain::{ActorId, BalanceResponsibilityRelations, TimeInterval, TimePoint};
    use market_relations::importer::{
        BalanceResponsibilityImporter, BalanceResponsibilityRecord, ImportError,
        IncomingRelationRequest,
    };
    use market_relations::repository::{
        BalanceResponsibilityRepository, BalanceResponsibilityStore, RepositoryError,
        RepositoryResult, UnrecognizedActorRepository, UnrecognizedActorStore,
    };
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    use crate::test_helpers::*;

    const UNKNOWN_BRP: &str = "5790000000399";

    /// 提交前由另一连接抢先提升 revision,模拟并发写入方
    struct ContendedStore {
        inner: BalanceResponsibilityRepository,
        rival: Mutex<Connection>,
    }

    impl ContendedStore {
        fn bump_all_revisions(&self) {
            self.rival
                .lock()
                .unwrap()
                .execute("UPDATE balance_responsibility_relations SET revision = revision + 1", [])
                .unwrap();
        }
    }

    #[async_trait]
    impl BalanceResponsibilityStore for ContendedStore {
        async fn get_relations(&self, supplier: ActorId) -> RepositoryResult<BalanceResponsibilityRelations> {
            self.inner.get_relations(supplier).await
        }

        async fn list_energy_supplier_ids(&self) -> RepositoryResult<Vec<ActorId>> {
            self.inner.list_energy_supplier_ids().await
        }

        async fn save_all(&self, aggregates: &[&BalanceResponsibilityRelations]) -> RepositoryResult<()> {
            self.bump_all_revisions();
            self.inner.save_all(aggregates).await
        }

        async fn save_intake(
            &self,
            aggregates: &[&BalanceResponsibilityRelations],
            unrecognized_numbers: &[String],
            seen_at: TimePoint,
        ) -> RepositoryResult<()> {
            self.bump_all_revisions();
            self.inner.save_intake(aggregates, unrecognized_numbers, seen_at).await
        }
    }

    fn incoming(brp: &str, from: (u32, u32)) -> IncomingRelationRequest {
        IncomingRelationRequest {
            energy_supplier: SUPPLIER.to_string(),
            balance_responsible: brp.to_string(),
            grid_area: grid_area(),
            metering_point_type: MeteringPointType::Consumption,
            interval: TimeInterval::open_ended(at(from.0, from.1, 0)),
        }
    }

    #[tokio::test]
    async fn test_failed_commit_records_no_unrecognized_numbers() {
        let env = create_test_env().unwrap();
        seed_market(&env);

        // 售电商已有关系记录 (revision = 1)
        let existing = BalanceResponsibilityRecord {
            energy_supplier: number(SUPPLIER),
            balance_responsible: number(BRP_1),
            grid_area: grid_area(),
            metering_point_type: MeteringPointType::Consumption,
            interval: TimeInterval::try_new(at(1, 1, 0), Some(at(6, 1, 0))).unwrap(),
        };
        env.state
            .balance_responsibility_api
            .import_records(&[existing], at(1, 1, 0))
            .await
            .unwrap();

        let store = Arc::new(ContendedStore {
            inner: BalanceResponsibilityRepository::new(&env.db_path).unwrap(),
            rival: Mutex::new(open_sqlite_connection(&env.db_path).unwrap()),
        });
        let importer = BalanceResponsibilityImporter::new(env.state.actor_repo.clone(), store);

        let requests = vec![incoming(BRP_2, (6, 1)), incoming(UNKNOWN_BRP, (1, 1))];
        let err = importer
            .record_incoming_requests(&requests, at(2, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::Repository(RepositoryError::OptimisticLockFailure { .. })
        ));

        let unrecognized = UnrecognizedActorRepository::new(&env.db_path).unwrap();
        assert!(unrecognized.list_numbers().await.unwrap().is_empty());

        let periods = env
            .state
            .balance_responsibility_api
            .list_periods(&number(SUPPLIER))
            .await
            .unwrap();
        assert_eq!(periods.len(), 1);

        // 未识别编号不会进入后续覆盖检查
        let report = env
            .state
            .balance_responsibility_api
            .check_coverage(at(2, 1, 1))
            .await
            .unwrap();
        assert_eq!(report.unrecognized_reported, 0);
    }

    #[tokio::test]
    async fn test_unrecognized_only_batch_is_recorded() {
        let env = create_test_env().unwrap();
        seed_market(&env);

        let intake = env
            .state
            .balance_responsibility_api
            .record_incoming_requests(&[incoming(UNKNOWN_BRP, (1, 1))], at(1, 1, 0))
            .await
            .unwrap();
        assert_eq!(intake.applied.aggregates_committed, 0);
        assert_eq!(intake.unrecognized_actor_numbers, vec![UNKNOWN_BRP.to_string()]);

        let unrecognized = UnrecognizedActorRepository::new(&env.db_path).unwrap();
        assert_eq!(unrecognized.list_numbers().await.unwrap(), vec![UNKNOWN_BRP.to_string()]);
    }
}
