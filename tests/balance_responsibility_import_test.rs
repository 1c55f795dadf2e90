// ==========================================
// 余额责任关系导入集成测试
// ==========================================
// 职责: 验证批量导入全有或全无、CSV 导入与重复导入
// ==========================================


#[cfg(test)]
mod balance_responsibility_import_test {
    use market_relations::api::ApiError;
    use market_relations::domain::types::{MarketRole, MeteringPointType};
    use market_relations::domain::TimeInterval;
    use market_relations::importer::BalanceResponsibilityRecord;
    use std::io::Write;
    use tempfile::Builder;

    use crate::test_helpers::*;

    fn record(brp: &str, from: (u32, u32), to: Option<(u32, u32)>) -> BalanceResponsibilityRecord {
        BalanceResponsibilityRecord {
            energy_supplier: number(SUPPLIER),
            balance_responsible: number(brp),
            grid_area: grid_area(),
            metering_point_type: MeteringPointType::Consumption,
            interval: TimeInterval::try_new(at(from.0, from.1, 0), to.map(|(m, d)| at(m, d, 0))).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_unresolved_reference_commits_nothing() {
        let env = create_test_env().unwrap();
        seed_market(&env);
        let api = &env.state.balance_responsibility_api;

        let records = vec![
            record(BRP_1, (1, 1), Some((6, 1))),
            record(BRP_2, (6, 1), None),
            // 未登记的余额责任方
            record("5790000000399", (1, 1), None),
        ];

        let err = api.import_records(&records, at(1, 1, 0)).await.unwrap_err();
        match err {
            ApiError::UnresolvedReference { actor_number, role, row } => {
                assert_eq!(actor_number, "5790000000399");
                assert_eq!(role, MarketRole::BalanceResponsibleParty);
                assert_eq!(row, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let periods = api.list_periods(&number(SUPPLIER)).await.unwrap();
        assert!(periods.is_empty());
    }

    #[tokio::test]
    async fn test_overlap_in_batch_commits_nothing() {
        let env = create_test_env().unwrap();
        seed_market(&env);
        let api = &env.state.balance_responsibility_api;

        let records = vec![
            record(BRP_1, (1, 1), Some((6, 1))),
            record(BRP_2, (5, 1), None),
        ];

        let err = api.import_records(&records, at(1, 1, 0)).await.unwrap_err();
        assert_eq!(err.code(), "OVERLAP_CONFLICT");
        assert!(api.list_periods(&number(SUPPLIER)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_periods_and_reimport() {
        let env = create_test_env().unwrap();
        seed_market(&env);
        let api = &env.state.balance_responsibility_api;

        let records = vec![
            record(BRP_1, (1, 1), Some((6, 1))),
            record(BRP_2, (6, 1), None),
        ];

        let summary = api.import_records(&records, at(1, 1, 0)).await.unwrap();
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.periods_added, 2);
        assert_eq!(summary.aggregates_committed, 1);

        // 重复导入不产生变化
        let summary = api.import_records(&records, at(1, 2, 0)).await.unwrap();
        assert_eq!(summary.periods_added, 0);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.aggregates_committed, 0);

        // 同分区键、同余额责任方、同 start → 更新 stop
        let update = vec![record(BRP_2, (6, 1), Some((9, 1)))];
        let summary = api.import_records(&update, at(1, 3, 0)).await.unwrap();
        assert_eq!(summary.stops_assigned, 1);

        let periods = api.list_periods(&number(SUPPLIER)).await.unwrap();
        assert_eq!(periods.len(), 2);
        let updated = periods
            .iter()
            .find(|p| p.interval.start() == at(6, 1, 0))
            .unwrap();
        assert_eq!(updated.interval.stop(), Some(at(9, 1, 0)));
        assert_eq!(updated.closed_at, Some(at(1, 3, 0)));
    }

    #[tokio::test]
    async fn test_import_csv_file() {
        let env = create_test_env().unwrap();
        seed_market(&env);

        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "energy_supplier,balance_responsible,grid_area,metering_point_type,valid_from,valid_to"
        )
        .unwrap();
        writeln!(file, "{},{},804,E17,2024-01-01,2024-06-01", SUPPLIER, BRP_1).unwrap();
        writeln!(file, "{},{},804,E17,2024-06-01,", SUPPLIER, BRP_2).unwrap();
        writeln!(file, "{},{},804,E18,2024-01-01T00:00:00Z,", SUPPLIER, BRP_1).unwrap();

        let summary = env
            .state
            .balance_responsibility_api
            .import_csv(file.path(), at(1, 1, 0))
            .await
            .unwrap();
        assert_eq!(summary.periods_added, 3);

        let periods = env
            .state
            .balance_responsibility_api
            .list_periods(&number(SUPPLIER))
            .await
            .unwrap();
        assert_eq!(periods.len(), 3);
    }

    #[tokio::test]
    async fn test_import_csv_supplier_role_mismatch() {
        let env = create_test_env().unwrap();
        seed_market(&env);

        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "energy_supplier,balance_responsible,grid_area,metering_point_type,valid_from,valid_to"
        )
        .unwrap();
        // 余额责任方编号出现在售电商列
        writeln!(file, "{},{},804,E17,2024-01-01,", BRP_2, BRP_1).unwrap();

        let err = env
            .state
            .balance_responsibility_api
            .import_csv(file.path(), at(1, 1, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNRESOLVED_REFERENCE");
    }
}
