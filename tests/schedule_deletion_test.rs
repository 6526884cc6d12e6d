// ==========================================
// 排程单删除资格与表头修改测试
// ==========================================


#[cfg(test)]
mod schedule_deletion_test {
    use chrono::NaiveDate;
    use production_scheduling::api::ApiError;
    use production_scheduling::domain::{
        CompletionRequest, DeleteBlockReason, NewProductionAllocation, NewSchedule,
    };
    use production_scheduling::repository::inventory_txn_repo::{
        self, REF_TYPE_PRODUCTION_ITEM, TXN_TYPE_RELEASE, TXN_TYPE_RESERVE,
    };

    use crate::test_helpers::*;

    // ==========================================
    // 删除阻断
    // ==========================================

    #[test]
    fn test_delete_blocked_by_completion_records() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 50.0);
        let api = &state.production_api;

        api.record_completion(&item.item_id, CompletionRequest::of_quantity(5.0), TEST_ACTOR)
            .unwrap();

        let err = api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap_err();
        match &err {
            ApiError::DeleteBlocked { reason } => {
                assert_eq!(reason.code(), "HAS_COMPLETION_RECORDS");
                assert!(matches!(
                    reason,
                    DeleteBlockReason::HasCompletionRecords { count: 1, .. }
                ));
            }
            other => panic!("期望 DeleteBlocked，实际: {:?}", other),
        }
        assert!(err.to_string().contains("has completion records"));

        // 预检给出相同结论，排程单仍在
        let err = api.check_schedule_deletable(&schedule.schedule_id).unwrap_err();
        assert_eq!(err.kind(), "DeleteBlocked");
        assert!(api.get_schedule(&schedule.schedule_id).is_ok());
        assert_eq!(api.list_items_by_schedule(&schedule.schedule_id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_blocked_by_allocations() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 50.0);
        let api = &state.production_api;

        api.replace_allocations(
            &item.item_id,
            &[NewProductionAllocation {
                demand_line_id: DEMAND_LINE_1.to_string(),
                allocated_quantity: 10.0,
            }],
            TEST_ACTOR,
        )
        .unwrap();

        match api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap_err() {
            ApiError::DeleteBlocked { reason } => assert_eq!(reason.code(), "HAS_ALLOCATIONS"),
            other => panic!("期望 DeleteBlocked，实际: {:?}", other),
        }
    }

    #[test]
    fn test_delete_blocked_by_overridden_completed_quantity() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 50.0);
        let api = &state.production_api;

        api.set_completed_quantity(&item.item_id, 3.0, TEST_ACTOR).unwrap();

        match api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap_err() {
            ApiError::DeleteBlocked { reason } => {
                assert_eq!(reason.code(), "HAS_COMPLETED_QUANTITY")
            }
            other => panic!("期望 DeleteBlocked，实际: {:?}", other),
        }
    }

    #[test]
    fn test_delete_checks_every_item() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let schedule = create_schedule(&state);
        let api = &state.production_api;

        let items = api
            .create_items(
                &schedule.schedule_id,
                &[new_item(PRODUCT_FG, 10.0), new_item(PRODUCT_FG, 10.0)],
                TEST_ACTOR,
            )
            .unwrap();
        api.record_completion(&items[1].item_id, CompletionRequest::of_quantity(1.0), TEST_ACTOR)
            .unwrap();

        let err = api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap_err();
        assert_eq!(err.kind(), "DeleteBlocked");
    }

    // ==========================================
    // 正常删除
    // ==========================================

    #[test]
    fn test_clean_schedule_is_deletable() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 50.0);
        let api = &state.production_api;

        // 用料明细不阻断删除，随生产项级联删除
        api.explode_details(&item.item_id, TEST_ACTOR).unwrap();

        api.check_schedule_deletable(&schedule.schedule_id).unwrap();
        let outcome = api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap();
        assert_eq!(outcome.removed_item_ids, vec![item.item_id.clone()]);

        assert_eq!(api.get_schedule(&schedule.schedule_id).unwrap_err().kind(), "NotFound");
        assert_eq!(api.get_item_graph(&item.item_id).unwrap_err().kind(), "NotFound");
        assert!(api.list_details_by_item(&item.item_id).unwrap().is_empty());

        // 删除审计保留
        let logs = api.list_action_logs_by_schedule(&schedule.schedule_id).unwrap();
        assert!(logs.iter().any(|log| log.action_type == "DeleteSchedule"));
    }

    #[test]
    fn test_delete_started_schedule_releases_reservations() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 10.0);
        let api = &state.production_api;

        api.explode_details(&item.item_id, TEST_ACTOR).unwrap();
        let started = api.start_item(&item.item_id, TEST_ACTOR).unwrap();
        assert_eq!(started.reservation_txn_ids.len(), 2);

        let outcome = api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap();
        assert_eq!(outcome.released_txn_ids.len(), 2);

        let ledger = state
            .store
            .read(|conn| inventory_txn_repo::select_by_ref(conn, REF_TYPE_PRODUCTION_ITEM, &item.item_id))
            .unwrap();
        assert_eq!(ledger.len(), 4);

        // 每个组件的 RESERVE 与 RELEASE 数量相抵
        for component in [COMPONENT_A, COMPONENT_B] {
            let net: f64 = ledger
                .iter()
                .filter(|t| t.product_id == component)
                .map(|t| match t.txn_type.as_str() {
                    TXN_TYPE_RESERVE => t.quantity,
                    TXN_TYPE_RELEASE => -t.quantity,
                    other => panic!("意外的库存事务类型: {}", other),
                })
                .sum();
            assert!(net.abs() < 1e-9, "{} 仍有预留 {}", component, net);
        }

        let logs = api.list_action_logs_by_schedule(&schedule.schedule_id).unwrap();
        let delete_log = logs
            .iter()
            .find(|log| log.action_type == "DeleteSchedule")
            .unwrap();
        let payload = delete_log.payload_json.as_ref().unwrap();
        assert_eq!(payload["released_txn_ids"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_unstarted_schedule_writes_no_release() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 10.0);
        let api = &state.production_api;

        api.explode_details(&item.item_id, TEST_ACTOR).unwrap();
        let outcome = api.delete_schedule(&schedule.schedule_id, TEST_ACTOR).unwrap();
        assert!(outcome.released_txn_ids.is_empty());

        let ledger = state
            .store
            .read(|conn| inventory_txn_repo::select_by_ref(conn, REF_TYPE_PRODUCTION_ITEM, &item.item_id))
            .unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_delete_unknown_schedule_is_not_found() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let err = state
            .production_api
            .delete_schedule("NO-SUCH-SCHEDULE", TEST_ACTOR)
            .unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }

    // ==========================================
    // 单项删除
    // ==========================================

    #[test]
    fn test_delete_item_requires_pending() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let schedule = create_schedule(&state);
        let api = &state.production_api;

        let items = api
            .create_items(
                &schedule.schedule_id,
                &[new_item(PRODUCT_FG, 10.0), new_item(PRODUCT_FG, 20.0)],
                TEST_ACTOR,
            )
            .unwrap();

        api.start_item(&items[0].item_id, TEST_ACTOR).unwrap();
        match api.delete_item(&items[0].item_id, TEST_ACTOR).unwrap_err() {
            ApiError::DeleteBlocked { reason } => assert_eq!(reason.code(), "ITEM_NOT_PENDING"),
            other => panic!("期望 DeleteBlocked，实际: {:?}", other),
        }

        let outcome = api.delete_item(&items[1].item_id, TEST_ACTOR).unwrap();
        assert_eq!(outcome.schedule_id, schedule.schedule_id);

        let remaining = api.list_items_by_schedule(&schedule.schedule_id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].item_id, items[0].item_id);
    }

    // ==========================================
    // 表头修改
    // ==========================================

    #[test]
    fn test_update_schedule_header_before_progress() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, _item) = create_schedule_with_item(&state, 10.0);
        let new_date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();

        let updated = state
            .production_api
            .update_schedule(
                &schedule.schedule_id,
                new_date,
                Some("改期".to_string()),
                TEST_ACTOR,
            )
            .unwrap();
        assert_eq!(updated.schedule_date, new_date);
        assert_eq!(updated.remarks.as_deref(), Some("改期"));
        assert_eq!(updated.schedule_code, schedule.schedule_code);
    }

    #[test]
    fn test_update_schedule_rejected_after_progress() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 10.0);
        let api = &state.production_api;

        api.record_completion(&item.item_id, CompletionRequest::of_quantity(2.0), TEST_ACTOR)
            .unwrap();

        let err = api
            .update_schedule(
                &schedule.schedule_id,
                NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
                None,
                TEST_ACTOR,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "IllegalStateTransition");
        assert_eq!(
            api.get_schedule(&schedule.schedule_id).unwrap().schedule_date,
            schedule.schedule_date
        );
    }

    // ==========================================
    // 创建与查询
    // ==========================================

    #[test]
    fn test_create_schedule_with_source_document() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let api = &state.production_api;
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        let schedule = api
            .create_schedule(
                NewSchedule {
                    schedule_code: Some("PS-MANUAL-001".to_string()),
                    schedule_date: Some(date),
                    source_doc_type: Some("SALES_ORDER".to_string()),
                    source_doc_id: Some("SO-1001".to_string()),
                    ..Default::default()
                },
                TEST_ACTOR,
            )
            .unwrap();
        assert_eq!(schedule.schedule_code, "PS-MANUAL-001");

        let by_source = api.list_schedules_by_source("SALES_ORDER", "SO-1001").unwrap();
        assert_eq!(by_source.len(), 1);

        let in_range = api
            .list_schedules_by_date_range(date, NaiveDate::from_ymd_opt(2026, 10, 31).unwrap())
            .unwrap();
        assert!(in_range.iter().any(|s| s.schedule_id == schedule.schedule_id));

        // 单号重复
        let err = api
            .create_schedule(
                NewSchedule {
                    schedule_code: Some("PS-MANUAL-001".to_string()),
                    ..Default::default()
                },
                TEST_ACTOR,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");

        // 来源单据只给一半
        let err = api
            .create_schedule(
                NewSchedule {
                    source_doc_type: Some("SALES_ORDER".to_string()),
                    ..Default::default()
                },
                TEST_ACTOR,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
    }

    #[test]
    fn test_date_range_must_be_ordered() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let err = state
            .production_api
            .list_schedules_by_date_range(
                NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
    }
}
