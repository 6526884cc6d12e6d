// ==========================================
// 外部协作方测试（事件发布 / 库存协作）
// ==========================================


#[cfg(test)]
mod collaborator_test {
    use production_scheduling::app::AppState;
    use production_scheduling::domain::CompletionRequest;
    use production_scheduling::engine::{
        NoOpInventoryGateway, ProductionEvent, ProductionEventPublisher, ProductionEventType,
        SqliteInventoryLedger,
    };
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    use crate::test_helpers::*;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<ProductionEvent>>,
    }

    impl ProductionEventPublisher for RecordingPublisher {
        fn publish(&self, event: ProductionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            let mut events = self.events.lock().unwrap();
            events.push(event);
            Ok(format!("evt-{}", events.len()))
        }
    }

    struct FailingPublisher;

    impl ProductionEventPublisher for FailingPublisher {
        fn publish(&self, _event: ProductionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("消息总线不可用".into())
        }
    }

    fn event_types(publisher: &RecordingPublisher) -> Vec<ProductionEventType> {
        publisher
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[test]
    fn test_events_published_after_commit() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let state = AppState::with_collaborators(
            db_path,
            Arc::new(SqliteInventoryLedger),
            Some(publisher.clone()),
        )
        .unwrap();
        seed_reference_data(&state);

        let (_schedule, item) = create_schedule_with_item(&state, 10.0);
        let api = &state.production_api;

        api.start_item(&item.item_id, TEST_ACTOR).unwrap();
        api.record_completion(&item.item_id, CompletionRequest::of_quantity(10.0), TEST_ACTOR)
            .unwrap();

        assert_eq!(
            event_types(&publisher),
            vec![
                ProductionEventType::ItemStarted,
                ProductionEventType::CompletionRecorded,
                ProductionEventType::ItemCompleted,
            ]
        );

        // 被拒绝的操作不发布事件
        let _ = api.record_completion(&item.item_id, CompletionRequest::of_quantity(1.0), TEST_ACTOR);
        assert_eq!(event_types(&publisher).len(), 3);
    }

    #[test]
    fn test_publish_failure_does_not_fail_operation() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let state = AppState::with_collaborators(
            db_path,
            Arc::new(SqliteInventoryLedger),
            Some(Arc::new(FailingPublisher)),
        )
        .unwrap();
        seed_reference_data(&state);

        let (_schedule, item) = create_schedule_with_item(&state, 10.0);
        let outcome = state
            .production_api
            .record_completion(&item.item_id, CompletionRequest::of_quantity(4.0), TEST_ACTOR)
            .unwrap();
        assert_eq!(outcome.item.completed_quantity, 4.0);
    }

    #[test]
    fn test_noop_inventory_leaves_completion_unlinked() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let state =
            AppState::with_collaborators(db_path, Arc::new(NoOpInventoryGateway), None).unwrap();
        seed_reference_data(&state);

        let (_schedule, item) = create_schedule_with_item(&state, 10.0);
        let outcome = state
            .production_api
            .record_completion(&item.item_id, CompletionRequest::of_quantity(4.0), TEST_ACTOR)
            .unwrap();
        assert!(outcome.completion.inventory_txn_id.is_none());
    }

    #[test]
    fn test_every_mutation_leaves_audit_trail() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let (schedule, item) = create_schedule_with_item(&state, 10.0);
        let api = &state.production_api;

        api.explode_details(&item.item_id, TEST_ACTOR).unwrap();
        api.start_item(&item.item_id, TEST_ACTOR).unwrap();
        api.record_completion(&item.item_id, CompletionRequest::of_quantity(2.0), TEST_ACTOR)
            .unwrap();

        let item_logs: Vec<String> = api
            .list_action_logs_by_item(&item.item_id)
            .unwrap()
            .into_iter()
            .map(|log| log.action_type)
            .collect();
        for expected in ["ReplaceDetails", "StartItem", "RecordCompletion"] {
            assert!(item_logs.iter().any(|t| t == expected), "缺少 {}", expected);
        }

        let schedule_logs: Vec<String> = api
            .list_action_logs_by_schedule(&schedule.schedule_id)
            .unwrap()
            .into_iter()
            .map(|log| log.action_type)
            .collect();
        assert!(schedule_logs.iter().any(|t| t == "CreateSchedule"));
        assert!(schedule_logs.iter().any(|t| t == "CreateItems"));
    }
}
