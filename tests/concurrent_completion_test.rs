// ==========================================
// 并发完工登记测试
// ==========================================
// 职责: 两个独立连接（两个 AppState）同时对同一生产项登记完工，
//       合计不得超过计划数量
// ==========================================


#[cfg(test)]
mod concurrent_completion_test {
    use production_scheduling::api::{ApiError, ApiResult};
    use production_scheduling::app::AppState;
    use production_scheduling::domain::{CompletionRequest, ProductionStatus};
    use production_scheduling::engine::CompletionOutcome;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::*;

    fn race(
        db_path: &str,
        item_id: &str,
        quantities: &[f64],
    ) -> Vec<ApiResult<CompletionOutcome>> {
        let barrier = Arc::new(Barrier::new(quantities.len()));

        let handles: Vec<_> = quantities
            .iter()
            .enumerate()
            .map(|(idx, &quantity)| {
                // 每个线程独立打开数据库，模拟多进程写入
                let state = AppState::new(db_path.to_string()).unwrap();
                let barrier = barrier.clone();
                let item_id = item_id.to_string();
                thread::spawn(move || {
                    barrier.wait();
                    state.production_api.record_completion(
                        &item_id,
                        CompletionRequest::of_quantity(quantity),
                        &format!("worker_{}", idx),
                    )
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("线程异常退出"))
            .collect()
    }

    #[test]
    fn test_concurrent_completions_never_overshoot_plan() {
        let (_temp_file, db_path, state) = setup_test_env();
        let (_schedule, item) = create_schedule_with_item(&state, 10.0);

        let results = race(&db_path, &item.item_id, &[6.0, 6.0]);

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let exceeded = results
            .iter()
            .filter(|r| matches!(r, Err(ApiError::QuantityExceedsPlan { .. })))
            .count();
        assert_eq!(succeeded, 1, "结果: {:?}", results);
        assert_eq!(exceeded, 1, "结果: {:?}", results);

        let graph = state.production_api.get_item_graph(&item.item_id).unwrap();
        assert_eq!(graph.item.completed_quantity, 6.0);
        assert_eq!(graph.item.status, ProductionStatus::InProgress);
        assert_eq!(graph.completions.len(), 1);
        assert_eq!(graph.total_completion_events, 6.0);
    }

    #[test]
    fn test_concurrent_completions_that_fit_all_succeed() {
        let (_temp_file, db_path, state) = setup_test_env();
        let (_schedule, item) = create_schedule_with_item(&state, 10.0);

        let results = race(&db_path, &item.item_id, &[3.0, 3.0, 4.0]);
        assert!(results.iter().all(|r| r.is_ok()), "结果: {:?}", results);

        let graph = state.production_api.get_item_graph(&item.item_id).unwrap();
        assert_eq!(graph.item.completed_quantity, 10.0);
        assert_eq!(graph.item.status, ProductionStatus::Completed);

        // 提交序号连续且不重复
        let mut seqs: Vec<i32> = graph.completions.iter().map(|c| c.seq_no).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_stale_revision_is_rejected() {
        use production_scheduling::repository::production_item_repo;
        use production_scheduling::repository::RepositoryError;

        let (_temp_file, _db_path, state) = setup_test_env();
        let (_schedule, item) = create_schedule_with_item(&state, 10.0);

        state
            .production_api
            .record_completion(&item.item_id, CompletionRequest::of_quantity(1.0), TEST_ACTOR)
            .unwrap();

        // 使用创建时的旧快照写回
        let mut stale = item.clone();
        stale.completed_quantity = 9.0;
        let err = state
            .store
            .read(|conn| production_item_repo::update_progress(conn, &mut stale))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { .. }));
    }
}
