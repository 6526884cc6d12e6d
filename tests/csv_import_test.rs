// ==========================================
// 排程行 CSV 导入集成测试
// ==========================================


#[cfg(test)]
mod csv_import_test {
    use production_scheduling::api::ApiError;
    use production_scheduling::domain::ProductionStatus;
    use std::io::Write;
    use std::path::Path;
    use tempfile::Builder;

    use crate::test_helpers::*;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_import_creates_pending_items() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let schedule = create_schedule(&state);

        let csv = write_csv(&format!(
            "Product_ID,Scheduled_Quantity,Priority,Demand_Line_ID,Warehouse_ID\n\
             {fg},40,5,{dl},WH-FG\n\
             \n\
             {fg},15,,,\n",
            fg = PRODUCT_FG,
            dl = DEMAND_LINE_1
        ));

        let items = state
            .production_api
            .import_items_from_csv(&schedule.schedule_id, csv.path(), TEST_ACTOR)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == ProductionStatus::Pending));
        assert_eq!(items[0].demand_line_id.as_deref(), Some(DEMAND_LINE_1));

        let listed = state
            .production_api
            .list_items_by_demand_line(DEMAND_LINE_1)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].priority, 5);
    }

    #[test]
    fn test_import_with_row_errors_inserts_nothing() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let schedule = create_schedule(&state);

        let csv = write_csv(&format!(
            "product_id,scheduled_quantity\n{},10\n,5\n{},zero\n",
            PRODUCT_FG, PRODUCT_FG
        ));

        match state
            .production_api
            .import_items_from_csv(&schedule.schedule_id, csv.path(), TEST_ACTOR)
            .unwrap_err()
        {
            ApiError::ValidationFailed { messages } => assert_eq!(messages.len(), 2),
            other => panic!("期望 ValidationFailed，实际: {:?}", other),
        }
        assert!(state
            .production_api
            .list_items_by_schedule(&schedule.schedule_id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_import_with_unknown_product_inserts_nothing() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let schedule = create_schedule(&state);

        let csv = write_csv(&format!(
            "product_id,scheduled_quantity\n{},10\nNOT-A-PRODUCT,5\n",
            PRODUCT_FG
        ));

        let err = state
            .production_api
            .import_items_from_csv(&schedule.schedule_id, csv.path(), TEST_ACTOR)
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationFailed");
        assert!(state
            .production_api
            .list_items_by_schedule(&schedule.schedule_id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_import_missing_file_is_not_found() {
        let (_temp_file, _db_path, state) = setup_test_env();
        let schedule = create_schedule(&state);

        let err = state
            .production_api
            .import_items_from_csv(
                &schedule.schedule_id,
                Path::new("/nonexistent/schedule_lines.csv"),
                TEST_ACTOR,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}
