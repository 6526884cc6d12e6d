// ==========================================
// 生产排程系统 - 生产排程 API
// ==========================================
// 职责: 对外服务接口（排程单、生产项、完工、分配、明细、查询）
// 边界: 存储失败在此记录（操作名 + 关键ID）并转换为 StoreFailure；不自动重试
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::production_allocation::{
    DemandSupplyView, NewProductionAllocation, ProductionAllocation,
};
use crate::domain::production_completion::{CompletionRequest, ProductionCompletion};
use crate::domain::production_detail::{NewProductionDetail, ProductionDetail};
use crate::domain::production_item::{NewProductionItem, ProductionItem};
use crate::domain::schedule::{NewSchedule, Schedule, ScheduleProgress};
use crate::domain::types::ProductionStatus;
use crate::engine::{
    AllocationLedger, CompletionOutcome, CompletionRecorder, DeletionOutcome, DetailExplosion,
    EngineError, EngineResult, ItemLifecycle, ScheduleAggregate, StartOutcome,
};
use crate::importer::ScheduleLineCsvParser;
use crate::repository::store::ScheduleStore;
use crate::repository::{
    production_allocation_repo, production_completion_repo, production_detail_repo,
    production_item_repo, ActionLogRepository, ProductionItemRepository,
};

/// 生产项完整视图（明细 + 分配 + 完工记录 + 合计）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionItemGraph {
    pub item: ProductionItem,
    pub details: Vec<ProductionDetail>,
    pub allocations: Vec<ProductionAllocation>,
    pub completions: Vec<ProductionCompletion>,
    pub total_allocated: f64,
    /// 完工记录数量合计（人工改写后可能与 item.completed_quantity 不同）
    pub total_completion_events: f64,
}

// ==========================================
// ProductionApi - 生产排程 API
// ==========================================
pub struct ProductionApi {
    store: ScheduleStore,
    schedule_aggregate: Arc<ScheduleAggregate>,
    item_lifecycle: Arc<ItemLifecycle>,
    completion_recorder: Arc<CompletionRecorder>,
    allocation_ledger: Arc<AllocationLedger>,
    detail_explosion: Arc<DetailExplosion>,
    item_repo: Arc<ProductionItemRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ProductionApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: ScheduleStore,
        schedule_aggregate: Arc<ScheduleAggregate>,
        item_lifecycle: Arc<ItemLifecycle>,
        completion_recorder: Arc<CompletionRecorder>,
        allocation_ledger: Arc<AllocationLedger>,
        detail_explosion: Arc<DetailExplosion>,
        item_repo: Arc<ProductionItemRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            store,
            schedule_aggregate,
            item_lifecycle,
            completion_recorder,
            allocation_ledger,
            detail_explosion,
            item_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 排程单
    // ==========================================

    pub fn create_schedule(&self, header: NewSchedule, actor: &str) -> ApiResult<Schedule> {
        let key = header.schedule_code.clone().unwrap_or_default();
        boundary("create_schedule", &key, self.schedule_aggregate.create_schedule(header, actor))
    }

    pub fn create_items(
        &self,
        schedule_id: &str,
        items: &[NewProductionItem],
        actor: &str,
    ) -> ApiResult<Vec<ProductionItem>> {
        boundary(
            "create_items",
            schedule_id,
            self.schedule_aggregate.create_items(schedule_id, items, actor),
        )
    }

    /// 从 CSV 文件导入生产项（解析问题全部返回，不插入任何行）
    pub fn import_items_from_csv(
        &self,
        schedule_id: &str,
        file_path: &Path,
        actor: &str,
    ) -> ApiResult<Vec<ProductionItem>> {
        let items = ScheduleLineCsvParser.parse_file(file_path).map_err(|e| {
            tracing::warn!(
                operation = "import_items_from_csv",
                schedule_id,
                file = %file_path.display(),
                error = %e,
                "排程行文件解析失败"
            );
            ApiError::from(e)
        })?;
        self.create_items(schedule_id, &items, actor)
    }

    pub fn update_schedule(
        &self,
        schedule_id: &str,
        schedule_date: NaiveDate,
        remarks: Option<String>,
        actor: &str,
    ) -> ApiResult<Schedule> {
        boundary(
            "update_schedule",
            schedule_id,
            self.schedule_aggregate
                .update_schedule(schedule_id, schedule_date, remarks, actor),
        )
    }

    /// 删除排程单（按删除资格规则）
    pub fn delete_schedule(&self, schedule_id: &str, actor: &str) -> ApiResult<DeletionOutcome> {
        boundary(
            "delete_schedule",
            schedule_id,
            self.schedule_aggregate.delete_schedule(schedule_id, actor),
        )
    }

    /// 删除资格预检（不删除）
    pub fn check_schedule_deletable(&self, schedule_id: &str) -> ApiResult<()> {
        boundary(
            "check_schedule_deletable",
            schedule_id,
            self.schedule_aggregate.check_deletable(schedule_id),
        )
    }

    pub fn delete_item(&self, item_id: &str, actor: &str) -> ApiResult<DeletionOutcome> {
        boundary("delete_item", item_id, self.schedule_aggregate.delete_item(item_id, actor))
    }

    pub fn get_schedule(&self, schedule_id: &str) -> ApiResult<Schedule> {
        boundary("get_schedule", schedule_id, self.schedule_aggregate.get_schedule(schedule_id))
    }

    pub fn get_schedule_by_code(&self, schedule_code: &str) -> ApiResult<Option<Schedule>> {
        boundary(
            "get_schedule_by_code",
            schedule_code,
            self.schedule_aggregate.find_by_code(schedule_code),
        )
    }

    pub fn list_schedules_by_source(
        &self,
        source_doc_type: &str,
        source_doc_id: &str,
    ) -> ApiResult<Vec<Schedule>> {
        boundary(
            "list_schedules_by_source",
            source_doc_id,
            self.schedule_aggregate.find_by_source(source_doc_type, source_doc_id),
        )
    }

    pub fn list_schedules_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Vec<Schedule>> {
        boundary(
            "list_schedules_by_date_range",
            &format!("{}..{}", from, to),
            self.schedule_aggregate.list_by_date_range(from, to),
        )
    }

    pub fn get_schedule_progress(&self, schedule_id: &str) -> ApiResult<ScheduleProgress> {
        boundary(
            "get_schedule_progress",
            schedule_id,
            self.schedule_aggregate.progress(schedule_id),
        )
    }

    // ==========================================
    // 生产项状态
    // ==========================================

    pub fn start_item(&self, item_id: &str, actor: &str) -> ApiResult<StartOutcome> {
        boundary("start_item", item_id, self.item_lifecycle.start(item_id, actor))
    }

    pub fn record_completion(
        &self,
        item_id: &str,
        request: CompletionRequest,
        actor: &str,
    ) -> ApiResult<CompletionOutcome> {
        boundary(
            "record_completion",
            item_id,
            self.completion_recorder.create(item_id, request, actor),
        )
    }

    /// 人工改写已完工数量
    pub fn set_completed_quantity(
        &self,
        item_id: &str,
        quantity: f64,
        actor: &str,
    ) -> ApiResult<ProductionItem> {
        boundary(
            "set_completed_quantity",
            item_id,
            self.item_lifecycle.set_completed_quantity(item_id, quantity, actor),
        )
    }

    // ==========================================
    // 用料明细 / 需求分配
    // ==========================================

    pub fn replace_details(
        &self,
        item_id: &str,
        details: &[NewProductionDetail],
        actor: &str,
    ) -> ApiResult<Vec<ProductionDetail>> {
        boundary(
            "replace_details",
            item_id,
            self.detail_explosion.replace_details(item_id, details, actor),
        )
    }

    pub fn explode_details(&self, item_id: &str, actor: &str) -> ApiResult<Vec<ProductionDetail>> {
        boundary(
            "explode_details",
            item_id,
            self.detail_explosion.explode_from_composition(item_id, actor),
        )
    }

    pub fn delete_details(&self, item_id: &str, actor: &str) -> ApiResult<usize> {
        boundary("delete_details", item_id, self.detail_explosion.delete_all(item_id, actor))
    }

    pub fn replace_allocations(
        &self,
        item_id: &str,
        allocations: &[NewProductionAllocation],
        actor: &str,
    ) -> ApiResult<Vec<ProductionAllocation>> {
        boundary(
            "replace_allocations",
            item_id,
            self.allocation_ledger
                .replace_allocations(item_id, allocations, actor),
        )
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 生产项完整视图（一次加锁读取，视图内部一致）
    pub fn get_item_graph(&self, item_id: &str) -> ApiResult<ProductionItemGraph> {
        let result = self
            .store
            .read(|conn| {
                let item = production_item_repo::load(conn, item_id)?;
                Ok(ProductionItemGraph {
                    details: production_detail_repo::select_by_item(conn, item_id)?,
                    allocations: production_allocation_repo::select_by_item(conn, item_id)?,
                    completions: production_completion_repo::select_by_item(conn, item_id)?,
                    total_allocated: production_allocation_repo::sum_by_item(conn, item_id)?,
                    total_completion_events: production_completion_repo::sum_by_item(conn, item_id)?,
                    item,
                })
            })
            .map_err(EngineError::from);
        boundary("get_item_graph", item_id, result)
    }

    pub fn list_items_by_schedule(&self, schedule_id: &str) -> ApiResult<Vec<ProductionItem>> {
        boundary(
            "list_items_by_schedule",
            schedule_id,
            self.item_repo.find_by_schedule(schedule_id).map_err(EngineError::from),
        )
    }

    pub fn list_items_by_product(&self, product_id: &str) -> ApiResult<Vec<ProductionItem>> {
        boundary(
            "list_items_by_product",
            product_id,
            self.item_repo.find_by_product(product_id).map_err(EngineError::from),
        )
    }

    /// 按生产项自身关联的需求行查询
    pub fn list_items_by_demand_line(&self, demand_line_id: &str) -> ApiResult<Vec<ProductionItem>> {
        boundary(
            "list_items_by_demand_line",
            demand_line_id,
            self.item_repo
                .find_by_demand_line(demand_line_id)
                .map_err(EngineError::from),
        )
    }

    pub fn list_items_by_status(
        &self,
        status: ProductionStatus,
        schedule_id: Option<&str>,
    ) -> ApiResult<Vec<ProductionItem>> {
        boundary(
            "list_items_by_status",
            status.to_db_str(),
            self.item_repo
                .find_by_status(status, schedule_id)
                .map_err(EngineError::from),
        )
    }

    /// 按排程日期区间查询生产项（闭区间）
    pub fn list_items_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Vec<ProductionItem>> {
        let result = if from > to {
            Err(EngineError::validation(format!(
                "date_range: 起始日期{}晚于结束日期{}",
                from, to
            )))
        } else {
            self.item_repo
                .find_by_schedule_date_range(from, to)
                .map_err(EngineError::from)
        };
        boundary("list_items_by_date_range", &format!("{}..{}", from, to), result)
    }

    pub fn list_allocations_by_item(&self, item_id: &str) -> ApiResult<Vec<ProductionAllocation>> {
        boundary(
            "list_allocations_by_item",
            item_id,
            self.allocation_ledger.find_by_item(item_id),
        )
    }

    /// 需求行的全部流入供给（排程日期由近及远）
    pub fn list_allocations_by_demand_line(
        &self,
        demand_line_id: &str,
    ) -> ApiResult<Vec<DemandSupplyView>> {
        boundary(
            "list_allocations_by_demand_line",
            demand_line_id,
            self.allocation_ledger.find_by_demand_line(demand_line_id),
        )
    }

    pub fn total_allocated(&self, item_id: &str) -> ApiResult<f64> {
        boundary("total_allocated", item_id, self.allocation_ledger.total_allocated(item_id))
    }

    pub fn list_completions_by_item(&self, item_id: &str) -> ApiResult<Vec<ProductionCompletion>> {
        boundary(
            "list_completions_by_item",
            item_id,
            self.completion_recorder.find_by_item(item_id),
        )
    }

    pub fn list_completions_by_date_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> ApiResult<Vec<ProductionCompletion>> {
        boundary(
            "list_completions_by_date_range",
            &format!("{}..{}", from, to),
            self.completion_recorder.find_by_date_range(from, to),
        )
    }

    pub fn list_completions_by_warehouse(
        &self,
        warehouse_id: &str,
    ) -> ApiResult<Vec<ProductionCompletion>> {
        boundary(
            "list_completions_by_warehouse",
            warehouse_id,
            self.completion_recorder.find_by_warehouse(warehouse_id),
        )
    }

    pub fn total_completed(&self, item_id: &str) -> ApiResult<f64> {
        boundary("total_completed", item_id, self.completion_recorder.total_completed(item_id))
    }

    pub fn list_details_by_item(&self, item_id: &str) -> ApiResult<Vec<ProductionDetail>> {
        boundary("list_details_by_item", item_id, self.detail_explosion.find_by_item(item_id))
    }

    /// 哪些生产依赖该组件
    pub fn list_details_by_component(
        &self,
        component_product_id: &str,
    ) -> ApiResult<Vec<ProductionDetail>> {
        boundary(
            "list_details_by_component",
            component_product_id,
            self.detail_explosion.find_by_component(component_product_id),
        )
    }

    pub fn list_details_by_warehouse(&self, warehouse_id: &str) -> ApiResult<Vec<ProductionDetail>> {
        boundary(
            "list_details_by_warehouse",
            warehouse_id,
            self.detail_explosion.find_by_warehouse(warehouse_id),
        )
    }

    /// 生产项操作日志（最新在前）
    pub fn list_action_logs_by_item(&self, item_id: &str) -> ApiResult<Vec<ActionLog>> {
        boundary(
            "list_action_logs_by_item",
            item_id,
            self.action_log_repo.find_by_item(item_id).map_err(EngineError::from),
        )
    }

    pub fn list_action_logs_by_schedule(&self, schedule_id: &str) -> ApiResult<Vec<ActionLog>> {
        boundary(
            "list_action_logs_by_schedule",
            schedule_id,
            self.action_log_repo
                .find_by_schedule(schedule_id)
                .map_err(EngineError::from),
        )
    }
}

/// 操作边界: 业务失败告警后原样返回；存储失败记录完整上下文后转为 StoreFailure
fn boundary<T>(operation: &'static str, key: &str, result: EngineResult<T>) -> ApiResult<T> {
    result.map_err(|err| {
        if err.is_store_failure() {
            tracing::error!(operation, key, error = %err, "存储层操作失败");
            ApiError::StoreFailure(format!("{} 执行失败", operation))
        } else {
            tracing::warn!(operation, key, error = %err, "业务规则拒绝");
            ApiError::from(err)
        }
    })
}
