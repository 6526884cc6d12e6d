// ==========================================
// 生产排程系统 - 排程单聚合
// ==========================================
// 职责: 排程单创建、生产项批量创建、表头修改、删除资格判定、进度汇总
// 删除资格: 任一生产项存在完工记录 / 需求分配 / 已完工数量 > 0 → 阻止删除
//          （无生产项的排程单总是可删除）
// 删除时: 已开工生产项的组件预留在同一事务内释放
// ==========================================

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production_item::{NewProductionItem, ProductionItem};
use crate::domain::schedule::{NewSchedule, Schedule, ScheduleProgress};
use crate::domain::types::{DeleteBlockReason, ProductionStatus, QTY_EPSILON};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, ProductionEvent, ProductionEventType};
use crate::engine::inventory::InventoryGateway;
use crate::engine::{local_now, non_blank};
use crate::engine::validation::FieldValidator;
use crate::repository::store::ScheduleStore;
use crate::repository::{
    action_log_repo, production_allocation_repo, production_completion_repo,
    production_item_repo, reference_repo, schedule_repo, RepositoryResult, ScheduleRepository,
};

/// 生成排程单号的最大重试次数
const CODE_GENERATION_ATTEMPTS: usize = 5;

/// 删除结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub schedule_id: String,
    pub removed_item_ids: Vec<String>,
    /// 释放组件预留写入的库存事务ID
    pub released_txn_ids: Vec<String>,
}

// ==========================================
// ScheduleAggregate - 排程单聚合
// ==========================================
pub struct ScheduleAggregate {
    store: ScheduleStore,
    schedule_repo: Arc<ScheduleRepository>,
    config: Arc<ConfigManager>,
    inventory: Arc<dyn InventoryGateway>,
    events: OptionalEventPublisher,
}

impl ScheduleAggregate {
    pub fn new(
        store: ScheduleStore,
        schedule_repo: Arc<ScheduleRepository>,
        config: Arc<ConfigManager>,
        inventory: Arc<dyn InventoryGateway>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            store,
            schedule_repo,
            config,
            inventory,
            events,
        }
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 创建排程单
    ///
    /// # 规则
    /// - 排程单号缺省时按 `{前缀}-{yyyymmdd}-{8位十六进制}` 生成，唯一
    /// - 来源单据类型与ID需同时提供
    /// - 排程日期缺省为当天
    #[instrument(skip(self, header))]
    pub fn create_schedule(&self, header: NewSchedule, actor: &str) -> EngineResult<Schedule> {
        let prefix = self.config.schedule_code_prefix()?;
        let now = local_now();
        let schedule_date = header.schedule_date.unwrap_or_else(|| now.date());

        let mut v = FieldValidator::new();
        if let Some(code) = &header.schedule_code {
            v.require("schedule_code", code);
        }
        let source_type = non_blank(&header.source_doc_type);
        let source_id = non_blank(&header.source_doc_id);
        v.check(
            source_type.is_some() == source_id.is_some(),
            "source_doc: 来源单据类型与来源单据ID需同时提供",
        );
        v.require("created_by", actor);
        v.finish()?;

        let schedule = self.store.write(|tx| -> EngineResult<Schedule> {
            let schedule_code = match &header.schedule_code {
                Some(code) => {
                    let code = code.trim().to_string();
                    if schedule_repo::code_exists(tx, &code)? {
                        return Err(EngineError::validation(format!(
                            "schedule_code: 排程单号{}已存在",
                            code
                        )));
                    }
                    code
                }
                None => generate_code(tx, &prefix, schedule_date)?,
            };

            let schedule = Schedule {
                schedule_id: uuid::Uuid::new_v4().to_string(),
                schedule_code,
                schedule_date,
                source_doc_type: source_type.clone(),
                source_doc_id: source_id.clone(),
                customer_id: non_blank(&header.customer_id),
                remarks: header.remarks.clone(),
                created_by: actor.to_string(),
                created_at: now,
                updated_at: now,
            };
            schedule_repo::insert(tx, &schedule)?;

            let log = ActionLog::new(ActionType::CreateSchedule, actor, now)
                .with_schedule(&schedule.schedule_id)
                .with_payload(json!({
                    "schedule_code": schedule.schedule_code,
                    "schedule_date": schedule.schedule_date.to_string(),
                    "source_doc_type": schedule.source_doc_type,
                    "source_doc_id": schedule.source_doc_id,
                }));
            action_log_repo::insert(tx, &log)?;
            Ok(schedule)
        })?;

        tracing::info!(
            schedule_id = %schedule.schedule_id,
            schedule_code = %schedule.schedule_code,
            "排程单已创建"
        );
        Ok(schedule)
    }

    /// 批量创建生产项（全部成功或全部不插入）
    ///
    /// # 规则
    /// - 每项: 成品必填且存在，计划数量 > 0，关联需求行（如有）存在
    /// - 初始状态 PENDING，已完工数量 0
    #[instrument(skip(self, items), fields(schedule_id = %schedule_id, count = items.len()))]
    pub fn create_items(
        &self,
        schedule_id: &str,
        items: &[NewProductionItem],
        actor: &str,
    ) -> EngineResult<Vec<ProductionItem>> {
        let now = local_now();

        let created = self.store.write(|tx| -> EngineResult<Vec<ProductionItem>> {
            let schedule = schedule_repo::load(tx, schedule_id)?;
            validate_new_items(tx, items)?;

            let created: Vec<ProductionItem> = items
                .iter()
                .map(|input| ProductionItem {
                    item_id: uuid::Uuid::new_v4().to_string(),
                    schedule_id: schedule.schedule_id.clone(),
                    product_id: input.product_id.trim().to_string(),
                    scheduled_quantity: input.scheduled_quantity,
                    completed_quantity: 0.0,
                    status: ProductionStatus::Pending,
                    priority: input.priority,
                    demand_line_id: non_blank(&input.demand_line_id),
                    warehouse_id: non_blank(&input.warehouse_id),
                    location: non_blank(&input.location),
                    actual_start_at: None,
                    actual_end_at: None,
                    revision: 0,
                    created_at: now,
                    updated_at: now,
                })
                .collect();
            production_item_repo::insert_batch(tx, &created)?;

            let log = ActionLog::new(ActionType::CreateItems, actor, now)
                .with_schedule(schedule_id)
                .with_payload(json!({
                    "item_ids": created.iter().map(|i| i.item_id.as_str()).collect::<Vec<_>>(),
                    "total_scheduled": created.iter().map(|i| i.scheduled_quantity).sum::<f64>(),
                }));
            action_log_repo::insert(tx, &log)?;
            Ok(created)
        })?;

        tracing::info!(schedule_id, count = created.len(), "生产项已批量创建");
        Ok(created)
    }

    // ==========================================
    // 修改
    // ==========================================

    /// 修改排程单表头（日期、备注）
    ///
    /// # 规则
    /// - 任一生产项已有进展（非 PENDING / 已完工数量 > 0 / 存在完工记录）→ 拒绝
    #[instrument(skip(self, remarks))]
    pub fn update_schedule(
        &self,
        schedule_id: &str,
        schedule_date: NaiveDate,
        remarks: Option<String>,
        actor: &str,
    ) -> EngineResult<Schedule> {
        let now = local_now();

        let schedule = self.store.write(|tx| -> EngineResult<Schedule> {
            let before = schedule_repo::load(tx, schedule_id)?;
            for item in production_item_repo::select_by_schedule(tx, schedule_id)? {
                let events = production_completion_repo::count_by_item(tx, &item.item_id)?;
                if item.has_progressed() || events > 0 {
                    return Err(EngineError::IllegalStateTransition {
                        from: format!("生产项{}状态{}", item.item_id, item.status),
                        to: "排程单表头修改".to_string(),
                    });
                }
            }

            schedule_repo::update_header(tx, schedule_id, schedule_date, remarks.as_deref(), now)?;

            let log = ActionLog::new(ActionType::UpdateSchedule, actor, now)
                .with_schedule(schedule_id)
                .with_payload(json!({
                    "schedule_date_before": before.schedule_date.to_string(),
                    "schedule_date_after": schedule_date.to_string(),
                    "remarks_before": before.remarks,
                    "remarks_after": remarks,
                }));
            action_log_repo::insert(tx, &log)?;

            Ok(schedule_repo::load(tx, schedule_id)?)
        })?;

        tracing::info!(schedule_id, schedule_date = %schedule.schedule_date, "排程单表头已修改");
        Ok(schedule)
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 判定排程单是否可删除（只读）
    pub fn check_deletable(&self, schedule_id: &str) -> EngineResult<()> {
        let block = self.store.read(|conn| {
            schedule_repo::load(conn, schedule_id)?;
            let items = production_item_repo::select_by_schedule(conn, schedule_id)?;
            find_delete_block(conn, &items)
        })?;

        match block {
            Some(reason) => Err(EngineError::DeleteBlocked(reason)),
            None => Ok(()),
        }
    }

    /// 删除排程单（生产项、用料明细、需求分配级联删除）
    #[instrument(skip(self))]
    pub fn delete_schedule(&self, schedule_id: &str, actor: &str) -> EngineResult<DeletionOutcome> {
        let now = local_now();

        let outcome = self.store.write(|tx| -> EngineResult<DeletionOutcome> {
            let schedule = schedule_repo::load(tx, schedule_id)?;
            let items = production_item_repo::select_by_schedule(tx, schedule_id)?;
            if let Some(reason) = find_delete_block(tx, &items)? {
                return Err(EngineError::DeleteBlocked(reason));
            }

            let mut released_txn_ids = Vec::new();
            for item in &items {
                released_txn_ids.extend(self.inventory.release_reservations(tx, &item.item_id, now)?);
            }

            schedule_repo::delete(tx, schedule_id)?;

            let removed_item_ids: Vec<String> = items.into_iter().map(|i| i.item_id).collect();
            let log = ActionLog::new(ActionType::DeleteSchedule, actor, now)
                .with_schedule(schedule_id)
                .with_payload(json!({
                    "schedule_code": schedule.schedule_code,
                    "removed_item_ids": removed_item_ids,
                    "released_txn_ids": released_txn_ids,
                }));
            action_log_repo::insert(tx, &log)?;

            Ok(DeletionOutcome {
                schedule_id: schedule_id.to_string(),
                removed_item_ids,
                released_txn_ids,
            })
        })?;

        tracing::info!(
            schedule_id,
            removed_items = outcome.removed_item_ids.len(),
            "排程单已删除"
        );
        self.events.publish_after_commit(ProductionEvent::for_schedule(
            ProductionEventType::ScheduleDeleted,
            schedule_id,
            now,
        ));
        Ok(outcome)
    }

    /// 删除单个生产项（仅 PENDING，且满足删除资格）
    #[instrument(skip(self))]
    pub fn delete_item(&self, item_id: &str, actor: &str) -> EngineResult<DeletionOutcome> {
        let now = local_now();

        let outcome = self.store.write(|tx| -> EngineResult<DeletionOutcome> {
            let item = production_item_repo::load(tx, item_id)?;
            if item.status != ProductionStatus::Pending {
                return Err(EngineError::DeleteBlocked(DeleteBlockReason::ItemNotPending {
                    item_id: item.item_id.clone(),
                    status: item.status,
                }));
            }
            if let Some(reason) = find_delete_block(tx, std::slice::from_ref(&item))? {
                return Err(EngineError::DeleteBlocked(reason));
            }

            let released_txn_ids = self.inventory.release_reservations(tx, item_id, now)?;
            production_item_repo::delete(tx, item_id)?;

            let log = ActionLog::new(ActionType::DeleteItem, actor, now)
                .with_schedule(&item.schedule_id)
                .with_item(item_id)
                .with_payload(json!({
                    "product_id": item.product_id,
                    "scheduled_quantity": item.scheduled_quantity,
                    "released_txn_ids": released_txn_ids,
                }));
            action_log_repo::insert(tx, &log)?;

            Ok(DeletionOutcome {
                schedule_id: item.schedule_id,
                removed_item_ids: vec![item.item_id],
                released_txn_ids,
            })
        })?;

        tracing::info!(item_id, schedule_id = %outcome.schedule_id, "生产项已删除");
        self.events.publish_after_commit(ProductionEvent::for_item(
            ProductionEventType::ItemDeleted,
            &outcome.schedule_id,
            item_id,
            None,
            now,
        ));
        Ok(outcome)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_schedule(&self, schedule_id: &str) -> EngineResult<Schedule> {
        self.schedule_repo
            .find_by_id(schedule_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Schedule".to_string(),
                id: schedule_id.to_string(),
            })
    }

    pub fn find_by_code(&self, schedule_code: &str) -> EngineResult<Option<Schedule>> {
        Ok(self.schedule_repo.find_by_code(schedule_code)?)
    }

    pub fn find_by_source(&self, source_doc_type: &str, source_doc_id: &str) -> EngineResult<Vec<Schedule>> {
        Ok(self.schedule_repo.find_by_source(source_doc_type, source_doc_id)?)
    }

    pub fn list_by_date_range(&self, from: NaiveDate, to: NaiveDate) -> EngineResult<Vec<Schedule>> {
        if from > to {
            return Err(EngineError::validation(format!(
                "date_range: 起始日期{}晚于结束日期{}",
                from, to
            )));
        }
        Ok(self.schedule_repo.list_by_date_range(from, to)?)
    }

    /// 排程单进度汇总
    pub fn progress(&self, schedule_id: &str) -> EngineResult<ScheduleProgress> {
        let progress = self.store.read(|conn| {
            schedule_repo::load(conn, schedule_id)?;
            let items = production_item_repo::select_by_schedule(conn, schedule_id)?;

            let mut progress = ScheduleProgress {
                schedule_id: schedule_id.to_string(),
                item_count: items.len() as i64,
                ..Default::default()
            };
            for item in &items {
                match item.status {
                    ProductionStatus::Pending => progress.pending_count += 1,
                    ProductionStatus::InProgress => progress.in_progress_count += 1,
                    ProductionStatus::Completed => progress.completed_count += 1,
                }
                progress.total_scheduled += item.scheduled_quantity;
                progress.total_completed += item.completed_quantity;
                progress.total_allocated += production_allocation_repo::sum_by_item(conn, &item.item_id)?;
            }
            Ok(progress)
        })?;
        Ok(progress)
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 删除资格判定：按 完工记录 → 需求分配 → 已完工数量 的顺序返回第一条阻断原因
fn find_delete_block(
    conn: &Connection,
    items: &[ProductionItem],
) -> RepositoryResult<Option<DeleteBlockReason>> {
    for item in items {
        let count = production_completion_repo::count_by_item(conn, &item.item_id)?;
        if count > 0 {
            return Ok(Some(DeleteBlockReason::HasCompletionRecords {
                item_id: item.item_id.clone(),
                count,
            }));
        }
    }
    for item in items {
        let count = production_allocation_repo::count_by_item(conn, &item.item_id)?;
        if count > 0 {
            return Ok(Some(DeleteBlockReason::HasAllocations {
                item_id: item.item_id.clone(),
                count,
            }));
        }
    }
    for item in items {
        if item.completed_quantity > QTY_EPSILON {
            return Ok(Some(DeleteBlockReason::HasCompletedQuantity {
                item_id: item.item_id.clone(),
                completed_quantity: item.completed_quantity,
            }));
        }
    }
    Ok(None)
}

fn validate_new_items(conn: &Connection, items: &[NewProductionItem]) -> EngineResult<()> {
    let mut v = FieldValidator::new();
    v.check(!items.is_empty(), "items: 生产项列表不能为空");

    for (idx, item) in items.iter().enumerate() {
        let field = format!("items[{}]", idx);
        if v.require(&format!("{}.product_id", field), &item.product_id) {
            let product_id = item.product_id.trim();
            v.check(
                reference_repo::product_exists(conn, product_id)?,
                format!("{}.product_id: 成品{}不存在", field, product_id),
            );
        }
        v.positive(&format!("{}.scheduled_quantity", field), item.scheduled_quantity);
        if let Some(demand_line_id) = non_blank(&item.demand_line_id) {
            v.check(
                reference_repo::demand_line_exists(conn, &demand_line_id)?,
                format!("{}.demand_line_id: 需求行{}不存在", field, demand_line_id),
            );
        }
    }

    v.finish()
}

fn generate_code(conn: &Connection, prefix: &str, date: NaiveDate) -> EngineResult<String> {
    for _ in 0..CODE_GENERATION_ATTEMPTS {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let code = format!(
            "{}-{}-{}",
            prefix,
            date.format("%Y%m%d"),
            suffix[..8].to_uppercase()
        );
        if !schedule_repo::code_exists(conn, &code)? {
            return Ok(code);
        }
    }
    Err(EngineError::Repository(
        crate::repository::RepositoryError::InternalError("排程单号生成冲突次数过多".to_string()),
    ))
}
