// ==========================================
// 生产排程系统 - 完工登记引擎
// ==========================================
// 职责: 追加完工记录、推进生产项进度、通知库存入库
// 并发: 同一生产项的完工登记在 IMMEDIATE 事务内串行化，
//       超计划校验与写入之间不存在其他写者
// 顺序: seq_no 在事务内分配，与提交顺序一致
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production_completion::{CompletionRequest, ProductionCompletion};
use crate::domain::production_item::{ProductionItem, ProgressChange};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, ProductionEvent, ProductionEventType};
use crate::engine::inventory::{FinishedGoodsReceipt, InventoryGateway};
use crate::engine::{local_now, non_blank};
use crate::repository::store::ScheduleStore;
use crate::repository::{
    action_log_repo, production_completion_repo, production_item_repo,
    ProductionCompletionRepository,
};

/// 完工登记结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub completion: ProductionCompletion,
    pub item: ProductionItem,
    pub change: ProgressChange,
}

// ==========================================
// CompletionRecorder - 完工登记
// ==========================================
pub struct CompletionRecorder {
    store: ScheduleStore,
    completion_repo: Arc<ProductionCompletionRepository>,
    inventory: Arc<dyn InventoryGateway>,
    events: OptionalEventPublisher,
}

impl CompletionRecorder {
    pub fn new(
        store: ScheduleStore,
        completion_repo: Arc<ProductionCompletionRepository>,
        inventory: Arc<dyn InventoryGateway>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            store,
            completion_repo,
            inventory,
            events,
        }
    }

    /// 登记完工
    ///
    /// # 规则
    /// - quantity > 0，且 已完工 + quantity <= 计划数量
    /// - 完工时间缺省为当前时间；仓库/库位缺省取生产项自身设置
    /// - 完工记录、成品入库、生产项进度在同一事务提交
    #[instrument(skip(self, request), fields(item_id = %item_id, quantity = request.quantity))]
    pub fn create(
        &self,
        item_id: &str,
        request: CompletionRequest,
        actor: &str,
    ) -> EngineResult<CompletionOutcome> {
        let now = local_now();
        let completed_at = request.completed_at.unwrap_or(now);

        let outcome = self.store.write(|tx| -> EngineResult<CompletionOutcome> {
            let mut item = production_item_repo::load(tx, item_id)?;
            let recorded_sum = production_completion_repo::sum_by_item(tx, item_id)?;

            let change = item
                .apply_completion(request.quantity, recorded_sum, now)
                .map_err(|v| EngineError::from_rule(item_id, v))?;

            let warehouse_id = non_blank(&request.warehouse_id).or_else(|| item.warehouse_id.clone());
            let location = non_blank(&request.location).or_else(|| item.location.clone());
            let completion_id = uuid::Uuid::new_v4().to_string();

            let inventory_txn_id = self.inventory.receive_finished_goods(
                tx,
                &FinishedGoodsReceipt {
                    product_id: item.product_id.clone(),
                    quantity: request.quantity,
                    warehouse_id: warehouse_id.clone(),
                    location: location.clone(),
                    completion_id: completion_id.clone(),
                    received_at: completed_at,
                },
            )?;

            let completion = ProductionCompletion {
                completion_id,
                item_id: item.item_id.clone(),
                seq_no: production_completion_repo::next_seq_no(tx, item_id)?,
                quantity: request.quantity,
                completed_at,
                warehouse_id,
                location,
                batch_no: non_blank(&request.batch_no),
                inventory_txn_id,
                created_by: actor.to_string(),
                created_at: now,
            };
            production_completion_repo::insert(tx, &completion)?;
            production_item_repo::update_progress(tx, &mut item)?;

            let log = ActionLog::new(ActionType::RecordCompletion, actor, now)
                .with_schedule(&item.schedule_id)
                .with_item(item_id)
                .with_payload(json!({
                    "completion_id": completion.completion_id,
                    "seq_no": completion.seq_no,
                    "quantity": completion.quantity,
                    "completed_before": change.previous_completed,
                    "completed_after": change.new_completed,
                    "status": change.new_status,
                    "inventory_txn_id": completion.inventory_txn_id,
                }));
            action_log_repo::insert(tx, &log)?;

            Ok(CompletionOutcome {
                completion,
                item,
                change,
            })
        })?;

        tracing::info!(
            item_id,
            seq_no = outcome.completion.seq_no,
            completed_quantity = outcome.item.completed_quantity,
            status = %outcome.item.status,
            "完工已登记"
        );

        self.events.publish_after_commit(ProductionEvent::for_item(
            ProductionEventType::CompletionRecorded,
            &outcome.item.schedule_id,
            item_id,
            Some(outcome.completion.quantity),
            now,
        ));
        if outcome.change.reached_plan() {
            self.events.publish_after_commit(ProductionEvent::for_item(
                ProductionEventType::ItemCompleted,
                &outcome.item.schedule_id,
                item_id,
                Some(outcome.item.completed_quantity),
                now,
            ));
        }

        Ok(outcome)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_item(&self, item_id: &str) -> EngineResult<Vec<ProductionCompletion>> {
        Ok(self.completion_repo.find_by_item(item_id)?)
    }

    pub fn find_by_date_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> EngineResult<Vec<ProductionCompletion>> {
        if from > to {
            return Err(EngineError::validation(format!(
                "date_range: 起始时间{}晚于结束时间{}",
                from, to
            )));
        }
        Ok(self.completion_repo.find_by_date_range(from, to)?)
    }

    pub fn find_by_warehouse(&self, warehouse_id: &str) -> EngineResult<Vec<ProductionCompletion>> {
        Ok(self.completion_repo.find_by_warehouse(warehouse_id)?)
    }

    /// 生产项完工记录数量合计
    pub fn total_completed(&self, item_id: &str) -> EngineResult<f64> {
        Ok(self.completion_repo.total_by_item(item_id)?)
    }
}
