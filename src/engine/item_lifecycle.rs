// ==========================================
// 生产排程系统 - 生产项生命周期引擎
// ==========================================
// 职责: 开工、人工改写已完工数量
// 并发: 读-改-写在一个 IMMEDIATE 事务内完成，并带 revision 检查
// 红线: Engine 不拼 SQL（经 repository 自由函数访问）
// ==========================================

use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production_item::{ProductionItem, ProgressChange};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, ProductionEvent, ProductionEventType};
use crate::engine::inventory::InventoryGateway;
use crate::engine::local_now;
use crate::repository::store::ScheduleStore;
use crate::repository::{
    action_log_repo, production_completion_repo, production_detail_repo, production_item_repo,
};

/// 开工结果
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub item: ProductionItem,
    /// 组件预留产生的库存事务ID
    pub reservation_txn_ids: Vec<String>,
}

// ==========================================
// ItemLifecycle - 生产项状态机服务
// ==========================================
pub struct ItemLifecycle {
    store: ScheduleStore,
    config: Arc<ConfigManager>,
    inventory: Arc<dyn InventoryGateway>,
    events: OptionalEventPublisher,
}

impl ItemLifecycle {
    pub fn new(
        store: ScheduleStore,
        config: Arc<ConfigManager>,
        inventory: Arc<dyn InventoryGateway>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            store,
            config,
            inventory,
            events,
        }
    }

    /// 开工
    ///
    /// # 规则
    /// - 仅 PENDING 可开工
    /// - 按配置预留用料明细中的组件库存（同一事务）
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub fn start(&self, item_id: &str, actor: &str) -> EngineResult<StartOutcome> {
        let reserve = self.config.reserve_components_on_start()?;
        let now = local_now();

        let outcome = self.store.write(|tx| -> EngineResult<StartOutcome> {
            let mut item = production_item_repo::load(tx, item_id)?;
            item.start(now)
                .map_err(|v| EngineError::from_rule(item_id, v))?;
            production_item_repo::update_progress(tx, &mut item)?;

            let reservation_txn_ids = if reserve {
                let details = production_detail_repo::select_by_item(tx, item_id)?;
                self.inventory.reserve_components(tx, &item, &details, now)?
            } else {
                Vec::new()
            };

            let log = ActionLog::new(ActionType::StartItem, actor, now)
                .with_schedule(&item.schedule_id)
                .with_item(item_id)
                .with_payload(json!({
                    "actual_start_at": item.actual_start_at.map(|t| t.to_string()),
                    "reservation_txn_ids": reservation_txn_ids,
                }));
            action_log_repo::insert(tx, &log)?;

            Ok(StartOutcome {
                item,
                reservation_txn_ids,
            })
        })?;

        tracing::info!(
            item_id,
            reserved_lines = outcome.reservation_txn_ids.len(),
            "生产项已开工"
        );
        self.events.publish_after_commit(ProductionEvent::for_item(
            ProductionEventType::ItemStarted,
            &outcome.item.schedule_id,
            item_id,
            None,
            now,
        ));

        Ok(outcome)
    }

    /// 人工改写已完工数量
    ///
    /// # 规则
    /// - 0 <= quantity <= scheduled_quantity，状态按阈值重算
    /// - 不追加完工记录、不动库存
    /// - 按配置写入修正审计记录（改写前后数量、与完工记录合计的偏差）
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub fn set_completed_quantity(
        &self,
        item_id: &str,
        quantity: f64,
        actor: &str,
    ) -> EngineResult<ProductionItem> {
        let audit = self.config.audit_completed_quantity_override()?;
        let now = local_now();

        let (item, change, divergence) = self.store.write(|tx| -> EngineResult<(ProductionItem, ProgressChange, f64)> {
            let mut item = production_item_repo::load(tx, item_id)?;
            let recorded_sum = production_completion_repo::sum_by_item(tx, item_id)?;
            let event_count = production_completion_repo::count_by_item(tx, item_id)?;

            let change = item
                .override_completed_quantity(quantity, event_count > 0, now)
                .map_err(|v| EngineError::from_rule(item_id, v))?;
            production_item_repo::update_progress(tx, &mut item)?;

            let divergence = item.completed_quantity - recorded_sum;
            if audit {
                let log = ActionLog::new(ActionType::CompletedQuantityOverride, actor, now)
                    .with_schedule(&item.schedule_id)
                    .with_item(item_id)
                    .with_payload(json!({
                        "before": change.previous_completed,
                        "after": change.new_completed,
                        "previous_status": change.previous_status,
                        "new_status": change.new_status,
                        "completion_event_sum": recorded_sum,
                        "completion_event_count": event_count,
                        "divergence": divergence,
                    }))
                    .with_detail(format!(
                        "已完工数量由 {} 改写为 {}，与完工记录合计偏差 {}",
                        change.previous_completed, change.new_completed, divergence
                    ));
                action_log_repo::insert(tx, &log)?;
            }

            Ok((item, change, divergence))
        })?;

        if divergence.abs() > crate::domain::types::QTY_EPSILON {
            tracing::warn!(
                item_id,
                completed_quantity = item.completed_quantity,
                divergence,
                "已完工数量与完工记录合计不一致"
            );
        }
        tracing::info!(
            item_id,
            before = change.previous_completed,
            after = change.new_completed,
            status = %item.status,
            "已完工数量已改写"
        );

        self.events.publish_after_commit(ProductionEvent::for_item(
            ProductionEventType::CompletedQuantityOverridden,
            &item.schedule_id,
            item_id,
            Some(item.completed_quantity),
            now,
        ));
        if change.reached_plan() {
            self.events.publish_after_commit(ProductionEvent::for_item(
                ProductionEventType::ItemCompleted,
                &item.schedule_id,
                item_id,
                Some(item.completed_quantity),
                now,
            ));
        }

        Ok(item)
    }
}
