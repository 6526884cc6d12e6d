// ==========================================
// 生产排程系统 - 需求分配台账
// ==========================================
// 职责: 维护生产项产出与需求行（如销售订单行）的对应关系
// 语义: 整组替换（删除全部旧分配 + 插入新集合，同一事务）
// 说明: 默认不限制分配合计 <= 计划数量；配置 allocation_enforce_cap 开启上限
// ==========================================

use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production_allocation::{
    DemandSupplyView, NewProductionAllocation, ProductionAllocation,
};
use crate::domain::types::QTY_EPSILON;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, ProductionEvent, ProductionEventType};
use crate::engine::local_now;
use crate::engine::validation::FieldValidator;
use crate::repository::store::ScheduleStore;
use crate::repository::{
    action_log_repo, production_allocation_repo, production_item_repo, reference_repo,
    ProductionAllocationRepository,
};

// ==========================================
// AllocationLedger - 需求分配台账
// ==========================================
pub struct AllocationLedger {
    store: ScheduleStore,
    allocation_repo: Arc<ProductionAllocationRepository>,
    config: Arc<ConfigManager>,
    events: OptionalEventPublisher,
}

impl AllocationLedger {
    pub fn new(
        store: ScheduleStore,
        allocation_repo: Arc<ProductionAllocationRepository>,
        config: Arc<ConfigManager>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            store,
            allocation_repo,
            config,
            events,
        }
    }

    /// 整组替换生产项的需求分配
    ///
    /// # 规则
    /// - 生产项必须存在；分配列表不能为空
    /// - 每条: 需求行必填且存在，数量 > 0（全部违规一并返回）
    #[instrument(skip(self, allocations), fields(item_id = %item_id, count = allocations.len()))]
    pub fn replace_allocations(
        &self,
        item_id: &str,
        allocations: &[NewProductionAllocation],
        actor: &str,
    ) -> EngineResult<Vec<ProductionAllocation>> {
        let enforce_cap = self.config.allocation_enforce_cap()?;
        let now = local_now();

        let (schedule_id, rows, total) = self.store.write(|tx| -> EngineResult<(String, Vec<ProductionAllocation>, f64)> {
            let item = production_item_repo::load(tx, item_id)?;

            let mut v = FieldValidator::new();
            v.check(!allocations.is_empty(), "allocations: 分配列表不能为空");
            for (idx, alloc) in allocations.iter().enumerate() {
                let field = format!("allocations[{}]", idx);
                if v.require(&format!("{}.demand_line_id", field), &alloc.demand_line_id) {
                    let demand_line_id = alloc.demand_line_id.trim();
                    v.check(
                        reference_repo::demand_line_exists(tx, demand_line_id)?,
                        format!("{}.demand_line_id: 需求行{}不存在", field, demand_line_id),
                    );
                }
                v.positive(&format!("{}.allocated_quantity", field), alloc.allocated_quantity);
            }
            v.finish()?;

            let total: f64 = allocations.iter().map(|a| a.allocated_quantity).sum();
            if enforce_cap && total > item.scheduled_quantity + QTY_EPSILON {
                return Err(EngineError::QuantityExceedsPlan {
                    item_id: item.item_id.clone(),
                    scheduled: item.scheduled_quantity,
                    completed: item.completed_quantity,
                    requested: total,
                    overflow: total - item.scheduled_quantity,
                });
            }

            let rows: Vec<ProductionAllocation> = allocations
                .iter()
                .map(|a| ProductionAllocation {
                    allocation_id: uuid::Uuid::new_v4().to_string(),
                    item_id: item.item_id.clone(),
                    demand_line_id: a.demand_line_id.trim().to_string(),
                    allocated_quantity: a.allocated_quantity,
                    created_at: now,
                })
                .collect();
            production_allocation_repo::replace_for_item(tx, item_id, &rows)?;

            let log = ActionLog::new(ActionType::ReplaceAllocations, actor, now)
                .with_schedule(&item.schedule_id)
                .with_item(item_id)
                .with_payload(json!({
                    "allocations": rows
                        .iter()
                        .map(|r| json!({ "demand_line_id": r.demand_line_id, "quantity": r.allocated_quantity }))
                        .collect::<Vec<_>>(),
                    "total_allocated": total,
                    "scheduled_quantity": item.scheduled_quantity,
                }));
            action_log_repo::insert(tx, &log)?;

            Ok((item.schedule_id, rows, total))
        })?;

        tracing::info!(item_id, count = rows.len(), total_allocated = total, "需求分配已替换");
        self.events.publish_after_commit(ProductionEvent::for_item(
            ProductionEventType::AllocationsReplaced,
            &schedule_id,
            item_id,
            Some(total),
            now,
        ));

        Ok(rows)
    }

    /// 生产项分配合计
    pub fn total_allocated(&self, item_id: &str) -> EngineResult<f64> {
        Ok(self.allocation_repo.total_by_item(item_id)?)
    }

    pub fn find_by_item(&self, item_id: &str) -> EngineResult<Vec<ProductionAllocation>> {
        Ok(self.allocation_repo.find_by_item(item_id)?)
    }

    /// 需求行的全部流入供给（排程日期由近及远）
    pub fn find_by_demand_line(&self, demand_line_id: &str) -> EngineResult<Vec<DemandSupplyView>> {
        Ok(self.allocation_repo.find_by_demand_line(demand_line_id)?)
    }
}
