// ==========================================
// 生产排程系统 - 用料明细（BOM 展开）
// ==========================================
// 职责: 存储/提供生产项的组件需求行
// 语义: 整组替换（先删后插，同一事务）；不提供逐行编辑
// 展开: required = scheduled_quantity × quantity_per，total_cost = unit_cost × required
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production_detail::{NewProductionDetail, ProductionDetail};
use crate::domain::production_item::ProductionItem;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, ProductionEvent, ProductionEventType};
use crate::engine::local_now;
use crate::engine::validation::FieldValidator;
use crate::repository::store::ScheduleStore;
use crate::repository::{
    action_log_repo, production_detail_repo, production_item_repo, reference_repo,
    ProductionDetailRepository,
};

// ==========================================
// DetailExplosion - 用料明细
// ==========================================
pub struct DetailExplosion {
    store: ScheduleStore,
    detail_repo: Arc<ProductionDetailRepository>,
    events: OptionalEventPublisher,
}

impl DetailExplosion {
    pub fn new(
        store: ScheduleStore,
        detail_repo: Arc<ProductionDetailRepository>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            store,
            detail_repo,
            events,
        }
    }

    /// 整组替换生产项的用料明细
    ///
    /// # 规则
    /// - 生产项必须存在；明细列表不能为空（清空请用 delete_all）
    /// - 每条: 组件物料必填且存在，需求数量 > 0，成本（如有）>= 0
    #[instrument(skip(self, details), fields(item_id = %item_id, count = details.len()))]
    pub fn replace_details(
        &self,
        item_id: &str,
        details: &[NewProductionDetail],
        actor: &str,
    ) -> EngineResult<Vec<ProductionDetail>> {
        let now = local_now();
        let (item, rows) = self.store.write(|tx| -> EngineResult<(ProductionItem, Vec<ProductionDetail>)> {
            let item = production_item_repo::load(tx, item_id)?;
            let rows = replace_in_tx(tx, &item, details, actor, now, "manual")?;
            Ok((item, rows))
        })?;

        tracing::info!(item_id, count = rows.len(), "用料明细已替换");
        self.publish_replaced(&item, rows.len(), now);
        Ok(rows)
    }

    /// 按成品 BOM 展开并整组替换用料明细
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub fn explode_from_composition(
        &self,
        item_id: &str,
        actor: &str,
    ) -> EngineResult<Vec<ProductionDetail>> {
        let now = local_now();
        let (item, rows) = self.store.write(|tx| -> EngineResult<(ProductionItem, Vec<ProductionDetail>)> {
            let item = production_item_repo::load(tx, item_id)?;
            let lines = reference_repo::select_composition_lines(tx, &item.product_id)?;
            if lines.is_empty() {
                return Err(EngineError::validation(format!(
                    "product_id: 成品{}没有 BOM 组成行",
                    item.product_id
                )));
            }

            let details: Vec<NewProductionDetail> = lines
                .iter()
                .map(|line| line.explode(item.scheduled_quantity))
                .collect();
            let rows = replace_in_tx(tx, &item, &details, actor, now, "composition")?;
            Ok((item, rows))
        })?;

        tracing::info!(
            item_id,
            product_id = %item.product_id,
            count = rows.len(),
            "BOM 已展开为用料明细"
        );
        self.publish_replaced(&item, rows.len(), now);
        Ok(rows)
    }

    /// 删除生产项的全部用料明细（重新计算前使用）
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub fn delete_all(&self, item_id: &str, actor: &str) -> EngineResult<usize> {
        let now = local_now();
        let (item, removed) = self.store.write(|tx| -> EngineResult<(ProductionItem, usize)> {
            let item = production_item_repo::load(tx, item_id)?;
            let removed = production_detail_repo::delete_for_item(tx, item_id)?;

            let log = ActionLog::new(ActionType::DeleteDetails, actor, now)
                .with_schedule(&item.schedule_id)
                .with_item(item_id)
                .with_payload(json!({ "removed": removed }));
            action_log_repo::insert(tx, &log)?;
            Ok((item, removed))
        })?;

        tracing::info!(item_id, removed, "用料明细已清空");
        self.publish_replaced(&item, 0, now);
        Ok(removed)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_item(&self, item_id: &str) -> EngineResult<Vec<ProductionDetail>> {
        Ok(self.detail_repo.find_by_item(item_id)?)
    }

    /// 哪些生产依赖该组件
    pub fn find_by_component(&self, component_product_id: &str) -> EngineResult<Vec<ProductionDetail>> {
        Ok(self.detail_repo.find_by_component(component_product_id)?)
    }

    pub fn find_by_warehouse(&self, warehouse_id: &str) -> EngineResult<Vec<ProductionDetail>> {
        Ok(self.detail_repo.find_by_warehouse(warehouse_id)?)
    }

    fn publish_replaced(&self, item: &ProductionItem, count: usize, now: NaiveDateTime) {
        self.events.publish_after_commit(ProductionEvent::for_item(
            ProductionEventType::DetailsReplaced,
            &item.schedule_id,
            &item.item_id,
            Some(count as f64),
            now,
        ));
    }
}

/// 校验并替换（调用方持有事务）
fn replace_in_tx(
    conn: &Connection,
    item: &ProductionItem,
    details: &[NewProductionDetail],
    actor: &str,
    now: NaiveDateTime,
    source: &str,
) -> EngineResult<Vec<ProductionDetail>> {
    validate_details(conn, details)?;

    let rows: Vec<ProductionDetail> = details
        .iter()
        .enumerate()
        .map(|(idx, d)| ProductionDetail {
            detail_id: uuid::Uuid::new_v4().to_string(),
            item_id: item.item_id.clone(),
            seq_no: idx as i32 + 1,
            component_product_id: d.component_product_id.trim().to_string(),
            required_quantity: d.required_quantity,
            composition_line_id: d.composition_line_id.clone(),
            warehouse_id: d.warehouse_id.clone(),
            unit_cost: d.unit_cost,
            total_cost: d.resolved_total_cost(),
        })
        .collect();
    production_detail_repo::replace_for_item(conn, &item.item_id, &rows)?;

    let log = ActionLog::new(ActionType::ReplaceDetails, actor, now)
        .with_schedule(&item.schedule_id)
        .with_item(&item.item_id)
        .with_payload(json!({
            "source": source,
            "count": rows.len(),
            "components": rows
                .iter()
                .map(|r| json!({ "component_product_id": r.component_product_id, "required_quantity": r.required_quantity }))
                .collect::<Vec<_>>(),
        }));
    action_log_repo::insert(conn, &log)?;

    Ok(rows)
}

fn validate_details(conn: &Connection, details: &[NewProductionDetail]) -> EngineResult<()> {
    let mut v = FieldValidator::new();
    v.check(!details.is_empty(), "details: 明细列表不能为空");

    for (idx, detail) in details.iter().enumerate() {
        let field = format!("details[{}]", idx);
        if v.require(&format!("{}.component_product_id", field), &detail.component_product_id) {
            let component = detail.component_product_id.trim();
            v.check(
                reference_repo::product_exists(conn, component)?,
                format!("{}.component_product_id: 组件物料{}不存在", field, component),
            );
        }
        v.positive(&format!("{}.required_quantity", field), detail.required_quantity);
        v.non_negative(&format!("{}.unit_cost", field), detail.unit_cost);
        v.non_negative(&format!("{}.total_cost", field), detail.total_cost);
    }

    v.finish()
}
