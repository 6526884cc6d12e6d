// ==========================================
// 生产排程系统 - 生产用料明细（BOM 展开）
// ==========================================
// 生命周期依附于生产项：整组替换，不做逐行编辑
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ProductionDetail - 用料明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionDetail {
    pub detail_id: String,                   // 明细ID
    pub item_id: String,                     // 所属生产项
    pub seq_no: i32,                         // 行号（按提交顺序）
    pub component_product_id: String,        // 组件物料
    pub required_quantity: f64,              // 需求数量 (> 0)
    pub composition_line_id: Option<String>, // 来源 BOM 行
    pub warehouse_id: Option<String>,        // 领料仓库
    pub unit_cost: Option<f64>,              // 单位成本（预估/实际）
    pub total_cost: Option<f64>,             // 总成本
}

/// 替换用料明细的输入行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProductionDetail {
    pub component_product_id: String,
    pub required_quantity: f64,
    pub composition_line_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub unit_cost: Option<f64>,
    /// 为空且有单位成本时按 单位成本 × 需求数量 计算
    pub total_cost: Option<f64>,
}

impl NewProductionDetail {
    /// 计算总成本
    pub fn resolved_total_cost(&self) -> Option<f64> {
        self.total_cost
            .or_else(|| self.unit_cost.map(|c| c * self.required_quantity))
    }
}

// ==========================================
// CompositionLine - BOM 行（协作方数据）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionLine {
    pub composition_line_id: String,
    pub parent_product_id: String,
    pub component_product_id: String,
    pub quantity_per: f64, // 单位成品耗用量
    pub warehouse_id: Option<String>,
    pub unit_cost: Option<f64>,
}

impl CompositionLine {
    /// 按成品计划数量展开为用料明细
    pub fn explode(&self, scheduled_quantity: f64) -> NewProductionDetail {
        let required_quantity = scheduled_quantity * self.quantity_per;
        NewProductionDetail {
            component_product_id: self.component_product_id.clone(),
            required_quantity,
            composition_line_id: Some(self.composition_line_id.clone()),
            warehouse_id: self.warehouse_id.clone(),
            unit_cost: self.unit_cost,
            total_cost: self.unit_cost.map(|c| c * required_quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explode_scales_by_scheduled_quantity() {
        let line = CompositionLine {
            composition_line_id: "BOM1".to_string(),
            parent_product_id: "FG".to_string(),
            component_product_id: "RM".to_string(),
            quantity_per: 2.5,
            warehouse_id: Some("WH-RM".to_string()),
            unit_cost: Some(4.0),
        };

        let detail = line.explode(10.0);
        assert_eq!(detail.required_quantity, 25.0);
        assert_eq!(detail.total_cost, Some(100.0));
        assert_eq!(detail.composition_line_id.as_deref(), Some("BOM1"));
    }

    #[test]
    fn test_resolved_total_cost_prefers_explicit_value() {
        let detail = NewProductionDetail {
            component_product_id: "RM".to_string(),
            required_quantity: 3.0,
            unit_cost: Some(2.0),
            total_cost: Some(7.0),
            ..Default::default()
        };
        assert_eq!(detail.resolved_total_cost(), Some(7.0));

        let detail = NewProductionDetail {
            total_cost: None,
            ..detail
        };
        assert_eq!(detail.resolved_total_cost(), Some(6.0));
    }
}
