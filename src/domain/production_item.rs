// ==========================================
// 生产排程系统 - 生产项领域模型与状态机
// ==========================================
// 状态: PENDING → IN_PROGRESS → COMPLETED（单向）
// 不变量:
// - 0 <= completed_quantity <= scheduled_quantity
// - status == COMPLETED 当且仅当 completed_quantity >= scheduled_quantity
// - status == PENDING 蕴含 completed_quantity == 0
// ==========================================
// 红线: 本文件只做纯计算，不访问存储
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::types::{ProductionStatus, QTY_EPSILON};

// ==========================================
// ProductionItem - 生产项
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionItem {
    pub item_id: String,                       // 生产项ID
    pub schedule_id: String,                   // 所属排程单
    pub product_id: String,                    // 成品
    pub scheduled_quantity: f64,               // 计划数量 (> 0)
    pub completed_quantity: f64,               // 已完工数量
    pub status: ProductionStatus,              // 状态
    pub priority: i32,                         // 优先级（排序提示）
    pub demand_line_id: Option<String>,        // 关联需求行（如销售订单行）
    pub warehouse_id: Option<String>,          // 成品入库仓库
    pub location: Option<String>,              // 成品入库库位
    pub actual_start_at: Option<NaiveDateTime>, // 实际开工时间
    pub actual_end_at: Option<NaiveDateTime>,   // 实际完工时间
    pub revision: i32,                         // 乐观锁：修订号
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// 批量创建生产项的输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProductionItem {
    pub product_id: String,
    pub scheduled_quantity: f64,
    pub priority: i32,
    pub demand_line_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub location: Option<String>,
}

// ==========================================
// 状态机规则违反
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemRuleViolation {
    #[error("无效的状态转换: from={from} to={to}")]
    IllegalTransition {
        from: ProductionStatus,
        to: ProductionStatus,
    },

    #[error("数量必须大于0: {0}")]
    NonPositiveQuantity(f64),

    #[error("数量不能为负: {0}")]
    NegativeQuantity(f64),

    #[error("超出计划数量: 计划={scheduled}, 已完工={completed}, 本次={requested}, 超出={overflow}")]
    ExceedsPlan {
        scheduled: f64,
        completed: f64,
        requested: f64,
        overflow: f64,
    },
}

/// 一次数量推进后的状态变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressChange {
    pub previous_status: ProductionStatus,
    pub new_status: ProductionStatus,
    pub previous_completed: f64,
    pub new_completed: f64,
}

impl ProgressChange {
    /// 本次推进是否使生产项完工
    pub fn reached_plan(&self) -> bool {
        self.previous_status != ProductionStatus::Completed
            && self.new_status == ProductionStatus::Completed
    }
}

impl ProductionItem {
    /// 剩余未完工数量
    pub fn remaining_quantity(&self) -> f64 {
        (self.scheduled_quantity - self.completed_quantity).max(0.0)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProductionStatus::Pending
    }

    /// 是否已有任何进展（开工或完工数量大于0）
    pub fn has_progressed(&self) -> bool {
        self.status != ProductionStatus::Pending || self.completed_quantity > QTY_EPSILON
    }

    /// 开工
    ///
    /// # 规则
    /// - 仅 PENDING 可开工
    /// - 实际开工时间仅在未设置时写入
    pub fn start(&mut self, now: NaiveDateTime) -> Result<ProgressChange, ItemRuleViolation> {
        if self.status != ProductionStatus::Pending {
            return Err(ItemRuleViolation::IllegalTransition {
                from: self.status,
                to: ProductionStatus::InProgress,
            });
        }

        let previous_status = self.status;
        self.status = ProductionStatus::InProgress;
        if self.actual_start_at.is_none() {
            self.actual_start_at = Some(now);
        }
        self.updated_at = now;

        Ok(ProgressChange {
            previous_status,
            new_status: self.status,
            previous_completed: self.completed_quantity,
            new_completed: self.completed_quantity,
        })
    }

    /// 校验一次完工登记（不修改自身）
    ///
    /// # 参数
    /// - `quantity`: 本次完工数量
    /// - `recorded_sum`: 已有完工记录数量合计
    ///
    /// 已完工基数取 `max(completed_quantity, recorded_sum)`：人工改写已完工数量后
    /// 两者可能不一致，取较大者保证两种口径都不超计划。
    pub fn check_completion(
        &self,
        quantity: f64,
        recorded_sum: f64,
    ) -> Result<(), ItemRuleViolation> {
        if self.status == ProductionStatus::Completed {
            return Err(ItemRuleViolation::IllegalTransition {
                from: self.status,
                to: ProductionStatus::Completed,
            });
        }
        if !(quantity > 0.0) {
            return Err(ItemRuleViolation::NonPositiveQuantity(quantity));
        }

        let base = self.completed_quantity.max(recorded_sum);
        let total = base + quantity;
        if total > self.scheduled_quantity + QTY_EPSILON {
            return Err(ItemRuleViolation::ExceedsPlan {
                scheduled: self.scheduled_quantity,
                completed: base,
                requested: quantity,
                overflow: total - self.scheduled_quantity,
            });
        }

        Ok(())
    }

    /// 登记完工
    ///
    /// # 规则
    /// - 达到计划数量 → COMPLETED，写入实际完工时间
    /// - 首次完工且仍为 PENDING → IN_PROGRESS，写入实际开工时间
    pub fn apply_completion(
        &mut self,
        quantity: f64,
        recorded_sum: f64,
        now: NaiveDateTime,
    ) -> Result<ProgressChange, ItemRuleViolation> {
        self.check_completion(quantity, recorded_sum)?;

        let previous_status = self.status;
        let previous_completed = self.completed_quantity;

        let mut new_completed = self.completed_quantity + quantity;
        if new_completed > self.scheduled_quantity {
            // 容差内的浮点误差收敛到计划数量
            new_completed = self.scheduled_quantity;
        }
        self.completed_quantity = new_completed;

        if self.completed_quantity + QTY_EPSILON >= self.scheduled_quantity {
            self.completed_quantity = self.scheduled_quantity;
            self.status = ProductionStatus::Completed;
            if self.actual_start_at.is_none() {
                self.actual_start_at = Some(now);
            }
            self.actual_end_at = Some(now);
        } else if self.status == ProductionStatus::Pending {
            self.status = ProductionStatus::InProgress;
            if self.actual_start_at.is_none() {
                self.actual_start_at = Some(now);
            }
        }
        self.updated_at = now;

        Ok(ProgressChange {
            previous_status,
            new_status: self.status,
            previous_completed,
            new_completed: self.completed_quantity,
        })
    }

    /// 人工改写已完工数量（不生成完工记录、不动库存）
    ///
    /// # 参数
    /// - `quantity`: 新的已完工数量
    /// - `has_completion_events`: 是否存在完工记录
    ///
    /// # 规则
    /// - 与完工登记相同的阈值规则重新计算状态
    /// - 改为0时: 无完工记录且未开工 → PENDING，否则保持 IN_PROGRESS
    pub fn override_completed_quantity(
        &mut self,
        quantity: f64,
        has_completion_events: bool,
        now: NaiveDateTime,
    ) -> Result<ProgressChange, ItemRuleViolation> {
        if quantity < 0.0 || quantity.is_nan() {
            return Err(ItemRuleViolation::NegativeQuantity(quantity));
        }
        if quantity > self.scheduled_quantity + QTY_EPSILON {
            return Err(ItemRuleViolation::ExceedsPlan {
                scheduled: self.scheduled_quantity,
                completed: self.completed_quantity,
                requested: quantity,
                overflow: quantity - self.scheduled_quantity,
            });
        }

        let previous_status = self.status;
        let previous_completed = self.completed_quantity;

        self.completed_quantity = quantity.min(self.scheduled_quantity);

        if self.completed_quantity + QTY_EPSILON >= self.scheduled_quantity {
            self.completed_quantity = self.scheduled_quantity;
            self.status = ProductionStatus::Completed;
            if self.actual_start_at.is_none() {
                self.actual_start_at = Some(now);
            }
            if self.actual_end_at.is_none() || previous_status != ProductionStatus::Completed {
                self.actual_end_at = Some(now);
            }
        } else if self.completed_quantity > QTY_EPSILON {
            self.status = ProductionStatus::InProgress;
            if self.actual_start_at.is_none() {
                self.actual_start_at = Some(now);
            }
            self.actual_end_at = None;
        } else if has_completion_events || self.actual_start_at.is_some() {
            self.completed_quantity = 0.0;
            self.status = ProductionStatus::InProgress;
            self.actual_end_at = None;
        } else {
            self.completed_quantity = 0.0;
            self.status = ProductionStatus::Pending;
            self.actual_end_at = None;
        }
        self.updated_at = now;

        Ok(ProgressChange {
            previous_status,
            new_status: self.status,
            previous_completed,
            new_completed: self.completed_quantity,
        })
    }
}
