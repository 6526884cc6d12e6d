// ==========================================
// 生产排程系统 - 引擎层事件发布
// ==========================================
// 职责: 定义生产事件发布 trait，事务提交后通知下游系统
// 说明: 发布失败只记录告警，不回滚已提交的业务数据
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 生产事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionEventType {
    /// 生产项开工
    ItemStarted,
    /// 完工登记
    CompletionRecorded,
    /// 生产项完工（达到计划数量）
    ItemCompleted,
    /// 人工改写已完工数量
    CompletedQuantityOverridden,
    /// 需求分配替换
    AllocationsReplaced,
    /// 用料明细替换/清空
    DetailsReplaced,
    /// 排程单删除
    ScheduleDeleted,
    /// 单个生产项删除
    ItemDeleted,
}

impl ProductionEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            ProductionEventType::ItemStarted => "ItemStarted",
            ProductionEventType::CompletionRecorded => "CompletionRecorded",
            ProductionEventType::ItemCompleted => "ItemCompleted",
            ProductionEventType::CompletedQuantityOverridden => "CompletedQuantityOverridden",
            ProductionEventType::AllocationsReplaced => "AllocationsReplaced",
            ProductionEventType::DetailsReplaced => "DetailsReplaced",
            ProductionEventType::ScheduleDeleted => "ScheduleDeleted",
            ProductionEventType::ItemDeleted => "ItemDeleted",
        }
    }
}

/// 生产事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionEvent {
    pub event_type: ProductionEventType,
    pub schedule_id: Option<String>,
    pub item_id: Option<String>,
    /// 与事件相关的数量（完工数量、分配合计等）
    pub quantity: Option<f64>,
    pub occurred_at: NaiveDateTime,
}

impl ProductionEvent {
    /// 生产项级事件
    pub fn for_item(
        event_type: ProductionEventType,
        schedule_id: &str,
        item_id: &str,
        quantity: Option<f64>,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            event_type,
            schedule_id: Some(schedule_id.to_string()),
            item_id: Some(item_id.to_string()),
            quantity,
            occurred_at,
        }
    }

    /// 排程单级事件
    pub fn for_schedule(
        event_type: ProductionEventType,
        schedule_id: &str,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            event_type,
            schedule_id: Some(schedule_id.to_string()),
            item_id: None,
            quantity: None,
            occurred_at,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 生产事件发布者 Trait
///
/// # 返回
/// - `Ok(task_id)`: 下游任务 ID（如果支持）或空字符串
/// - `Err`: 发布失败
pub trait ProductionEventPublisher: Send + Sync {
    fn publish(&self, event: ProductionEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ProductionEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ProductionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, item_id={:?}",
            event.event_type.as_str(),
            event.item_id
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ProductionEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn ProductionEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn from_option(publisher: Option<Arc<dyn ProductionEventPublisher>>) -> Self {
        Self { inner: publisher }
    }

    /// 提交后发布；失败只告警
    pub fn publish_after_commit(&self, event: ProductionEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                event.event_type.as_str()
            );
            return;
        };

        let event_type = event.event_type;
        let item_id = event.item_id.clone();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(
                event_type = event_type.as_str(),
                item_id = ?item_id,
                error = %e,
                "生产事件发布失败（业务数据已提交）"
            );
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}
