// ==========================================
// 生产排程系统 - 字段校验器
// ==========================================
// 规则: 收集全部违规信息，不在第一条失败处中断
// ==========================================

use crate::engine::error::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct FieldValidator {
    messages: Vec<String>,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 必填引用（去空白后非空）
    pub fn require(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.messages.push(format!("{}: 不能为空", field));
            return false;
        }
        true
    }

    /// 数量 > 0
    pub fn positive(&mut self, field: &str, value: f64) -> bool {
        if !(value > 0.0) || !value.is_finite() {
            self.messages.push(format!("{}: 必须大于0 (实际 {})", field, value));
            return false;
        }
        true
    }

    /// 可选金额 >= 0
    pub fn non_negative(&mut self, field: &str, value: Option<f64>) -> bool {
        match value {
            Some(v) if !(v >= 0.0) || !v.is_finite() => {
                self.messages.push(format!("{}: 不能为负 (实际 {})", field, v));
                false
            }
            _ => true,
        }
    }

    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.messages.push(message.into());
        }
        condition
    }

    pub fn is_valid(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn finish(self) -> EngineResult<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ValidationFailed(self.messages))
        }
    }
}
