// ==========================================
// 生产排程系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 单行数据问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// 文件行号（表头为第1行）
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "行 {} 字段 {}: {}", self.row, self.field, self.message)
    }
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    #[error("文件没有数据行")]
    EmptyFile,

    // ===== 数据质量错误 =====
    #[error("{} 处数据有误", .0.len())]
    RowErrors(Vec<RowError>),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            ImportError::FileReadError(err.to_string())
        } else {
            ImportError::CsvParseError(err.to_string())
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl ImportError {
    /// 面向操作员的全部消息
    pub fn messages(&self) -> Vec<String> {
        match self {
            ImportError::RowErrors(rows) => rows.iter().map(|r| r.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
