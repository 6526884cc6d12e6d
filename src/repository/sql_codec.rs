// ==========================================
// 生产排程系统 - 行映射辅助函数
// ==========================================
// 时间统一存储为文本: 日期 %Y-%m-%d，时间戳 %Y-%m-%d %H:%M:%S
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;

use crate::domain::types::ProductionStatus;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FMT).to_string()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(raw.trim(), TS_FMT).map_err(|e| conversion_error(idx, e))
}

pub fn get_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDateTime::parse_from_str(s.trim(), TS_FMT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FMT).map_err(|e| conversion_error(idx, e))
}

#[derive(Debug)]
struct UnknownStatus(String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "未知的生产项状态: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

pub fn get_status(row: &Row, idx: usize) -> rusqlite::Result<ProductionStatus> {
    let raw: String = row.get(idx)?;
    ProductionStatus::parse(&raw).ok_or_else(|| conversion_error(idx, UnknownStatus(raw)))
}
