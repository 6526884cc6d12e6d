// ==========================================
// 生产排程系统 - 排程单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 带 `conn: &Connection` 参数的自由函数可在事务内复用
//       （`&Transaction` 自动解引用为 `&Connection`）
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::schedule::Schedule;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{fmt_date, fmt_ts, get_date, get_ts};

const SELECT_COLUMNS: &str = r#"SELECT schedule_id, schedule_code, schedule_date, source_doc_type,
       source_doc_id, customer_id, remarks, created_by, created_at, updated_at
  FROM schedule"#;

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        schedule_id: row.get(0)?,
        schedule_code: row.get(1)?,
        schedule_date: get_date(row, 2)?,
        source_doc_type: row.get(3)?,
        source_doc_id: row.get(4)?,
        customer_id: row.get(5)?,
        remarks: row.get(6)?,
        created_by: row.get(7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

// ==========================================
// 事务内函数
// ==========================================

/// 插入排程单
pub fn insert(conn: &Connection, schedule: &Schedule) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT INTO schedule (
            schedule_id, schedule_code, schedule_date, source_doc_type, source_doc_id,
            customer_id, remarks, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &schedule.schedule_id,
            &schedule.schedule_code,
            fmt_date(&schedule.schedule_date),
            &schedule.source_doc_type,
            &schedule.source_doc_id,
            &schedule.customer_id,
            &schedule.remarks,
            &schedule.created_by,
            fmt_ts(&schedule.created_at),
            fmt_ts(&schedule.updated_at),
        ],
    )?;
    Ok(())
}

/// 按ID查询
pub fn select_by_id(conn: &Connection, schedule_id: &str) -> RepositoryResult<Option<Schedule>> {
    let sql = format!("{} WHERE schedule_id = ?", SELECT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![schedule_id], map_row)
        .optional()?)
}

/// 按ID查询，不存在返回 NotFound
pub fn load(conn: &Connection, schedule_id: &str) -> RepositoryResult<Schedule> {
    select_by_id(conn, schedule_id)?
        .ok_or_else(|| RepositoryError::not_found("Schedule", schedule_id))
}

/// 排程单号是否已存在
pub fn code_exists(conn: &Connection, schedule_code: &str) -> RepositoryResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM schedule WHERE schedule_code = ? LIMIT 1",
            params![schedule_code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// 更新表头（日期、备注）
pub fn update_header(
    conn: &Connection,
    schedule_id: &str,
    schedule_date: NaiveDate,
    remarks: Option<&str>,
    updated_at: NaiveDateTime,
) -> RepositoryResult<()> {
    let rows = conn.execute(
        "UPDATE schedule SET schedule_date = ?, remarks = ?, updated_at = ? WHERE schedule_id = ?",
        params![fmt_date(&schedule_date), remarks, fmt_ts(&updated_at), schedule_id],
    )?;
    if rows == 0 {
        return Err(RepositoryError::not_found("Schedule", schedule_id));
    }
    Ok(())
}

/// 删除排程单（生产项、用料明细、分配级联删除）
pub fn delete(conn: &Connection, schedule_id: &str) -> RepositoryResult<usize> {
    Ok(conn.execute("DELETE FROM schedule WHERE schedule_id = ?", params![schedule_id])?)
}

// ==========================================
// ScheduleRepository - 排程单仓储
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    /// 创建新的ScheduleRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按schedule_id查询
    pub fn find_by_id(&self, schedule_id: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;
        select_by_id(&conn, schedule_id)
    }

    /// 按排程单号查询
    pub fn find_by_code(&self, schedule_code: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE schedule_code = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![schedule_code], map_row)
            .optional()?)
    }

    /// 按来源单据查询（如某销售订单生成的全部排程单）
    pub fn find_by_source(
        &self,
        source_doc_type: &str,
        source_doc_id: &str,
    ) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE source_doc_type = ? AND source_doc_id = ? ORDER BY schedule_date DESC, created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let schedules = stmt
            .query_map(params![source_doc_type, source_doc_id], map_row)?
            .collect::<Result<Vec<Schedule>, _>>()?;
        Ok(schedules)
    }

    /// 按排程日期区间查询（闭区间），按日期降序
    pub fn list_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE schedule_date BETWEEN ? AND ? ORDER BY schedule_date DESC, created_at DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let schedules = stmt
            .query_map(params![fmt_date(&from), fmt_date(&to)], map_row)?
            .collect::<Result<Vec<Schedule>, _>>()?;
        Ok(schedules)
    }

    /// 查询所有排程单
    pub fn list_all(&self) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY schedule_date DESC, created_at DESC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let schedules = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<Schedule>, _>>()?;
        Ok(schedules)
    }
}
