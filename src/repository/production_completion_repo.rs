// ==========================================
// 生产排程系统 - 完工记录数据仓储
// ==========================================
// 红线: 只追加（本仓储不提供更新/删除）
// 顺序: 同一生产项按 seq_no 递增，seq_no 在写事务内分配
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, ToSql};
use std::sync::{Arc, Mutex};

use crate::domain::production_completion::ProductionCompletion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{fmt_ts, get_ts};

const SELECT_COLUMNS: &str = r#"SELECT completion_id, item_id, seq_no, quantity, completed_at, warehouse_id,
       location, batch_no, inventory_txn_id, created_by, created_at
  FROM production_completion"#;

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionCompletion> {
    Ok(ProductionCompletion {
        completion_id: row.get(0)?,
        item_id: row.get(1)?,
        seq_no: row.get(2)?,
        quantity: row.get(3)?,
        completed_at: get_ts(row, 4)?,
        warehouse_id: row.get(5)?,
        location: row.get(6)?,
        batch_no: row.get(7)?,
        inventory_txn_id: row.get(8)?,
        created_by: row.get(9)?,
        created_at: get_ts(row, 10)?,
    })
}

fn query_completions(
    conn: &Connection,
    where_clause: &str,
    args: &[&dyn ToSql],
) -> RepositoryResult<Vec<ProductionCompletion>> {
    let sql = format!(
        "{} {} ORDER BY completed_at, item_id, seq_no",
        SELECT_COLUMNS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let completions = stmt
        .query_map(args, map_row)?
        .collect::<Result<Vec<ProductionCompletion>, _>>()?;
    Ok(completions)
}

// ==========================================
// 事务内函数
// ==========================================

/// 追加完工记录
pub fn insert(conn: &Connection, completion: &ProductionCompletion) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT INTO production_completion (
                completion_id, item_id, seq_no, quantity, completed_at, warehouse_id,
                location, batch_no, inventory_txn_id, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &completion.completion_id,
            &completion.item_id,
            completion.seq_no,
            completion.quantity,
            fmt_ts(&completion.completed_at),
            &completion.warehouse_id,
            &completion.location,
            &completion.batch_no,
            &completion.inventory_txn_id,
            &completion.created_by,
            fmt_ts(&completion.created_at),
        ],
    )?;
    Ok(())
}

/// 下一个提交序号
pub fn next_seq_no(conn: &Connection, item_id: &str) -> RepositoryResult<i32> {
    let max: Option<i32> = conn.query_row(
        "SELECT MAX(seq_no) FROM production_completion WHERE item_id = ?",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

/// 生产项完工记录数量合计
pub fn sum_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(quantity), 0) FROM production_completion WHERE item_id = ?",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// 生产项完工记录条数
pub fn count_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM production_completion WHERE item_id = ?",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// 查询生产项的完工记录（按提交顺序）
pub fn select_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<Vec<ProductionCompletion>> {
    let sql = format!("{} WHERE item_id = ? ORDER BY seq_no", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let completions = stmt
        .query_map(params![item_id], map_row)?
        .collect::<Result<Vec<ProductionCompletion>, _>>()?;
    Ok(completions)
}

// ==========================================
// ProductionCompletionRepository - 完工记录仓储
// ==========================================
pub struct ProductionCompletionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionCompletionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_item(&self, item_id: &str) -> RepositoryResult<Vec<ProductionCompletion>> {
        let conn = self.get_conn()?;
        select_by_item(&conn, item_id)
    }

    pub fn total_by_item(&self, item_id: &str) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        sum_by_item(&conn, item_id)
    }

    /// 按完工时间区间查询（闭区间）
    pub fn find_by_date_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Vec<ProductionCompletion>> {
        let conn = self.get_conn()?;
        let (from, to) = (fmt_ts(&from), fmt_ts(&to));
        query_completions(&conn, "WHERE completed_at BETWEEN ? AND ?", &[&from, &to])
    }

    /// 按入库仓库查询
    pub fn find_by_warehouse(&self, warehouse_id: &str) -> RepositoryResult<Vec<ProductionCompletion>> {
        let conn = self.get_conn()?;
        query_completions(&conn, "WHERE warehouse_id = ?", &[&warehouse_id])
    }
}
