// ==========================================
// 生产排程系统 - 需求分配数据仓储
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::domain::production_allocation::{DemandSupplyView, ProductionAllocation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{fmt_ts, get_date, get_ts};

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionAllocation> {
    Ok(ProductionAllocation {
        allocation_id: row.get(0)?,
        item_id: row.get(1)?,
        demand_line_id: row.get(2)?,
        allocated_quantity: row.get(3)?,
        created_at: get_ts(row, 4)?,
    })
}

// ==========================================
// 事务内函数
// ==========================================

/// 整组替换：删除生产项的全部分配后插入新集合
pub fn replace_for_item(
    conn: &Connection,
    item_id: &str,
    allocations: &[ProductionAllocation],
) -> RepositoryResult<usize> {
    conn.execute(
        "DELETE FROM production_allocation WHERE item_id = ?",
        params![item_id],
    )?;

    let mut stmt = conn.prepare(
        r#"INSERT INTO production_allocation (
                allocation_id, item_id, demand_line_id, allocated_quantity, created_at
            ) VALUES (?, ?, ?, ?, ?)"#,
    )?;

    for allocation in allocations {
        stmt.execute(params![
            &allocation.allocation_id,
            item_id,
            &allocation.demand_line_id,
            allocation.allocated_quantity,
            fmt_ts(&allocation.created_at),
        ])?;
    }

    Ok(allocations.len())
}

/// 查询生产项的分配
pub fn select_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<Vec<ProductionAllocation>> {
    let mut stmt = conn.prepare(
        r#"SELECT allocation_id, item_id, demand_line_id, allocated_quantity, created_at
             FROM production_allocation
            WHERE item_id = ?
            ORDER BY created_at, rowid"#,
    )?;
    let allocations = stmt
        .query_map(params![item_id], map_row)?
        .collect::<Result<Vec<ProductionAllocation>, _>>()?;
    Ok(allocations)
}

/// 生产项分配合计
pub fn sum_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(allocated_quantity), 0) FROM production_allocation WHERE item_id = ?",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// 生产项分配条数
pub fn count_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM production_allocation WHERE item_id = ?",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ==========================================
// ProductionAllocationRepository - 需求分配仓储
// ==========================================
pub struct ProductionAllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionAllocationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_item(&self, item_id: &str) -> RepositoryResult<Vec<ProductionAllocation>> {
        let conn = self.get_conn()?;
        select_by_item(&conn, item_id)
    }

    pub fn total_by_item(&self, item_id: &str) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        sum_by_item(&conn, item_id)
    }

    /// 按需求行查询流入供给（按排程日期由近及远）
    pub fn find_by_demand_line(&self, demand_line_id: &str) -> RepositoryResult<Vec<DemandSupplyView>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT pa.allocation_id, pa.item_id, pa.demand_line_id, pa.allocated_quantity,
                      pa.created_at, s.schedule_id, s.schedule_code, s.schedule_date, pi.product_id
                 FROM production_allocation pa
                 JOIN production_item pi ON pi.item_id = pa.item_id
                 JOIN schedule s ON s.schedule_id = pi.schedule_id
                WHERE pa.demand_line_id = ?
                ORDER BY s.schedule_date DESC, s.created_at DESC, pa.created_at DESC"#,
        )?;

        let views = stmt
            .query_map(params![demand_line_id], |row| {
                Ok(DemandSupplyView {
                    allocation: map_row(row)?,
                    schedule_id: row.get(5)?,
                    schedule_code: row.get(6)?,
                    schedule_date: get_date(row, 7)?,
                    product_id: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<DemandSupplyView>, _>>()?;
        Ok(views)
    }
}
