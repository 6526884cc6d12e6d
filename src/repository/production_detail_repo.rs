// ==========================================
// 生产排程系统 - 用料明细数据仓储
// ==========================================
// 红线: 明细只做整组替换，读者不可见“替换一半”的状态（调用方持有事务）
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::domain::production_detail::ProductionDetail;
use crate::repository::error::{RepositoryError, RepositoryResult};

const SELECT_COLUMNS: &str = r#"SELECT detail_id, item_id, seq_no, component_product_id, required_quantity,
       composition_line_id, warehouse_id, unit_cost, total_cost
  FROM production_detail"#;

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionDetail> {
    Ok(ProductionDetail {
        detail_id: row.get(0)?,
        item_id: row.get(1)?,
        seq_no: row.get(2)?,
        component_product_id: row.get(3)?,
        required_quantity: row.get(4)?,
        composition_line_id: row.get(5)?,
        warehouse_id: row.get(6)?,
        unit_cost: row.get(7)?,
        total_cost: row.get(8)?,
    })
}

fn query_details(
    conn: &Connection,
    where_clause: &str,
    key: &str,
) -> RepositoryResult<Vec<ProductionDetail>> {
    let sql = format!("{} {} ORDER BY item_id, seq_no", SELECT_COLUMNS, where_clause);
    let mut stmt = conn.prepare(&sql)?;
    let details = stmt
        .query_map(params![key], map_row)?
        .collect::<Result<Vec<ProductionDetail>, _>>()?;
    Ok(details)
}

// ==========================================
// 事务内函数
// ==========================================

/// 删除生产项的全部明细
pub fn delete_for_item(conn: &Connection, item_id: &str) -> RepositoryResult<usize> {
    Ok(conn.execute(
        "DELETE FROM production_detail WHERE item_id = ?",
        params![item_id],
    )?)
}

/// 整组替换：先删后插
pub fn replace_for_item(
    conn: &Connection,
    item_id: &str,
    details: &[ProductionDetail],
) -> RepositoryResult<usize> {
    delete_for_item(conn, item_id)?;

    let mut stmt = conn.prepare(
        r#"INSERT INTO production_detail (
                detail_id, item_id, seq_no, component_product_id, required_quantity,
                composition_line_id, warehouse_id, unit_cost, total_cost
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )?;

    for detail in details {
        stmt.execute(params![
            &detail.detail_id,
            item_id,
            detail.seq_no,
            &detail.component_product_id,
            detail.required_quantity,
            &detail.composition_line_id,
            &detail.warehouse_id,
            detail.unit_cost,
            detail.total_cost,
        ])?;
    }

    Ok(details.len())
}

/// 查询生产项的明细
pub fn select_by_item(conn: &Connection, item_id: &str) -> RepositoryResult<Vec<ProductionDetail>> {
    query_details(conn, "WHERE item_id = ?", item_id)
}

// ==========================================
// ProductionDetailRepository - 用料明细仓储
// ==========================================
pub struct ProductionDetailRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionDetailRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_item(&self, item_id: &str) -> RepositoryResult<Vec<ProductionDetail>> {
        let conn = self.get_conn()?;
        select_by_item(&conn, item_id)
    }

    /// 按组件物料查询（哪些生产依赖该组件）
    pub fn find_by_component(&self, component_product_id: &str) -> RepositoryResult<Vec<ProductionDetail>> {
        let conn = self.get_conn()?;
        query_details(&conn, "WHERE component_product_id = ?", component_product_id)
    }

    /// 按领料仓库查询
    pub fn find_by_warehouse(&self, warehouse_id: &str) -> RepositoryResult<Vec<ProductionDetail>> {
        let conn = self.get_conn()?;
        query_details(&conn, "WHERE warehouse_id = ?", warehouse_id)
    }
}
