// ==========================================
// 生产排程系统 - 生产项数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（状态推进在 domain::production_item）
// 并发: 进度更新带 revision 乐观锁检查
// ==========================================

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::production_item::ProductionItem;
use crate::domain::types::ProductionStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{fmt_date, fmt_ts, get_opt_ts, get_status, get_ts};

const SELECT_COLUMNS: &str = r#"SELECT pi.item_id, pi.schedule_id, pi.product_id, pi.scheduled_quantity,
       pi.completed_quantity, pi.status, pi.priority, pi.demand_line_id, pi.warehouse_id,
       pi.location, pi.actual_start_at, pi.actual_end_at, pi.revision, pi.created_at, pi.updated_at
  FROM production_item pi"#;

const DEFAULT_ORDER: &str = " ORDER BY pi.priority DESC, pi.created_at, pi.item_id";

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionItem> {
    Ok(ProductionItem {
        item_id: row.get(0)?,
        schedule_id: row.get(1)?,
        product_id: row.get(2)?,
        scheduled_quantity: row.get(3)?,
        completed_quantity: row.get(4)?,
        status: get_status(row, 5)?,
        priority: row.get(6)?,
        demand_line_id: row.get(7)?,
        warehouse_id: row.get(8)?,
        location: row.get(9)?,
        actual_start_at: get_opt_ts(row, 10)?,
        actual_end_at: get_opt_ts(row, 11)?,
        revision: row.get(12)?,
        created_at: get_ts(row, 13)?,
        updated_at: get_ts(row, 14)?,
    })
}

fn query_items(
    conn: &Connection,
    where_clause: &str,
    values: Vec<Value>,
) -> RepositoryResult<Vec<ProductionItem>> {
    let sql = format!("{} {}{}", SELECT_COLUMNS, where_clause, DEFAULT_ORDER);
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values), map_row)?
        .collect::<Result<Vec<ProductionItem>, _>>()?;
    Ok(items)
}

// ==========================================
// 事务内函数
// ==========================================

/// 批量插入生产项（调用方负责事务边界）
pub fn insert_batch(conn: &Connection, items: &[ProductionItem]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare(
        r#"INSERT INTO production_item (
                item_id, schedule_id, product_id, scheduled_quantity, completed_quantity,
                status, priority, demand_line_id, warehouse_id, location,
                actual_start_at, actual_end_at, revision, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )?;

    for item in items {
        stmt.execute(params![
            &item.item_id,
            &item.schedule_id,
            &item.product_id,
            item.scheduled_quantity,
            item.completed_quantity,
            item.status.to_db_str(),
            item.priority,
            &item.demand_line_id,
            &item.warehouse_id,
            &item.location,
            item.actual_start_at.as_ref().map(fmt_ts),
            item.actual_end_at.as_ref().map(fmt_ts),
            item.revision,
            fmt_ts(&item.created_at),
            fmt_ts(&item.updated_at),
        ])?;
    }

    Ok(items.len())
}

/// 按ID查询
pub fn select_by_id(conn: &Connection, item_id: &str) -> RepositoryResult<Option<ProductionItem>> {
    let sql = format!("{} WHERE pi.item_id = ?", SELECT_COLUMNS);
    Ok(conn.query_row(&sql, params![item_id], map_row).optional()?)
}

/// 按ID查询，不存在返回 NotFound
pub fn load(conn: &Connection, item_id: &str) -> RepositoryResult<ProductionItem> {
    select_by_id(conn, item_id)?.ok_or_else(|| RepositoryError::not_found("ProductionItem", item_id))
}

/// 查询排程单下的全部生产项
pub fn select_by_schedule(
    conn: &Connection,
    schedule_id: &str,
) -> RepositoryResult<Vec<ProductionItem>> {
    query_items(
        conn,
        "WHERE pi.schedule_id = ?1",
        vec![Value::from(schedule_id.to_string())],
    )
}

/// 写回进度字段（已完工数量、状态、开工/完工时间）
///
/// # 并发控制
/// `WHERE revision = ?` 不匹配时返回 OptimisticLockFailure；成功后 item.revision 自增
pub fn update_progress(conn: &Connection, item: &mut ProductionItem) -> RepositoryResult<()> {
    let rows = conn.execute(
        r#"UPDATE production_item
              SET completed_quantity = ?, status = ?, actual_start_at = ?, actual_end_at = ?,
                  updated_at = ?, revision = revision + 1
            WHERE item_id = ? AND revision = ?"#,
        params![
            item.completed_quantity,
            item.status.to_db_str(),
            item.actual_start_at.as_ref().map(fmt_ts),
            item.actual_end_at.as_ref().map(fmt_ts),
            fmt_ts(&item.updated_at),
            &item.item_id,
            item.revision,
        ],
    )?;

    if rows == 0 {
        let actual: Option<i32> = conn
            .query_row(
                "SELECT revision FROM production_item WHERE item_id = ?",
                params![&item.item_id],
                |row| row.get(0),
            )
            .optional()?;

        return Err(match actual {
            Some(actual) => RepositoryError::OptimisticLockFailure {
                item_id: item.item_id.clone(),
                expected: item.revision,
                actual,
            },
            None => RepositoryError::not_found("ProductionItem", &item.item_id),
        });
    }

    item.revision += 1;
    Ok(())
}

/// 删除生产项（用料明细、分配级联删除）
pub fn delete(conn: &Connection, item_id: &str) -> RepositoryResult<usize> {
    Ok(conn.execute("DELETE FROM production_item WHERE item_id = ?", params![item_id])?)
}

// ==========================================
// ProductionItemRepository - 生产项仓储
// ==========================================
pub struct ProductionItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionItemRepository {
    /// 创建新的ProductionItemRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, item_id: &str) -> RepositoryResult<Option<ProductionItem>> {
        let conn = self.get_conn()?;
        select_by_id(&conn, item_id)
    }

    /// 按排程单查询（优先级降序）
    pub fn find_by_schedule(&self, schedule_id: &str) -> RepositoryResult<Vec<ProductionItem>> {
        let conn = self.get_conn()?;
        select_by_schedule(&conn, schedule_id)
    }

    /// 按成品查询
    pub fn find_by_product(&self, product_id: &str) -> RepositoryResult<Vec<ProductionItem>> {
        let conn = self.get_conn()?;
        query_items(
            &conn,
            "WHERE pi.product_id = ?1",
            vec![Value::from(product_id.to_string())],
        )
    }

    /// 按关联需求行查询（生产项自身的 demand_line_id）
    pub fn find_by_demand_line(&self, demand_line_id: &str) -> RepositoryResult<Vec<ProductionItem>> {
        let conn = self.get_conn()?;
        query_items(
            &conn,
            "WHERE pi.demand_line_id = ?1",
            vec![Value::from(demand_line_id.to_string())],
        )
    }

    /// 按状态查询（可限定排程单）
    pub fn find_by_status(
        &self,
        status: ProductionStatus,
        schedule_id: Option<&str>,
    ) -> RepositoryResult<Vec<ProductionItem>> {
        let conn = self.get_conn()?;

        let mut where_clause = String::from("WHERE pi.status = ?1");
        let mut values = vec![Value::from(status.to_db_str().to_string())];
        if let Some(id) = schedule_id.map(str::trim).filter(|s| !s.is_empty()) {
            where_clause.push_str(" AND pi.schedule_id = ?2");
            values.push(Value::from(id.to_string()));
        }

        query_items(&conn, &where_clause, values)
    }

    /// 按排程日期区间查询（闭区间）
    pub fn find_by_schedule_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<ProductionItem>> {
        let conn = self.get_conn()?;
        query_items(
            &conn,
            "JOIN schedule s ON s.schedule_id = pi.schedule_id WHERE s.schedule_date BETWEEN ?1 AND ?2",
            vec![Value::from(fmt_date(&from)), Value::from(fmt_date(&to))],
        )
    }
}
