// ==========================================
// 生产排程系统 - 库存事务数据仓储
// ==========================================
// 说明: inventory_transaction 属于库存协作方；核心只追加 RESERVE / RELEASE / RECEIPT 记录
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::repository::error::RepositoryResult;
use crate::repository::sql_codec::{fmt_ts, get_ts};

pub const TXN_TYPE_RESERVE: &str = "RESERVE";
pub const TXN_TYPE_RECEIPT: &str = "RECEIPT";
/// 冲销 RESERVE（生产项删除时写入）
pub const TXN_TYPE_RELEASE: &str = "RELEASE";

pub const REF_TYPE_PRODUCTION_ITEM: &str = "PRODUCTION_ITEM";
pub const REF_TYPE_PRODUCTION_COMPLETION: &str = "PRODUCTION_COMPLETION";

/// 库存事务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransactionEntity {
    pub txn_id: String,
    pub txn_type: String,
    pub product_id: String,
    pub quantity: f64,
    pub warehouse_id: Option<String>,
    pub location: Option<String>,
    pub ref_type: String,
    pub ref_id: String,
    pub created_at: NaiveDateTime,
}

pub fn insert(conn: &Connection, txn: &InventoryTransactionEntity) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT INTO inventory_transaction (
                txn_id, txn_type, product_id, quantity, warehouse_id, location,
                ref_type, ref_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &txn.txn_id,
            &txn.txn_type,
            &txn.product_id,
            txn.quantity,
            &txn.warehouse_id,
            &txn.location,
            &txn.ref_type,
            &txn.ref_id,
            fmt_ts(&txn.created_at),
        ],
    )?;
    Ok(())
}

/// 按来源单据查询
pub fn select_by_ref(
    conn: &Connection,
    ref_type: &str,
    ref_id: &str,
) -> RepositoryResult<Vec<InventoryTransactionEntity>> {
    let mut stmt = conn.prepare(
        r#"SELECT txn_id, txn_type, product_id, quantity, warehouse_id, location,
                  ref_type, ref_id, created_at
             FROM inventory_transaction
            WHERE ref_type = ? AND ref_id = ?
            ORDER BY created_at, rowid"#,
    )?;
    let txns = stmt
        .query_map(params![ref_type, ref_id], |row| {
            Ok(InventoryTransactionEntity {
                txn_id: row.get(0)?,
                txn_type: row.get(1)?,
                product_id: row.get(2)?,
                quantity: row.get(3)?,
                warehouse_id: row.get(4)?,
                location: row.get(5)?,
                ref_type: row.get(6)?,
                ref_id: row.get(7)?,
                created_at: get_ts(row, 8)?,
            })
        })?
        .collect::<Result<Vec<InventoryTransactionEntity>, _>>()?;
    Ok(txns)
}

/// 按来源单据与事务类型统计
pub fn count_by_ref_and_type(
    conn: &Connection,
    ref_type: &str,
    ref_id: &str,
    txn_type: &str,
) -> RepositoryResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM inventory_transaction WHERE ref_type = ? AND ref_id = ? AND txn_type = ?",
        params![ref_type, ref_id, txn_type],
        |row| row.get(0),
    )?;
    Ok(count)
}
