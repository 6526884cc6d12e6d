// ==========================================
// 生产排程系统 - 库存协作接口
// ==========================================
// 职责: 开工预留组件、删除时释放预留、完工入库成品
// 一致性: 接口接收调用方事务的连接，库存记录与生产项状态同一事务提交/回滚
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::domain::production_detail::ProductionDetail;
use crate::domain::production_item::ProductionItem;
use crate::repository::error::RepositoryResult;
use crate::repository::inventory_txn_repo::{
    self, InventoryTransactionEntity, REF_TYPE_PRODUCTION_COMPLETION, REF_TYPE_PRODUCTION_ITEM,
    TXN_TYPE_RECEIPT, TXN_TYPE_RELEASE, TXN_TYPE_RESERVE,
};

/// 成品入库请求
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedGoodsReceipt {
    pub product_id: String,
    pub quantity: f64,
    pub warehouse_id: Option<String>,
    pub location: Option<String>,
    /// 来源完工记录ID
    pub completion_id: String,
    pub received_at: NaiveDateTime,
}

// ==========================================
// InventoryGateway - 库存协作方
// ==========================================
pub trait InventoryGateway: Send + Sync {
    /// 开工时按用料明细预留组件，返回库存事务ID
    fn reserve_components(
        &self,
        conn: &Connection,
        item: &ProductionItem,
        details: &[ProductionDetail],
        at: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>>;

    /// 生产项删除时释放其全部组件预留，返回冲销事务ID
    fn release_reservations(
        &self,
        conn: &Connection,
        item_id: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>>;

    /// 完工时成品入库，返回库存事务ID（不追踪库存时为 None）
    fn receive_finished_goods(
        &self,
        conn: &Connection,
        receipt: &FinishedGoodsReceipt,
    ) -> RepositoryResult<Option<String>>;
}

/// 写入 inventory_transaction 表的库存台账
#[derive(Debug, Clone, Default)]
pub struct SqliteInventoryLedger;

impl InventoryGateway for SqliteInventoryLedger {
    fn reserve_components(
        &self,
        conn: &Connection,
        item: &ProductionItem,
        details: &[ProductionDetail],
        at: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>> {
        let mut txn_ids = Vec::with_capacity(details.len());
        for detail in details {
            let txn = InventoryTransactionEntity {
                txn_id: uuid::Uuid::new_v4().to_string(),
                txn_type: TXN_TYPE_RESERVE.to_string(),
                product_id: detail.component_product_id.clone(),
                quantity: detail.required_quantity,
                warehouse_id: detail.warehouse_id.clone(),
                location: None,
                ref_type: REF_TYPE_PRODUCTION_ITEM.to_string(),
                ref_id: item.item_id.clone(),
                created_at: at,
            };
            inventory_txn_repo::insert(conn, &txn)?;
            txn_ids.push(txn.txn_id);
        }

        tracing::debug!(
            item_id = %item.item_id,
            reserved_lines = txn_ids.len(),
            "组件库存已预留"
        );
        Ok(txn_ids)
    }

    fn release_reservations(
        &self,
        conn: &Connection,
        item_id: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>> {
        // 台账只追加：逐条写 RELEASE 冲销，已冲销过的不再重复
        let released = inventory_txn_repo::count_by_ref_and_type(
            conn,
            REF_TYPE_PRODUCTION_ITEM,
            item_id,
            TXN_TYPE_RELEASE,
        )?;
        if released > 0 {
            return Ok(Vec::new());
        }

        let mut txn_ids = Vec::new();
        for reserve in inventory_txn_repo::select_by_ref(conn, REF_TYPE_PRODUCTION_ITEM, item_id)?
            .into_iter()
            .filter(|t| t.txn_type == TXN_TYPE_RESERVE)
        {
            let txn = InventoryTransactionEntity {
                txn_id: uuid::Uuid::new_v4().to_string(),
                txn_type: TXN_TYPE_RELEASE.to_string(),
                created_at: at,
                ..reserve
            };
            inventory_txn_repo::insert(conn, &txn)?;
            txn_ids.push(txn.txn_id);
        }

        if !txn_ids.is_empty() {
            tracing::debug!(item_id, released_lines = txn_ids.len(), "组件预留已释放");
        }
        Ok(txn_ids)
    }

    fn receive_finished_goods(
        &self,
        conn: &Connection,
        receipt: &FinishedGoodsReceipt,
    ) -> RepositoryResult<Option<String>> {
        let txn = InventoryTransactionEntity {
            txn_id: uuid::Uuid::new_v4().to_string(),
            txn_type: TXN_TYPE_RECEIPT.to_string(),
            product_id: receipt.product_id.clone(),
            quantity: receipt.quantity,
            warehouse_id: receipt.warehouse_id.clone(),
            location: receipt.location.clone(),
            ref_type: REF_TYPE_PRODUCTION_COMPLETION.to_string(),
            ref_id: receipt.completion_id.clone(),
            created_at: receipt.received_at,
        };
        inventory_txn_repo::insert(conn, &txn)?;

        tracing::debug!(
            product_id = %receipt.product_id,
            quantity = receipt.quantity,
            txn_id = %txn.txn_id,
            "成品已入库"
        );
        Ok(Some(txn.txn_id))
    }
}

/// 不追踪库存的宿主使用
#[derive(Debug, Clone, Default)]
pub struct NoOpInventoryGateway;

impl InventoryGateway for NoOpInventoryGateway {
    fn reserve_components(
        &self,
        _conn: &Connection,
        _item: &ProductionItem,
        _details: &[ProductionDetail],
        _at: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn release_reservations(
        &self,
        _conn: &Connection,
        _item_id: &str,
        _at: NaiveDateTime,
    ) -> RepositoryResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn receive_finished_goods(
        &self,
        _conn: &Connection,
        _receipt: &FinishedGoodsReceipt,
    ) -> RepositoryResult<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn reserve_row(conn: &Connection, item_id: &str, product_id: &str, quantity: f64, at: NaiveDateTime) {
        inventory_txn_repo::insert(
            conn,
            &InventoryTransactionEntity {
                txn_id: uuid::Uuid::new_v4().to_string(),
                txn_type: TXN_TYPE_RESERVE.to_string(),
                product_id: product_id.to_string(),
                quantity,
                warehouse_id: Some("WH-RM".to_string()),
                location: None,
                ref_type: REF_TYPE_PRODUCTION_ITEM.to_string(),
                ref_id: item_id.to_string(),
                created_at: at,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_release_reservations_only_once() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let at = chrono::Local::now().naive_local();
        reserve_row(&conn, "PI-1", "RM-A", 25.0, at);
        reserve_row(&conn, "PI-1", "RM-B", 10.0, at);
        reserve_row(&conn, "PI-2", "RM-A", 5.0, at);

        let ledger = SqliteInventoryLedger;
        let released = ledger.release_reservations(&conn, "PI-1", at).unwrap();
        assert_eq!(released.len(), 2);
        assert!(ledger.release_reservations(&conn, "PI-1", at).unwrap().is_empty());

        let rows = inventory_txn_repo::select_by_ref(&conn, REF_TYPE_PRODUCTION_ITEM, "PI-1").unwrap();
        let releases: Vec<_> = rows.iter().filter(|t| t.txn_type == TXN_TYPE_RELEASE).collect();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].warehouse_id.as_deref(), Some("WH-RM"));

        // 其他生产项的预留不受影响
        assert_eq!(
            inventory_txn_repo::count_by_ref_and_type(&conn, REF_TYPE_PRODUCTION_ITEM, "PI-2", TXN_TYPE_RELEASE)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_release_without_reservations_is_empty() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let at = chrono::Local::now().naive_local();
        assert!(SqliteInventoryLedger
            .release_reservations(&conn, "PI-none", at)
            .unwrap()
            .is_empty());
    }
}
