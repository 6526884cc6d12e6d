// ==========================================
// 生产排程系统 - 协作方参考数据仓储
// ==========================================
// 说明: product / warehouse / demand_line / composition_line 由外部系统维护，
//       核心只做存在性校验与 BOM 读取
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::production_detail::CompositionLine;
use crate::repository::error::{RepositoryError, RepositoryResult};

fn exists(conn: &Connection, sql: &str, key: &str) -> RepositoryResult<bool> {
    let found: Option<i64> = conn.query_row(sql, params![key], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

pub fn product_exists(conn: &Connection, product_id: &str) -> RepositoryResult<bool> {
    exists(conn, "SELECT 1 FROM product WHERE product_id = ? LIMIT 1", product_id)
}

pub fn demand_line_exists(conn: &Connection, demand_line_id: &str) -> RepositoryResult<bool> {
    exists(
        conn,
        "SELECT 1 FROM demand_line WHERE demand_line_id = ? LIMIT 1",
        demand_line_id,
    )
}

pub fn warehouse_exists(conn: &Connection, warehouse_id: &str) -> RepositoryResult<bool> {
    exists(
        conn,
        "SELECT 1 FROM warehouse WHERE warehouse_id = ? LIMIT 1",
        warehouse_id,
    )
}

/// 成品的 BOM 行（按组件物料排序）
pub fn select_composition_lines(
    conn: &Connection,
    parent_product_id: &str,
) -> RepositoryResult<Vec<CompositionLine>> {
    let mut stmt = conn.prepare(
        r#"SELECT composition_line_id, parent_product_id, component_product_id, quantity_per,
                  warehouse_id, unit_cost
             FROM composition_line
            WHERE parent_product_id = ?
            ORDER BY component_product_id, composition_line_id"#,
    )?;
    let lines = stmt
        .query_map(params![parent_product_id], |row| {
            Ok(CompositionLine {
                composition_line_id: row.get(0)?,
                parent_product_id: row.get(1)?,
                component_product_id: row.get(2)?,
                quantity_per: row.get(3)?,
                warehouse_id: row.get(4)?,
                unit_cost: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<CompositionLine>, _>>()?;
    Ok(lines)
}

// ==========================================
// ReferenceDataRepository - 参考数据仓储
// ==========================================
// 写入方法供宿主同步主数据及测试造数
pub struct ReferenceDataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceDataRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert_product(
        &self,
        product_id: &str,
        product_name: &str,
        unit: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO product (product_id, product_code, product_name, unit)
               VALUES (?1, ?1, ?2, ?3)
               ON CONFLICT(product_id) DO UPDATE SET product_name = ?2, unit = ?3"#,
            params![product_id, product_name, unit],
        )?;
        Ok(())
    }

    pub fn upsert_warehouse(&self, warehouse_id: &str, warehouse_name: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO warehouse (warehouse_id, warehouse_name) VALUES (?1, ?2)
               ON CONFLICT(warehouse_id) DO UPDATE SET warehouse_name = ?2"#,
            params![warehouse_id, warehouse_name],
        )?;
        Ok(())
    }

    pub fn upsert_demand_line(
        &self,
        demand_line_id: &str,
        document_type: &str,
        document_id: &str,
        product_id: Option<&str>,
        quantity: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO demand_line (demand_line_id, document_type, document_id, product_id, quantity)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(demand_line_id) DO UPDATE
                  SET document_type = ?2, document_id = ?3, product_id = ?4, quantity = ?5"#,
            params![demand_line_id, document_type, document_id, product_id, quantity],
        )?;
        Ok(())
    }

    pub fn upsert_composition_line(&self, line: &CompositionLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO composition_line (
                    composition_line_id, parent_product_id, component_product_id, quantity_per,
                    warehouse_id, unit_cost
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(composition_line_id) DO UPDATE
                  SET parent_product_id = ?2, component_product_id = ?3, quantity_per = ?4,
                      warehouse_id = ?5, unit_cost = ?6"#,
            params![
                &line.composition_line_id,
                &line.parent_product_id,
                &line.component_product_id,
                line.quantity_per,
                &line.warehouse_id,
                line.unit_cost,
            ],
        )?;
        Ok(())
    }

    pub fn find_composition_lines(&self, parent_product_id: &str) -> RepositoryResult<Vec<CompositionLine>> {
        let conn = self.get_conn()?;
        select_composition_lines(&conn, parent_product_id)
    }

    pub fn has_product(&self, product_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        product_exists(&conn, product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ReferenceDataRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        ReferenceDataRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_existence_checks() {
        let repo = setup();
        repo.upsert_product("FG1", "成品1", Some("PCS")).unwrap();
        repo.upsert_demand_line("SOL1", "SALES_ORDER", "SO1", Some("FG1"), 10.0)
            .unwrap();

        let conn = repo.get_conn().unwrap();
        assert!(product_exists(&conn, "FG1").unwrap());
        assert!(!product_exists(&conn, "FG2").unwrap());
        assert!(demand_line_exists(&conn, "SOL1").unwrap());
        assert!(!demand_line_exists(&conn, "SOL2").unwrap());
        assert!(!warehouse_exists(&conn, "WH1").unwrap());
    }

    #[test]
    fn test_composition_lines_by_parent() {
        let repo = setup();
        for id in ["FG1", "RM1", "RM2"] {
            repo.upsert_product(id, id, None).unwrap();
        }
        for (line_id, component, qty) in [("B2", "RM2", 1.5), ("B1", "RM1", 2.0)] {
            repo.upsert_composition_line(&CompositionLine {
                composition_line_id: line_id.to_string(),
                parent_product_id: "FG1".to_string(),
                component_product_id: component.to_string(),
                quantity_per: qty,
                warehouse_id: None,
                unit_cost: Some(1.0),
            })
            .unwrap();
        }

        let lines = repo.find_composition_lines("FG1").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].component_product_id, "RM1");
        assert!(repo.find_composition_lines("RM1").unwrap().is_empty());
    }
}
