// ==========================================
// 生产排程系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表语句，保证测试库与运行库结构一致
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置；并发完工登记依赖它排队等待写锁
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 包含两类表：
/// - 核心表：schedule / production_item / production_detail / production_allocation /
///   production_completion / action_log / config_kv
/// - 协作方表（最小字段集）：product / warehouse / demand_line / composition_line /
///   inventory_transaction，核心只做存在性校验或追加写入
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- ===== 协作方表 =====
        CREATE TABLE IF NOT EXISTS product (
            product_id TEXT PRIMARY KEY,
            product_code TEXT,
            product_name TEXT NOT NULL,
            unit TEXT
        );

        CREATE TABLE IF NOT EXISTS warehouse (
            warehouse_id TEXT PRIMARY KEY,
            warehouse_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS demand_line (
            demand_line_id TEXT PRIMARY KEY,
            document_type TEXT NOT NULL,
            document_id TEXT NOT NULL,
            product_id TEXT REFERENCES product(product_id),
            quantity REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS composition_line (
            composition_line_id TEXT PRIMARY KEY,
            parent_product_id TEXT NOT NULL REFERENCES product(product_id),
            component_product_id TEXT NOT NULL REFERENCES product(product_id),
            quantity_per REAL NOT NULL CHECK (quantity_per > 0),
            warehouse_id TEXT,
            unit_cost REAL
        );

        CREATE TABLE IF NOT EXISTS inventory_transaction (
            txn_id TEXT PRIMARY KEY,
            txn_type TEXT NOT NULL,
            product_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            warehouse_id TEXT,
            location TEXT,
            ref_type TEXT NOT NULL,
            ref_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- ===== 核心表 =====
        CREATE TABLE IF NOT EXISTS schedule (
            schedule_id TEXT PRIMARY KEY,
            schedule_code TEXT NOT NULL UNIQUE,
            schedule_date TEXT NOT NULL,
            source_doc_type TEXT,
            source_doc_id TEXT,
            customer_id TEXT,
            remarks TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS production_item (
            item_id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL REFERENCES schedule(schedule_id) ON DELETE CASCADE,
            product_id TEXT NOT NULL REFERENCES product(product_id),
            scheduled_quantity REAL NOT NULL CHECK (scheduled_quantity > 0),
            completed_quantity REAL NOT NULL DEFAULT 0 CHECK (completed_quantity >= 0),
            status TEXT NOT NULL DEFAULT 'PENDING',
            priority INTEGER NOT NULL DEFAULT 0,
            demand_line_id TEXT REFERENCES demand_line(demand_line_id),
            warehouse_id TEXT,
            location TEXT,
            actual_start_at TEXT,
            actual_end_at TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (completed_quantity <= scheduled_quantity)
        );
        CREATE INDEX IF NOT EXISTS idx_production_item_schedule ON production_item(schedule_id);
        CREATE INDEX IF NOT EXISTS idx_production_item_product ON production_item(product_id);
        CREATE INDEX IF NOT EXISTS idx_production_item_demand ON production_item(demand_line_id);

        CREATE TABLE IF NOT EXISTS production_detail (
            detail_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES production_item(item_id) ON DELETE CASCADE,
            seq_no INTEGER NOT NULL,
            component_product_id TEXT NOT NULL REFERENCES product(product_id),
            required_quantity REAL NOT NULL CHECK (required_quantity > 0),
            composition_line_id TEXT,
            warehouse_id TEXT,
            unit_cost REAL,
            total_cost REAL
        );
        CREATE INDEX IF NOT EXISTS idx_production_detail_item ON production_detail(item_id);
        CREATE INDEX IF NOT EXISTS idx_production_detail_component ON production_detail(component_product_id);

        CREATE TABLE IF NOT EXISTS production_allocation (
            allocation_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES production_item(item_id) ON DELETE CASCADE,
            demand_line_id TEXT NOT NULL REFERENCES demand_line(demand_line_id),
            allocated_quantity REAL NOT NULL CHECK (allocated_quantity > 0),
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_production_allocation_item ON production_allocation(item_id);
        CREATE INDEX IF NOT EXISTS idx_production_allocation_demand ON production_allocation(demand_line_id);

        -- 完工记录只追加：不级联删除，存在完工记录的生产项无法被删除
        CREATE TABLE IF NOT EXISTS production_completion (
            completion_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL REFERENCES production_item(item_id),
            seq_no INTEGER NOT NULL,
            quantity REAL NOT NULL CHECK (quantity > 0),
            completed_at TEXT NOT NULL,
            warehouse_id TEXT,
            location TEXT,
            batch_no TEXT,
            inventory_txn_id TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (item_id, seq_no)
        );
        CREATE INDEX IF NOT EXISTS idx_production_completion_date ON production_completion(completed_at);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            schedule_id TEXT,
            item_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_item ON action_log(item_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 打开连接并确保 schema 存在
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;

    match read_schema_version(&conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本高于当前程序版本，可能存在不兼容字段"
            );
        }
        _ => {}
    }

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
