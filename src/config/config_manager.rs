// ==========================================
// 生产排程系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        read_value(&conn, key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self.get_global_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    fn get_bool_or_default(&self, key: &str, default: bool) -> RepositoryResult<bool> {
        let value = match self.get_global_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        Ok(parse_bool(&value).unwrap_or_else(|| {
            tracing::warn!(config_key = key, raw_value = %value, "布尔配置格式错误，使用默认值");
            default
        }))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    // ===== 生产排程配置 =====

    /// 需求分配合计是否限制在计划数量以内（默认不限制）
    pub fn allocation_enforce_cap(&self) -> RepositoryResult<bool> {
        self.get_bool_or_default(config_keys::ALLOCATION_ENFORCE_CAP, false)
    }

    /// 开工时是否预留组件库存（默认是）
    pub fn reserve_components_on_start(&self) -> RepositoryResult<bool> {
        self.get_bool_or_default(config_keys::RESERVE_COMPONENTS_ON_START, true)
    }

    /// 人工改写已完工数量时是否写入修正审计记录（默认是）
    pub fn audit_completed_quantity_override(&self) -> RepositoryResult<bool> {
        self.get_bool_or_default(config_keys::AUDIT_COMPLETED_QUANTITY_OVERRIDE, true)
    }

    /// 排程单号前缀
    pub fn schedule_code_prefix(&self) -> RepositoryResult<String> {
        let value = self.get_config_or_default(config_keys::SCHEDULE_CODE_PREFIX, "PS")?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Ok("PS".to_string())
        } else {
            Ok(trimmed.to_string())
        }
    }
}

/// 在给定连接（可为事务）上读取 global 配置值
pub fn read_value(conn: &Connection, key: &str) -> RepositoryResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 需求分配
    pub const ALLOCATION_ENFORCE_CAP: &str = "allocation_enforce_cap";

    // 库存协作
    pub const RESERVE_COMPONENTS_ON_START: &str = "reserve_components_on_start";

    // 审计
    pub const AUDIT_COMPLETED_QUANTITY_OVERRIDE: &str = "audit_completed_quantity_override";

    // 编码
    pub const SCHEDULE_CODE_PREFIX: &str = "schedule_code_prefix";
}
