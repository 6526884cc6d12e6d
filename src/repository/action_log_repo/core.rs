use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::fmt_ts;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 在调用方事务内写入操作日志
pub fn insert(conn: &Connection, log: &ActionLog) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO action_log (
            action_id, schedule_id, item_id, action_type, action_ts, actor,
            payload_json, detail
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            log.action_id,
            log.schedule_id,
            log.item_id,
            log.action_type,
            fmt_ts(&log.action_ts),
            log.actor,
            log.payload_json.as_ref().map(|v| v.to_string()),
            log.detail,
        ],
    )?;
    Ok(())
}

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入操作日志（独立事务）
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert(&conn, log)?;
        Ok(log.action_id.clone())
    }
}
