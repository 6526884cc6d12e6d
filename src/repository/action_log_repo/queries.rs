use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use crate::repository::sql_codec::get_ts;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, schedule_id, item_id, action_type, action_ts, actor,
           payload_json, detail
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE action_id = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![action_id], |row| self.map_row(row))
            .optional()?)
    }

    /// 查询生产项的操作日志（最新在前）
    pub fn find_by_item(&self, item_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE item_id = ? ORDER BY action_ts DESC, rowid DESC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![item_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询排程单的操作日志（最新在前）
    pub fn find_by_schedule(&self, schedule_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE schedule_id = ? ORDER BY action_ts DESC, rowid DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![schedule_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询指定类型的最近日志
    pub fn find_recent_by_type(&self, action_type: &str, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE action_type = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![action_type, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 映射数据库行到 ActionLog
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let payload_json: Option<String> = row.get(6)?;
        Ok(ActionLog {
            action_id: row.get(0)?,
            schedule_id: row.get(1)?,
            item_id: row.get(2)?,
            action_type: row.get(3)?,
            action_ts: get_ts(row, 4)?,
            actor: row.get(5)?,
            // 历史数据中的非法 JSON 不阻断查询
            payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(7)?,
        })
    }
}
