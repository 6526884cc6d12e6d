// ==========================================
// 生产排程系统 - 事务性记录存储
// ==========================================
// 职责: 持有共享连接，提供“读”与“立即写事务”两种执行方式
// 并发: 写事务统一使用 BEGIN IMMEDIATE，同一数据库文件上的多个连接
//       在读-改-写序列上串行化（配合 busy_timeout 排队）
// ==========================================

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::open_and_init;
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// ScheduleStore - 记录存储
// ==========================================
#[derive(Clone)]
pub struct ScheduleStore {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleStore {
    /// 基于已有共享连接创建
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件（自动建表）
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 共享连接（供仓储构造）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 只读执行
    pub fn read<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }

    /// 在一个 IMMEDIATE 事务中执行
    ///
    /// # 语义
    /// - 闭包返回 Err → 事务回滚（Transaction drop）
    /// - 闭包返回 Ok → 提交；提交失败按仓储错误返回
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let out = f(&tx)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn memory_store() -> ScheduleStore {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ScheduleStore::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let store = memory_store();

        let result: RepositoryResult<()> = store.write(|tx| {
            tx.execute(
                "INSERT INTO product (product_id, product_name) VALUES ('P1', 'x')",
                [],
            )?;
            Err(RepositoryError::InternalError("boom".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM product", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_write_commits_on_success() {
        let store = memory_store();

        store
            .write(|tx| -> RepositoryResult<()> {
                tx.execute(
                    "INSERT INTO product (product_id, product_name) VALUES ('P1', 'x')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM product", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }
}
