//! 键值偏好存储
//!
//! 保存连续学习天数、登录状态等轻量级应用状态。

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::{StorageError, StorageResult};

pub struct PreferenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PreferenceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.get_connection()?;
        Self::get_internal(&conn, key)
    }

    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.get_connection()?;
        Self::set_internal(&conn, key, value)
    }

    /// 删除键，返回键是否存在
    pub fn remove(&self, key: &str) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        Self::remove_internal(&conn, key)
    }

    /// 读取整数值，无法解析时视为缺失
    pub fn get_i64(&self, key: &str) -> StorageResult<Option<i64>> {
        let conn = self.get_connection()?;
        Self::get_i64_internal(&conn, key)
    }

    pub fn get_internal(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_internal(conn: &Connection, key: &str, value: &str) -> StorageResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO preferences (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_internal(conn: &Connection, key: &str) -> StorageResult<bool> {
        let affected = conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    pub fn get_i64_internal(conn: &Connection, key: &str) -> StorageResult<Option<i64>> {
        Ok(Self::get_internal(conn, key)?.and_then(|v| v.trim().parse().ok()))
    }
}
