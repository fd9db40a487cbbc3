//! 用户账户
//!
//! 密码使用 bcrypt 哈希保存，明文从不落库。

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::storage::models::User;
use crate::storage::{StorageError, StorageResult};

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
    cost: u32,
}

impl UserRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// 自定义哈希强度（测试中使用较低的值）
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    /// 注册新用户
    ///
    /// 用户名已被占用时返回 `None`。
    pub fn register(&self, name: &str, username: &str, password: &str) -> StorageResult<Option<User>> {
        let password_hash = hash_password(password, self.cost)?;
        self.insert_user(name, username, &password_hash)
    }

    /// 写入已哈希的账户，哈希计算由调用方在锁外完成
    pub fn insert_user(&self, name: &str, username: &str, password_hash: &str) -> StorageResult<Option<User>> {
        let conn = self.get_connection()?;
        let affected = conn.execute(
            "INSERT OR IGNORE INTO users (name, username, password_hash) VALUES (?1, ?2, ?3)",
            params![name, username, password_hash],
        )?;
        if affected == 0 {
            debug!(username = %username, "username already taken");
            return Ok(None);
        }

        info!(username = %username, "user registered");
        User::find_by_username(&conn, username)
    }

    /// 校验用户名与密码，失败返回 `None`
    pub fn login(&self, username: &str, password: &str) -> StorageResult<Option<User>> {
        let Some(user) = self.find_by_username(username)? else {
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub fn find_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let conn = self.get_connection()?;
        User::find_by_username(&conn, username)
    }
}

pub fn hash_password(password: &str, cost: u32) -> StorageResult<String> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, password_hash: &str) -> StorageResult<bool> {
    Ok(bcrypt::verify(password, password_hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn repo(storage: &Storage) -> UserRepository {
        storage.users().with_cost(4)
    }

    #[test]
    fn test_register_and_login() {
        let storage = Storage::in_memory().unwrap();
        let users = repo(&storage);

        let user = users.register("Alice", "alice", "s3cret").unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "s3cret");

        let logged_in = users.login("alice", "s3cret").unwrap().unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let storage = Storage::in_memory().unwrap();
        let users = repo(&storage);

        assert!(users.register("Alice", "alice", "a").unwrap().is_some());
        assert!(users.register("Other Alice", "alice", "b").unwrap().is_none());
        assert_eq!(users.find_by_username("alice").unwrap().unwrap().name, "Alice");
    }

    #[test]
    fn test_login_failures() {
        let storage = Storage::in_memory().unwrap();
        let users = repo(&storage);
        users.register("Alice", "alice", "right").unwrap();

        assert!(users.login("alice", "wrong").unwrap().is_none());
        assert!(users.login("nobody", "right").unwrap().is_none());
    }

    #[test]
    fn test_insert_prehashed_user() {
        let storage = Storage::in_memory().unwrap();
        let users = repo(&storage);

        let hash = hash_password("pw", 4).unwrap();
        let user = users.insert_user("Bob", "bob", &hash).unwrap().unwrap();
        assert!(verify_password("pw", &user.password_hash).unwrap());
        assert!(!verify_password("nope", &user.password_hash).unwrap());
        assert!(users.insert_user("Bob", "bob", &hash).unwrap().is_none());
    }
}
