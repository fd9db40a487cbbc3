//! SQLite 本地存储模块
//!
//! 提供本地 SQLite 数据库存储功能，支持：
//! - 单词、分类及其关联的持久化
//! - 测验结果与题目的原子保存
//! - 用户账户与键值偏好（连续学习天数、登录状态）
//! - 串行化的后台写入队列

// ============================================================
// 子模块声明
// ============================================================

pub mod category;
pub mod migrations;
pub mod models;
pub mod preferences;
pub mod quiz;
pub mod user;
pub mod word;
pub mod worker;

// ============================================================
// 重新导出主要类型
// ============================================================

pub use category::CategoryRepository;
pub use migrations::run_migrations;
pub use models::*;
pub use preferences::PreferenceRepository;
pub use quiz::QuizRepository;
pub use user::UserRepository;
pub use word::WordRepository;
pub use worker::StoreWorker;

// ============================================================
// 依赖导入
// ============================================================

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

// ============================================================
// 错误类型定义
// ============================================================

/// 存储模块错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("迁移错误: {0}")]
    Migration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("数据未找到: {0}")]
    NotFound(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("锁获取失败: {0}")]
    LockError(String),

    #[error("后台队列错误: {0}")]
    Worker(String),

    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("密码哈希错误: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================
// Storage - 统一存储结构体
// ============================================================

/// 统一存储结构体
///
/// 持有唯一的数据库连接，并提供对所有 Repository 的便捷访问。
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Storage {
    /// 打开（必要时创建）数据库文件
    ///
    /// 自动启用 WAL 模式、外键约束，并运行数据库迁移。
    pub fn new<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection = Connection::open(path)?;

        // 启用 WAL 模式以提高并发性能
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;

        Self::with_connection(connection, path.to_string_lossy().to_string())
    }

    /// 创建内存数据库（用于测试）
    pub fn in_memory() -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::with_connection(connection, ":memory:".to_string())
    }

    fn with_connection(connection: Connection, db_path: String) -> StorageResult<Self> {
        migrations::run_migrations(&connection)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
            db_path,
        })
    }

    /// 获取数据库连接
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 获取数据库连接的锁
    pub fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    /// 获取数据库路径
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// 获取单词仓库
    pub fn words(&self) -> WordRepository {
        WordRepository::new(self.connection())
    }

    /// 获取分类仓库
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.connection())
    }

    /// 获取测验仓库
    pub fn quizzes(&self) -> QuizRepository {
        QuizRepository::new(self.connection())
    }

    /// 获取用户仓库
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.connection())
    }

    /// 获取键值偏好仓库
    pub fn preferences(&self) -> PreferenceRepository {
        PreferenceRepository::new(self.connection())
    }

    /// 执行事务
    ///
    /// # Example
    /// ```ignore
    /// let id = storage.transaction(|conn| {
    ///     conn.execute("INSERT INTO ...", [])?;
    ///     Ok(conn.last_insert_rowid())
    /// })?;
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let mut conn = self.get_connection()?;

        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;

        Ok(result)
    }
}

// ============================================================
// 测试
// ============================================================
