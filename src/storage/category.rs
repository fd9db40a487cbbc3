//! 分类数据库操作
//!
//! 内置分类（六个 CEFR 等级与 "User Added"）由迁移预置，
//! 自定义分类可随时创建和删除，删除时关联记录级联清除。

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use crate::storage::models::{Category, CategoryKind};
use crate::storage::{StorageError, StorageResult};

/// 分类仓库
pub struct CategoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CategoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    /// 创建分类，同名分类已存在时直接返回已有记录
    pub fn create(&self, name: &str) -> StorageResult<Category> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT OR IGNORE INTO category (name) VALUES (?1)",
            params![name],
        )?;

        Self::get_by_name_internal(&conn, name)?
            .ok_or_else(|| StorageError::NotFound(format!("分类 {}", name)))
    }

    /// 按名称删除自定义分类
    ///
    /// 内置分类不可删除，返回 `false`。
    pub fn delete(&self, name: &str) -> StorageResult<bool> {
        if CategoryKind::classify(name).is_builtin() {
            warn!(category = %name, "refusing to delete built-in category");
            return Ok(false);
        }

        let conn = self.get_connection()?;
        let affected = conn.execute("DELETE FROM category WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }

    /// 所有分类，按名称排序
    pub fn get_all(&self) -> StorageResult<Vec<Category>> {
        let conn = self.get_connection()?;
        Self::get_all_internal(&conn)
    }

    pub fn get_by_name(&self, name: &str) -> StorageResult<Option<Category>> {
        let conn = self.get_connection()?;
        Self::get_by_name_internal(&conn, name)
    }

    /// 将单词加入自定义分类（重复加入无副作用）
    pub fn add_word(&self, word_id: i64, category_id: i64) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT OR IGNORE INTO word_category (word_id, category_id) VALUES (?1, ?2)",
            params![word_id, category_id],
        )?;
        Ok(())
    }

    /// 将单词移出分类
    pub fn remove_word(&self, word_id: i64, category_id: i64) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let affected = conn.execute(
            "DELETE FROM word_category WHERE word_id = ?1 AND category_id = ?2",
            params![word_id, category_id],
        )?;
        Ok(affected > 0)
    }

    /// 单词是否属于某个自定义分类
    pub fn contains_word(&self, word_id: i64, category_id: i64) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM word_category WHERE word_id = ?1 AND category_id = ?2",
            params![word_id, category_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 自定义分类中的单词数量
    pub fn count_words(&self, category_id: i64) -> StorageResult<i64> {
        let conn = self.get_connection()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM word_category WHERE category_id = ?1",
            params![category_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 单词所属的全部自定义分类
    pub fn get_categories_for_word(&self, word_id: i64) -> StorageResult<Vec<Category>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.name
            FROM category c
            INNER JOIN word_category wc ON wc.category_id = c.id
            WHERE wc.word_id = ?1
            ORDER BY c.name ASC
            "#,
        )?;
        let categories = stmt
            .query_map(params![word_id], |row| Category::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_all_internal(conn: &Connection) -> StorageResult<Vec<Category>> {
        let mut stmt = conn.prepare("SELECT id, name FROM category ORDER BY name ASC")?;
        let categories = stmt
            .query_map([], |row| Category::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_by_name_internal(conn: &Connection, name: &str) -> StorageResult<Option<Category>> {
        let category = conn
            .query_row(
                "SELECT id, name FROM category WHERE name = ?1",
                params![name],
                |row| Category::from_row(row),
            )
            .optional()?;
        Ok(category)
    }
}
