//! Word 数据库操作
//!
//! 提供单词的 CRUD、按分类查询、计数以及测验候选词的随机抽取。

use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::models::{CategoryKind, Word, USER_ADDED};
use crate::storage::{StorageError, StorageResult};

const WORD_COLUMNS: &str = "w.id, w.word, w.meaning, w.part_of_speech, w.example, \
                            w.cefr_level, w.is_learned, w.is_prebuilt, w.created_at";

/// 可参与测验的条件：已学会或用户添加
const ELIGIBLE_CONDITION: &str = "(w.is_learned = 1 OR w.cefr_level = 'User Added')";

/// 单词数据库操作仓库
///
/// 支持两种使用方式：
/// 1. 使用 `Arc<Mutex<Connection>>` 进行线程安全操作
/// 2. 使用 `&Connection` 引用进行直接操作（适用于事务内操作）
pub struct WordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取连接锁
    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    // ============================================================
    // 写操作
    // ============================================================

    /// 插入单词，拼写重复时返回 `None`
    pub fn insert_word(&self, word: &Word) -> StorageResult<Option<i64>> {
        let conn = self.get_conn()?;
        word.insert(&conn)
    }

    /// 批量导入单词（预置词库），返回实际插入的数量
    pub fn insert_words(&self, words: &[Word]) -> StorageResult<usize> {
        if words.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for word in words {
            if word.insert(&tx)?.is_some() {
                inserted += 1;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    /// 查找同拼写单词，不存在则插入
    ///
    /// 返回入库后的单词以及是否为新插入。
    pub fn find_or_insert_word(&self, word: &Word) -> StorageResult<(Word, bool)> {
        let conn = self.get_conn()?;
        Self::find_or_insert_word_internal(&conn, word)
    }

    /// 更新单词，返回是否命中
    pub fn update_word(&self, word: &Word) -> StorageResult<bool> {
        let conn = self.get_conn()?;
        word.update(&conn)
    }

    /// 删除单词，关联的自定义分类随之级联删除
    pub fn delete_word(&self, id: i64) -> StorageResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM word WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// 设置已学会标记
    ///
    /// 返回 `true` 表示单词由未学会变为已学会。
    pub fn set_learned(&self, id: i64, learned: bool) -> StorageResult<bool> {
        let conn = self.get_conn()?;
        Self::set_learned_internal(&conn, id, learned)
    }

    // ============================================================
    // 读操作
    // ============================================================

    pub fn get_word(&self, id: i64) -> StorageResult<Option<Word>> {
        let conn = self.get_conn()?;
        Self::get_word_internal(&conn, id)
    }

    /// 按拼写精确查找
    pub fn get_word_by_text(&self, text: &str) -> StorageResult<Option<Word>> {
        let conn = self.get_conn()?;
        Self::get_word_by_text_internal(&conn, text)
    }

    /// 所有单词，按拼写排序
    pub fn get_all_words(&self) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::get_all_words_internal(&conn)
    }

    pub fn get_learned_words(&self) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::get_learned_words_internal(&conn)
    }

    /// 某个分类下的单词
    ///
    /// 内置分类按单词自身的 `cefr_level` 过滤，自定义分类走关联表。
    pub fn get_words_for_category(&self, category: &str) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::get_words_for_category_internal(&conn, category)
    }

    /// 随机取一个单词作为每日一词
    pub fn get_word_of_the_day(&self) -> StorageResult<Option<Word>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {WORD_COLUMNS} FROM word w ORDER BY RANDOM() LIMIT 1");
        let word = conn
            .query_row(&sql, [], |row| Word::from_row(row))
            .optional()?;
        Ok(word)
    }

    pub fn count_words(&self) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM word", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_learned_words(&self) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM word WHERE is_learned = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 可参与测验的单词数量，可选按分类过滤
    pub fn count_eligible_words(&self, category: Option<&str>) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        Self::count_eligible_words_internal(&conn, category)
    }

    /// 随机抽取可参与测验的单词（无放回）
    pub fn get_random_eligible_words(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::get_random_eligible_words_internal(&conn, category, limit)
    }

    // ============================================================
    // 内部实现方法（静态方法，接受 &Connection）
    // ============================================================

    pub fn get_word_internal(conn: &Connection, id: i64) -> StorageResult<Option<Word>> {
        let sql = format!("SELECT {WORD_COLUMNS} FROM word w WHERE w.id = ?1");
        let word = conn
            .query_row(&sql, params![id], |row| Word::from_row(row))
            .optional()?;
        Ok(word)
    }

    pub fn get_word_by_text_internal(conn: &Connection, text: &str) -> StorageResult<Option<Word>> {
        let sql = format!("SELECT {WORD_COLUMNS} FROM word w WHERE w.word = ?1 LIMIT 1");
        let word = conn
            .query_row(&sql, params![text], |row| Word::from_row(row))
            .optional()?;
        Ok(word)
    }

    pub fn get_all_words_internal(conn: &Connection) -> StorageResult<Vec<Word>> {
        let sql = format!("SELECT {WORD_COLUMNS} FROM word w ORDER BY w.word ASC");
        query_words(conn, &sql, params![])
    }

    pub fn get_learned_words_internal(conn: &Connection) -> StorageResult<Vec<Word>> {
        let sql = format!(
            "SELECT {WORD_COLUMNS} FROM word w WHERE w.is_learned = 1 ORDER BY w.word ASC"
        );
        query_words(conn, &sql, params![])
    }

    pub fn get_words_for_category_internal(
        conn: &Connection,
        category: &str,
    ) -> StorageResult<Vec<Word>> {
        match CategoryKind::classify(category) {
            CategoryKind::UserAdded => {
                let sql = format!(
                    "SELECT {WORD_COLUMNS} FROM word w WHERE w.cefr_level = ?1 ORDER BY w.word ASC"
                );
                query_words(conn, &sql, params![USER_ADDED])
            }
            CategoryKind::Cefr(level) => {
                let sql = format!(
                    "SELECT {WORD_COLUMNS} FROM word w WHERE w.cefr_level = ?1 ORDER BY w.word ASC"
                );
                query_words(conn, &sql, params![level])
            }
            CategoryKind::Custom(name) => {
                let sql = format!(
                    r#"
                    SELECT {WORD_COLUMNS}
                    FROM word w
                    INNER JOIN word_category wc ON w.id = wc.word_id
                    INNER JOIN category c ON wc.category_id = c.id
                    WHERE c.name = ?1
                    ORDER BY w.word ASC
                    "#
                );
                query_words(conn, &sql, params![name])
            }
        }
    }

    pub fn find_or_insert_word_internal(
        conn: &Connection,
        word: &Word,
    ) -> StorageResult<(Word, bool)> {
        if let Some(existing) = Self::get_word_by_text_internal(conn, &word.word)? {
            return Ok((existing, false));
        }

        let id = word
            .insert(conn)?
            .ok_or_else(|| StorageError::NotFound(format!("单词插入被忽略: {}", word.word)))?;
        let inserted = Self::get_word_internal(conn, id)?
            .ok_or_else(|| StorageError::NotFound(format!("单词 {}", id)))?;

        Ok((inserted, true))
    }

    pub fn set_learned_internal(conn: &Connection, id: i64, learned: bool) -> StorageResult<bool> {
        let was_learned: bool = conn
            .query_row(
                "SELECT is_learned FROM word WHERE id = ?1",
                params![id],
                |row| row.get::<_, i32>(0),
            )
            .optional()?
            .map(|v| v != 0)
            .ok_or_else(|| StorageError::NotFound(format!("单词 {}", id)))?;

        conn.execute(
            "UPDATE word SET is_learned = ?2 WHERE id = ?1",
            params![id, learned as i32],
        )?;

        Ok(learned && !was_learned)
    }

    pub fn count_eligible_words_internal(
        conn: &Connection,
        category: Option<&str>,
    ) -> StorageResult<i64> {
        let (from_where, param) = eligible_scope(category);
        let sql = format!("SELECT COUNT(*) FROM {from_where}");

        let count = match param {
            Some(value) => conn.query_row(&sql, params![value], |row| row.get(0))?,
            None => conn.query_row(&sql, [], |row| row.get(0))?,
        };
        Ok(count)
    }

    pub fn get_random_eligible_words_internal(
        conn: &Connection,
        category: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<Word>> {
        let (from_where, param) = eligible_scope(category);
        let limit = limit as i64;

        match param {
            Some(value) => {
                let sql = format!(
                    "SELECT {WORD_COLUMNS} FROM {from_where} ORDER BY RANDOM() LIMIT ?2"
                );
                query_words(conn, &sql, params![value, limit])
            }
            None => {
                let sql = format!(
                    "SELECT {WORD_COLUMNS} FROM {from_where} ORDER BY RANDOM() LIMIT ?1"
                );
                query_words(conn, &sql, params![limit])
            }
        }
    }
}

/// 可参与测验单词的 FROM/WHERE 片段及其绑定参数
fn eligible_scope(category: Option<&str>) -> (String, Option<&str>) {
    match category.map(CategoryKind::classify) {
        None => (format!("word w WHERE {ELIGIBLE_CONDITION}"), None),
        Some(CategoryKind::UserAdded) => (
            format!("word w WHERE w.cefr_level = ?1 AND {ELIGIBLE_CONDITION}"),
            Some(USER_ADDED),
        ),
        Some(CategoryKind::Cefr(level)) => (
            format!("word w WHERE w.cefr_level = ?1 AND {ELIGIBLE_CONDITION}"),
            Some(level),
        ),
        Some(CategoryKind::Custom(name)) => (
            format!(
                "word w \
                 INNER JOIN word_category wc ON w.id = wc.word_id \
                 INNER JOIN category c ON wc.category_id = c.id \
                 WHERE c.name = ?1 AND {ELIGIBLE_CONDITION}"
            ),
            Some(name),
        ),
    }
}

fn query_words(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> StorageResult<Vec<Word>> {
    let mut stmt = conn.prepare(sql)?;
    let words = stmt
        .query_map(params, |row| Word::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(words)
}
