//! 数据模型定义
//!
//! 定义 SQLite 存储所需的数据结构，以及与数据库交互的方法。

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde::{Deserialize, Serialize};

use crate::storage::StorageResult;

/// 用户自行添加的单词所使用的分类标签
pub const USER_ADDED: &str = "User Added";

/// 内置的 CEFR 等级
pub const CEFR_LEVELS: [&str; 6] = ["A1", "A2", "B1", "B2", "C1", "C2"];

// ============================================================
// Word - 单词数据
// ============================================================

/// 单词数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// 自增主键，未入库时为 0
    pub id: i64,
    /// 单词拼写（全库唯一）
    pub word: String,
    /// 释义
    pub meaning: String,
    /// 词性
    pub part_of_speech: String,
    /// 例句
    pub example: String,
    /// 分类标签：CEFR 等级或 "User Added"
    pub cefr_level: String,
    /// 是否已学会
    pub learned: bool,
    /// 是否为预置词库内容
    pub prebuilt: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Word {
    pub fn new(
        word: impl Into<String>,
        meaning: impl Into<String>,
        part_of_speech: impl Into<String>,
        example: impl Into<String>,
        cefr_level: impl Into<String>,
        learned: bool,
        prebuilt: bool,
    ) -> Self {
        Self {
            id: 0,
            word: word.into(),
            meaning: meaning.into(),
            part_of_speech: part_of_speech.into(),
            example: example.into(),
            cefr_level: cefr_level.into(),
            learned,
            prebuilt,
            created_at: Utc::now(),
        }
    }

    /// 预置词库单词（未学会）
    pub fn prebuilt(
        word: impl Into<String>,
        meaning: impl Into<String>,
        part_of_speech: impl Into<String>,
        example: impl Into<String>,
        cefr_level: impl Into<String>,
    ) -> Self {
        Self::new(word, meaning, part_of_speech, example, cefr_level, false, true)
    }

    /// 用户添加的单词
    pub fn user_added(
        word: impl Into<String>,
        meaning: impl Into<String>,
        part_of_speech: impl Into<String>,
        example: impl Into<String>,
    ) -> Self {
        Self::new(word, meaning, part_of_speech, example, USER_ADDED, false, false)
    }

    /// 查词失败时的占位单词：只有拼写，其余字段为空
    pub fn placeholder(word: impl Into<String>) -> Self {
        Self::user_added(word, "", "", "")
    }

    pub fn is_user_added(&self) -> bool {
        self.cefr_level == USER_ADDED
    }

    /// 可参与测验：已学会或用户添加
    pub fn is_eligible(&self) -> bool {
        self.learned || self.is_user_added()
    }

    /// 从数据库行解析
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            word: row.get("word")?,
            meaning: row.get("meaning")?,
            part_of_speech: row.get("part_of_speech")?,
            example: row.get("example")?,
            cefr_level: row.get("cefr_level")?,
            learned: row.get::<_, i32>("is_learned")? != 0,
            prebuilt: row.get::<_, i32>("is_prebuilt")? != 0,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
        })
    }

    /// 插入到数据库
    ///
    /// 拼写已存在时忽略，返回 `None`；否则返回新行 ID。
    pub fn insert(&self, conn: &Connection) -> StorageResult<Option<i64>> {
        let affected = conn.execute(
            r#"
            INSERT OR IGNORE INTO word (
                word, meaning, part_of_speech, example, cefr_level,
                is_learned, is_prebuilt, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                self.word,
                self.meaning,
                self.part_of_speech,
                self.example,
                self.cefr_level,
                self.learned as i32,
                self.prebuilt as i32,
                format_datetime(self.created_at),
            ],
        )?;

        if affected == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// 更新数据库记录，返回是否命中
    pub fn update(&self, conn: &Connection) -> StorageResult<bool> {
        let affected = conn.execute(
            r#"
            UPDATE word SET
                word = ?2, meaning = ?3, part_of_speech = ?4, example = ?5,
                cefr_level = ?6, is_learned = ?7, is_prebuilt = ?8
            WHERE id = ?1
            "#,
            params![
                self.id,
                self.word,
                self.meaning,
                self.part_of_speech,
                self.example,
                self.cefr_level,
                self.learned as i32,
                self.prebuilt as i32,
            ],
        )?;
        Ok(affected > 0)
    }
}

// ============================================================
// Category - 分类
// ============================================================

/// 分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

/// 分类类型
///
/// 内置分类的成员关系由单词自身的 `cefr_level` 字段决定，
/// 自定义分类则通过 `word_category` 关联表维护。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind<'a> {
    /// 六个 CEFR 等级之一
    Cefr(&'a str),
    /// "User Added" 伪分类
    UserAdded,
    /// 用户自定义分类
    Custom(&'a str),
}

impl<'a> CategoryKind<'a> {
    pub fn classify(name: &'a str) -> Self {
        if name == USER_ADDED {
            CategoryKind::UserAdded
        } else if CEFR_LEVELS.contains(&name) {
            CategoryKind::Cefr(name)
        } else {
            CategoryKind::Custom(name)
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, CategoryKind::Custom(_))
    }
}

// ============================================================
// Quiz - 测验结果
// ============================================================

/// 单道题的作答记录，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    /// 所属测验结果 ID，入库前为 0
    pub quiz_result_id: i64,
    /// 题目（单词拼写）
    pub word: String,
    /// 用户选择的释义
    pub user_answer: String,
    /// 正确释义
    pub correct_answer: String,
    pub is_correct: bool,
}

impl QuizQuestion {
    pub fn new(
        word: impl Into<String>,
        user_answer: impl Into<String>,
        correct_answer: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        Self {
            id: 0,
            quiz_result_id: 0,
            word: word.into(),
            user_answer: user_answer.into(),
            correct_answer: correct_answer.into(),
            is_correct,
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            quiz_result_id: row.get("quiz_result_id")?,
            word: row.get("word")?,
            user_answer: row.get("user_answer")?,
            correct_answer: row.get("correct_answer")?,
            is_correct: row.get::<_, i32>("is_correct")? != 0,
        })
    }

    /// 插入到数据库，`quiz_result_id` 由调用方指定
    pub fn insert(&self, conn: &Connection, quiz_result_id: i64) -> StorageResult<i64> {
        conn.execute(
            r#"
            INSERT INTO quiz_question (
                quiz_result_id, word, user_answer, correct_answer, is_correct
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                quiz_result_id,
                self.word,
                self.user_answer,
                self.correct_answer,
                self.is_correct as i32,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// 测验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    /// 答对题数
    pub score: i64,
    /// 完成时间
    pub completed_at: DateTime<Utc>,
}

impl QuizResult {
    pub fn new(score: i64, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            score,
            completed_at,
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            score: row.get("score")?,
            completed_at: parse_datetime(row.get::<_, String>("completed_at")?),
        })
    }

    pub fn insert(&self, conn: &Connection) -> StorageResult<i64> {
        conn.execute(
            "INSERT INTO quiz_result (score, completed_at) VALUES (?1, ?2)",
            params![self.score, format_datetime(self.completed_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// 测验结果及其全部题目（按作答顺序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResultWithQuestions {
    pub result: QuizResult,
    pub questions: Vec<QuizQuestion>,
}

impl QuizResultWithQuestions {
    pub fn correct_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_correct).count()
    }
}

// ============================================================
// User - 用户
// ============================================================

/// 用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    /// bcrypt 哈希，不对外序列化
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

impl User {
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
        })
    }

    /// 按用户名查找
    pub fn find_by_username(conn: &Connection, username: &str) -> StorageResult<Option<Self>> {
        let user = conn
            .query_row(
                "SELECT id, name, username, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| Self::from_row(row),
            )
            .optional()?;
        Ok(user)
    }
}

// ============================================================
// 工具函数
// ============================================================

/// 解析日期时间字符串
pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    // 尝试多种格式
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return dt.with_timezone(&Utc);
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S") {
        return DateTime::from_naive_utc_and_offset(dt, Utc);
    }

    // 默认返回当前时间
    Utc::now()
}

/// 格式化日期时间为字符串
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_constructors() {
        let word = Word::prebuilt("apple", "a fruit", "noun", "I ate an apple.", "A1");
        assert!(word.prebuilt);
        assert!(!word.learned);
        assert!(!word.is_eligible());

        let added = Word::user_added("serendipity", "happy accident", "noun", "");
        assert!(added.is_user_added());
        assert!(!added.prebuilt);
        assert!(added.is_eligible());

        let placeholder = Word::placeholder("zyzzyva");
        assert_eq!(placeholder.word, "zyzzyva");
        assert!(placeholder.meaning.is_empty());
        assert!(placeholder.part_of_speech.is_empty());
        assert_eq!(placeholder.cefr_level, USER_ADDED);
    }

    #[test]
    fn test_category_kind_classify() {
        assert_eq!(CategoryKind::classify("B2"), CategoryKind::Cefr("B2"));
        assert_eq!(CategoryKind::classify(USER_ADDED), CategoryKind::UserAdded);
        assert_eq!(CategoryKind::classify("My Nouns"), CategoryKind::Custom("My Nouns"));
        assert!(CategoryKind::classify("C2").is_builtin());
        assert!(!CategoryKind::classify("b2").is_builtin());
    }

    #[test]
    fn test_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(format_datetime(now));
        assert_eq!(parsed.timestamp(), now.timestamp());
    }
}
