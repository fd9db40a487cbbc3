//! 测验结果数据库操作模块
//!
//! 测验完成时一次性保存：先插入结果行取得 ID，再插入全部题目行，
//! 两步在同一事务中完成。

use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::models::{QuizQuestion, QuizResult, QuizResultWithQuestions};
use crate::storage::{StorageError, StorageResult};

/// 测验仓库
pub struct QuizRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuizRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }

    /// 原子保存测验结果及其题目，返回结果 ID
    pub fn save_result(
        &self,
        result: &QuizResult,
        questions: &[QuizQuestion],
    ) -> StorageResult<i64> {
        let mut conn = self.get_connection()?;

        let tx = conn.transaction()?;
        let result_id = Self::save_result_internal(&tx, result, questions)?;
        tx.commit()?;

        Ok(result_id)
    }

    /// 在调用方事务内保存结果与题目
    pub fn save_result_internal(
        conn: &Connection,
        result: &QuizResult,
        questions: &[QuizQuestion],
    ) -> StorageResult<i64> {
        let result_id = result.insert(conn)?;
        for question in questions {
            question.insert(conn, result_id)?;
        }
        Ok(result_id)
    }

    /// 测验历史，最近完成的在前，题目按作答顺序
    pub fn get_history(&self) -> StorageResult<Vec<QuizResultWithQuestions>> {
        let conn = self.get_connection()?;
        Self::get_history_internal(&conn)
    }

    pub fn count_results(&self) -> StorageResult<i64> {
        let conn = self.get_connection()?;
        let count = conn.query_row("SELECT COUNT(*) FROM quiz_result", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_questions(&self) -> StorageResult<i64> {
        let conn = self.get_connection()?;
        let count = conn.query_row("SELECT COUNT(*) FROM quiz_question", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_history_internal(conn: &Connection) -> StorageResult<Vec<QuizResultWithQuestions>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, score, completed_at
            FROM quiz_result
            ORDER BY completed_at DESC, id DESC
            "#,
        )?;
        let results = stmt
            .query_map([], |row| QuizResult::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, quiz_result_id, word, user_answer, correct_answer, is_correct
            FROM quiz_question
            ORDER BY quiz_result_id, id ASC
            "#,
        )?;
        let mut by_result: HashMap<i64, Vec<QuizQuestion>> = HashMap::new();
        for question in stmt.query_map(params![], |row| QuizQuestion::from_row(row))? {
            let question = question?;
            by_result
                .entry(question.quiz_result_id)
                .or_default()
                .push(question);
        }

        let history = results
            .into_iter()
            .map(|result| {
                let questions = by_result.remove(&result.id).unwrap_or_default();
                QuizResultWithQuestions { result, questions }
            })
            .collect();

        Ok(history)
    }
}
