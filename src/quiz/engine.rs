//! Quiz setup and persistence on the store worker.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{QuizError, QuizSession, QuizSetup};
use crate::clock::Clock;
use crate::storage::{QuizRepository, StoreWorker};
use crate::streak::{self, LearningEvent, StreakState};

/// What finishing a quiz produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizCompletion {
    pub result_id: i64,
    pub score: usize,
    pub num_questions: usize,
    /// Streak after counting this quiz.
    pub streak: StreakState,
}

#[derive(Clone)]
pub struct QuizEngine {
    worker: StoreWorker,
    clock: Arc<dyn Clock>,
}

impl QuizEngine {
    pub fn new(worker: StoreWorker, clock: Arc<dyn Clock>) -> Self {
        Self { worker, clock }
    }

    /// Eligible words for an optional category.
    pub async fn available_words(&self, category: Option<String>) -> Result<usize, QuizError> {
        let count = self
            .worker
            .run(move |s| s.words().count_eligible_words(category.as_deref()))
            .await?;
        Ok(count.max(0) as usize)
    }

    /// Validates the setup, draws the candidate pool and builds the session.
    pub async fn start(&self, setup: QuizSetup) -> Result<QuizSession, QuizError> {
        let category = setup.category().map(str::to_string);
        let available = self.available_words(category.clone()).await?;
        if let Err(rejection) = setup.validate(available) {
            info!(?category, requested = setup.num_questions, available, %rejection, "quiz setup rejected");
            return Err(rejection.into());
        }

        let pool_category = category.clone();
        let limit = setup.pool_size();
        let pool = self
            .worker
            .run(move |s| s.words().get_random_eligible_words(pool_category.as_deref(), limit))
            .await?;

        let session = QuizSession::new(pool, setup.num_questions)?.with_category(category);
        info!(
            quiz = %session.id(),
            category = ?session.category(),
            num_questions = session.num_questions(),
            pool = session.pool_len(),
            "quiz started"
        );
        Ok(session)
    }

    /// Persists a finished quiz and counts it toward the streak.
    ///
    /// The result, its questions and the streak commit in one transaction.
    /// On any error nothing is written and the session is left untouched so
    /// the caller can retry or discard it.
    pub async fn complete(&self, session: &mut QuizSession) -> Result<QuizCompletion, QuizError> {
        if let Some(id) = session.saved_result_id() {
            return Err(QuizError::AlreadySaved(id));
        }

        let (result, questions) = session.to_result(self.clock.now())?;
        let today = self.clock.today();
        let (result_id, streak) = self
            .worker
            .run(move |s| {
                s.transaction(|conn| {
                    let result_id = QuizRepository::save_result_internal(conn, &result, &questions)?;
                    let (streak, _) = streak::record_learning_event_internal(
                        conn,
                        today,
                        LearningEvent::QuizCompleted,
                    )?;
                    Ok((result_id, streak))
                })
            })
            .await?;
        session.mark_saved(result_id);
        info!(
            quiz = %session.id(),
            result_id,
            score = session.score(),
            streak = streak.current_streak,
            "quiz result saved"
        );

        Ok(QuizCompletion {
            result_id,
            score: session.score(),
            num_questions: session.num_questions(),
            streak,
        })
    }
}
