//! Multiple-choice quizzes on word meanings.
//!
//! - `setup`: the start precondition and its rejection reasons
//! - `session`: the in-memory question/answer state machine
//! - `engine`: pool fetch and result persistence on the store worker

pub mod engine;
pub mod session;
pub mod setup;

pub use engine::{QuizCompletion, QuizEngine};
pub use session::{AnswerOutcome, Question, QuizOption, QuizSession, QuizState};
pub use setup::{QuizSetup, SetupRejection};

use thiserror::Error;

use crate::storage::StorageError;

/// Options shown per question; also the smallest usable pool.
pub const OPTIONS_PER_QUESTION: usize = 4;
/// Shortest quiz that may be started.
pub const MIN_QUESTIONS: usize = 4;
/// Candidate words fetched per requested question.
pub const POOL_FACTOR: usize = 4;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("quiz cannot start: {0}")]
    SetupRejected(#[from] SetupRejection),

    #[error("quiz persistence failed: {0}")]
    Persistence(#[from] StorageError),

    #[error("invalid quiz state: expected {expected}, quiz is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: QuizState,
    },

    #[error("option {0} is out of range")]
    OptionOutOfRange(usize),

    #[error("quiz already saved as result {0}")]
    AlreadySaved(i64),
}
