//! In-memory quiz state machine.
//!
//! `AwaitingAnswer(i) -> AnswerRegistered(i) -> AwaitingAnswer(i + 1) ... -> Finished`.
//! Nothing here touches the store; dropping a session abandons the quiz.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use super::setup::validate_counts;
use super::{QuizError, SetupRejection, OPTIONS_PER_QUESTION};
use crate::storage::{QuizQuestion, QuizResult, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuizState {
    AwaitingAnswer(usize),
    AnswerRegistered(usize),
    Finished,
}

impl fmt::Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizState::AwaitingAnswer(i) => write!(f, "awaiting an answer to question {}", i + 1),
            QuizState::AnswerRegistered(i) => write!(f, "showing the answer to question {}", i + 1),
            QuizState::Finished => f.write_str("finished"),
        }
    }
}

/// One answer button: the meaning text of some pool word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOption {
    pub word_id: i64,
    pub meaning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub index: usize,
    /// Text of the word being asked about.
    pub prompt: String,
    pub options: Vec<QuizOption>,
    #[serde(skip)]
    correct_word_id: i64,
    #[serde(skip)]
    correct_meaning: String,
}

impl Question {
    fn build<R: Rng + ?Sized>(pool: &[Word], index: usize, rng: &mut R) -> Self {
        let correct = &pool[index];

        let mut distractors: Vec<&Word> = pool
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, word)| word)
            .collect();
        distractors.shuffle(rng);

        let mut options: Vec<&Word> = Vec::with_capacity(OPTIONS_PER_QUESTION);
        options.push(correct);
        options.extend(distractors.into_iter().take(OPTIONS_PER_QUESTION - 1));
        options.shuffle(rng);

        Self {
            index,
            prompt: correct.word.clone(),
            options: options
                .into_iter()
                .map(|word| QuizOption {
                    word_id: word.id,
                    meaning: word.meaning.clone(),
                })
                .collect(),
            correct_word_id: correct.id,
            correct_meaning: correct.meaning.clone(),
        }
    }

    pub fn correct_meaning(&self) -> &str {
        &self.correct_meaning
    }

    /// Position of the correct word among the options.
    pub fn correct_option(&self) -> Option<usize> {
        self.options
            .iter()
            .position(|option| option.word_id == self.correct_word_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub selected_meaning: String,
    pub correct_meaning: String,
    /// Correct answers so far, this one included.
    pub score: usize,
}

pub struct QuizSession {
    id: Uuid,
    category: Option<String>,
    pool: Vec<Word>,
    num_questions: usize,
    state: QuizState,
    current: Option<Question>,
    answers: Vec<QuizQuestion>,
    score: usize,
    saved_result_id: Option<i64>,
    rng: StdRng,
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("pool", &self.pool.len())
            .field("num_questions", &self.num_questions)
            .field("state", &self.state)
            .field("score", &self.score)
            .finish_non_exhaustive()
    }
}

impl QuizSession {
    /// Starts a quiz over an already randomly ordered pool.
    ///
    /// Question `i` asks about `pool[i]`.
    pub fn new(pool: Vec<Word>, num_questions: usize) -> Result<Self, SetupRejection> {
        Self::with_rng(pool, num_questions, StdRng::from_os_rng())
    }

    pub fn with_rng(
        pool: Vec<Word>,
        num_questions: usize,
        mut rng: StdRng,
    ) -> Result<Self, SetupRejection> {
        validate_counts(num_questions, pool.len())?;

        let first = Question::build(&pool, 0, &mut rng);
        let session = Self {
            id: Uuid::new_v4(),
            category: None,
            pool,
            num_questions,
            state: QuizState::AwaitingAnswer(0),
            current: Some(first),
            answers: Vec::with_capacity(num_questions),
            score: 0,
            saved_result_id: None,
            rng,
        };
        debug!(quiz = %session.id, pool = session.pool.len(), num_questions, "quiz session created");
        Ok(session)
    }

    pub(crate) fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn num_questions(&self) -> usize {
        self.num_questions
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.state == QuizState::Finished
    }

    /// The visible question, until the quiz finishes.
    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// Answers recorded so far, in ask order.
    pub fn answers(&self) -> &[QuizQuestion] {
        &self.answers
    }

    pub fn saved_result_id(&self) -> Option<i64> {
        self.saved_result_id
    }

    pub(crate) fn mark_saved(&mut self, result_id: i64) {
        self.saved_result_id = Some(result_id);
    }

    /// Registers the chosen option for the current question.
    ///
    /// Correctness compares the chosen option's meaning text with the
    /// correct word's meaning text, so two words sharing a meaning are
    /// interchangeable here.
    pub fn answer(&mut self, option_index: usize) -> Result<AnswerOutcome, QuizError> {
        let QuizState::AwaitingAnswer(index) = self.state else {
            return Err(QuizError::InvalidState {
                expected: "awaiting an answer",
                actual: self.state,
            });
        };
        let question = self.current.as_ref().ok_or(QuizError::InvalidState {
            expected: "a visible question",
            actual: self.state,
        })?;
        let option = question
            .options
            .get(option_index)
            .ok_or(QuizError::OptionOutOfRange(option_index))?;

        let is_correct = option.meaning == question.correct_meaning;
        self.answers.push(QuizQuestion::new(
            question.prompt.clone(),
            option.meaning.clone(),
            question.correct_meaning.clone(),
            is_correct,
        ));
        if is_correct {
            self.score += 1;
        }

        let outcome = AnswerOutcome {
            is_correct,
            selected_meaning: option.meaning.clone(),
            correct_meaning: question.correct_meaning.clone(),
            score: self.score,
        };
        self.state = QuizState::AnswerRegistered(index);
        debug!(quiz = %self.id, question = index, is_correct, "answer registered");
        Ok(outcome)
    }

    /// Moves past an answered question.
    pub fn advance(&mut self) -> Result<QuizState, QuizError> {
        let QuizState::AnswerRegistered(index) = self.state else {
            return Err(QuizError::InvalidState {
                expected: "an answered question",
                actual: self.state,
            });
        };

        let next = index + 1;
        if next >= self.num_questions {
            self.current = None;
            self.state = QuizState::Finished;
            debug!(quiz = %self.id, score = self.score, "quiz finished");
        } else {
            self.current = Some(Question::build(&self.pool, next, &mut self.rng));
            self.state = QuizState::AwaitingAnswer(next);
        }
        Ok(self.state)
    }

    /// Result row and question rows for a finished quiz.
    pub fn to_result(
        &self,
        completed_at: DateTime<Utc>,
    ) -> Result<(QuizResult, Vec<QuizQuestion>), QuizError> {
        if !self.is_finished() {
            return Err(QuizError::InvalidState {
                expected: "finished",
                actual: self.state,
            });
        }
        Ok((
            QuizResult::new(self.score as i64, completed_at),
            self.answers.clone(),
        ))
    }
}
