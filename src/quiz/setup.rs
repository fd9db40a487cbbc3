use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{MIN_QUESTIONS, OPTIONS_PER_QUESTION, POOL_FACTOR};

/// What the user asked for before a quiz begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSetup {
    /// `None` quizzes over every eligible word.
    pub category: Option<String>,
    pub num_questions: usize,
}

impl QuizSetup {
    pub fn new(num_questions: usize) -> Self {
        Self {
            category: None,
            num_questions,
        }
    }

    /// Surrounding whitespace is dropped; blank names mean "no category".
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        let category = category.trim();
        self.category = if category.is_empty() {
            None
        } else {
            Some(category.to_string())
        };
        self
    }

    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Number of candidates to draw from the store.
    pub fn pool_size(&self) -> usize {
        self.num_questions.saturating_mul(POOL_FACTOR)
    }

    /// Checks the start precondition against the eligible word count.
    pub fn validate(&self, available: usize) -> Result<(), SetupRejection> {
        validate_counts(self.num_questions, available)
    }
}

pub(crate) fn validate_counts(requested: usize, available: usize) -> Result<(), SetupRejection> {
    if requested < MIN_QUESTIONS {
        return Err(SetupRejection::TooFewQuestions { requested });
    }
    if available < OPTIONS_PER_QUESTION {
        return Err(SetupRejection::NotEnoughWords { available });
    }
    if requested > available {
        return Err(SetupRejection::MoreThanAvailable {
            requested,
            available,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum SetupRejection {
    #[error("a quiz must have at least {} words (asked for {requested})", MIN_QUESTIONS)]
    TooFewQuestions { requested: usize },

    #[error(
        "not enough words for a quiz: {available} available, at least {} needed",
        OPTIONS_PER_QUESTION
    )]
    NotEnoughWords { available: usize },

    #[error("you don't have that many words available ({requested} requested, {available} available)")]
    MoreThanAvailable { requested: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_short_quizzes_first() {
        assert_eq!(
            QuizSetup::new(3).validate(0),
            Err(SetupRejection::TooFewQuestions { requested: 3 })
        );
    }

    #[test]
    fn rejects_tiny_pools() {
        assert_eq!(
            QuizSetup::new(4).validate(3),
            Err(SetupRejection::NotEnoughWords { available: 3 })
        );
    }

    #[test]
    fn rejects_more_than_available() {
        let err = QuizSetup::new(12).validate(10).unwrap_err();
        assert_eq!(
            err,
            SetupRejection::MoreThanAvailable {
                requested: 12,
                available: 10
            }
        );
        assert!(err.to_string().contains("don't have that many"));
    }

    #[test]
    fn accepts_exact_fit() {
        assert!(QuizSetup::new(4).validate(4).is_ok());
        assert!(QuizSetup::new(10).validate(10).is_ok());
    }

    #[test]
    fn blank_category_means_all_words() {
        let setup = QuizSetup::new(5).with_category("  ");
        assert_eq!(setup.category(), None);

        let setup = QuizSetup::new(5).with_category("B2");
        assert_eq!(setup.category(), Some("B2"));
        assert_eq!(setup.pool_size(), 20);
    }

    #[test]
    fn category_name_is_trimmed() {
        let setup = QuizSetup::new(5).with_category(" A1\t");
        assert_eq!(setup.category(), Some("A1"));
    }

    #[test]
    fn rejection_messages_name_the_limits() {
        assert_eq!(
            SetupRejection::TooFewQuestions { requested: 2 }.to_string(),
            "a quiz must have at least 4 words (asked for 2)"
        );
        assert_eq!(
            SetupRejection::NotEnoughWords { available: 1 }.to_string(),
            "not enough words for a quiz: 1 available, at least 4 needed"
        );
    }

    proptest! {
        #[test]
        fn accepted_iff_precondition_holds(requested in 0usize..64, available in 0usize..64) {
            let accepted = QuizSetup::new(requested).validate(available).is_ok();
            let expected = requested >= 4 && requested <= available && available >= 4;
            prop_assert_eq!(accepted, expected);
        }
    }
}
