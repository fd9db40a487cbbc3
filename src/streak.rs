//! Day-granularity learning streak.
//!
//! The state is two scalars kept in the preferences table. Updates run
//! inside one transaction on the store worker, so concurrent triggers are
//! totally ordered and a reader never sees the date without its count.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{PreferenceRepository, Storage, StorageResult};

pub const LAST_LEARNING_DATE_KEY: &str = "last_learning_date";
pub const CURRENT_STREAK_KEY: &str = "current_streak";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Activity that counts toward the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningEvent {
    WordLearned,
    WordAdded,
    QuizCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreakUpdate {
    /// Already counted today.
    Unchanged,
    /// Last activity was yesterday.
    Extended,
    /// First activity ever, or the chain was broken.
    Restarted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub last_learning_date: Option<NaiveDate>,
    pub current_streak: i64,
}

impl StreakState {
    pub fn new(last_learning_date: Option<NaiveDate>, current_streak: i64) -> Self {
        Self {
            last_learning_date,
            current_streak,
        }
    }

    /// Applies one qualifying event on `today`.
    pub fn advance(self, today: NaiveDate) -> (Self, StreakUpdate) {
        if self.last_learning_date == Some(today) {
            return (self, StreakUpdate::Unchanged);
        }

        let yesterday = today.pred_opt();
        let (current_streak, update) = match self.last_learning_date {
            Some(last) if Some(last) == yesterday => (self.current_streak + 1, StreakUpdate::Extended),
            _ => (1, StreakUpdate::Restarted),
        };

        (
            Self {
                last_learning_date: Some(today),
                current_streak,
            },
            update,
        )
    }

    /// Reads the persisted state. Missing or unreadable values count as no history.
    pub fn load(conn: &Connection) -> StorageResult<Self> {
        let last_learning_date = PreferenceRepository::get_internal(conn, LAST_LEARNING_DATE_KEY)?
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok());
        let current_streak = PreferenceRepository::get_i64_internal(conn, CURRENT_STREAK_KEY)?
            .unwrap_or(0)
            .max(0);

        Ok(Self {
            last_learning_date,
            current_streak,
        })
    }

    pub fn save(&self, conn: &Connection) -> StorageResult<()> {
        PreferenceRepository::set_internal(conn, CURRENT_STREAK_KEY, &self.current_streak.to_string())?;
        match self.last_learning_date {
            Some(date) => PreferenceRepository::set_internal(
                conn,
                LAST_LEARNING_DATE_KEY,
                &date.format(DATE_FORMAT).to_string(),
            ),
            None => PreferenceRepository::remove_internal(conn, LAST_LEARNING_DATE_KEY).map(|_| ()),
        }
    }
}

/// Reads and advances the streak in one transaction.
///
/// Must run on the store worker.
pub fn record_learning_event(
    storage: &Storage,
    today: NaiveDate,
    event: LearningEvent,
) -> StorageResult<(StreakState, StreakUpdate)> {
    storage.transaction(|conn| record_learning_event_internal(conn, today, event))
}

/// Streak step for callers that already hold a transaction, so the write
/// that earned the event and the streak commit together.
pub fn record_learning_event_internal(
    conn: &Connection,
    today: NaiveDate,
    event: LearningEvent,
) -> StorageResult<(StreakState, StreakUpdate)> {
    let previous = StreakState::load(conn)?;
    let (next, update) = previous.advance(today);

    match update {
        StreakUpdate::Unchanged => {
            debug!(?event, streak = next.current_streak, "streak already counted today");
        }
        _ => {
            next.save(conn)?;
            info!(
                ?event,
                ?update,
                streak = next.current_streak,
                date = %today,
                "learning streak updated"
            );
        }
    }

    Ok((next, update))
}

pub fn current_streak(storage: &Storage) -> StorageResult<StreakState> {
    let conn = storage.get_connection()?;
    StreakState::load(&conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_event_starts_at_one() {
        let (state, update) = StreakState::default().advance(date(2024, 5, 10));
        assert_eq!(state, StreakState::new(Some(date(2024, 5, 10)), 1));
        assert_eq!(update, StreakUpdate::Restarted);
    }

    #[test]
    fn same_day_is_a_no_op() {
        let today = date(2024, 5, 10);
        let state = StreakState::new(Some(today), 4);
        assert_eq!(state.advance(today), (state, StreakUpdate::Unchanged));
    }

    #[test]
    fn consecutive_day_extends() {
        let state = StreakState::new(Some(date(2024, 2, 29)), 6);
        let (next, update) = state.advance(date(2024, 3, 1));
        assert_eq!(next.current_streak, 7);
        assert_eq!(next.last_learning_date, Some(date(2024, 3, 1)));
        assert_eq!(update, StreakUpdate::Extended);
    }

    #[test]
    fn gap_resets_to_one() {
        let state = StreakState::new(Some(date(2024, 5, 5)), 12);
        let (next, update) = state.advance(date(2024, 5, 10));
        assert_eq!(next.current_streak, 1);
        assert_eq!(update, StreakUpdate::Restarted);
    }

    #[test]
    fn persisted_round_trip_through_storage() {
        let storage = Storage::in_memory().unwrap();
        let day = date(2024, 5, 10);

        let (state, _) = record_learning_event(&storage, day, LearningEvent::WordAdded).unwrap();
        assert_eq!(state.current_streak, 1);

        let (state, update) = record_learning_event(&storage, day, LearningEvent::QuizCompleted).unwrap();
        assert_eq!(update, StreakUpdate::Unchanged);
        assert_eq!(state.current_streak, 1);

        let next_day = day.succ_opt().unwrap();
        record_learning_event(&storage, next_day, LearningEvent::WordLearned).unwrap();

        let loaded = current_streak(&storage).unwrap();
        assert_eq!(loaded, StreakState::new(Some(next_day), 2));
        assert_eq!(
            storage.preferences().get(LAST_LEARNING_DATE_KEY).unwrap().as_deref(),
            Some("2024-05-11")
        );
    }

    #[test]
    fn corrupt_stored_values_are_treated_as_no_history() {
        let storage = Storage::in_memory().unwrap();
        let prefs = storage.preferences();
        prefs.set(LAST_LEARNING_DATE_KEY, "yesterday-ish").unwrap();
        prefs.set(CURRENT_STREAK_KEY, "many").unwrap();

        assert_eq!(current_streak(&storage).unwrap(), StreakState::default());
    }

    proptest! {
        #[test]
        fn advancing_twice_on_one_day_matches_once(
            offset in 0i64..3650,
            gap in 0i64..30,
            streak in 1i64..500,
        ) {
            let today = date(2015, 1, 1) + chrono::Duration::days(offset + 30);
            let last = today - chrono::Duration::days(gap);
            let state = StreakState::new(Some(last), streak);

            let (once, _) = state.advance(today);
            let (twice, update) = once.advance(today);

            prop_assert_eq!(once, twice);
            prop_assert_eq!(update, StreakUpdate::Unchanged);
            prop_assert!(once.current_streak >= 1);
        }
    }
}
