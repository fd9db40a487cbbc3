//! Application façade.
//!
//! `VocabApp` owns the store worker, the observable feeds, the calendar and
//! the dictionary client. Every mutation goes through the worker, then the
//! feeds that depend on it are recomputed if anyone is watching.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::feed::{FeedReceiver, FeedTopic, Feeds};
use crate::lookup::{self, DictionaryClient, DictionaryLookup, LookupError};
use crate::quiz::{QuizCompletion, QuizEngine, QuizError, QuizSession, QuizSetup};
use crate::session::Session;
use crate::storage::user::{hash_password, verify_password};
use crate::storage::{
    Category, CategoryKind, QuizResultWithQuestions, Storage, StorageError, StorageResult,
    StoreWorker, User, Word, WordRepository,
};
use crate::streak::{self, LearningEvent, StreakState};

pub struct VocabApp<L = DictionaryClient> {
    worker: StoreWorker,
    feeds: Feeds,
    clock: Arc<dyn Clock>,
    lookup: L,
    quiz: QuizEngine,
    session: watch::Sender<Option<Session>>,
    db_path: String,
}

impl VocabApp<DictionaryClient> {
    /// Opens the configured database and restores any persisted login.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open(config: &Config) -> StorageResult<Self> {
        let storage = Storage::new(&config.db_path)?;
        let app = Self::with_parts(storage, DictionaryClient::from_config(config), Arc::new(SystemClock));
        app.restore_session().await?;
        Ok(app)
    }
}

impl<L: DictionaryLookup> VocabApp<L> {
    pub fn with_parts(storage: Storage, lookup: L, clock: Arc<dyn Clock>) -> Self {
        let db_path = storage.db_path().to_string();
        let worker = StoreWorker::spawn(storage);
        let quiz = QuizEngine::new(worker.clone(), Arc::clone(&clock));
        let (session, _) = watch::channel(None);

        Self {
            worker,
            feeds: Feeds::default(),
            clock,
            lookup,
            quiz,
            session,
            db_path,
        }
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    // ------------------------------------------------------------
    // Words
    // ------------------------------------------------------------

    /// Inserts a word; `None` when the text already exists.
    ///
    /// A new word counts toward today's streak in the same transaction, so
    /// a failed streak update leaves the word unsaved and returns the error.
    pub async fn add_word(&self, word: Word) -> StorageResult<Option<i64>> {
        let text = word.word.clone();
        let today = self.clock.today();
        let id = self
            .worker
            .run(move |s| {
                s.transaction(|conn| {
                    let id = word.insert(conn)?;
                    if id.is_some() {
                        streak::record_learning_event_internal(conn, today, LearningEvent::WordAdded)?;
                    }
                    Ok(id)
                })
            })
            .await?;

        match id {
            Some(id) => {
                info!(word = %text, id, "word added");
                self.refresh(&[FeedTopic::AllWords, FeedTopic::LearnedWords, FeedTopic::Streak])
                    .await;
            }
            None => debug!(word = %text, "word already exists"),
        }
        Ok(id)
    }

    /// Seeds or imports words in one transaction, skipping duplicates.
    pub async fn import_words(&self, words: Vec<Word>) -> StorageResult<usize> {
        let inserted = self.worker.run(move |s| s.words().insert_words(&words)).await?;
        info!(inserted, "words imported");
        if inserted > 0 {
            self.refresh(FeedTopic::WORDS).await;
        }
        Ok(inserted)
    }

    /// Returns the stored word with this text, inserting `word` if there is none.
    pub async fn find_or_insert_word(&self, word: Word) -> StorageResult<(Word, bool)> {
        let today = self.clock.today();
        let (stored, inserted) = self
            .worker
            .run(move |s| {
                s.transaction(|conn| {
                    let (stored, inserted) = WordRepository::find_or_insert_word_internal(conn, &word)?;
                    if inserted {
                        streak::record_learning_event_internal(conn, today, LearningEvent::WordAdded)?;
                    }
                    Ok((stored, inserted))
                })
            })
            .await?;

        if inserted {
            info!(word = %stored.word, id = stored.id, "word added");
            self.refresh(&[FeedTopic::AllWords, FeedTopic::LearnedWords, FeedTopic::Streak])
                .await;
        }
        Ok((stored, inserted))
    }

    /// Adds a word looked up in the dictionary.
    ///
    /// A word already in the store is returned as is without a lookup. When
    /// the lookup fails or has no usable sense, a placeholder holding just
    /// the text is stored instead.
    pub async fn add_word_from_lookup(&self, text: &str) -> StorageResult<(Word, bool)> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(StorageError::InvalidInput("word text is empty".to_string()));
        }

        if let Some(existing) = self.get_word_by_text(&text).await? {
            return Ok((existing, false));
        }

        let word = match self.lookup_first_sense(&text).await {
            Ok(word) => word,
            Err(e) => {
                warn!(word = %text, error = %e, "dictionary lookup failed, storing placeholder");
                Word::placeholder(text)
            }
        };
        self.find_or_insert_word(word).await
    }

    async fn lookup_first_sense(&self, text: &str) -> Result<Word, LookupError> {
        let entries = self.lookup.lookup(text).await?;
        lookup::first_word(&entries)
    }

    /// Dictionary search without touching the store.
    pub async fn search_dictionary(&self, text: &str) -> Result<Vec<Word>, LookupError> {
        let entries = self.lookup.lookup(text.trim()).await?;
        Ok(entries.iter().filter_map(|entry| entry.first_sense()).collect())
    }

    pub async fn update_word(&self, word: Word) -> StorageResult<bool> {
        let updated = self.worker.run(move |s| s.words().update_word(&word)).await?;
        if updated {
            self.refresh(FeedTopic::WORDS).await;
        }
        Ok(updated)
    }

    pub async fn delete_word(&self, id: i64) -> StorageResult<bool> {
        let deleted = self.worker.run(move |s| s.words().delete_word(id)).await?;
        if deleted {
            info!(id, "word deleted");
            self.refresh(FeedTopic::WORDS).await;
        }
        Ok(deleted)
    }

    /// Marks a word learned or not; returns whether it became newly learned.
    ///
    /// Becoming learned and the streak update commit together.
    pub async fn set_learned(&self, id: i64, learned: bool) -> StorageResult<bool> {
        let today = self.clock.today();
        let newly_learned = self
            .worker
            .run(move |s| {
                s.transaction(|conn| {
                    let newly_learned = WordRepository::set_learned_internal(conn, id, learned)?;
                    if newly_learned {
                        streak::record_learning_event_internal(conn, today, LearningEvent::WordLearned)?;
                    }
                    Ok(newly_learned)
                })
            })
            .await?;

        if newly_learned {
            info!(id, "word learned");
        }
        self.refresh(&[FeedTopic::AllWords, FeedTopic::LearnedWords, FeedTopic::Streak])
            .await;
        Ok(newly_learned)
    }

    pub async fn get_word(&self, id: i64) -> StorageResult<Option<Word>> {
        self.worker.run(move |s| s.words().get_word(id)).await
    }

    pub async fn get_word_by_text(&self, text: &str) -> StorageResult<Option<Word>> {
        let text = text.to_string();
        self.worker.run(move |s| s.words().get_word_by_text(&text)).await
    }

    pub async fn all_words(&self) -> StorageResult<Vec<Word>> {
        self.worker.run(|s| s.words().get_all_words()).await
    }

    pub async fn learned_words(&self) -> StorageResult<Vec<Word>> {
        self.worker.run(|s| s.words().get_learned_words()).await
    }

    /// Words of a CEFR level, the user-added words, or a custom category.
    pub async fn words_for_category(&self, name: &str) -> StorageResult<Vec<Word>> {
        let name = name.to_string();
        self.worker
            .run(move |s| s.words().get_words_for_category(&name))
            .await
    }

    pub async fn word_of_the_day(&self) -> StorageResult<Option<Word>> {
        self.worker.run(|s| s.words().get_word_of_the_day()).await
    }

    pub async fn learned_count(&self) -> StorageResult<i64> {
        self.worker.run(|s| s.words().count_learned_words()).await
    }

    // ------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------

    pub async fn categories(&self) -> StorageResult<Vec<Category>> {
        self.worker.run(|s| s.categories().get_all()).await
    }

    pub async fn create_category(&self, name: &str) -> StorageResult<Category> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("category name is empty".to_string()));
        }
        let category = self.worker.run(move |s| s.categories().create(&name)).await?;
        self.refresh(&[FeedTopic::Categories]).await;
        Ok(category)
    }

    /// Deletes a custom category; built-in categories are kept.
    pub async fn delete_category(&self, name: &str) -> StorageResult<bool> {
        let name = name.to_string();
        let deleted = self.worker.run(move |s| s.categories().delete(&name)).await?;
        if deleted {
            self.refresh(&[FeedTopic::Categories]).await;
        }
        Ok(deleted)
    }

    /// Adds a word to a custom category, creating the category if needed.
    ///
    /// CEFR levels and "User Added" follow the word's own tag and cannot be
    /// assigned by hand.
    pub async fn add_word_to_category(&self, word_id: i64, category: &str) -> StorageResult<Category> {
        let name = category.trim().to_string();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("category name is empty".to_string()));
        }
        if CategoryKind::classify(&name).is_builtin() {
            return Err(StorageError::InvalidInput(format!(
                "built-in category {name} cannot be assigned"
            )));
        }
        let category = self
            .worker
            .run(move |s| {
                let categories = s.categories();
                let category = categories.create(&name)?;
                categories.add_word(word_id, category.id)?;
                Ok(category)
            })
            .await?;
        self.refresh(&[FeedTopic::Categories]).await;
        Ok(category)
    }

    pub async fn remove_word_from_category(&self, word_id: i64, category: &str) -> StorageResult<bool> {
        let name = category.to_string();
        self.worker
            .run(move |s| {
                let categories = s.categories();
                match categories.get_by_name(&name)? {
                    Some(category) => categories.remove_word(word_id, category.id),
                    None => Ok(false),
                }
            })
            .await
    }

    pub async fn categories_for_word(&self, word_id: i64) -> StorageResult<Vec<Category>> {
        self.worker
            .run(move |s| s.categories().get_categories_for_word(word_id))
            .await
    }

    // ------------------------------------------------------------
    // Quizzes
    // ------------------------------------------------------------

    pub async fn quiz_available_words(&self, category: Option<&str>) -> Result<usize, QuizError> {
        self.quiz.available_words(category.map(str::to_string)).await
    }

    pub async fn start_quiz(&self, setup: QuizSetup) -> Result<QuizSession, QuizError> {
        self.quiz.start(setup).await
    }

    /// Saves a finished quiz and counts it toward today's streak.
    pub async fn complete_quiz(&self, session: &mut QuizSession) -> Result<QuizCompletion, QuizError> {
        let completion = self.quiz.complete(session).await?;
        self.refresh(&[FeedTopic::QuizHistory, FeedTopic::Streak]).await;
        Ok(completion)
    }

    pub async fn quiz_history(&self) -> StorageResult<Vec<QuizResultWithQuestions>> {
        self.worker.run(|s| s.quizzes().get_history()).await
    }

    // ------------------------------------------------------------
    // Streak
    // ------------------------------------------------------------

    pub async fn current_streak(&self) -> StorageResult<StreakState> {
        self.worker.run(|s| streak::current_streak(s)).await
    }

    /// Counts a learning event toward today's streak.
    pub async fn record_learning_event(&self, event: LearningEvent) -> StorageResult<StreakState> {
        let today = self.clock.today();
        let (state, _) = self
            .worker
            .run(move |s| streak::record_learning_event(s, today, event))
            .await?;
        Ok(state)
    }

    // ------------------------------------------------------------
    // Feeds
    // ------------------------------------------------------------

    pub async fn subscribe_all_words(&self) -> StorageResult<FeedReceiver<Vec<Word>>> {
        let rx = self.feeds.all_words.subscribe();
        self.feeds.refresh_topic(&self.worker, FeedTopic::AllWords).await?;
        Ok(rx)
    }

    pub async fn subscribe_learned_words(&self) -> StorageResult<FeedReceiver<Vec<Word>>> {
        let rx = self.feeds.learned_words.subscribe();
        self.feeds.refresh_topic(&self.worker, FeedTopic::LearnedWords).await?;
        Ok(rx)
    }

    pub async fn subscribe_categories(&self) -> StorageResult<FeedReceiver<Vec<Category>>> {
        let rx = self.feeds.categories.subscribe();
        self.feeds.refresh_topic(&self.worker, FeedTopic::Categories).await?;
        Ok(rx)
    }

    pub async fn subscribe_quiz_history(
        &self,
    ) -> StorageResult<FeedReceiver<Vec<QuizResultWithQuestions>>> {
        let rx = self.feeds.quiz_history.subscribe();
        self.feeds.refresh_topic(&self.worker, FeedTopic::QuizHistory).await?;
        Ok(rx)
    }

    pub async fn subscribe_streak(&self) -> StorageResult<FeedReceiver<StreakState>> {
        let rx = self.feeds.streak.subscribe();
        self.feeds.refresh_topic(&self.worker, FeedTopic::Streak).await?;
        Ok(rx)
    }

    async fn refresh(&self, topics: &[FeedTopic]) {
        if let Err(e) = self.feeds.refresh(&self.worker, topics).await {
            warn!(?topics, error = %e, "feed refresh failed");
        }
    }

    // ------------------------------------------------------------
    // Users and session
    // ------------------------------------------------------------

    /// Creates an account; `None` when the username is taken.
    ///
    /// Hashing runs on the blocking pool, not on the store worker.
    pub async fn register(&self, name: &str, username: &str, password: &str) -> StorageResult<Option<User>> {
        let password = password.to_string();
        let password_hash =
            off_worker(move || hash_password(&password, bcrypt::DEFAULT_COST)).await?;

        let (name, username) = (name.to_string(), username.to_string());
        self.worker
            .run(move |s| s.users().insert_user(&name, &username, &password_hash))
            .await
    }

    /// Checks credentials and starts a session; `None` on a mismatch.
    pub async fn login(&self, username: &str, password: &str) -> StorageResult<Option<Session>> {
        let lookup_name = username.to_string();
        let user = self
            .worker
            .run(move |s| s.users().find_by_username(&lookup_name))
            .await?;
        let Some(user) = user else {
            info!(username = %username, "login rejected");
            return Ok(None);
        };

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        if !off_worker(move || verify_password(&password, &password_hash)).await? {
            info!(username = %username, "login rejected");
            return Ok(None);
        }

        let session = Session::from(user);
        let persisted = session.clone();
        self.worker
            .run(move |s| s.transaction(|conn| persisted.persist(conn)))
            .await?;

        self.session.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    pub async fn logout(&self) -> StorageResult<()> {
        self.worker.run(|s| s.transaction(Session::clear)).await?;
        self.session.send_replace(None);
        Ok(())
    }

    /// Reloads the persisted login, if any.
    pub async fn restore_session(&self) -> StorageResult<Option<Session>> {
        let session = self.worker.run(|s| Session::restore(s)).await?;
        if let Some(session) = &session {
            info!(username = %session.username, "session restored");
        }
        self.session.send_replace(session.clone());
        Ok(session)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

/// Runs CPU-heavy work on the blocking pool so queued store jobs keep moving.
async fn off_worker<F, T>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))?
}
