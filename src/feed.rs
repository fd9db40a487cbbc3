//! Observable query feeds.
//!
//! Each feed is a `watch` channel holding the latest full snapshot of one
//! query. Consumers subscribe explicitly; a store mutation asks for the
//! affected topics to be recomputed and only observed feeds pay for it.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::storage::{Category, QuizResultWithQuestions, Storage, StorageResult, StoreWorker, Word};
use crate::streak::StreakState;

pub type FeedReceiver<T> = watch::Receiver<Arc<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedTopic {
    AllWords,
    LearnedWords,
    Categories,
    QuizHistory,
    Streak,
}

impl FeedTopic {
    pub const WORDS: &'static [FeedTopic] = &[FeedTopic::AllWords, FeedTopic::LearnedWords];
}

pub struct Feed<T> {
    topic: FeedTopic,
    tx: watch::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Feed<T> {
    pub fn new(topic: FeedTopic, initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { topic, tx }
    }

    pub fn subscribe(&self) -> FeedReceiver<T> {
        self.tx.subscribe()
    }

    pub fn is_observed(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    /// Replaces the snapshot and wakes every receiver.
    pub fn publish(&self, snapshot: T) {
        self.tx.send_replace(Arc::new(snapshot));
        debug!(topic = ?self.topic, receivers = self.tx.receiver_count(), "feed published");
    }

    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.tx.borrow())
    }
}

/// All feeds exposed by the app.
///
/// Each feed is shared with the store worker, which publishes the snapshot
/// from inside the job that queried it.
pub struct Feeds {
    pub all_words: Arc<Feed<Vec<Word>>>,
    pub learned_words: Arc<Feed<Vec<Word>>>,
    pub categories: Arc<Feed<Vec<Category>>>,
    pub quiz_history: Arc<Feed<Vec<QuizResultWithQuestions>>>,
    pub streak: Arc<Feed<StreakState>>,
}

impl Default for Feeds {
    fn default() -> Self {
        Self {
            all_words: Arc::new(Feed::new(FeedTopic::AllWords, Vec::new())),
            learned_words: Arc::new(Feed::new(FeedTopic::LearnedWords, Vec::new())),
            categories: Arc::new(Feed::new(FeedTopic::Categories, Vec::new())),
            quiz_history: Arc::new(Feed::new(FeedTopic::QuizHistory, Vec::new())),
            streak: Arc::new(Feed::new(FeedTopic::Streak, StreakState::default())),
        }
    }
}

impl Feeds {
    fn is_observed(&self, topic: FeedTopic) -> bool {
        match topic {
            FeedTopic::AllWords => self.all_words.is_observed(),
            FeedTopic::LearnedWords => self.learned_words.is_observed(),
            FeedTopic::Categories => self.categories.is_observed(),
            FeedTopic::QuizHistory => self.quiz_history.is_observed(),
            FeedTopic::Streak => self.streak.is_observed(),
        }
    }

    /// Recomputes the observed feeds among `topics` on the store worker.
    ///
    /// The queries are queued behind the mutation that triggered them, so
    /// each snapshot reflects at least that write.
    pub async fn refresh(&self, worker: &StoreWorker, topics: &[FeedTopic]) -> StorageResult<()> {
        for &topic in topics {
            if !self.is_observed(topic) {
                continue;
            }
            self.refresh_topic(worker, topic).await?;
        }
        Ok(())
    }

    /// Recomputes one feed whether or not anyone is listening yet.
    pub async fn refresh_topic(&self, worker: &StoreWorker, topic: FeedTopic) -> StorageResult<()> {
        match topic {
            FeedTopic::AllWords => {
                recompute(worker, &self.all_words, |s| s.words().get_all_words()).await
            }
            FeedTopic::LearnedWords => {
                recompute(worker, &self.learned_words, |s| s.words().get_learned_words()).await
            }
            FeedTopic::Categories => {
                recompute(worker, &self.categories, |s| s.categories().get_all()).await
            }
            FeedTopic::QuizHistory => {
                recompute(worker, &self.quiz_history, |s| s.quizzes().get_history()).await
            }
            FeedTopic::Streak => {
                recompute(worker, &self.streak, |s| crate::streak::current_streak(s)).await
            }
        }
    }
}

/// Queries and publishes inside one store job.
///
/// Jobs run in submission order, so snapshots are published in commit order
/// and a slow caller can never overwrite a newer snapshot with an older one.
async fn recompute<T, Q>(worker: &StoreWorker, feed: &Arc<Feed<T>>, query: Q) -> StorageResult<()>
where
    T: Send + Sync + 'static,
    Q: FnOnce(&Storage) -> StorageResult<T> + Send + 'static,
{
    let feed = Arc::clone(feed);
    worker
        .run(move |s| {
            let snapshot = query(s)?;
            feed.publish(snapshot);
            Ok(())
        })
        .await
}
