mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{day, test_app, test_app_with, user_words, StubDictionary};
use vocab_builder::storage::{StorageError, Word, USER_ADDED};
use vocab_builder::streak::{LearningEvent, StreakState};
use vocab_builder::VocabApp;

#[tokio::test]
async fn lookup_success_stores_first_sense() {
    let t = test_app_with(StubDictionary::default().with_word(
        "serendipity",
        "noun",
        "A fortunate discovery by chance.",
        Some("Meeting her was serendipity."),
    ));

    let (word, inserted) = t.app.add_word_from_lookup("  serendipity ").await.unwrap();
    assert!(inserted);
    assert_eq!(word.word, "serendipity");
    assert_eq!(word.meaning, "A fortunate discovery by chance.");
    assert_eq!(word.part_of_speech, "noun");
    assert_eq!(word.example, "Meeting her was serendipity.");
    assert_eq!(word.cefr_level, USER_ADDED);
    assert!(word.id > 0);
}

#[tokio::test]
async fn lookup_failure_falls_back_to_placeholder() {
    let t = test_app();

    let (word, inserted) = t.app.add_word_from_lookup("qwxz").await.unwrap();
    assert!(inserted);
    assert_eq!(word.word, "qwxz");
    assert_eq!(word.meaning, "");
    assert_eq!(word.cefr_level, USER_ADDED);
    assert_eq!(t.dictionary.calls(), 1);

    // known words skip the dictionary entirely
    let (again, inserted) = t.app.add_word_from_lookup("qwxz").await.unwrap();
    assert!(!inserted);
    assert_eq!(again.id, word.id);
    assert_eq!(t.dictionary.calls(), 1);
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let t = test_app();
    let err = t.app.add_word_from_lookup("   ").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidInput(_)));
    assert_eq!(t.dictionary.calls(), 0);
}

#[tokio::test]
async fn duplicate_text_is_ignored() {
    let t = test_app();
    let first = Word::user_added("apple", "a fruit", "noun", "");
    assert!(t.app.add_word(first.clone()).await.unwrap().is_some());
    assert!(t.app.add_word(first).await.unwrap().is_none());
    assert_eq!(t.app.all_words().await.unwrap().len(), 1);
}

#[tokio::test]
async fn streak_follows_the_calendar() {
    let t = test_app();

    t.app.add_word(Word::user_added("one", "1", "num", "")).await.unwrap();
    assert_eq!(
        t.app.current_streak().await.unwrap(),
        StreakState::new(Some(day(2024, 6, 1)), 1)
    );

    // same day: counted once
    t.app.add_word(Word::user_added("two", "2", "num", "")).await.unwrap();
    assert_eq!(t.app.current_streak().await.unwrap().current_streak, 1);

    t.clock.advance_days(1);
    let id = t.app.add_word(Word::prebuilt("three", "3", "num", "", "A1")).await.unwrap().unwrap();
    assert_eq!(t.app.current_streak().await.unwrap().current_streak, 2);

    t.clock.advance_days(1);
    assert!(t.app.set_learned(id, true).await.unwrap());
    assert_eq!(t.app.current_streak().await.unwrap().current_streak, 3);

    // relearning is not a new event
    t.clock.advance_days(1);
    assert!(!t.app.set_learned(id, true).await.unwrap());
    assert_eq!(
        t.app.current_streak().await.unwrap(),
        StreakState::new(Some(day(2024, 6, 3)), 3)
    );

    t.clock.advance_days(4);
    let state = t.app.record_learning_event(LearningEvent::QuizCompleted).await.unwrap();
    assert_eq!(state, StreakState::new(Some(day(2024, 6, 8)), 1));
}

#[tokio::test]
async fn concurrent_triggers_count_once_per_day() {
    let t = test_app();
    let app = &t.app;

    let (first, second) = tokio::join!(
        app.record_learning_event(LearningEvent::WordAdded),
        app.record_learning_event(LearningEvent::WordLearned),
    );
    assert_eq!(first.unwrap().current_streak, 1);
    assert_eq!(second.unwrap().current_streak, 1);
}

#[tokio::test]
async fn failed_streak_update_rolls_back_the_word() {
    let t = test_app();
    t.storage
        .get_connection()
        .unwrap()
        .execute("ALTER TABLE preferences RENAME TO preferences_moved", [])
        .unwrap();

    let err = t
        .app
        .add_word(Word::user_added("apple", "a fruit", "noun", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Database(_)));
    assert!(t.app.all_words().await.unwrap().is_empty());

    t.storage
        .get_connection()
        .unwrap()
        .execute("ALTER TABLE preferences_moved RENAME TO preferences", [])
        .unwrap();
    let id = t
        .app
        .add_word(Word::user_added("apple", "a fruit", "noun", ""))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(t.app.current_streak().await.unwrap().current_streak, 1);

    t.clock.advance_days(1);
    t.storage
        .get_connection()
        .unwrap()
        .execute("ALTER TABLE preferences RENAME TO preferences_moved", [])
        .unwrap();
    assert!(t.app.set_learned(id, true).await.is_err());
    assert!(!t.app.get_word(id).await.unwrap().unwrap().learned);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn word_feed_ends_on_latest_snapshot_under_concurrent_adds() {
    for round in 0..40 {
        let app = Arc::new(test_app().app);
        let rx = app.subscribe_all_words().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let app = Arc::clone(&app);
                tokio::spawn(async move {
                    app.add_word(Word::user_added(format!("w{i}"), format!("m{i}"), "noun", ""))
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        assert_eq!(rx.borrow().len(), 8, "round {round}");
    }
}

#[tokio::test]
async fn word_feeds_publish_full_snapshots() {
    let t = test_app();
    let mut all_rx = t.app.subscribe_all_words().await.unwrap();
    let mut learned_rx = t.app.subscribe_learned_words().await.unwrap();
    assert!(all_rx.borrow_and_update().is_empty());
    assert!(learned_rx.borrow_and_update().is_empty());

    let id = t
        .app
        .add_word(Word::user_added("apple", "a fruit", "noun", ""))
        .await
        .unwrap()
        .unwrap();
    all_rx.changed().await.unwrap();
    assert_eq!(all_rx.borrow_and_update().len(), 1);

    t.app.set_learned(id, true).await.unwrap();
    learned_rx.changed().await.unwrap();
    let learned = learned_rx.borrow_and_update().clone();
    assert_eq!(learned.len(), 1);
    assert!(learned[0].learned);

    t.app.delete_word(id).await.unwrap();
    all_rx.changed().await.unwrap();
    assert!(all_rx.borrow_and_update().is_empty());
}

#[tokio::test]
async fn categories_feed_and_builtins() {
    let t = test_app();
    let mut rx = t.app.subscribe_categories().await.unwrap();
    assert_eq!(rx.borrow_and_update().len(), 7);

    let word_id = t
        .app
        .add_word(Word::user_added("fjord", "a narrow inlet", "noun", ""))
        .await
        .unwrap()
        .unwrap();
    let travel = t.app.add_word_to_category(word_id, "Travel").await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().len(), 8);

    assert_eq!(t.app.categories_for_word(word_id).await.unwrap(), vec![travel]);
    assert!(!t.app.delete_category("B2").await.unwrap());
    assert!(t.app.delete_category("Travel").await.unwrap());
    assert!(t.app.categories_for_word(word_id).await.unwrap().is_empty());
    assert_eq!(t.app.categories().await.unwrap().len(), 7);
}

#[tokio::test]
async fn builtin_categories_cannot_be_assigned() {
    let t = test_app();
    let word_id = t
        .app
        .add_word(Word::prebuilt("ubiquitous", "found everywhere", "adj", "", "B2"))
        .await
        .unwrap()
        .unwrap();

    for name in ["A1", " C2 ", USER_ADDED] {
        let err = t.app.add_word_to_category(word_id, name).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)), "{name}");
    }
    assert!(t.app.categories_for_word(word_id).await.unwrap().is_empty());
    assert!(t.app.words_for_category("A1").await.unwrap().is_empty());
}

#[tokio::test]
async fn users_login_logout_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let config = vocab_builder::Config {
        db_path: dir.path().join("vocab.db"),
        dictionary_api_url: "http://127.0.0.1:9/".to_string(),
        dictionary_timeout: Duration::from_millis(100),
        ..vocab_builder::Config::default()
    };

    {
        let app = VocabApp::open(&config).await.unwrap();
        assert!(app.current_session().is_none());

        assert!(app.register("Alice", "alice", "hunter2").await.unwrap().is_some());
        assert!(app.register("Alicia", "alice", "other").await.unwrap().is_none());

        assert!(app.login("alice", "wrong").await.unwrap().is_none());
        assert!(app.current_session().is_none());

        let session = app.login("alice", "hunter2").await.unwrap().unwrap();
        assert_eq!(session.name, "Alice");
        assert_eq!(app.current_session(), Some(session));
        app.import_words(user_words(3)).await.unwrap();
    }

    let app = VocabApp::open(&config).await.unwrap();
    assert_eq!(app.current_session().unwrap().username, "alice");
    assert_eq!(app.all_words().await.unwrap().len(), 3);

    let mut session_rx = app.subscribe_session();
    app.logout().await.unwrap();
    session_rx.changed().await.unwrap();
    assert!(session_rx.borrow().is_none());
    assert!(app.restore_session().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn password_hashing_does_not_hold_up_the_store() {
    let app = Arc::new(test_app().app);

    let registering = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.register("Alice", "alice", "hunter2").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    app.add_word(Word::user_added("apple", "a fruit", "noun", ""))
        .await
        .unwrap();
    assert!(!registering.is_finished());
    assert!(registering.await.unwrap().unwrap().is_some());
}
