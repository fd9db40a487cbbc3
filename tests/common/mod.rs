#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use vocab_builder::clock::{Clock, FixedClock};
use vocab_builder::lookup::{Definition, DictionaryEntry, DictionaryLookup, LookupError, Meaning};
use vocab_builder::storage::{Storage, Word};
use vocab_builder::VocabApp;

/// In-process dictionary that answers from a fixed table.
#[derive(Default)]
pub struct StubDictionary {
    entries: HashMap<String, Vec<DictionaryEntry>>,
    calls: AtomicUsize,
}

impl StubDictionary {
    pub fn with_word(mut self, word: &str, part_of_speech: &str, definition: &str, example: Option<&str>) -> Self {
        self.entries.insert(
            word.to_string(),
            vec![DictionaryEntry {
                word: word.to_string(),
                meanings: vec![Meaning {
                    part_of_speech: part_of_speech.to_string(),
                    definitions: vec![Definition {
                        definition: definition.to_string(),
                        example: example.map(str::to_string),
                    }],
                }],
            }],
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DictionaryLookup for StubDictionary {
    async fn lookup(&self, word: &str) -> Result<Vec<DictionaryEntry>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.entries.get(word) {
            Some(entries) => Ok(entries.clone()),
            None => Err(LookupError::Empty),
        }
    }
}

pub struct TestApp {
    pub app: VocabApp<Arc<StubDictionary>>,
    pub storage: Storage,
    pub clock: Arc<FixedClock>,
    pub dictionary: Arc<StubDictionary>,
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_app() -> TestApp {
    test_app_with(StubDictionary::default())
}

pub fn test_app_with(dictionary: StubDictionary) -> TestApp {
    let storage = Storage::in_memory().unwrap();
    let clock = Arc::new(FixedClock::on(day(2024, 6, 1)));
    let dictionary = Arc::new(dictionary);
    let app = VocabApp::with_parts(
        storage.clone(),
        Arc::clone(&dictionary),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    TestApp {
        app,
        storage,
        clock,
        dictionary,
    }
}

/// `n` user-added words `word0..` with distinct meanings.
pub fn user_words(n: usize) -> Vec<Word> {
    (0..n)
        .map(|i| Word::user_added(format!("word{i}"), format!("meaning {i}"), "noun", ""))
        .collect()
}
