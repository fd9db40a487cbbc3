//! Dictionary lookup over the public free-dictionary REST API.
//!
//! `GET {base_url}{word}` (the word percent-encoded as one path segment) answers with a JSON array of entries. Only the
//! first meaning's first definition of an entry is ever used.

use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::storage::Word;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no usable definition")]
    Empty,
    #[error("invalid dictionary URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DictionaryEntry {
    pub word: String,
    #[serde(default)]
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Meaning {
    #[serde(rename = "partOfSpeech", default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Definition {
    pub definition: String,
    #[serde(default)]
    pub example: Option<String>,
}

impl DictionaryEntry {
    /// The entry as a user-added word, built from its first sense only.
    pub fn first_sense(&self) -> Option<Word> {
        let meaning = self.meanings.first()?;
        let definition = meaning.definitions.first()?;
        Some(Word::user_added(
            self.word.clone(),
            definition.definition.clone(),
            meaning.part_of_speech.clone(),
            definition.example.clone().unwrap_or_default(),
        ))
    }
}

/// First sense of the first entry, if any.
pub fn first_word(entries: &[DictionaryEntry]) -> Result<Word, LookupError> {
    entries
        .first()
        .and_then(DictionaryEntry::first_sense)
        .ok_or(LookupError::Empty)
}

pub fn parse_entries(body: &str) -> Result<Vec<DictionaryEntry>, LookupError> {
    Ok(serde_json::from_str(body)?)
}

/// Source of dictionary entries.
pub trait DictionaryLookup: Send + Sync + 'static {
    fn lookup(
        &self,
        word: &str,
    ) -> impl Future<Output = Result<Vec<DictionaryEntry>, LookupError>> + Send;
}

impl<T: DictionaryLookup> DictionaryLookup for Arc<T> {
    fn lookup(
        &self,
        word: &str,
    ) -> impl Future<Output = Result<Vec<DictionaryEntry>, LookupError>> + Send {
        (**self).lookup(word)
    }
}

#[derive(Clone)]
pub struct DictionaryClient {
    base_url: String,
    client: reqwest::Client,
}

impl DictionaryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { base_url, client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.dictionary_api_url.clone(), config.dictionary_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Entry URL for `word`; `?`, `#`, `/` and spaces are escaped.
    pub fn entry_url(&self, word: &str) -> Result<reqwest::Url, LookupError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| LookupError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(word.trim());
        Ok(url)
    }
}

impl DictionaryLookup for DictionaryClient {
    async fn lookup(&self, word: &str) -> Result<Vec<DictionaryEntry>, LookupError> {
        let url = self.entry_url(word)?;
        debug!(%url, "dictionary lookup");

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(?status, word = %word, "dictionary lookup rejected");
            return Err(LookupError::HttpStatus { status, body });
        }

        let body = resp.text().await?;
        parse_entries(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::USER_ADDED;

    const SERENDIPITY: &str = r#"[
        {
            "word": "serendipity",
            "phonetic": "/ˌsɛɹənˈdɪpɪti/",
            "meanings": [
                {
                    "partOfSpeech": "noun",
                    "definitions": [
                        {
                            "definition": "A combination of events which have come together by chance to make a surprisingly good or wonderful outcome.",
                            "example": "It was pure serendipity that we met.",
                            "synonyms": []
                        },
                        { "definition": "An unsought, unintended, and/or unexpected, but fortunate, discovery." }
                    ]
                },
                {
                    "partOfSpeech": "verb",
                    "definitions": [{ "definition": "To find by chance." }]
                }
            ]
        }
    ]"#;

    #[test]
    fn first_sense_uses_first_meaning_and_definition() {
        let entries = parse_entries(SERENDIPITY).unwrap();
        let word = first_word(&entries).unwrap();

        assert_eq!(word.word, "serendipity");
        assert_eq!(word.part_of_speech, "noun");
        assert!(word.meaning.starts_with("A combination of events"));
        assert_eq!(word.example, "It was pure serendipity that we met.");
        assert_eq!(word.cefr_level, USER_ADDED);
        assert!(!word.learned);
        assert!(!word.prebuilt);
    }

    #[test]
    fn missing_example_becomes_empty() {
        let entries = parse_entries(
            r#"[{"word":"run","meanings":[{"partOfSpeech":"verb","definitions":[{"definition":"To move swiftly."}]}]}]"#,
        )
        .unwrap();
        assert_eq!(first_word(&entries).unwrap().example, "");
    }

    #[test]
    fn empty_results_are_lookup_errors() {
        assert!(matches!(first_word(&[]), Err(LookupError::Empty)));

        let no_meanings = parse_entries(r#"[{"word":"zzz","meanings":[]}]"#).unwrap();
        assert!(matches!(first_word(&no_meanings), Err(LookupError::Empty)));

        let no_definitions =
            parse_entries(r#"[{"word":"zzz","meanings":[{"partOfSpeech":"noun","definitions":[]}]}]"#)
                .unwrap();
        assert!(matches!(first_word(&no_definitions), Err(LookupError::Empty)));
    }

    #[test]
    fn not_found_payload_is_not_an_entry_list() {
        let body = r#"{"title":"No Definitions Found","message":"Sorry pal","resolution":"Try again"}"#;
        assert!(matches!(parse_entries(body), Err(LookupError::Json(_))));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = DictionaryClient::new("http://localhost:9/entries/en", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:9/entries/en/");
    }

    #[test]
    fn entry_url_escapes_the_word() {
        let client = DictionaryClient::new("http://localhost:9/entries/en", Duration::from_secs(1));
        assert_eq!(
            client.entry_url("what?").unwrap().as_str(),
            "http://localhost:9/entries/en/what%3F"
        );
        assert_eq!(
            client.entry_url(" C# ").unwrap().as_str(),
            "http://localhost:9/entries/en/C%23"
        );
        assert_eq!(
            client.entry_url("ice cream").unwrap().as_str(),
            "http://localhost:9/entries/en/ice%20cream"
        );
        assert!(client.entry_url("and/or").unwrap().as_str().ends_with("/and%2For"));
    }
}
