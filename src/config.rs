use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./data/vocabulary.db";
pub const DEFAULT_DICTIONARY_API_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en/";
pub const DEFAULT_DICTIONARY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LOG_DIR: &str = "./logs";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub dictionary_api_url: String,
    pub dictionary_timeout: Duration,
    pub log_level: String,
    /// Also write logs to a daily rolling file under `log_dir`.
    pub file_logs: bool,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = var("VOCAB_DB_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let dictionary_api_url = var("DICTIONARY_API_URL")
            .filter(|value| value.starts_with("http://") || value.starts_with("https://"))
            .unwrap_or_else(|| DEFAULT_DICTIONARY_API_URL.to_string());

        let dictionary_timeout = var("DICTIONARY_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_DICTIONARY_TIMEOUT_MS));

        let log_level = var("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let file_logs = var("ENABLE_FILE_LOGS")
            .map(|value| value == "true" || value == "1")
            .unwrap_or(false);

        let log_dir = var("LOG_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        Self {
            db_path,
            dictionary_api_url,
            dictionary_timeout,
            log_level,
            file_logs,
            log_dir,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}
