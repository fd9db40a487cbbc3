pub mod app;
pub mod clock;
pub mod config;
pub mod feed;
pub mod logging;
pub mod lookup;
pub mod quiz;
pub mod session;
pub mod storage;
pub mod streak;

pub use app::VocabApp;
pub use config::Config;
