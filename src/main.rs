use std::process::ExitCode;

use vocab_builder::config::Config;
use vocab_builder::logging;
use vocab_builder::VocabApp;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config);

    let app = match VocabApp::open(&config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, db_path = %config.db_path.display(), "failed to open word store");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(db_path = %app.db_path(), "word store opened");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("add") => match args.get(1) {
            Some(text) => add(&app, text).await,
            None => usage(),
        },
        Some("lookup") => match args.get(1) {
            Some(text) => lookup(&app, text).await,
            None => usage(),
        },
        None | Some("status") => status(&app).await,
        Some(_) => usage(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn usage() -> CliResult {
    eprintln!("usage: vocab-builder [status | add <word> | lookup <word>]");
    Ok(())
}

async fn status(app: &VocabApp) -> CliResult {
    let words = app.all_words().await?;
    let learned = app.learned_count().await?;
    let streak = app.current_streak().await?;
    let history = app.quiz_history().await?;

    tracing::info!(
        words = words.len(),
        learned,
        streak = streak.current_streak,
        last_learning_date = ?streak.last_learning_date,
        quizzes = history.len(),
        user = ?app.current_session().map(|s| s.username),
        "status"
    );
    if let Some(word) = app.word_of_the_day().await? {
        tracing::info!(word = %word.word, meaning = %word.meaning, "word of the day");
    }
    Ok(())
}

async fn add(app: &VocabApp, text: &str) -> CliResult {
    let (word, inserted) = app.add_word_from_lookup(text).await?;
    tracing::info!(word = %word.word, meaning = %word.meaning, inserted, "add");
    Ok(())
}

async fn lookup(app: &VocabApp, text: &str) -> CliResult {
    for word in app.search_dictionary(text).await? {
        tracing::info!(word = %word.word, part_of_speech = %word.part_of_speech, meaning = %word.meaning, "definition");
    }
    Ok(())
}
