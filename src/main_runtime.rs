use setrace::agents::forward_stdin;
use setrace::config::{AppConfig, LoggingConfig};
use setrace::coordination::{install_signal_handlers, Termination, TerminationReason};
use setrace::display::{DisplaySink, JsonLinesDisplay, TracingDisplay};
use setrace::error::Result;
use setrace::oracle::SetCardOracle;
use setrace::orchestrator::{GameOutcome, Orchestrator, OrchestratorConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},setrace=debug", config.level)));

    // `tracing_appender::rolling::daily` panics if it cannot create the first
    // file, so check the directory is writable before handing it over.
    let file_layer = config.dir.as_deref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Could not create log directory {log_dir} ({e}), file logging disabled"
            );
            return None;
        }
        let test_path = std::path::Path::new(log_dir).join(".setrace_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(log_dir, "setrace.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Flushes on drop; the process owns it until exit
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {log_dir} ({e}), file logging disabled"
                );
                None
            }
        }
    });

    // Console goes to stderr; stdout may carry JSON display events
    let (plain_layer, json_layer) = if config.json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(plain_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, config.dir.as_deref()) {
        eprintln!("Logging to: {dir}/setrace.log");
    }
}

/// Wire the collaborators, play one game and return how it ended
pub async fn run_game(config: &AppConfig, json_events: bool) -> Result<GameOutcome> {
    let termination = Termination::new();
    tokio::spawn(install_signal_handlers(termination.clone()));

    let display: Arc<dyn DisplaySink> = if json_events {
        Arc::new(JsonLinesDisplay::stdout())
    } else {
        Arc::new(TracingDisplay)
    };
    let oracle = Arc::new(SetCardOracle::new(
        config.game.feature_size,
        config.game.feature_count,
    ));

    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig::from(config),
        oracle,
        display,
        termination.clone(),
    );
    let senders = orchestrator.spawn_players(config.players.human, config.players.autonomous)?;
    if !senders.is_empty() {
        info!(
            humans = senders.len(),
            "reading `<agent> <position>` presses from stdin"
        );
        if let Err(e) = forward_stdin(senders, termination.clone()) {
            warn!(error = %e, "could not start input thread, humans cannot play");
        }
    }

    let outcome = orchestrator.run().await;
    // Releases the signal handler and the input thread
    termination.request(TerminationReason::GameOver);
    outcome
}
