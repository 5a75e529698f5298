use clap::Parser;
use setrace::cli::{Cli, Commands, RunArgs};
use setrace::config::AppConfig;
use setrace::error::{GameError, Result};
use tracing::{error, info};

mod main_runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = match cli.command {
        Some(Commands::Run(args)) => args,
        None => RunArgs::default(),
    };

    let mut config = AppConfig::load_from(&cli.config_dir)?;
    args.apply(&mut config);
    main_runtime::init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Invalid configuration: {}", e);
        }
        return Err(GameError::InvalidConfig(errors.join("; ")));
    }

    info!(
        rows = config.game.rows,
        columns = config.game.columns,
        humans = config.players.human,
        autonomous = config.players.autonomous,
        "starting game"
    );

    let outcome = main_runtime::run_game(&config, args.json_events).await?;
    info!(
        rounds = outcome.rounds,
        reason = %outcome.reason,
        winners = ?outcome.winners,
        scores = ?outcome.scores,
        "game over"
    );
    if args.json_events {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}
