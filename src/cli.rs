use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "setrace")]
#[command(version = "0.1.0")]
#[command(about = "Real-time set-matching card game", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, default_value = "config", global = true)]
    pub config_dir: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play one game until the deck runs out of sets or Ctrl-C
    Run(RunArgs),
}

/// Overrides applied on top of the loaded configuration
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Human players, driven by `<agent> <position>` lines on stdin
    #[arg(long)]
    pub humans: Option<usize>,

    /// Computer players
    #[arg(long)]
    pub autonomous: Option<usize>,

    /// Seed for shuffles and computer play
    #[arg(long)]
    pub seed: Option<u64>,

    /// Round length in milliseconds
    #[arg(long)]
    pub turn_timeout_ms: Option<u64>,

    /// Publish every set on the board each tick
    #[arg(long)]
    pub hints: bool,

    /// Write display events to stdout as JSON lines
    #[arg(long)]
    pub json_events: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(humans) = self.humans {
            config.players.human = humans;
        }
        if let Some(autonomous) = self.autonomous {
            config.players.autonomous = autonomous;
        }
        if let Some(seed) = self.seed {
            config.game.seed = Some(seed);
        }
        if let Some(timeout) = self.turn_timeout_ms {
            config.timing.turn_timeout_ms = timeout;
        }
        if self.hints {
            config.game.hints = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "setrace",
            "run",
            "--humans",
            "1",
            "--seed",
            "9",
            "--hints",
            "--config-dir",
            "/etc/setrace",
        ])
        .unwrap();
        assert_eq!(cli.config_dir, "/etc/setrace");

        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run subcommand");
        };
        let mut config = AppConfig::default_config();
        args.apply(&mut config);
        assert_eq!(config.players.human, 1);
        assert_eq!(config.players.autonomous, 2);
        assert_eq!(config.game.seed, Some(9));
        assert!(config.game.hints);
        assert!(!args.json_events);
    }

    #[test]
    fn test_no_subcommand_defaults() {
        let cli = Cli::try_parse_from(["setrace"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config_dir, "config");

        let mut config = AppConfig::default_config();
        RunArgs::default().apply(&mut config);
        assert_eq!(config.timing.turn_timeout_ms, 60_000);
    }
}
