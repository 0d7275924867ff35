//! Agora Node - command-line front end for the governance engine.
//!
//! Loads the TOML configuration, opens the persisted engine in the data
//! directory and applies a single command.

pub mod commands;
pub mod config;
pub mod telemetry;

use agora_governance::{Clock, Dao, ManualClock, SystemClock};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};

fn main() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    // Load or create config
    let mut config = match &cli.config {
        Some(path) => config::NodeConfig::from_file(path)?,
        None => config::NodeConfig::default(),
    };

    // Override with CLI args
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = "json".to_string();
    }

    config.validate()?;
    let _guard = telemetry::init_telemetry(&config.logging)?;

    if cli.command.needs_caller() && cli.caller.is_none() {
        anyhow::bail!("this command requires --caller (or AGORA_CALLER)");
    }

    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };

    debug!(data_dir = ?config.data_dir, "Opening governance state");
    let dao = Dao::open(&config.data_dir, &config.engine, clock)?;
    info!(generation = ?dao.generation(), now = dao.now(), "Engine ready");

    commands::execute(cli.command, &dao, cli.caller)
}

#[cfg(test)]
mod tests {
    use super::commands::{Cli, Commands};
    use agora_governance::VoteSupport;
    use agora_types::amount::tokens;
    use agora_types::Address;
    use clap::Parser;

    #[test]
    fn test_cli_args() {
        let cli = Cli::try_parse_from([
            "agora", "--data-dir", "/tmp/agora", "--now", "1700000000", "--caller", "alice",
            "vote", "3", "for", "--reason", "ship it",
        ])
        .unwrap();
        assert_eq!(cli.now, Some(1_700_000_000));
        assert_eq!(cli.caller, Some(Address::from_label("alice")));
        match cli.command {
            Commands::Vote { id, support, reason } => {
                assert_eq!(id, 3);
                assert_eq!(support, VoteSupport::For);
                assert_eq!(reason.as_deref(), Some("ship it"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_amounts_are_decimal_tokens() {
        let cli = Cli::try_parse_from(["agora", "stake", "12.5", "--caller", "bob"]).unwrap();
        match cli.command {
            Commands::Stake { amount } => assert_eq!(amount, tokens(25) / 2),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["agora", "stake", "1.2.3"]).is_err());
        assert!(Cli::try_parse_from(["agora", "vote", "1", "maybe"]).is_err());
    }
}
