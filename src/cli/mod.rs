//! CLI entry point: argument parsing, logging setup, and command routing.

pub mod commands;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::analyzer::Status;
use crate::config::Config;
use crate::hooks::{Handler, HookEvent};
use crate::logging;

pub use commands::{Cli, Commands, ConfigAction};

pub struct CliApp;

impl CliApp {
    /// Parses arguments and executes the requested command. Exit codes:
    /// zero for every handled invocation (including suppressed ones),
    /// non-zero only for bad input or fatal config errors.
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        let plugin_root = resolve_plugin_root(cli.plugin_root.clone());
        logging::init(&plugin_root, cli.verbose);

        match cli.command {
            Commands::HandleHook { event } => {
                let hook_event: HookEvent = event.parse()?;
                let handler = Handler::new(&plugin_root)?;
                let result = handler.handle(hook_event, std::io::stdin().lock()).await;
                // Drain in-flight webhook sends before the process exits.
                handler.shutdown().await;
                result?;
                Ok(())
            }
            Commands::Test { message, status } => {
                let status = Status::from_tag(&status)
                    .ok_or_else(|| anyhow!("unknown status tag: {status}"))?;
                let handler = Handler::new(&plugin_root)?;
                handler.send_test(status, &message).await?;
                println!("Test notification sent ({status})");
                Ok(())
            }
            Commands::Version => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Commands::Config { action } => match action {
                ConfigAction::Show => {
                    let config = Config::load_from_plugin_root(&plugin_root)?;
                    config.validate()?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                    Ok(())
                }
            },
        }
    }
}

fn resolve_plugin_root(flag: Option<PathBuf>) -> PathBuf {
    flag.filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."))
}
