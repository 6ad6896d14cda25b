//! Command-line definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure.
#[derive(Parser)]
#[command(name = "claude-notifications")]
#[command(about = "Claude Code hook notification processor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Plugin root for config, assets, and the debug log
    #[arg(long, global = true, env = "CLAUDE_PLUGIN_ROOT")]
    pub plugin_root: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle a Claude Code hook event read from stdin
    #[command(name = "handle-hook")]
    HandleHook {
        /// Hook event kind: PreToolUse, Notification, Stop, or SubagentStop
        event: String,
    },

    /// Send a test notification through the configured channels
    Test {
        /// Message body to send
        message: String,

        /// Status tag to render the notification as
        #[arg(short, long, default_value = "task_complete")]
        status: String,
    },

    /// Print version information
    Version,

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration as JSON
    Show,
}
