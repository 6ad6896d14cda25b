//! Debug-file logging setup.
//!
//! Every invocation appends to `notification-debug.log` under the plugin
//! root. The log is the only place operational failures surface; the hook
//! protocol forbids writing diagnostics to stdout.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber writing to
/// `<plugin_root>/notification-debug.log`. Safe to call more than once;
/// subsequent calls are no-ops.
pub fn init(plugin_root: &Path, verbose: bool) {
    if !plugin_root.is_dir() && std::fs::create_dir_all(plugin_root).is_err() {
        // Nowhere to write; the hook contract forbids stdout noise, so run
        // without a log rather than failing the invocation.
        return;
    }
    let appender = tracing_appender::rolling::never(plugin_root, "notification-debug.log");

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(default_level.parse().unwrap_or_else(|_| tracing::Level::INFO.into()));

    let _ = tracing_subscriber::fmt()
        .with_writer(appender)
        .with_ansi(false)
        .with_env_filter(filter)
        .try_init();
}
