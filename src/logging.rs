//! Logger setup for the `log` facade, backed by log4rs.
//!
//! Every record goes to stdout and, when a log file is given, is appended to
//! it with a local timestamp. The returned handle allows the level to be
//! changed once the configuration file has been read.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;

/// Line layout, e.g. `[14:03:07.125] WARN  Humidity 120.0% ...`.
const LOG_PATTERN: &str = "[{d(%H:%M:%S%.3f)}] {l:<5} {m}{n}";

const CONSOLE: &str = "console";
const LOGFILE: &str = "logfile";

fn encoder() -> Box<PatternEncoder> {
    Box::new(PatternEncoder::new(LOG_PATTERN))
}

/// Builds a configuration writing to stdout and optionally to `log_path`.
pub fn build_config(level: LevelFilter, log_path: Option<&Path>) -> Result<Config> {
    let console = ConsoleAppender::builder().encoder(encoder()).build();

    let mut builder =
        Config::builder().appender(Appender::builder().build(CONSOLE, Box::new(console)));
    let mut root = Root::builder().appender(CONSOLE);

    if let Some(path) = log_path {
        let logfile = FileAppender::builder()
            .encoder(encoder())
            .build(path)
            .with_context(|| format!("Cannot open log file {}", path.display()))?;
        builder = builder.appender(Appender::builder().build(LOGFILE, Box::new(logfile)));
        root = root.appender(LOGFILE);
    }

    builder
        .build(root.build(level))
        .context("Invalid logger configuration")
}

/// Installs the global logger.
pub fn init(level: LevelFilter, log_path: Option<&Path>) -> Result<Handle> {
    let config = build_config(level, log_path)?;
    log4rs::init_config(config).map_err(|e| anyhow!("Failed to install logger: {}", e))
}

/// Replaces the active configuration, e.g. with the level from config.json.
pub fn set_level(handle: &Handle, level: LevelFilter, log_path: Option<&Path>) -> Result<()> {
    handle.set_config(build_config(level, log_path)?);
    Ok(())
}
