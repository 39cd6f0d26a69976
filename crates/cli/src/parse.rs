//! ArgMatches to run options.
//!
//! The config file supplies the base configuration; flags given on the
//! command line override it.

use bankcheck_core::{BankConfig, BankError, BankResult, ConnectionPolicy, CONFIG_FILE_NAME};
use clap::ArgMatches;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Database path used when `--db` is absent.
pub const DEFAULT_DB: &str = "bank.db";

/// Everything `main` needs to start a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// SQLite database file
    pub db: PathBuf,
    /// Merged configuration
    pub config: BankConfig,
    /// Maximum log level
    pub log_level: Level,
}

/// Where to look for a config file.
fn config_path(matches: &ArgMatches, db: &Path) -> Option<PathBuf> {
    if let Some(path) = matches.get_one::<String>("config") {
        return Some(PathBuf::from(path));
    }
    let beside_db = db
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME);
    beside_db.exists().then_some(beside_db)
}

/// Parse a `--log-level` value.
pub fn parse_level(s: &str) -> BankResult<Level> {
    s.parse::<Level>()
        .map_err(|_| BankError::InvalidConfig(format!("unknown log level '{}'", s)))
}

/// Apply command-line overrides on top of `config`.
pub fn apply_overrides(matches: &ArgMatches, mut config: BankConfig) -> BankConfig {
    if let Some(&n) = matches.get_one::<usize>("accounts") {
        config.num_accounts = n;
    }
    if let Some(&n) = matches.get_one::<usize>("tables") {
        config.table_num = n;
    }
    if let Some(&n) = matches.get_one::<usize>("concurrency") {
        config.concurrency = n;
    }
    if let Some(&ms) = matches.get_one::<u64>("interval-ms") {
        config.interval_ms = ms;
    }
    if let Some(&n) = matches.get_one::<i64>("retry-limit") {
        config.retry_limit = n;
    }
    if let Some(&on) = matches.get_one::<bool>("long-txn") {
        config.enable_long_txn = on;
    }
    if matches.get_flag("pessimistic") {
        config.pessimistic = true;
    }
    if matches.get_flag("long-conn") {
        config.connection_policy = ConnectionPolicy::Dedicated;
    } else if matches.get_flag("short-conn-once") {
        config.connection_policy = ConnectionPolicy::Ephemeral;
    }
    config
}

/// Build the run options from parsed arguments.
///
/// # Errors
///
/// An unreadable or invalid config file, an unknown log level, or a
/// merged configuration that fails validation.
pub fn matches_to_options(matches: &ArgMatches) -> BankResult<RunOptions> {
    let db = PathBuf::from(
        matches
            .get_one::<String>("db")
            .map(String::as_str)
            .unwrap_or(DEFAULT_DB),
    );
    let base = match config_path(matches, &db) {
        Some(path) => BankConfig::from_file(&path)?,
        None => BankConfig::default(),
    };
    let config = apply_overrides(matches, base).normalized();
    config.validate()?;

    let log_level = parse_level(
        matches
            .get_one::<String>("log-level")
            .map(String::as_str)
            .unwrap_or("info"),
    )?;

    Ok(RunOptions {
        db,
        config,
        log_level,
    })
}
