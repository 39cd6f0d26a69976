//! Run configuration via `bankcheck.toml`
//!
//! Every field has a default matching the command-line tool, so an empty
//! file (or no file) yields a runnable configuration. Flags given on the
//! command line override file values.

use crate::error::{BankError, BankResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Config file name conventionally placed next to the database.
pub const CONFIG_FILE_NAME: &str = "bankcheck.toml";

/// How workers obtain store connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPolicy {
    /// All callers share one recycled pool; a connection per unit of work.
    #[default]
    Pooled,
    /// Each long-lived worker holds one connection for its whole life.
    Dedicated,
    /// Every unit of work opens a fresh connection and closes it after.
    Ephemeral,
}

impl ConnectionPolicy {
    /// Name used in config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPolicy::Pooled => "pooled",
            ConnectionPolicy::Dedicated => "dedicated",
            ConnectionPolicy::Ephemeral => "ephemeral",
        }
    }
}

impl fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionPolicy {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pooled" => Ok(ConnectionPolicy::Pooled),
            "dedicated" => Ok(ConnectionPolicy::Dedicated),
            "ephemeral" => Ok(ConnectionPolicy::Ephemeral),
            other => Err(BankError::InvalidConfig(format!(
                "unknown connection policy '{}', expected pooled, dedicated or ephemeral",
                other
            ))),
        }
    }
}

/// Immutable run parameters.
///
/// # Example
///
/// ```toml
/// num_accounts = 1000
/// table_num = 4
/// concurrency = 32
/// connection_policy = "dedicated"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BankConfig {
    /// Accounts per shard.
    pub num_accounts: usize,
    /// Verification cadence in milliseconds.
    pub interval_ms: u64,
    /// Number of shard tables.
    pub table_num: usize,
    /// Transfer workers, and seeding workers per shard.
    pub concurrency: usize,
    /// Run the delayed-read / delayed-commit pools and the delayed checker.
    pub enable_long_txn: bool,
    /// Take row locks when a transfer transaction begins.
    pub pessimistic: bool,
    /// Connection lifetime policy.
    pub connection_policy: ConnectionPolicy,
    /// Seeding insert attempts; negative retries forever.
    pub retry_limit: i64,
    /// Fixed backoff between seeding attempts.
    pub retry_interval_ms: u64,
    /// Sustained verification failure tolerated before the run is declared broken.
    pub verify_timeout_ms: u64,
    /// Centre of the long-transaction delay window.
    pub long_txn_delay_ms: u64,
    /// Half-width of the long-transaction delay window.
    pub long_txn_jitter_ms: u64,
    /// Polling tick of the delay loop.
    pub delay_tick_ms: u64,
    /// Pause after a transfer worker fails to obtain a connection.
    pub acquire_backoff_ms: u64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            num_accounts: 1_000_000,
            interval_ms: 2_000,
            table_num: 1,
            concurrency: 200,
            enable_long_txn: true,
            pessimistic: false,
            connection_policy: ConnectionPolicy::Pooled,
            retry_limit: 200,
            retry_interval_ms: 5_000,
            verify_timeout_ms: 6 * 60 * 60 * 1_000,
            long_txn_delay_ms: 10 * 60 * 1_000,
            long_txn_jitter_ms: 10 * 1_000,
            delay_tick_ms: 1_000,
            acquire_backoff_ms: 1_000,
        }
    }
}

impl BankConfig {
    /// Verification cadence.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Seeding retry backoff.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Watchdog window.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    /// Shortest long-transaction delay.
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.long_txn_delay_ms.saturating_sub(self.long_txn_jitter_ms))
    }

    /// Longest long-transaction delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.long_txn_delay_ms.saturating_add(self.long_txn_jitter_ms))
    }

    /// Polling tick of the delay loop.
    pub fn delay_tick(&self) -> Duration {
        Duration::from_millis(self.delay_tick_ms)
    }

    /// Pause after a failed connection acquisition.
    pub fn acquire_backoff(&self) -> Duration {
        Duration::from_millis(self.acquire_backoff_ms)
    }

    /// Clamp a shard count below one up to one.
    pub fn normalized(mut self) -> Self {
        if self.table_num < 1 {
            self.table_num = 1;
        }
        self
    }

    /// Reject parameters the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> BankResult<()> {
        if self.num_accounts < 2 {
            return Err(BankError::InvalidConfig(format!(
                "num_accounts must be at least 2, got {}",
                self.num_accounts
            )));
        }
        if self.concurrency == 0 {
            return Err(BankError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.table_num == 0 {
            return Err(BankError::InvalidConfig(
                "table_num must be at least 1".to_string(),
            ));
        }
        if self.interval_ms == 0 {
            return Err(BankError::InvalidConfig(
                "interval_ms must be positive".to_string(),
            ));
        }
        if self.retry_limit == 0 {
            return Err(BankError::InvalidConfig(
                "retry_limit must be positive, or negative to retry forever".to_string(),
            ));
        }
        if self.delay_tick_ms == 0 {
            return Err(BankError::InvalidConfig(
                "delay_tick_ms must be positive".to_string(),
            ));
        }
        if self.long_txn_jitter_ms > self.long_txn_delay_ms {
            return Err(BankError::InvalidConfig(format!(
                "long_txn_jitter_ms ({}) exceeds long_txn_delay_ms ({})",
                self.long_txn_jitter_ms, self.long_txn_delay_ms
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# bankcheck configuration
#
# Accounts per shard; every account starts with balance 1000.
num_accounts = 1000000

# Number of shard tables: accounts, accounts1, accounts2, ...
table_num = 1

# Transfer workers (and seeding workers per shard).
concurrency = 200

# Verification cadence in milliseconds.
interval_ms = 2000

# Long transactions: extra delayed-read / delayed-commit transfer workers
# and a delayed verification checker.
enable_long_txn = true

# Take row locks when a transfer begins.
pessimistic = false

# "pooled", "dedicated" or "ephemeral".
connection_policy = "pooled"

# Seeding insert attempts (negative = forever) and backoff.
retry_limit = 200
retry_interval_ms = 5000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> BankResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BankError::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: BankConfig = toml::from_str(&content).map_err(|e| {
            BankError::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }
}
