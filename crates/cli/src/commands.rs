//! Clap command definition.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the command-line interface.
pub fn build_cli() -> Command {
    Command::new("bankcheck")
        .about("Bank transfer consistency harness for transactional stores")
        .arg(
            Arg::new("db")
                .long("db")
                .help("SQLite database path (default: bank.db)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file (default: bankcheck.toml next to the database, if present)"),
        )
        .arg(
            Arg::new("accounts")
                .long("accounts")
                .help("Accounts per table")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("tables")
                .long("tables")
                .help("Number of account tables")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .help("Transfer workers, and seeding workers per table")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .help("Verification interval in milliseconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("retry-limit")
                .long("retry-limit")
                .help("Seeding insert attempts; negative retries forever")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i64)),
        )
        .arg(
            Arg::new("long-txn")
                .long("long-txn")
                .help("Enable long transactions (true/false)")
                .value_parser(value_parser!(bool)),
        )
        .arg(
            Arg::new("pessimistic")
                .long("pessimistic")
                .help("Take row locks when a transfer begins")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("long-conn")
                .long("long-conn")
                .help("Each worker holds one connection for its whole life")
                .action(ArgAction::SetTrue)
                .conflicts_with("short-conn-once"),
        )
        .arg(
            Arg::new("short-conn-once")
                .long("short-conn-once")
                .help("Open a fresh connection for every operation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("trace, debug, info, warn or error")
                .default_value("info"),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .help("Print the default config file and exit")
                .action(ArgAction::SetTrue),
        )
}
