//! Command-line surface: server mode by default, or re-invoked by the
//! supervisor in `--proxy` child mode, or driven as the consistency-checking
//! load generator with `--gen` (spec.md §6).

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Theme {
    Dark,
    Light,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "notely", about = "Zero-downtime data migration framework")]
pub struct Cli {
    /// Host/port the REST façade and Deployment Controller bind to.
    #[arg(long, env = "NOTELY_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "NOTELY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "NOTELY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to the `SQLite` database file backing the Account Store.
    #[arg(long, env = "NOTELY_DB_PATH", default_value = "notely-accounts.db")]
    pub db_path: std::path::PathBuf,

    /// Path to the legacy shard's `SQLite` database, opened by proxy
    /// children on startup.
    #[arg(long, env = "NOTELY_LEGACY_DB_PATH", default_value = "notely-legacy.db")]
    pub legacy_db_path: std::path::PathBuf,

    /// Path to the new shard's `SQLite` database, opened by proxy children
    /// on startup.
    #[arg(long, env = "NOTELY_NEW_DB_PATH", default_value = "notely-new.db")]
    pub new_db_path: std::path::PathBuf,

    /// Launches the terminal UI. Not implemented by this core: accepted
    /// for wire compatibility with the CLI surface, rejected at startup.
    #[arg(long)]
    pub cli: bool,

    #[arg(long, value_enum, default_value_t = Theme::Dark, requires = "cli")]
    pub theme: Theme,

    /// Re-invokes this binary as a Data Proxy child process. Set by the
    /// Process Supervisor, not meant to be passed by an operator directly.
    #[arg(long)]
    pub proxy: bool,

    #[arg(long, requires = "proxy")]
    pub proxy_id: Option<u64>,

    #[arg(long, requires = "proxy")]
    pub proxy_port: Option<u16>,

    /// Runs the consistency-checking load generator against a running
    /// server instead of starting one.
    #[arg(long)]
    pub gen: bool,

    #[arg(long, default_value_t = 10)]
    pub concurrency: u32,

    #[arg(long, default_value_t = 20)]
    pub notes_per_account: u32,

    #[arg(long, default_value_t = 60)]
    pub rpm: u32,

    #[arg(long, env = "NOTELY_SERVER_ADDRESS", default_value = "http://127.0.0.1:8080")]
    pub server_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_to_server_mode() {
        let cli = Cli::parse_from(["notely"]);
        assert!(!cli.proxy);
        assert!(!cli.gen);
        assert_eq!(cli.port, 8080);
    }

    #[test]
    fn proxy_mode_carries_id_and_port() {
        let cli = Cli::parse_from(["notely", "--proxy", "--proxy-id", "2", "--proxy-port", "9001"]);
        assert!(cli.proxy);
        assert_eq!(cli.proxy_id, Some(2));
        assert_eq!(cli.proxy_port, Some(9001));
    }

    #[test]
    fn gen_mode_parses_load_gen_flags() {
        let cli = Cli::parse_from(["notely", "--gen", "--concurrency", "50", "--rpm", "120"]);
        assert!(cli.gen);
        assert_eq!(cli.concurrency, 50);
        assert_eq!(cli.rpm, 120);
    }
}
