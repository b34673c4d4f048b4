use crate::config::EscrowConfig;
use crate::strategy::{BatchConfig, ServiceOptions};
use crate::types::UserId;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Replay escrow marketplace commands and report user balances
#[derive(Parser, Debug)]
#[command(name = "escrow-engine")]
#[command(about = "Replay escrow marketplace commands and report user balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing command records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy to use for replaying commands
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Directory the state is restored from and saved to
    #[arg(
        long = "state-dir",
        value_name = "DIR",
        env = "ESCROW_STATE_DIR",
        help = "State directory; without it the run is purely in memory"
    )]
    pub state_dir: Option<PathBuf>,

    #[arg(
        long = "min-withdrawal",
        value_name = "AMOUNT",
        help = "Smallest withdrawal amount (default: 10000)"
    )]
    pub min_withdrawal: Option<Decimal>,

    #[arg(
        long = "unlimited-balance",
        value_name = "AMOUNT",
        help = "Balance set by the unlimited grant (default: 999999)"
    )]
    pub unlimited_balance: Option<Decimal>,

    /// Admin user ids, repeatable or comma separated
    #[arg(
        long = "admin",
        value_name = "USER_ID",
        env = "ESCROW_ADMIN_IDS",
        value_delimiter = ',',
        help = "User ids allowed to run admin commands"
    )]
    pub admins: Vec<UserId>,

    #[arg(
        long = "bot-username",
        value_name = "NAME",
        env = "ESCROW_BOT_USERNAME",
        help = "Bot handle used in deal links (default: escrow_bot)"
    )]
    pub bot_username: Option<String>,

    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        help = "Log filter used when RUST_LOG is not set"
    )]
    pub log_level: String,
}

/// Available processing strategies for command replay
#[derive(Clone, Debug, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Uses the CLI values when provided and falls back to defaults otherwise.
    /// Zero values are rejected by `BatchConfig::new` with a warning.
    ///
    /// # Returns
    ///
    /// A `BatchConfig` with values from CLI arguments or defaults.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an EscrowConfig from CLI arguments
    ///
    /// Missing values take the defaults; invalid ones fall back to the
    /// defaults with a warning.
    pub fn to_escrow_config(&self) -> EscrowConfig {
        let default = EscrowConfig::default();
        EscrowConfig::new(
            self.min_withdrawal.unwrap_or(default.min_withdrawal),
            self.unlimited_balance.unwrap_or(default.unlimited_balance),
            self.bot_username
                .clone()
                .unwrap_or(default.bot_username),
            self.admins.clone(),
        )
    }

    /// Escrow config plus state directory, as the strategies take them
    pub fn to_service_options(&self) -> ServiceOptions {
        ServiceOptions::new(self.to_escrow_config(), self.state_dir.clone())
    }
}
