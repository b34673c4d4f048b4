//! Escrow Engine CLI
//!
//! Replays escrow marketplace commands from a CSV file and prints the final
//! user balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --admin 100 commands.csv > users.csv
//! cargo run -- --strategy sync --state-dir ./state commands.csv > users.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 commands.csv > users.csv
//! ```
//!
//! The users report goes to stdout; logs go to stderr (`RUST_LOG` or
//! `--log-level`). With `--state-dir` the state is restored before the run and
//! saved after it.
//!
//! # Processing Strategies
//!
//! - **sync**: One command at a time in file order
//! - **async**: Batches split into independent groups on a multi-threaded runtime (default)
//!
//! # Exit Codes
//!
//! - 0: Success (individual rejected commands do not fail the run)
//! - 1: Error (file not found, corrupt state directory, output failure, etc.)

use escrow_engine::cli;
use escrow_engine::logging;
use escrow_engine::strategy;
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    logging::init_logging(&args.log_level);

    let strategy = {
        let batch = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), args.to_service_options(), batch)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!("{}", e);
        process::exit(1);
    }
}
