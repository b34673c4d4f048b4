//! Asynchronous batch processing strategy
//!
//! This module provides an asynchronous, multi-threaded implementation of the
//! ProcessingStrategy trait. It replays commands in batches using thread-based
//! parallelism over groups of commands that share no state.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── ServiceOptions (escrow config, state directory)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (footprint partitioning + task spawning)
//!     └── CommandDispatcher
//!         └── EscrowService (ledger, deal store, withdrawal queue)
//! ```
//!
//! # Thread-Based Parallelism
//!
//! - Batches are processed one after another
//! - Within a batch, commands touching a common user, deal or the withdrawal
//!   queue form one group that runs in file order as one tokio task
//! - Groups share no state, so running them in parallel gives the same result
//!   as the sync strategy for any batch size

use crate::core::{BatchProcessor, CommandDispatcher};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_users_csv;
use crate::strategy::{ProcessingStrategy, ServiceOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for batch processing
///
/// Controls how commands are batched and the number of worker threads
/// for parallel processing within each batch.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size, default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                "Invalid max_concurrent_batches ({}), using default ({})",
                max_concurrent_batches, default.max_concurrent_batches
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
///
/// Commands are read in batches and processed batch by batch. Within each
/// batch they are partitioned into independent groups that run in parallel
/// across the runtime's worker threads.
///
/// # Configuration
///
/// - `batch_size`: Number of commands per batch (default: 1000)
/// - `max_concurrent_batches`: Number of worker threads (default: CPU cores)
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    options: ServiceOptions,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `options` - How to build and persist the escrow service
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    pub fn new(options: ServiceOptions, config: BatchConfig) -> Self {
        Self { options, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay commands from the input file and write the users report
    ///
    /// 1. Builds (or restores) the escrow service and a dispatcher over it
    /// 2. Creates a tokio multi-threaded runtime
    /// 3. Reads commands in batches from CSV using AsyncReader
    /// 4. Processes each batch and waits for it before reading the next
    /// 5. Persists the state directory, then writes the users report
    ///
    /// # Errors
    ///
    /// Fatal errors (file not found, corrupt state, runtime or output errors)
    /// are returned immediately. Rejected commands are logged and skipped.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let service = Arc::new(self.options.open()?);
        let processor = BatchProcessor::new(Arc::new(CommandDispatcher::new(Arc::clone(
            &service,
        ))));

        runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures::io, tokio files need the compat layer
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut replayed = 0usize;
            let mut rejected = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                replayed += results.len();
                rejected += results.iter().filter(|r| r.result.is_err()).count();
            }
            info!(replayed, rejected, "Command file replayed");

            Ok::<(), String>(())
        })?;

        // Persist before reporting so a failed write cannot lose the run
        self.options.close(&service)?;
        write_users_csv(&service.ledger().all_users(), output)?;

        Ok(())
    }
}
