//! Synchronous processing strategy
//!
//! Replays commands one at a time in file order, coordinating between the
//! `SyncReader` (CSV input) and the `CommandDispatcher` (business logic). The
//! outcome is fully deterministic, which makes this the reference strategy
//! for the end-to-end fixtures.
//!
//! Memory stays proportional to the escrow state (users, deals, journal), not
//! to the length of the command file.

use crate::core::CommandDispatcher;
use crate::io::csv_format::write_users_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, ServiceOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    options: ServiceOptions,
}

impl SyncProcessingStrategy {
    pub fn new(options: ServiceOptions) -> Self {
        Self { options }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let reader = SyncReader::new(input_path)?;
        let service = Arc::new(self.options.open()?);
        let dispatcher = CommandDispatcher::new(Arc::clone(&service));

        let mut replayed = 0usize;
        let mut rejected = 0usize;
        for result in reader {
            match result {
                Ok(command) => {
                    replayed += 1;
                    // Rejections are logged by the dispatcher
                    if dispatcher.dispatch(&command).is_err() {
                        rejected += 1;
                    }
                }
                Err(e) => warn!("CSV parsing error: {}", e),
            }
        }
        info!(replayed, rejected, "Command file replayed");

        // Persist before reporting so a failed write cannot lose the run
        self.options.close(&service)?;
        write_users_csv(&service.ledger().all_users(), output)?;

        Ok(())
    }
}
