//! Processing strategy module for command replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! covering both CSV parsing and command dispatch. This allows different
//! processing implementations (synchronous, asynchronous batch) to be selected
//! at runtime. Both strategies share [`ServiceOptions`], which builds the
//! escrow service (restoring a state directory if one is configured) and
//! persists it again at the end of the run.

use crate::cli::StrategyType;
use crate::config::EscrowConfig;
use crate::core::EscrowService;
use crate::io::snapshot::{load_snapshot, save_snapshot};
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Trait for complete processing pipelines
///
/// Implementations read commands from `input_path`, replay them against the
/// escrow service and write the users report to `output`. Rejected commands
/// are logged and skipped; only fatal problems (unreadable input, corrupt
/// state directory, failed output) are returned as errors.
pub trait ProcessingStrategy: Send + Sync {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// How a strategy builds and persists its escrow service
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub config: EscrowConfig,
    /// Directory holding the state snapshot; `None` runs purely in memory
    pub state_dir: Option<PathBuf>,
}

impl ServiceOptions {
    pub fn new(config: EscrowConfig, state_dir: Option<PathBuf>) -> Self {
        Self { config, state_dir }
    }

    /// Build the service, restoring the state directory if configured
    pub fn open(&self) -> Result<EscrowService, String> {
        match &self.state_dir {
            Some(dir) => {
                let snapshot = load_snapshot(dir).map_err(|e| {
                    format!("Failed to load state from '{}': {}", dir.display(), e)
                })?;
                EscrowService::restore(self.config.clone(), snapshot)
                    .map_err(|e| format!("Failed to restore state: {}", e))
            }
            None => Ok(EscrowService::new(self.config.clone())),
        }
    }

    /// Persist the service into the state directory, if configured
    pub fn close(&self, service: &EscrowService) -> Result<(), String> {
        if let Some(dir) = &self.state_dir {
            save_snapshot(dir, &service.snapshot())
                .map_err(|e| format!("Failed to save state to '{}': {}", dir.display(), e))?;
        }
        Ok(())
    }
}

/// Factory function to create a processing strategy
///
/// `batch` is only used by the async strategy and defaults when absent.
pub fn create_strategy(
    strategy_type: StrategyType,
    options: ServiceOptions,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(options)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            options,
            batch.unwrap_or_default(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    #[test]
    fn test_options_without_state_dir_start_empty() {
        let options = ServiceOptions::default();

        let service = options.open().unwrap();

        assert!(service.ledger().all_users().is_empty());
        assert!(options.close(&service).is_ok());
    }

    #[test]
    fn test_options_persist_between_runs() {
        let dir = TempDir::new().unwrap();
        let config = EscrowConfig {
            admin_ids: vec![100],
            ..EscrowConfig::default()
        };
        let options = ServiceOptions::new(config, Some(dir.path().join("state")));

        let first = options.open().unwrap();
        first
            .admin()
            .grant_balance(100, 1, Decimal::new(500, 0))
            .unwrap();
        options.close(&first).unwrap();

        let second = options.open().unwrap();
        assert_eq!(second.ledger().balance(1), Decimal::new(500, 0));
    }
}
