//! I/O module
//!
//! Handles CSV parsing, the users report and state persistence.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, report serialization)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `snapshot` - Atomic save and load of the state directory

pub mod async_reader;
pub mod csv_format;
pub mod snapshot;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, write_users_csv, CommandCsvRecord};
pub use snapshot::{load_snapshot, save_snapshot};
pub use sync_reader::SyncReader;
