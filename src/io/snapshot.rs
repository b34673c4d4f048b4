//! Durable state snapshots
//!
//! A state directory holds one CSV file per table:
//!
//! - `users.csv` - user rows
//! - `deals.csv` - deal records
//! - `withdrawals.csv` - withdrawal requests
//! - `ledger.csv` - the balance journal
//!
//! Each file is written to a temporary file in the same directory, synced and
//! then renamed over the previous version, so a crash leaves either the old or
//! the new file, never a torn one. A missing file loads as an empty table.

use crate::core::StateSnapshot;
use crate::types::EscrowError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const USERS_FILE: &str = "users.csv";
const DEALS_FILE: &str = "deals.csv";
const WITHDRAWALS_FILE: &str = "withdrawals.csv";
const LEDGER_FILE: &str = "ledger.csv";

/// Write every table of `snapshot` into `dir`, creating it if needed
pub fn save_snapshot(dir: &Path, snapshot: &StateSnapshot) -> Result<(), EscrowError> {
    fs::create_dir_all(dir)?;

    write_table(dir, USERS_FILE, &snapshot.users)?;
    write_table(dir, DEALS_FILE, &snapshot.deals)?;
    write_table(dir, WITHDRAWALS_FILE, &snapshot.withdrawals)?;
    write_table(dir, LEDGER_FILE, &snapshot.journal)?;

    info!(
        dir = %dir.display(),
        users = snapshot.users.len(),
        deals = snapshot.deals.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// Read the tables in `dir`; a missing directory yields an empty snapshot
pub fn load_snapshot(dir: &Path) -> Result<StateSnapshot, EscrowError> {
    Ok(StateSnapshot {
        users: read_table(dir, USERS_FILE)?,
        deals: read_table(dir, DEALS_FILE)?,
        withdrawals: read_table(dir, WITHDRAWALS_FILE)?,
        journal: read_table(dir, LEDGER_FILE)?,
    })
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> Result<(), EscrowError> {
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file_mut());
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    temp.persist(dir.join(name)).map_err(|e| e.error)?;
    debug!(table = name, rows = rows.len(), "Table written");
    Ok(())
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>, EscrowError> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(&path)?;
    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| {
                let line = e.position().map(|pos| pos.line());
                EscrowError::parse_error(line, format!("{}: {}", name, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EscrowConfig;
    use crate::core::EscrowService;
    use crate::types::{Currency, NewDeal};
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_raw(dir: &Path, name: &str, content: &str) -> Result<(), EscrowError> {
        let mut file = fs::File::create(dir.join(name))?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    fn busy_service() -> EscrowService {
        let service = EscrowService::new(EscrowConfig {
            admin_ids: vec![100],
            ..EscrowConfig::default()
        });
        service.ledger().register(2, Some("bob"));
        service.ledger().set_requisites(2, "card, 4242");
        service
            .admin()
            .grant_balance(100, 2, Decimal::new(2500050, 2))
            .unwrap();
        let deal = service
            .engine()
            .create_deal(NewDeal {
                seller_id: 1,
                product_info: "Gift \"rare\"".into(),
                currency: Currency::Usdt,
                amount: Decimal::new(100025, 2),
            })
            .unwrap();
        service.engine().pay(&deal.deal_id, 2).unwrap();
        service
            .withdrawals()
            .request_withdrawal(2, Decimal::new(10_000, 0), None)
            .unwrap();
        service
    }

    #[test]
    fn test_save_then_load_reproduces_state() {
        let dir = TempDir::new().unwrap();
        let snapshot = busy_service().snapshot();

        save_snapshot(dir.path(), &snapshot).unwrap();
        let loaded = load_snapshot(dir.path()).unwrap();

        assert_eq!(loaded, snapshot);
        assert!(dir.path().join(USERS_FILE).exists());
        assert!(dir.path().join(LEDGER_FILE).exists());
    }

    #[test]
    fn test_missing_directory_loads_empty() {
        let dir = TempDir::new().unwrap();

        let loaded = load_snapshot(&dir.path().join("never-written")).unwrap();

        assert_eq!(loaded, StateSnapshot::default());
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        save_snapshot(dir.path(), &busy_service().snapshot()).unwrap();

        save_snapshot(dir.path(), &StateSnapshot::default()).unwrap();

        assert_eq!(load_snapshot(dir.path()).unwrap(), StateSnapshot::default());
    }

    #[test]
    fn test_corrupt_table_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        save_snapshot(dir.path(), &busy_service().snapshot()).unwrap();
        write_raw(
            dir.path(),
            DEALS_FILE,
            "deal_id,seller_id\nABC123,not-a-number\n",
        )
        .unwrap();

        let result = load_snapshot(dir.path());

        match result {
            Err(EscrowError::ParseError { message, .. }) => assert!(message.contains("deals.csv")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
