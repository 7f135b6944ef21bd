//! Three-way reconciliation of a collection against a supplied record set.
//!
//! # Invariants
//! - All phases run inside one `IMMEDIATE` transaction; any failure drops the
//!   transaction before commit, so no phase is ever partially visible.
//! - After a successful run the collection holds exactly the keys present in
//!   the input, with field values taken from the input.
//! - Records without a usable key (null, or `0` for auto-generated keys) are
//!   always inserted as new rows.

use super::query::{FetchQuery, Selection};
use super::sql::{delete_rows, ensure_known_columns, insert_row, query_rows, update_rows};
use super::{GatewayError, GatewayResult};
use crate::contract::Contract;
use crate::record::Record;
use rusqlite::types::Value;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};

/// Row counts per reconciliation phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Reconciles `contract`'s table with `records` and commits.
///
/// # Errors
/// - `InvalidRecord` when any record is not a complete contract instance.
/// - `Db` for any store failure; nothing is committed in that case.
pub(crate) fn reconcile(
    conn: &mut Connection,
    contract: &Contract,
    records: Vec<Record>,
) -> GatewayResult<SyncOutcome> {
    if let Some(record) = records
        .iter()
        .find(|record| !contract.is_valid_record(record))
    {
        ensure_known_columns(contract, record)?;
        return Err(GatewayError::InvalidRecord {
            table: contract.table().to_string(),
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let primary_key = contract.primary_key_column();

    let current: BTreeMap<String, Value> = query_rows(
        &tx,
        contract.table(),
        &FetchQuery::new().projection([primary_key]),
    )?
    .into_iter()
    .filter_map(|row| row.get(primary_key).cloned())
    .filter_map(|value| key_text(&value).map(|key| (key, value)))
    .collect();

    let mut outcome = SyncOutcome::default();
    let mut retained = BTreeSet::new();
    for mut record in records {
        let key = record
            .get(primary_key)
            .filter(|value| !is_placeholder_key(contract, value))
            .and_then(key_text);

        match key {
            Some(key) if current.contains_key(&key) => {
                let id = record.remove(primary_key).unwrap_or(Value::Null);
                let selection = Selection::all().qualified_by_id(primary_key, id);
                outcome.updated += update_rows(&tx, contract, &record, &selection)?;
                retained.insert(key);
            }
            _ => {
                if record
                    .get(primary_key)
                    .is_some_and(|value| is_placeholder_key(contract, value))
                {
                    record.remove(primary_key);
                }
                outcome.inserted += insert_row(&tx, contract, &record)?;
            }
        }
    }

    for (key, id) in &current {
        if retained.contains(key) {
            continue;
        }
        let selection = Selection::all().qualified_by_id(primary_key, id.clone());
        outcome.deleted += delete_rows(&tx, contract, &selection)?;
    }

    tx.commit()?;
    Ok(outcome)
}

fn is_placeholder_key(contract: &Contract, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(0) => contract.primary_key_auto_generated(),
        _ => false,
    }
}

/// Comparable key text; SQLite integer affinity makes `1` and `"1"` equal.
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(value) => Some(value.to_string()),
        Value::Real(value) => Some(value.to_string()),
        Value::Text(value) => Some(value.clone()),
        Value::Blob(bytes) => Some(format!("{bytes:02x?}")),
    }
}
