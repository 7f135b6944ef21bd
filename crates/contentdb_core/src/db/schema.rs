//! Contract-driven table provisioning.
//!
//! # Invariants
//! - Provisioning runs in one transaction: either every table exists and the
//!   version stamp is written, or nothing changes.
//! - `user_version` is only ever raised, never lowered.

use crate::contract::Contract;
use crate::db::{DbError, DbResult};
use rusqlite::Connection;
use std::sync::Arc;

/// Version stamped on stores opened without explicit configuration.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// Creates missing contract tables and stamps `version`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store carries a newer stamp.
/// - `Provision` when a table's DDL fails; the transaction is rolled back.
pub fn provision(
    conn: &mut Connection,
    version: u32,
    contracts: &[Arc<Contract>],
) -> DbResult<()> {
    let current = current_user_version(conn)?;
    if current > version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            configured_version: version,
        });
    }

    let tx = conn.transaction()?;
    for contract in contracts {
        tx.execute_batch(&contract.create_table_sql())
            .map_err(|source| DbError::Provision {
                table: contract.table().to_string(),
                source,
            })?;
    }
    if current < version {
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    }
    tx.commit()?;

    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
