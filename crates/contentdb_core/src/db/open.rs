//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the gateway.
//! - Provision contract tables before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have every contract table provisioned.

use super::schema::{provision, DEFAULT_SCHEMA_VERSION};
use super::DbResult;
use crate::config::{StoreConfig, DEFAULT_BUSY_TIMEOUT_MS};
use crate::contract::Contract;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct OpenSettings {
    schema_version: u32,
    busy_timeout: Duration,
}

impl Default for OpenSettings {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

/// Opens a SQLite store file and provisions `contracts`.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, contracts: &[Arc<Contract>]) -> DbResult<Connection> {
    open_with("file", || Connection::open(path), OpenSettings::default(), contracts)
}

/// Opens an in-memory SQLite store and provisions `contracts`.
pub fn open_db_in_memory(contracts: &[Arc<Contract>]) -> DbResult<Connection> {
    open_with(
        "memory",
        Connection::open_in_memory,
        OpenSettings::default(),
        contracts,
    )
}

/// Opens the store described by `config`.
///
/// A missing `db_path` selects an in-memory store.
pub fn open_store(config: &StoreConfig, contracts: &[Arc<Contract>]) -> DbResult<Connection> {
    let settings = OpenSettings {
        schema_version: config.schema_version,
        busy_timeout: Duration::from_millis(config.busy_timeout_ms),
    };
    match config.db_path.as_deref() {
        Some(path) => open_with("file", || Connection::open(path), settings, contracts),
        None => open_with("memory", Connection::open_in_memory, settings, contracts),
    }
}

fn open_with(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
    settings: OpenSettings,
    contracts: &[Arc<Contract>],
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, settings, contracts) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={} tables={} schema_version={}",
                mode,
                started_at.elapsed().as_millis(),
                contracts.len(),
                settings.schema_version
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    settings: OpenSettings,
    contracts: &[Arc<Contract>],
) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(settings.busy_timeout)?;
    provision(conn, settings.schema_version, contracts)?;
    Ok(())
}
