//! SQLite store bootstrap and table provisioning.
//!
//! # Responsibility
//! - Open and configure the single writable SQLite connection.
//! - Provision one table per registered contract before first use.
//!
//! # Invariants
//! - The provisioned schema version is tracked via `PRAGMA user_version`.
//! - A store stamped with a newer version than configured is never opened.
//! - Provisioning only creates missing tables; existing tables are untouched.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory, open_store};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Creating one contract's table failed.
    Provision {
        table: String,
        source: rusqlite::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        configured_version: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Provision { table, source } => {
                write!(f, "failed to provision table `{table}`: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                configured_version,
            } => write!(
                f,
                "store schema version {db_version} is newer than configured {configured_version}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Provision { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
