//! Static schema descriptors for stored entity types.
//!
//! # Responsibility
//! - Describe one physical table: identity, primary key policy, columns and
//!   write-conflict policy.
//! - Derive the locators used to address the table's collection, items and
//!   sync endpoint.
//!
//! # Invariants
//! - A contract is immutable after `ContractBuilder::build`.
//! - The primary key column is always the first declared column.
//! - Table, column and authority names are validated identifiers, so they
//!   can be spliced into SQL text without quoting.
//!
//! # See also
//! - `crate::gateway` for how contracts are routed.

mod column;

pub use column::{Column, ColumnKind, ConflictStrategy};

use crate::locator::{Locator, SYNC_SEGMENT};
use crate::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static AUTHORITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+)*$").expect("valid authority regex")
});

const ITEM_TYPE_PREFIX: &str = "vnd.contentdb.item";
const LIST_TYPE_PREFIX: &str = "vnd.contentdb.dir";

/// Contract definition errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    InvalidAuthority(String),
    InvalidIdentifier(String),
    ReservedTableName(String),
    DuplicateColumn(String),
    MissingPrimaryKey,
    /// Auto-generated keys map onto SQLite rowids and must be integers.
    AutoGeneratedKeyNotInteger(String),
}

impl Display for ContractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAuthority(value) => write!(f, "invalid contract authority `{value}`"),
            Self::InvalidIdentifier(value) => write!(f, "invalid table or column name `{value}`"),
            Self::ReservedTableName(value) => write!(f, "table name `{value}` is reserved"),
            Self::DuplicateColumn(value) => write!(f, "column declared twice: `{value}`"),
            Self::MissingPrimaryKey => write!(f, "contract has no primary key column"),
            Self::AutoGeneratedKeyNotInteger(value) => write!(
                f,
                "auto-generated primary key `{value}` must be an integer column"
            ),
        }
    }
}

impl Error for ContractError {}

/// Immutable schema descriptor for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    authority: String,
    table: String,
    primary_key_auto_generated: bool,
    columns: Vec<Column>,
    conflict_strategy: ConflictStrategy,
}

impl Contract {
    /// Starts a contract definition for `table` under `authority`.
    pub fn builder(authority: impl Into<String>, table: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(authority, table)
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key_column(&self) -> &str {
        &self.columns[0].name
    }

    pub fn primary_key_auto_generated(&self) -> bool {
        self.primary_key_auto_generated
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order, primary key first.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.conflict_strategy
    }

    /// Returns whether `record` is a complete instance of this contract.
    ///
    /// The field set must equal the column set exactly. Unknown or missing
    /// names yield `false`, never an error.
    pub fn is_valid_record(&self, record: &Record) -> bool {
        if record.len() != self.columns.len() {
            return false;
        }
        self.columns
            .iter()
            .all(|column| record.contains_field(&column.name))
    }

    /// Aliased projection `table.col AS table_col` for every column.
    pub fn table_projection(&self) -> Vec<String> {
        self.projection_with_prefix(None)
    }

    /// Aliased projection with the table qualifier replaced by `prefix`.
    ///
    /// The alias keeps the `<table>_<column>` form so decoders resolve the
    /// same names whether or not the query used a table alias.
    pub fn projection_with_prefix(&self, prefix: Option<&str>) -> Vec<String> {
        let qualifier = prefix.unwrap_or(self.table.as_str());
        self.columns
            .iter()
            .map(|column| {
                format!(
                    "{qualifier}.{name} AS {table}_{name}",
                    name = column.name,
                    table = self.table
                )
            })
            .collect()
    }

    /// Joined projection text, usable directly in a `SELECT` list.
    pub fn table_selection(&self, prefix: Option<&str>) -> String {
        self.projection_with_prefix(prefix).join(", ")
    }

    /// `content://<authority>/<table>`
    pub fn collection_locator(&self) -> Locator {
        Locator::collection(&self.authority, &self.table)
    }

    /// `content://<authority>/<table>/<id>`
    pub fn item_locator(&self, id: impl Display) -> Locator {
        self.collection_locator().child(id.to_string())
    }

    /// `content://<authority>/<table>/sync`
    pub fn sync_locator(&self) -> Locator {
        self.collection_locator().child(SYNC_SEGMENT)
    }

    /// Extracts the id segment from an item locator of this contract,
    /// converted per `id_value`.
    pub fn id_from_locator(&self, locator: &Locator) -> Option<Value> {
        if locator.authority() != self.authority {
            return None;
        }
        match locator.segments() {
            [table, id] if table == &self.table => Some(self.id_value(id)),
            _ => None,
        }
    }

    /// Key value bound for `id` in primary-key predicates.
    ///
    /// Follows the primary key's declared kind: `Integer` and `Real` keys
    /// parse the text, every other kind (or a failed parse) binds it as text.
    pub fn id_value(&self, id: impl Display) -> Value {
        let text = id.to_string();
        match self.columns[0].kind {
            ColumnKind::Integer => text.parse::<i64>().map(Value::Integer).ok(),
            ColumnKind::Real => text.parse::<f64>().map(Value::Real).ok(),
            ColumnKind::Text | ColumnKind::Blob => None,
        }
        .unwrap_or(Value::Text(text))
    }

    /// MIME-like content type for the collection or a single item.
    pub fn content_type(&self, item: bool) -> String {
        let prefix = if item {
            ITEM_TYPE_PREFIX
        } else {
            LIST_TYPE_PREFIX
        };
        format!("{prefix}/{}", self.table)
    }

    /// DDL used to provision this contract's table.
    pub fn create_table_sql(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                if index == 0 {
                    let mut definition =
                        format!("{} {} PRIMARY KEY", column.name, column.kind.sql_type());
                    if self.primary_key_auto_generated {
                        definition.push_str(" AUTOINCREMENT");
                    }
                    definition
                } else if column.nullable {
                    format!("{} {}", column.name, column.kind.sql_type())
                } else {
                    format!("{} {} NOT NULL", column.name, column.kind.sql_type())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({definitions});", self.table)
    }
}

/// Builder for `Contract` values.
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    authority: String,
    table: String,
    primary_key: Option<(Column, bool)>,
    columns: Vec<Column>,
    conflict_strategy: ConflictStrategy,
}

impl ContractBuilder {
    pub fn new(authority: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            table: table.into(),
            primary_key: None,
            columns: Vec::new(),
            conflict_strategy: ConflictStrategy::default(),
        }
    }

    /// Declares the primary key column.
    pub fn primary_key(
        mut self,
        name: impl Into<String>,
        kind: ColumnKind,
        auto_generated: bool,
    ) -> Self {
        self.primary_key = Some((Column::new(name, kind, false), auto_generated));
        self
    }

    /// Declares a `NOT NULL` column.
    pub fn column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(Column::new(name, kind, false));
        self
    }

    pub fn nullable_column(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(Column::new(name, kind, true));
        self
    }

    pub fn conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    /// Validates names and freezes the contract.
    ///
    /// # Errors
    /// - `InvalidAuthority` / `InvalidIdentifier` for names outside the
    ///   identifier grammar.
    /// - `ReservedTableName` when the table is named like the sync segment.
    /// - `DuplicateColumn`, `MissingPrimaryKey`, `AutoGeneratedKeyNotInteger`.
    pub fn build(self) -> Result<Contract, ContractError> {
        if !AUTHORITY_RE.is_match(&self.authority) {
            return Err(ContractError::InvalidAuthority(self.authority));
        }
        ensure_identifier(&self.table)?;
        if self.table == SYNC_SEGMENT {
            return Err(ContractError::ReservedTableName(self.table));
        }

        let (primary_key, auto_generated) =
            self.primary_key.ok_or(ContractError::MissingPrimaryKey)?;
        if auto_generated && primary_key.kind != ColumnKind::Integer {
            return Err(ContractError::AutoGeneratedKeyNotInteger(primary_key.name));
        }

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(primary_key);
        columns.extend(self.columns);

        let mut seen = BTreeSet::new();
        for column in &columns {
            ensure_identifier(&column.name)?;
            if !seen.insert(column.name.as_str()) {
                return Err(ContractError::DuplicateColumn(column.name.clone()));
            }
        }

        Ok(Contract {
            authority: self.authority,
            table: self.table,
            primary_key_auto_generated: auto_generated,
            columns,
            conflict_strategy: self.conflict_strategy,
        })
    }
}

fn ensure_identifier(value: &str) -> Result<(), ContractError> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(ContractError::InvalidIdentifier(value.to_string()))
    }
}
