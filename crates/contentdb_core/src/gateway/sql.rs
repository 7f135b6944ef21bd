//! Statement builders shared by single-row writes, bulk paths and sync.
//!
//! Table and column names come from validated contracts; record field names
//! are checked against the contract before they reach SQL text. Values are
//! always bound as parameters.

use super::query::{FetchQuery, Selection};
use super::{GatewayError, GatewayResult};
use crate::contract::Contract;
use crate::record::Record;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Fails with `UnknownColumn` for any field the contract does not declare.
pub(crate) fn ensure_known_columns(contract: &Contract, record: &Record) -> GatewayResult<()> {
    match record.field_names().find(|name| !contract.has_column(name)) {
        Some(column) => Err(GatewayError::UnknownColumn {
            table: contract.table().to_string(),
            column: column.to_string(),
        }),
        None => Ok(()),
    }
}

/// Writes `record` as given and returns the number of changed rows.
pub(crate) fn insert_row(
    conn: &Connection,
    contract: &Contract,
    record: &Record,
) -> GatewayResult<usize> {
    ensure_known_columns(contract, record)?;
    let verb = contract.conflict_strategy().sql_keyword();
    if record.is_empty() {
        let sql = format!("INSERT OR {verb} INTO {} DEFAULT VALUES", contract.table());
        return Ok(conn.execute(&sql, [])?);
    }

    let columns: Vec<&str> = record.field_names().collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT OR {verb} INTO {} ({}) VALUES ({placeholders})",
        contract.table(),
        columns.join(", ")
    );
    let changed = conn.execute(&sql, params_from_iter(record.iter().map(|(_, value)| value)))?;
    Ok(changed)
}

/// Applies `record` to every row matched by `selection`.
pub(crate) fn update_rows(
    conn: &Connection,
    contract: &Contract,
    record: &Record,
    selection: &Selection,
) -> GatewayResult<usize> {
    ensure_known_columns(contract, record)?;
    if record.is_empty() {
        return Ok(0);
    }

    let assignments = record
        .field_names()
        .map(|name| format!("{name} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE OR {} {} SET {assignments}{}",
        contract.conflict_strategy().sql_keyword(),
        contract.table(),
        selection.where_clause()
    );
    let values = record
        .iter()
        .map(|(_, value)| value)
        .chain(selection.args().iter());
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

pub(crate) fn delete_rows(
    conn: &Connection,
    contract: &Contract,
    selection: &Selection,
) -> GatewayResult<usize> {
    let sql = format!(
        "DELETE FROM {}{}",
        contract.table(),
        selection.where_clause()
    );
    Ok(conn.execute(&sql, params_from_iter(selection.args().iter()))?)
}

/// Runs `query` against `table` and materializes every row.
pub(crate) fn query_rows(
    conn: &Connection,
    table: &str,
    query: &FetchQuery,
) -> GatewayResult<Vec<Record>> {
    let sql = query.select_sql(table);
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = stmt.query(params_from_iter(query.selection_ref().args().iter()))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (index, name) in names.iter().enumerate() {
            record.put(name.clone(), row.get::<_, Value>(index)?);
        }
        records.push(record);
    }
    Ok(records)
}
