//! Predicate, query and cursor types passed across the gateway boundary.
//!
//! # Invariants
//! - A `Selection` predicate is never an empty string; blank text means
//!   "no predicate".
//! - Positional `?` placeholders in the predicate bind `args` in order.

use crate::record::Record;
use rusqlite::types::Value;

/// Predicate text plus positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    predicate: Option<String>,
    args: Vec<Value>,
}

impl Selection {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        Self {
            predicate: (!predicate.trim().is_empty()).then_some(predicate),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, V>(predicate: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut selection = Self::new(predicate);
        selection.args = args.into_iter().map(Into::into).collect();
        selection
    }

    /// Appends one positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn is_unrestricted(&self) -> bool {
        self.predicate.is_none()
    }

    /// Restricts the selection to the row whose `primary_key` equals `id`.
    ///
    /// Produces `<pk> = ?` or `<pk> = ? AND (<predicate>)`, with `id` bound
    /// ahead of the caller's arguments.
    pub fn qualified_by_id(&self, primary_key: &str, id: Value) -> Self {
        let predicate = match &self.predicate {
            Some(predicate) => format!("{primary_key} = ? AND ({predicate})"),
            None => format!("{primary_key} = ?"),
        };
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(id);
        args.extend(self.args.iter().cloned());
        Self {
            predicate: Some(predicate),
            args,
        }
    }

    /// Conjunction of both selections; either side may be unrestricted.
    pub fn and(self, other: Selection) -> Self {
        let predicate = match (self.predicate, other.predicate) {
            (Some(left), Some(right)) => Some(format!("({left}) AND ({right})")),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        };
        let mut args = self.args;
        args.extend(other.args);
        Self { predicate, args }
    }

    pub(crate) fn where_clause(&self) -> String {
        match &self.predicate {
            Some(predicate) => format!(" WHERE {predicate}"),
            None => String::new(),
        }
    }
}

/// Read request: projection, selection and sort order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchQuery {
    projection: Option<Vec<String>>,
    selection: Selection,
    order: Option<String>,
}

impl FetchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.projection = (!columns.is_empty()).then_some(columns);
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// `ORDER BY` body, e.g. `id DESC LIMIT 10`.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        let order = order.into();
        self.order = (!order.trim().is_empty()).then_some(order);
        self
    }

    pub fn selection_ref(&self) -> &Selection {
        &self.selection
    }

    pub fn order_ref(&self) -> Option<&str> {
        self.order.as_deref()
    }

    /// Same query with its selection replaced.
    pub(crate) fn with_selection(&self, selection: Selection) -> Self {
        Self {
            projection: self.projection.clone(),
            selection,
            order: self.order.clone(),
        }
    }

    pub(crate) fn select_sql(&self, table: &str) -> String {
        let projection = match &self.projection {
            Some(columns) => columns.join(", "),
            None => "*".to_string(),
        };
        let mut sql = format!(
            "SELECT {projection} FROM {table}{}",
            self.selection.where_clause()
        );
        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql
    }
}

/// Finite, single-pass sequence of fetched rows.
#[derive(Debug)]
pub struct RecordCursor {
    rows: std::vec::IntoIter<Record>,
}

impl RecordCursor {
    pub(crate) fn new(rows: Vec<Record>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Rows not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for RecordCursor {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for RecordCursor {}
