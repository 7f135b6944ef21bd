//! Locator-routed gateway over the single writable store.
//!
//! # Responsibility
//! - Own the store connection, the contract list and the match table.
//! - Dispatch create/read/update/delete/bulk-sync calls by route code.
//! - Fan out change notifications after successful writes.
//!
//! # Invariants
//! - Contract `i` answers on collection route `i` and item route
//!   `ID_ROUTE_OFFSET + i`. The sync locator routes as an item; only the
//!   bulk paths read a trailing `sync` segment as the sync endpoint, so a
//!   row keyed `sync` stays addressable by update/delete/fetch.
//! - Custom routes are matched before contract routes of equal specificity.
//! - Unresolved locators perform no work: `None` or `0`, never an error.
//! - Notifications are sent after the connection lock is released.
//! - Bulk paths absorb failures and report `0`.

mod matcher;
mod query;
mod routes;
mod sql;
mod sync;

pub use matcher::{
    MatchTable, RouteCode, RouteKind, CUSTOM_ROUTE_MAX, CUSTOM_ROUTE_MIN, ID_ROUTE_OFFSET,
    MAX_CONTRACTS,
};
pub use query::{FetchQuery, RecordCursor, Selection};
pub use routes::CustomRouteHandler;
pub use sync::SyncOutcome;

use crate::config::StoreConfig;
use crate::contract::Contract;
use crate::db::{open_store, DbError};
use crate::locator::Locator;
use crate::observe::{ChangeBus, ChangeObserver, ObserverId};
use crate::record::Record;
use crate::resolver::ContentResolver;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway setup and write errors.
#[derive(Debug)]
pub enum GatewayError {
    Db(DbError),
    /// A record field is not a declared column of the target contract.
    UnknownColumn { table: String, column: String },
    /// A record is not a complete contract instance, or lacks a required key.
    InvalidRecord { table: String },
    DuplicateRoute { authority: String, path: String },
    RouteOutOfBand(u32),
    TooManyContracts(usize),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownColumn { table, column } => {
                write!(f, "table `{table}` has no column `{column}`")
            }
            Self::InvalidRecord { table } => {
                write!(f, "record does not match the `{table}` contract")
            }
            Self::DuplicateRoute { authority, path } => {
                write!(f, "route already registered: {authority}/{path}")
            }
            Self::RouteOutOfBand(code) => write!(
                f,
                "custom route code {code} outside {CUSTOM_ROUTE_MIN}..={CUSTOM_ROUTE_MAX}"
            ),
            Self::TooManyContracts(count) => write!(
                f,
                "{count} contracts registered, at most {MAX_CONTRACTS} supported"
            ),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

enum Target<'a> {
    Table {
        contract: &'a Arc<Contract>,
        route: RouteCode,
        item_id: Option<Value>,
    },
    Custom {
        route: RouteCode,
        handler: &'a Arc<dyn CustomRouteHandler>,
    },
}

/// Builder collecting contracts and custom routes before the match table is
/// frozen.
#[derive(Default)]
pub struct GatewayBuilder {
    contracts: Vec<Arc<Contract>>,
    custom_routes: Vec<(String, String, u32)>,
    handler: Option<Arc<dyn CustomRouteHandler>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the next contract; its position is its route index.
    pub fn contract(mut self, contract: Arc<Contract>) -> Self {
        self.contracts.push(contract);
        self
    }

    pub fn contracts(mut self, contracts: impl IntoIterator<Item = Arc<Contract>>) -> Self {
        self.contracts.extend(contracts);
        self
    }

    /// Registers `path` under `authority` with a code from the custom band.
    pub fn custom_route(
        mut self,
        authority: impl Into<String>,
        path: impl Into<String>,
        code: u32,
    ) -> Self {
        self.custom_routes
            .push((authority.into(), path.into(), code));
        self
    }

    pub fn route_handler(mut self, handler: Arc<dyn CustomRouteHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Freezes the match table and takes ownership of `conn`.
    ///
    /// `conn` is expected to be provisioned for every registered contract
    /// (see `crate::db::open_store`).
    ///
    /// # Errors
    /// - `TooManyContracts` when contract indexes would reach the custom band.
    /// - `RouteOutOfBand` for custom codes outside the reserved band.
    /// - `DuplicateRoute` when two registrations share a pattern.
    pub fn build(self, conn: Connection) -> GatewayResult<Gateway> {
        if self.contracts.len() > MAX_CONTRACTS {
            return Err(GatewayError::TooManyContracts(self.contracts.len()));
        }

        let mut matcher = MatchTable::new();
        for (authority, path, code) in &self.custom_routes {
            let route = RouteCode::custom(*code).ok_or(GatewayError::RouteOutOfBand(*code))?;
            add_route(&mut matcher, authority, path, route)?;
        }
        for (index, contract) in self.contracts.iter().enumerate() {
            let table = contract.table();
            add_route(&mut matcher, contract.authority(), table, RouteCode::collection(index))?;
            add_route(
                &mut matcher,
                contract.authority(),
                &format!("{table}/*"),
                RouteCode::item(index),
            )?;
        }

        info!(
            "event=gateway_build module=gateway status=ok contracts={} custom_routes={} routes={}",
            self.contracts.len(),
            self.custom_routes.len(),
            matcher.len()
        );
        Ok(Gateway {
            conn: Mutex::new(conn),
            contracts: self.contracts,
            matcher,
            handler: self.handler,
            bus: ChangeBus::new(),
        })
    }
}

fn add_route(
    matcher: &mut MatchTable,
    authority: &str,
    path: &str,
    route: RouteCode,
) -> GatewayResult<()> {
    if matcher.add(authority, path, route) {
        Ok(())
    } else {
        Err(GatewayError::DuplicateRoute {
            authority: authority.to_string(),
            path: path.to_string(),
        })
    }
}

/// Single entry point for locator-addressed storage operations.
pub struct Gateway {
    conn: Mutex<Connection>,
    contracts: Vec<Arc<Contract>>,
    matcher: MatchTable,
    handler: Option<Arc<dyn CustomRouteHandler>>,
    bus: ChangeBus,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Gateway over `conn` routing `contracts` in order, without custom routes.
    pub fn new(conn: Connection, contracts: Vec<Arc<Contract>>) -> GatewayResult<Self> {
        GatewayBuilder::new().contracts(contracts).build(conn)
    }

    /// Opens and provisions the store described by `config`, then routes
    /// `contracts` over it.
    pub fn open(config: &StoreConfig, contracts: Vec<Arc<Contract>>) -> GatewayResult<Self> {
        let conn = open_store(config, &contracts)?;
        Self::new(conn, contracts)
    }

    /// Releases the store handle. Registered observers are dropped.
    pub fn close(self) -> Connection {
        info!(
            "event=gateway_close module=gateway status=ok observers={}",
            self.bus.len()
        );
        self.conn.into_inner()
    }

    pub fn contracts(&self) -> &[Arc<Contract>] {
        &self.contracts
    }

    /// Route code of `locator`, if any registration matches.
    pub fn route_of(&self, locator: &Locator) -> Option<RouteCode> {
        self.matcher.route(locator)
    }

    /// Contract addressed by a collection, sync or item locator.
    pub fn contract_for(&self, locator: &Locator) -> Option<&Arc<Contract>> {
        match self.route_of(locator)?.kind() {
            RouteKind::Collection(index) | RouteKind::Item(index) => self.contracts.get(index),
            RouteKind::Custom(_) => None,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.bus.len()
    }

    fn resolve(&self, locator: &Locator) -> Option<Target<'_>> {
        let route = self.route_of(locator)?;
        match route.kind() {
            RouteKind::Collection(index) => Some(Target::Table {
                contract: self.contracts.get(index)?,
                route,
                item_id: None,
            }),
            RouteKind::Item(index) => {
                let contract = self.contracts.get(index)?;
                Some(Target::Table {
                    contract,
                    route,
                    item_id: Some(contract.id_from_locator(locator)?),
                })
            }
            RouteKind::Custom(_) => Some(Target::Custom {
                route,
                handler: self.handler.as_ref()?,
            }),
        }
    }

    fn insert_table_row(
        &self,
        contract: &Contract,
        mut record: Record,
    ) -> GatewayResult<Option<Locator>> {
        let primary_key = contract.primary_key_column();
        let given_id = if contract.primary_key_auto_generated() {
            record.remove(primary_key);
            None
        } else {
            let id = record.get(primary_key).and_then(id_segment).ok_or_else(|| {
                GatewayError::InvalidRecord {
                    table: contract.table().to_string(),
                }
            })?;
            Some(id)
        };

        let (changed, row_id) = {
            let conn = self.conn.lock();
            let changed = sql::insert_row(&conn, contract, &record)?;
            (changed, conn.last_insert_rowid())
        };
        if changed == 0 {
            return Ok(None);
        }

        let item = match given_id {
            Some(id) => contract.item_locator(id),
            None => contract.item_locator(row_id),
        };
        self.notify_change(&item);
        Ok(Some(item))
    }
}

fn id_segment(value: &Value) -> Option<String> {
    match value {
        Value::Integer(value) => Some(value.to_string()),
        Value::Real(value) => Some(value.to_string()),
        Value::Text(value) if !value.is_empty() && !value.contains('/') => Some(value.clone()),
        _ => None,
    }
}

impl ContentResolver for Gateway {
    fn insert(&self, locator: &Locator, record: Record) -> GatewayResult<Option<Locator>> {
        match self.resolve(locator) {
            None => {
                warn!("event=gateway_insert module=gateway status=skip reason=unresolved_locator");
                Ok(None)
            }
            Some(Target::Custom { route, handler }) => {
                let changed = {
                    let conn = self.conn.lock();
                    handler.try_insert(&conn, route, locator, std::slice::from_ref(&record))?
                };
                debug!(
                    "event=gateway_insert module=gateway status=ok route={} changed={changed}",
                    route.value()
                );
                if changed == 0 {
                    return Ok(None);
                }
                self.notify_change(locator);
                Ok(Some(locator.clone()))
            }
            Some(Target::Table {
                contract, route, ..
            }) => {
                let inserted = self.insert_table_row(contract, record);
                match &inserted {
                    Ok(item) => debug!(
                        "event=gateway_insert module=gateway status=ok table={} route={} inserted={}",
                        contract.table(),
                        route.value(),
                        item.is_some()
                    ),
                    Err(err) => error!(
                        "event=gateway_insert module=gateway status=error table={} error={}",
                        contract.table(),
                        err
                    ),
                }
                inserted
            }
        }
    }

    fn bulk_insert(&self, locator: &Locator, records: Vec<Record>) -> usize {
        match self.resolve(locator) {
            None => {
                warn!(
                    "event=gateway_bulk_insert module=gateway status=skip reason=unresolved_locator"
                );
                0
            }
            Some(Target::Custom { route, handler }) => {
                let result = {
                    let conn = self.conn.lock();
                    handler.try_insert(&conn, route, locator, &records)
                };
                match result {
                    Ok(changed) => {
                        if changed > 0 {
                            self.notify_change(locator);
                        }
                        changed
                    }
                    Err(err) => {
                        warn!(
                            "event=gateway_bulk_insert module=gateway status=error route={} error={}",
                            route.value(),
                            err
                        );
                        0
                    }
                }
            }
            Some(Target::Table {
                item_id: Some(_), ..
            }) if locator.is_sync() => self.bulk_sync(locator, records),
            Some(Target::Table { contract, .. }) => {
                let result = {
                    let mut conn = self.conn.lock();
                    insert_all(&mut conn, contract, records)
                };
                match result {
                    Ok(changed) => {
                        debug!(
                            "event=gateway_bulk_insert module=gateway status=ok table={} changed={changed}",
                            contract.table()
                        );
                        if changed > 0 {
                            self.notify_change(&contract.collection_locator());
                        }
                        changed
                    }
                    Err(err) => {
                        warn!(
                            "event=gateway_bulk_insert module=gateway status=error table={} error={}",
                            contract.table(),
                            err
                        );
                        0
                    }
                }
            }
        }
    }

    fn update(
        &self,
        locator: &Locator,
        record: &Record,
        selection: &Selection,
    ) -> GatewayResult<usize> {
        let changed = match self.resolve(locator) {
            None => {
                warn!("event=gateway_update module=gateway status=skip reason=unresolved_locator");
                return Ok(0);
            }
            Some(Target::Custom { route, handler }) => {
                let conn = self.conn.lock();
                handler.try_update(&conn, route, locator, record, selection)?
            }
            Some(Target::Table {
                contract, item_id, ..
            }) => {
                let selection = match item_id {
                    Some(id) => selection.qualified_by_id(contract.primary_key_column(), id),
                    None => selection.clone(),
                };
                let result = sql::update_rows(&self.conn.lock(), contract, record, &selection);
                if let Err(err) = &result {
                    error!(
                        "event=gateway_update module=gateway status=error table={} error={}",
                        contract.table(),
                        err
                    );
                }
                result?
            }
        };

        debug!("event=gateway_update module=gateway status=ok changed={changed}");
        if changed > 0 {
            self.notify_change(locator);
        }
        Ok(changed)
    }

    fn delete(&self, locator: &Locator, selection: &Selection) -> GatewayResult<usize> {
        let Some(Target::Table {
            contract, item_id, ..
        }) = self.resolve(locator)
        else {
            warn!("event=gateway_delete module=gateway status=skip reason=unsupported_locator");
            return Ok(0);
        };

        let selection = match item_id {
            Some(id) => selection.qualified_by_id(contract.primary_key_column(), id),
            None => selection.clone(),
        };
        let result = sql::delete_rows(&self.conn.lock(), contract, &selection);
        let changed = match result {
            Ok(changed) => changed,
            Err(err) => {
                error!(
                    "event=gateway_delete module=gateway status=error table={} error={}",
                    contract.table(),
                    err
                );
                return Err(err);
            }
        };

        debug!(
            "event=gateway_delete module=gateway status=ok table={} changed={changed}",
            contract.table()
        );
        if changed > 0 {
            self.notify_change(locator);
        }
        Ok(changed)
    }

    fn fetch(&self, locator: &Locator, query: &FetchQuery) -> GatewayResult<Option<RecordCursor>> {
        let rows = match self.resolve(locator) {
            None => {
                warn!("event=gateway_fetch module=gateway status=skip reason=unresolved_locator");
                return Ok(None);
            }
            Some(Target::Custom { route, handler }) => {
                let conn = self.conn.lock();
                handler.try_query(&conn, route, locator, query)?
            }
            Some(Target::Table {
                contract, item_id, ..
            }) => {
                let query = match item_id {
                    Some(id) => query.with_selection(
                        query
                            .selection_ref()
                            .qualified_by_id(contract.primary_key_column(), id),
                    ),
                    None => query.clone(),
                };
                let conn = self.conn.lock();
                Some(sql::query_rows(&conn, contract.table(), &query)?)
            }
        };
        Ok(rows.map(RecordCursor::new))
    }

    fn bulk_sync(&self, locator: &Locator, records: Vec<Record>) -> usize {
        let contract = match self.resolve(locator) {
            Some(Target::Table {
                contract,
                item_id: None,
                ..
            }) => contract,
            Some(Target::Table { contract, .. }) if locator.is_sync() => contract,
            _ => {
                warn!("event=gateway_sync module=gateway status=skip reason=unsupported_locator");
                return 0;
            }
        };

        let started_at = Instant::now();
        let submitted = records.len();
        let result = {
            let mut conn = self.conn.lock();
            sync::reconcile(&mut conn, contract, records)
        };
        let changed = match result {
            Ok(outcome) => {
                info!(
                    "event=gateway_sync module=gateway status=ok table={} submitted={} inserted={} updated={} deleted={} duration_ms={}",
                    contract.table(),
                    submitted,
                    outcome.inserted,
                    outcome.updated,
                    outcome.deleted,
                    started_at.elapsed().as_millis()
                );
                outcome.total()
            }
            Err(err) => {
                warn!(
                    "event=gateway_sync module=gateway status=error table={} submitted={} duration_ms={} error={}",
                    contract.table(),
                    submitted,
                    started_at.elapsed().as_millis(),
                    err
                );
                0
            }
        };

        self.notify_change(&contract.collection_locator());
        changed
    }

    fn type_of(&self, locator: &Locator) -> Option<String> {
        match self.route_of(locator)?.kind() {
            RouteKind::Collection(index) => Some(self.contracts.get(index)?.content_type(false)),
            RouteKind::Item(index) => Some(self.contracts.get(index)?.content_type(true)),
            RouteKind::Custom(_) => None,
        }
    }

    fn register_observer(
        &self,
        locator: &Locator,
        notify_for_descendants: bool,
        observer: Arc<dyn ChangeObserver>,
    ) -> ObserverId {
        self.bus.register(locator.clone(), notify_for_descendants, observer)
    }

    fn unregister_observer(&self, id: ObserverId) -> bool {
        self.bus.unregister(id)
    }

    fn notify_change(&self, locator: &Locator) {
        self.bus.notify(locator);
    }
}

fn insert_all(
    conn: &mut Connection,
    contract: &Contract,
    records: Vec<Record>,
) -> GatewayResult<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut changed = 0;
    for mut record in records {
        if contract.primary_key_auto_generated() {
            record.remove(contract.primary_key_column());
        }
        changed += sql::insert_row(&tx, contract, &record)?;
    }
    tx.commit()?;
    Ok(changed)
}
