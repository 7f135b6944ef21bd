//! Host-specific route strategy.
//!
//! Locators that match a route code in the custom band bypass default CRUD
//! dispatch and are handed to the gateway's `CustomRouteHandler`.

use super::matcher::RouteCode;
use super::query::{FetchQuery, Selection};
use super::GatewayResult;
use crate::locator::Locator;
use crate::record::Record;
use rusqlite::Connection;

/// Insert/update/query hooks for custom routes.
///
/// Every hook has a no-op default so a handler only implements what its
/// routes support. Returned counts drive change notification: the gateway
/// notifies the request locator when a write hook reports `> 0`.
pub trait CustomRouteHandler: Send + Sync {
    fn try_insert(
        &self,
        _conn: &Connection,
        _route: RouteCode,
        _locator: &Locator,
        _records: &[Record],
    ) -> GatewayResult<usize> {
        Ok(0)
    }

    fn try_update(
        &self,
        _conn: &Connection,
        _route: RouteCode,
        _locator: &Locator,
        _record: &Record,
        _selection: &Selection,
    ) -> GatewayResult<usize> {
        Ok(0)
    }

    /// `Ok(None)` means the route does not support reads.
    fn try_query(
        &self,
        _conn: &Connection,
        _route: RouteCode,
        _locator: &Locator,
        _query: &FetchQuery,
    ) -> GatewayResult<Option<Vec<Record>>> {
        Ok(None)
    }
}
