//! Store-access abstraction handed to repositories.
//!
//! Repositories never hold a gateway directly; every call receives a
//! `StoreContext`, so hosts can substitute their own resolver (or a test
//! double) without touching typed code.

use crate::gateway::{FetchQuery, GatewayResult, RecordCursor, Selection};
use crate::locator::Locator;
use crate::observe::{ChangeObserver, ObserverId};
use crate::record::Record;
use std::sync::Arc;

/// Locator-addressed storage operations plus change registration.
pub trait ContentResolver: Send + Sync {
    /// Returns the item locator of the written row, `None` when nothing was
    /// written or the locator is unresolved.
    fn insert(&self, locator: &Locator, record: Record) -> GatewayResult<Option<Locator>>;

    /// Failures are absorbed and reported as `0`.
    fn bulk_insert(&self, locator: &Locator, records: Vec<Record>) -> usize;

    fn update(
        &self,
        locator: &Locator,
        record: &Record,
        selection: &Selection,
    ) -> GatewayResult<usize>;

    fn delete(&self, locator: &Locator, selection: &Selection) -> GatewayResult<usize>;

    /// `Ok(None)` when the locator is unresolved.
    fn fetch(&self, locator: &Locator, query: &FetchQuery) -> GatewayResult<Option<RecordCursor>>;

    /// Reconciles a collection with `records` atomically; `0` on any failure.
    fn bulk_sync(&self, locator: &Locator, records: Vec<Record>) -> usize;

    fn type_of(&self, locator: &Locator) -> Option<String>;

    fn register_observer(
        &self,
        locator: &Locator,
        notify_for_descendants: bool,
        observer: Arc<dyn ChangeObserver>,
    ) -> ObserverId;

    fn unregister_observer(&self, id: ObserverId) -> bool;

    fn notify_change(&self, locator: &Locator);
}

/// Shared execution context threaded through repository calls.
pub type StoreContext = Arc<dyn ContentResolver>;
