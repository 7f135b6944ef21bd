//! Typed repositories over the locator gateway.
//!
//! # Responsibility
//! - Bind one contract and one entity codec into typed CRUD, sync and
//!   observe entry points.
//! - Translate typed calls into locators, records and selections.
//!
//! # Invariants
//! - Repositories never open transactions; the gateway owns boundaries.
//! - Every call goes through the caller-supplied `StoreContext`.

mod contract_repo;
mod observer;

pub use contract_repo::ContractRepository;
pub use observer::{ObserveOptions, SetObserver, Subscription};

use crate::codec::EntityCodec;
use crate::gateway::{GatewayError, Selection};
use crate::locator::Locator;
use crate::observe::DeliveryContext;
use crate::record::{CodecError, Record};
use crate::resolver::StoreContext;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level error for typed persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Gateway(GatewayError),
    Codec(CodecError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "failed to decode entity: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gateway(err) => Some(err),
            Self::Codec(err) => Some(err),
        }
    }
}

impl From<GatewayError> for RepoError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<CodecError> for RepoError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

/// Typed data-access surface for one entity type.
pub trait EntityRepository<T: EntityCodec> {
    /// Writes `entity`; an auto-generated key is never sent to the store.
    fn insert(&self, ctx: &StoreContext, entity: &T) -> RepoResult<Option<Locator>>;

    /// Reconciles the stored collection with `entities`; `0` on failure.
    fn sync(&self, ctx: &StoreContext, entities: &[T]) -> usize;

    fn update(
        &self,
        ctx: &StoreContext,
        id: impl Display,
        record: &Record,
        selection: &Selection,
    ) -> RepoResult<usize>;

    /// Deletes rows matching `selection`, restricted to `ids` when given.
    fn delete<K: Display>(
        &self,
        ctx: &StoreContext,
        selection: &Selection,
        ids: &[K],
    ) -> RepoResult<usize>;

    /// `None` unless exactly one row matches.
    fn fetch_by_id(&self, ctx: &StoreContext, id: impl Display) -> RepoResult<Option<T>>;

    fn fetch_all(
        &self,
        ctx: &StoreContext,
        selection: &Selection,
        order: Option<&str>,
    ) -> RepoResult<Vec<T>>;

    fn purge(&self, ctx: &StoreContext) -> RepoResult<usize>;

    /// Registers `callback` for re-queried result sets on `delivery`.
    fn observe(
        &self,
        ctx: &StoreContext,
        callback: Arc<dyn SetObserver<T>>,
        delivery: Arc<dyn DeliveryContext>,
        options: ObserveOptions,
    ) -> Subscription;

    fn unregister(&self, ctx: &StoreContext, subscription: &Subscription) -> bool;
}
