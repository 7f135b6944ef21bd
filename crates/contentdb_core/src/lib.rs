//! Schema-driven local persistence over SQLite.
//!
//! Typed repositories address a single routing gateway through opaque
//! `content://` locators; the gateway owns the store handle, transaction
//! boundaries and change notification.

pub mod codec;
pub mod config;
pub mod contract;
pub mod db;
pub mod gateway;
pub mod locator;
pub mod logging;
pub mod model;
pub mod observe;
pub mod record;
pub mod repo;
pub mod resolver;
pub mod service;

pub use codec::EntityCodec;
pub use config::{ConfigError, StoreConfig};
pub use contract::{Column, ColumnKind, ConflictStrategy, Contract, ContractBuilder, ContractError};
pub use db::{open_db, open_db_in_memory, open_store, DbError, DbResult};
pub use gateway::{
    CustomRouteHandler, FetchQuery, Gateway, GatewayBuilder, GatewayError, GatewayResult,
    RecordCursor, RouteCode, RouteKind, Selection,
};
pub use locator::{Locator, LocatorError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogSettings,
    LoggingError,
};
pub use model::favorite::{favorite_repository, favorites_contract, Favorite, FavoriteRepository};
pub use observe::{ChangeObserver, DeliveryContext, InlineDelivery, MainLoop, ObserverId};
pub use record::{CodecError, CodecResult, Record};
pub use repo::{
    ContractRepository, EntityRepository, ObserveOptions, RepoError, RepoResult, SetObserver,
    Subscription,
};
pub use resolver::{ContentResolver, StoreContext};
pub use rusqlite::types::Value;
pub use service::favorite_service::{FavoriteService, FavoriteSummary};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
