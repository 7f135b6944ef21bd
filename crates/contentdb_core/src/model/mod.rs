//! Bundled sample entities.
//!
//! # Responsibility
//! - Show how an entity type pairs a contract with an `EntityCodec`.
//! - Back the favorites scenario used by the CLI and integration tests.

pub mod favorite;
