//! Use-case services over typed repositories.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers decoupled from locators, records and selections.

pub mod favorite_service;
