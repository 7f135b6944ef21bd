//! Change notification and asynchronous delivery.
//!
//! # Responsibility
//! - Track which observers watch which locators (`ChangeBus`).
//! - Abstract the context on which subscriber callbacks run
//!   (`DeliveryContext`).
//!
//! # Invariants
//! - Notifications are fire-and-forget: nothing is queued for observers that
//!   are not registered at notification time.

pub mod bus;
pub mod delivery;

pub use bus::{ChangeBus, ChangeObserver, ObserverId};
pub use delivery::{DeliveryContext, DeliveryTask, InlineDelivery, MainLoop};
