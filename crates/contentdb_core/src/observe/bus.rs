//! Per-store registry of change observers.

use crate::locator::Locator;
use log::debug;
use parking_lot::RwLock;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Receiver of store change notifications.
///
/// Called on the notifying thread; implementations must not block on store
/// access there.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, locator: &Locator);
}

/// Stable handle of one observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Uuid);

impl ObserverId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ObserverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Registration {
    id: ObserverId,
    locator: Locator,
    notify_for_descendants: bool,
    observer: Arc<dyn ChangeObserver>,
}

impl Registration {
    fn is_interested_in(&self, changed: &Locator) -> bool {
        self.locator == *changed
            || (self.notify_for_descendants && self.locator.is_ancestor_of(changed))
    }
}

/// Locator-keyed observer registry.
#[derive(Default)]
pub struct ChangeBus {
    registrations: RwLock<Vec<Registration>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watches `locator`; with `notify_for_descendants`, also every locator
    /// below it.
    pub fn register(
        &self,
        locator: Locator,
        notify_for_descendants: bool,
        observer: Arc<dyn ChangeObserver>,
    ) -> ObserverId {
        let id = ObserverId::new();
        debug!(
            "event=observer_register module=bus status=ok observer_id={} descendants={}",
            id, notify_for_descendants
        );
        self.registrations.write().push(Registration {
            id,
            locator,
            notify_for_descendants,
            observer,
        });
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;
        debug!(
            "event=observer_unregister module=bus status={} observer_id={}",
            if removed { "ok" } else { "skip" },
            id
        );
        removed
    }

    /// Triggers every observer interested in `changed`.
    ///
    /// Observers are invoked after the registry lock is released, so they may
    /// register or unregister from inside `on_change`. Returns how many were
    /// triggered.
    pub fn notify(&self, changed: &Locator) -> usize {
        let interested: Vec<Arc<dyn ChangeObserver>> = self
            .registrations
            .read()
            .iter()
            .filter(|registration| registration.is_interested_in(changed))
            .map(|registration| Arc::clone(&registration.observer))
            .collect();

        for observer in &interested {
            observer.on_change(changed);
        }
        debug!(
            "event=change_notify module=bus status=ok observers={}",
            interested.len()
        );
        interested.len()
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}
