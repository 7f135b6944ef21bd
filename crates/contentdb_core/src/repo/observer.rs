//! Re-query subscriptions.
//!
//! # Invariants
//! - Each change spawns one background re-query; results are posted to the
//!   subscription's delivery context, never run on the notifying thread.
//! - The re-query reflects store state at re-query time (last query wins).
//! - A delivery whose subscription was unregistered before the task ran is
//!   dropped; an in-flight re-query itself is not cancelled.
//! - Observers hold the resolver weakly, so a registration never keeps the
//!   store alive.

use super::contract_repo::fetch_entities;
use crate::codec::EntityCodec;
use crate::contract::Contract;
use crate::gateway::Selection;
use crate::locator::Locator;
use crate::observe::{ChangeObserver, DeliveryContext, ObserverId};
use crate::resolver::ContentResolver;
use log::{debug, warn};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

const REQUERY_THREAD_NAME: &str = "contentdb-requery";

/// Receives the full re-queried entity set after each relevant change.
pub trait SetObserver<T>: Send + Sync + 'static {
    fn on_entities_changed(&self, entities: Vec<T>);
}

impl<T, F> SetObserver<T> for F
where
    F: Fn(Vec<T>) + Send + Sync + 'static,
{
    fn on_entities_changed(&self, entities: Vec<T>) {
        self(entities)
    }
}

/// Registration options for `EntityRepository::observe`.
#[derive(Debug, Clone)]
pub struct ObserveOptions {
    /// Watched locator; the repository's collection locator when `None`.
    pub locator: Option<Locator>,
    pub notify_for_descendants: bool,
    pub selection: Selection,
    pub order: Option<String>,
    pub skip_initial_dispatch: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            locator: None,
            notify_for_descendants: true,
            selection: Selection::all(),
            order: None,
            skip_initial_dispatch: false,
        }
    }
}

impl ObserveOptions {
    pub fn watch(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn descendants(mut self, notify_for_descendants: bool) -> Self {
        self.notify_for_descendants = notify_for_descendants;
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn skip_initial_dispatch(mut self) -> Self {
        self.skip_initial_dispatch = true;
        self
    }
}

/// Handle returned by `observe`; pass it back to `unregister`.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ObserverId,
    locator: Locator,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new(id: ObserverId, locator: Locator, active: Arc<AtomicBool>) -> Self {
        Self {
            id,
            locator,
            active,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

pub(crate) struct RequeryObserver<T: EntityCodec> {
    resolver: Weak<dyn ContentResolver>,
    contract: Arc<Contract>,
    selection: Selection,
    order: Option<String>,
    callback: Arc<dyn SetObserver<T>>,
    delivery: Arc<dyn DeliveryContext>,
    active: Arc<AtomicBool>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: EntityCodec> Clone for RequeryObserver<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            contract: Arc::clone(&self.contract),
            selection: self.selection.clone(),
            order: self.order.clone(),
            callback: Arc::clone(&self.callback),
            delivery: Arc::clone(&self.delivery),
            active: Arc::clone(&self.active),
            _entity: PhantomData,
        }
    }
}

impl<T: EntityCodec> RequeryObserver<T> {
    pub(crate) fn new(
        resolver: Weak<dyn ContentResolver>,
        contract: Arc<Contract>,
        options: &ObserveOptions,
        callback: Arc<dyn SetObserver<T>>,
        delivery: Arc<dyn DeliveryContext>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            resolver,
            contract,
            selection: options.selection.clone(),
            order: options.order.clone(),
            callback,
            delivery,
            active,
            _entity: PhantomData,
        }
    }

    /// Starts one re-query cycle on a background thread.
    pub(crate) fn dispatch(&self) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let cycle = self.clone();
        let spawned = thread::Builder::new()
            .name(REQUERY_THREAD_NAME.to_string())
            .spawn(move || cycle.requery());
        if let Err(err) = spawned {
            warn!(
                "event=observer_requery module=repo status=error table={} error_code=spawn_failed error={}",
                self.contract.table(),
                err
            );
        }
    }

    fn requery(self) {
        let Some(resolver) = self.resolver.upgrade() else {
            debug!("event=observer_requery module=repo status=skip reason=store_closed");
            return;
        };
        let entities = match fetch_entities::<T>(
            resolver.as_ref(),
            &self.contract,
            &self.selection,
            self.order.as_deref(),
        ) {
            Ok(entities) => entities,
            Err(err) => {
                warn!(
                    "event=observer_requery module=repo status=error table={} error={}",
                    self.contract.table(),
                    err
                );
                return;
            }
        };
        drop(resolver);

        debug!(
            "event=observer_requery module=repo status=ok table={} rows={}",
            self.contract.table(),
            entities.len()
        );
        let Self {
            callback,
            delivery,
            active,
            ..
        } = self;
        delivery.post(Box::new(move || {
            if active.load(Ordering::Acquire) {
                callback.on_entities_changed(entities);
            }
        }));
    }
}

impl<T: EntityCodec> ChangeObserver for RequeryObserver<T> {
    fn on_change(&self, _changed: &Locator) {
        self.dispatch();
    }
}
