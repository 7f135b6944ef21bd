//! Contract-bound repository implementation.

use super::observer::{ObserveOptions, RequeryObserver, SetObserver, Subscription};
use super::{EntityRepository, RepoError, RepoResult};
use crate::codec::EntityCodec;
use crate::contract::Contract;
use crate::gateway::{FetchQuery, Selection};
use crate::locator::Locator;
use crate::observe::DeliveryContext;
use crate::record::Record;
use crate::resolver::{ContentResolver, StoreContext};
use log::debug;
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Repository for entities of type `T` stored under one contract.
pub struct ContractRepository<T: EntityCodec> {
    contract: Arc<Contract>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: EntityCodec> Clone for ContractRepository<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.contract))
    }
}

impl<T: EntityCodec> ContractRepository<T> {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            _entity: PhantomData,
        }
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn id_selection<K: Display>(&self, ids: &[K], selection: &Selection) -> Selection {
        if ids.is_empty() {
            return selection.clone();
        }
        let primary_key = self.contract.primary_key_column();
        let by_id = vec![format!("{primary_key} = ?"); ids.len()].join(" OR ");
        let predicate = match selection.predicate() {
            Some(predicate) => format!("({by_id}) AND ({predicate})"),
            None => format!("({by_id})"),
        };
        let args = ids
            .iter()
            .map(|id| self.contract.id_value(id))
            .chain(selection.args().iter().cloned());
        Selection::with_args(predicate, args)
    }
}

impl<T: EntityCodec> EntityRepository<T> for ContractRepository<T> {
    fn insert(&self, ctx: &StoreContext, entity: &T) -> RepoResult<Option<Locator>> {
        let mut record = entity.to_record();
        if self.contract.primary_key_auto_generated() {
            record.remove(self.contract.primary_key_column());
        }
        Ok(ctx.insert(&self.contract.collection_locator(), record)?)
    }

    fn sync(&self, ctx: &StoreContext, entities: &[T]) -> usize {
        let records = entities.iter().map(T::to_record).collect();
        ctx.bulk_sync(&self.contract.sync_locator(), records)
    }

    fn update(
        &self,
        ctx: &StoreContext,
        id: impl Display,
        record: &Record,
        selection: &Selection,
    ) -> RepoResult<usize> {
        Ok(ctx.update(&self.contract.item_locator(id), record, selection)?)
    }

    fn delete<K: Display>(
        &self,
        ctx: &StoreContext,
        selection: &Selection,
        ids: &[K],
    ) -> RepoResult<usize> {
        let selection = self.id_selection(ids, selection);
        Ok(ctx.delete(&self.contract.collection_locator(), &selection)?)
    }

    fn fetch_by_id(&self, ctx: &StoreContext, id: impl Display) -> RepoResult<Option<T>> {
        let query = FetchQuery::new().projection(self.contract.table_projection());
        let Some(cursor) = ctx.fetch(&self.contract.item_locator(id), &query)? else {
            return Ok(None);
        };
        let mut rows: Vec<Record> = cursor.collect();
        if rows.len() != 1 {
            return Ok(None);
        }
        let mut record = rows.remove(0);
        record.set_mapped_table(self.contract.table());
        Ok(Some(T::from_record(&record)?))
    }

    fn fetch_all(
        &self,
        ctx: &StoreContext,
        selection: &Selection,
        order: Option<&str>,
    ) -> RepoResult<Vec<T>> {
        fetch_entities(ctx.as_ref(), &self.contract, selection, order)
    }

    fn purge(&self, ctx: &StoreContext) -> RepoResult<usize> {
        Ok(ctx.delete(&self.contract.collection_locator(), &Selection::all())?)
    }

    fn observe(
        &self,
        ctx: &StoreContext,
        callback: Arc<dyn SetObserver<T>>,
        delivery: Arc<dyn DeliveryContext>,
        options: ObserveOptions,
    ) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let observer = Arc::new(RequeryObserver::new(
            Arc::downgrade(ctx),
            Arc::clone(&self.contract),
            &options,
            callback,
            delivery,
            Arc::clone(&active),
        ));
        let locator = options
            .locator
            .unwrap_or_else(|| self.contract.collection_locator());
        let id = ctx.register_observer(&locator, options.notify_for_descendants, observer.clone());
        debug!(
            "event=observe_register module=repo status=ok table={} observer_id={} descendants={}",
            self.contract.table(),
            id,
            options.notify_for_descendants
        );
        if !options.skip_initial_dispatch {
            observer.dispatch();
        }
        Subscription::new(id, locator, active)
    }

    fn unregister(&self, ctx: &StoreContext, subscription: &Subscription) -> bool {
        subscription.deactivate();
        let removed = ctx.unregister_observer(subscription.id());
        debug!(
            "event=observe_unregister module=repo status=ok table={} observer_id={} removed={}",
            self.contract.table(),
            subscription.id(),
            removed
        );
        removed
    }
}

/// Fetches and decodes the contract's collection with its aliased projection.
pub(crate) fn fetch_entities<T: EntityCodec>(
    resolver: &dyn ContentResolver,
    contract: &Contract,
    selection: &Selection,
    order: Option<&str>,
) -> RepoResult<Vec<T>> {
    let mut query = FetchQuery::new()
        .projection(contract.table_projection())
        .selection(selection.clone());
    if let Some(order) = order {
        query = query.order(order);
    }
    let Some(cursor) = resolver.fetch(&contract.collection_locator(), &query)? else {
        return Ok(Vec::new());
    };
    cursor
        .map(|mut record| {
            record.set_mapped_table(contract.table());
            T::from_record(&record).map_err(RepoError::from)
        })
        .collect()
}
