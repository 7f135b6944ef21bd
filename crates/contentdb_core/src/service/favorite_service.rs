//! Favorites use-case service.
//!
//! # Responsibility
//! - Add, list, observe and bulk-replace favorites.
//! - Map stored favorites into presentation summaries.
//!
//! # Invariants
//! - The service never bypasses the repository; sync stays atomic.

use crate::gateway::Selection;
use crate::locator::Locator;
use crate::model::favorite::{columns, Favorite};
use crate::observe::DeliveryContext;
use crate::repo::{EntityRepository, ObserveOptions, RepoResult, Subscription};
use crate::resolver::StoreContext;
use log::info;
use std::sync::Arc;

/// Rows delivered to recent-favorites observers.
pub const RECENT_FAVORITES_LIMIT: usize = 4;

/// Presentation shape of one favorite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteSummary {
    pub image_url: String,
    pub title: String,
}

impl From<Favorite> for FavoriteSummary {
    fn from(value: Favorite) -> Self {
        Self {
            image_url: value.image_url,
            title: value.title,
        }
    }
}

/// Use-case service wrapper for favorites.
pub struct FavoriteService<R: EntityRepository<Favorite>> {
    ctx: StoreContext,
    repo: R,
}

impl<R: EntityRepository<Favorite>> FavoriteService<R> {
    pub fn new(ctx: StoreContext, repo: R) -> Self {
        Self { ctx, repo }
    }

    /// Stores a new favorite and returns its item locator.
    pub fn add_favorite(
        &self,
        image_url: impl Into<String>,
        title: impl Into<String>,
    ) -> RepoResult<Option<Locator>> {
        self.repo.insert(&self.ctx, &Favorite::new(image_url, title))
    }

    /// Lists every stored favorite in key order.
    pub fn fetch_favorites(&self) -> RepoResult<Vec<FavoriteSummary>> {
        let order = format!("{} ASC", columns::ID);
        let favorites = self
            .repo
            .fetch_all(&self.ctx, &Selection::all(), Some(order.as_str()))?;
        Ok(favorites.into_iter().map(FavoriteSummary::from).collect())
    }

    /// Delivers the most recent favorites after every change, newest first.
    ///
    /// Keep the returned subscription and pass it to `stop_observation`.
    pub fn observe_recent<F>(&self, block: F, delivery: Arc<dyn DeliveryContext>) -> Subscription
    where
        F: Fn(Vec<FavoriteSummary>) + Send + Sync + 'static,
    {
        let callback = move |favorites: Vec<Favorite>| {
            block(favorites.into_iter().map(FavoriteSummary::from).collect());
        };
        let options = ObserveOptions::default().order(format!(
            "{} DESC LIMIT {RECENT_FAVORITES_LIMIT}",
            columns::ID
        ));
        self.repo
            .observe(&self.ctx, Arc::new(callback), delivery, options)
    }

    pub fn stop_observation(&self, subscription: &Subscription) -> bool {
        self.repo.unregister(&self.ctx, subscription)
    }

    /// Replaces the stored set with `favorites`; `0` when nothing changed or
    /// the batch was rejected.
    pub fn replace_all(&self, favorites: &[Favorite]) -> usize {
        let changed = self.repo.sync(&self.ctx, favorites);
        info!(
            "event=favorites_replace module=service status=ok submitted={} changed={}",
            favorites.len(),
            changed
        );
        changed
    }

    /// Parses an upstream JSON batch and replaces the stored set with it.
    pub fn replace_from_json(&self, payload: &str) -> Result<usize, serde_json::Error> {
        let favorites: Vec<Favorite> = serde_json::from_str(payload)?;
        Ok(self.replace_all(&favorites))
    }
}
