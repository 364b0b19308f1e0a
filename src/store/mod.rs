// Saved route store
// This file implements the single owner of SavedRoute records: create, replace,
// delete, listing, similarity lookup and change notification, with one writer
// at a time so read-modify-write updates never interleave
//
// Numan Thabit 2025 Nov

pub mod backend;
pub mod events;

pub use backend::{ConfiguredBackend, InMemoryBackend, JsonFileBackend, PersistenceBackend};
pub use events::{StoreEvent, Subscription};

use chrono::{DateTime, Local, TimeZone, Utc};
use std::cmp::Ordering;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::PersistenceError;
use crate::fingerprint::{Fingerprint, SimilarityRule};
use crate::metrics::STORE_MUTATIONS;
use crate::models::{OptimizedRouteResult, OriginalRouteInputs, SavedRoute};
use crate::stats::{CalendarWindows, RouteStatistics};

const EVENT_BUFFER: usize = 64;

pub struct RouteStore<B> {
    backend: B,
    similarity: SimilarityRule,
    writer: Mutex<()>,
    events: broadcast::Sender<StoreEvent>,
}

impl<B: PersistenceBackend> RouteStore<B> {
    pub fn new(backend: B, similarity: SimilarityRule) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            backend,
            similarity,
            writer: Mutex::new(()),
            events,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn emit(&self, operation: &str, event: StoreEvent) {
        STORE_MUTATIONS.with_label_values(&[operation]).inc();
        // no listeners is fine
        let _ = self.events.send(event);
    }

    /// Persist a new record. Does not look for duplicates; see `save_or_merge`.
    pub async fn save(&self, result: OptimizedRouteResult, inputs: OriginalRouteInputs) -> Result<SavedRoute, PersistenceError> {
        let _guard = self.writer.lock().await;
        self.insert(result, inputs, false).await
    }

    async fn insert(&self, result: OptimizedRouteResult, inputs: OriginalRouteInputs, favorite: bool) -> Result<SavedRoute, PersistenceError> {
        let route = SavedRoute {
            id: Uuid::new_v4().to_string(),
            name: SavedRoute::default_name(&result),
            route_result: result,
            original_inputs: inputs,
            saved_at: Utc::now(),
            is_favorite: favorite,
        };
        self.backend.create(route.clone()).await?;
        info!(id = %route.id, name = %route.name, favorite = favorite, "saved route");
        self.emit("save", StoreEvent::Saved { id: route.id.clone() });
        Ok(route)
    }

    /// Full-record replace keyed by id.
    pub async fn update(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        let _guard = self.writer.lock().await;
        let id = route.id.clone();
        self.backend.replace(route).await?;
        debug!(id = %id, "updated route");
        self.emit("update", StoreEvent::Updated { id });
        Ok(())
    }

    async fn modify(&self, id: &str, change: impl FnOnce(&mut SavedRoute)) -> Result<SavedRoute, PersistenceError> {
        let _guard = self.writer.lock().await;
        let mut route = self
            .backend
            .get(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        change(&mut route);
        self.backend.replace(route.clone()).await?;
        self.emit("update", StoreEvent::Updated { id: id.to_string() });
        Ok(route)
    }

    pub async fn toggle_favorite(&self, id: &str) -> Result<SavedRoute, PersistenceError> {
        let route = self.modify(id, |r| r.is_favorite = !r.is_favorite).await?;
        debug!(id = %id, favorite = route.is_favorite, "toggled favorite");
        Ok(route)
    }

    pub async fn rename(&self, id: &str, name: impl Into<String>) -> Result<SavedRoute, PersistenceError> {
        let name = name.into();
        self.modify(id, |r| r.name = name).await
    }

    /// `false` when nothing was removed or the backend failed.
    pub async fn delete(&self, id: &str) -> bool {
        let _guard = self.writer.lock().await;
        match self.backend.remove(id).await {
            Ok(true) => {
                info!(id = %id, "deleted route");
                self.emit("delete", StoreEvent::Deleted { id: id.to_string() });
                true
            }
            Ok(false) => {
                debug!(id = %id, "delete of unknown route");
                false
            }
            Err(err) => {
                warn!(id = %id, error = %err, "failed to delete route");
                false
            }
        }
    }

    /// `false` only when the backend failed.
    pub async fn clear_all(&self) -> bool {
        let _guard = self.writer.lock().await;
        match self.backend.clear().await {
            Ok(removed) => {
                info!(removed = removed, "cleared saved routes");
                self.emit("clear", StoreEvent::Cleared { removed });
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to clear saved routes");
                false
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<SavedRoute>, PersistenceError> {
        self.backend.get(id).await
    }

    /// All records, unordered.
    pub async fn list_all(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        self.backend.list().await
    }

    /// All records, newest first.
    pub async fn list_recent(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        let mut routes = self.backend.list().await?;
        sort_recent_first(&mut routes);
        Ok(routes)
    }

    pub async fn list_favorites(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        let mut routes = self.backend.favorites().await?;
        sort_recent_first(&mut routes);
        Ok(routes)
    }

    /// Stored route describing the same trip as `candidate`: an exact
    /// fingerprint match when there is one, otherwise the closest route above
    /// the similarity threshold. Ties go to the most recently saved.
    pub async fn find_similar_route(&self, candidate: &OptimizedRouteResult) -> Result<Option<SavedRoute>, PersistenceError> {
        let routes = self.backend.list().await?;
        Ok(self.best_match(candidate, routes))
    }

    fn best_match(&self, candidate: &OptimizedRouteResult, routes: Vec<SavedRoute>) -> Option<SavedRoute> {
        let fingerprint = Fingerprint::of_result(candidate);
        let stops = candidate.optimized_stops();
        routes
            .into_iter()
            .filter_map(|route| {
                let exact = Fingerprint::of_result(&route.route_result) == fingerprint;
                let score = if exact {
                    Some(f64::INFINITY)
                } else {
                    self.similarity.score(stops, route.route_result.optimized_stops())
                };
                score.map(|s| (s, route))
            })
            .max_by(|(a, ra), (b, rb)| {
                a.partial_cmp(b)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| ra.saved_at.cmp(&rb.saved_at))
            })
            .map(|(_, route)| route)
    }

    /// Favorite flag a freshly computed result inherits from its stored equivalent.
    pub async fn favorite_state_for(&self, candidate: &OptimizedRouteResult) -> Result<bool, PersistenceError> {
        Ok(self
            .find_similar_route(candidate)
            .await?
            .map(|route| route.is_favorite)
            .unwrap_or(false))
    }

    /// Save with deduplication: an equivalent stored route is updated in place
    /// (result, inputs, favorite flag and timestamp) instead of adding a row.
    pub async fn save_or_merge(
        &self,
        result: OptimizedRouteResult,
        inputs: OriginalRouteInputs,
        favorite: bool,
    ) -> Result<SavedRoute, PersistenceError> {
        let _guard = self.writer.lock().await;
        let existing = self.best_match(&result, self.backend.list().await?);
        match existing {
            Some(mut route) => {
                route.route_result = result;
                route.original_inputs = inputs;
                route.is_favorite = favorite;
                route.saved_at = Utc::now();
                self.backend.replace(route.clone()).await?;
                info!(id = %route.id, favorite = favorite, "merged into existing route");
                self.emit("merge", StoreEvent::Updated { id: route.id.clone() });
                Ok(route)
            }
            None => self.insert(result, inputs, favorite).await,
        }
    }

    /// Today / this week / this month counts in the local time zone.
    pub async fn get_statistics(&self) -> Result<RouteStatistics, PersistenceError> {
        self.statistics_at(&Local::now()).await
    }

    /// Window buckets come from one timestamp range query over the last month.
    pub async fn statistics_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<RouteStatistics, PersistenceError> {
        let w = CalendarWindows::at(now);
        let (total, favorites, recent) = futures::try_join!(
            self.backend.count(),
            self.backend.favorites(),
            self.backend.saved_between(w.month_start, w.tomorrow_start),
        )?;
        Ok(RouteStatistics::from_windowed(total as u64, favorites.len() as u64, &recent, &w))
    }
}

fn sort_recent_first(routes: &mut [SavedRoute]) {
    routes.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
}
