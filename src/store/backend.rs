// Persistence backends for saved routes
// This file defines the storage collaborator contract and the two backends the
// crate ships: an in-memory map and a JSON document on disk
//
// Numan Thabit 2025 Nov

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::errors::PersistenceError;
use crate::models::SavedRoute;

/// Record-level storage keyed by route id.
#[allow(async_fn_in_trait)]
pub trait PersistenceBackend: Send + Sync {
    /// Insert a new record; `Conflict` if the id exists.
    async fn create(&self, route: SavedRoute) -> Result<(), PersistenceError>;
    async fn get(&self, id: &str) -> Result<Option<SavedRoute>, PersistenceError>;
    /// Full-record replace; `NotFound` if the id does not exist.
    async fn replace(&self, route: SavedRoute) -> Result<(), PersistenceError>;
    /// Whether a record was removed
    async fn remove(&self, id: &str) -> Result<bool, PersistenceError>;
    /// Number of records removed
    async fn clear(&self) -> Result<usize, PersistenceError>;
    async fn list(&self) -> Result<Vec<SavedRoute>, PersistenceError>;
    /// Records with `from <= saved_at < to`
    async fn saved_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SavedRoute>, PersistenceError>;
    async fn favorites(&self) -> Result<Vec<SavedRoute>, PersistenceError>;

    async fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.list().await?.len())
    }
}

fn in_range(route: &SavedRoute, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    route.saved_at >= from && route.saved_at < to
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    routes: RwLock<HashMap<String, SavedRoute>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceBackend for InMemoryBackend {
    async fn create(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        let mut routes = self.routes.write().await;
        if routes.contains_key(&route.id) {
            return Err(PersistenceError::Conflict(route.id));
        }
        routes.insert(route.id.clone(), route);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SavedRoute>, PersistenceError> {
        Ok(self.routes.read().await.get(id).cloned())
    }

    async fn replace(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        let mut routes = self.routes.write().await;
        match routes.get_mut(&route.id) {
            Some(existing) => {
                *existing = route;
                Ok(())
            }
            None => Err(PersistenceError::NotFound(route.id)),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistenceError> {
        Ok(self.routes.write().await.remove(id).is_some())
    }

    async fn clear(&self) -> Result<usize, PersistenceError> {
        let mut routes = self.routes.write().await;
        let removed = routes.len();
        routes.clear();
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        Ok(self.routes.read().await.values().cloned().collect())
    }

    async fn saved_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SavedRoute>, PersistenceError> {
        Ok(self
            .routes
            .read()
            .await
            .values()
            .filter(|r| in_range(r, from, to))
            .cloned()
            .collect())
    }

    async fn favorites(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        Ok(self
            .routes
            .read()
            .await
            .values()
            .filter(|r| r.is_favorite)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.routes.read().await.len())
    }
}

/// Whole collection kept in memory and written back as one JSON array after
/// every mutation (temp file + rename).
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    routes: RwLock<HashMap<String, SavedRoute>>,
}

impl JsonFileBackend {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let routes = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => {
                let list: Vec<SavedRoute> = serde_json::from_slice(&bytes)?;
                list.into_iter().map(|r| (r.id.clone(), r)).collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        info!(path = %path.display(), routes = routes.len(), "opened saved route file");
        Ok(Self {
            path,
            routes: RwLock::new(routes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, routes: &HashMap<String, SavedRoute>) -> Result<(), PersistenceError> {
        let mut list: Vec<&SavedRoute> = routes.values().collect();
        list.sort_by(|a, b| a.saved_at.cmp(&b.saved_at).then_with(|| a.id.cmp(&b.id)));
        let bytes = serde_json::to_vec_pretty(&list)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), routes = list.len(), "flushed saved routes");
        Ok(())
    }
}

impl PersistenceBackend for JsonFileBackend {
    async fn create(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        let mut routes = self.routes.write().await;
        if routes.contains_key(&route.id) {
            return Err(PersistenceError::Conflict(route.id));
        }
        let id = route.id.clone();
        routes.insert(id.clone(), route);
        if let Err(err) = self.flush(&routes).await {
            routes.remove(&id);
            return Err(err);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SavedRoute>, PersistenceError> {
        Ok(self.routes.read().await.get(id).cloned())
    }

    async fn replace(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        let mut routes = self.routes.write().await;
        let previous = match routes.get_mut(&route.id) {
            Some(existing) => std::mem::replace(existing, route),
            None => return Err(PersistenceError::NotFound(route.id)),
        };
        if let Err(err) = self.flush(&routes).await {
            routes.insert(previous.id.clone(), previous);
            return Err(err);
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistenceError> {
        let mut routes = self.routes.write().await;
        let Some(previous) = routes.remove(id) else {
            return Ok(false);
        };
        if let Err(err) = self.flush(&routes).await {
            routes.insert(previous.id.clone(), previous);
            return Err(err);
        }
        Ok(true)
    }

    async fn clear(&self) -> Result<usize, PersistenceError> {
        let mut routes = self.routes.write().await;
        let previous = std::mem::take(&mut *routes);
        if let Err(err) = self.flush(&routes).await {
            *routes = previous;
            return Err(err);
        }
        Ok(previous.len())
    }

    async fn list(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        Ok(self.routes.read().await.values().cloned().collect())
    }

    async fn saved_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SavedRoute>, PersistenceError> {
        Ok(self
            .routes
            .read()
            .await
            .values()
            .filter(|r| in_range(r, from, to))
            .cloned()
            .collect())
    }

    async fn favorites(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        Ok(self
            .routes
            .read()
            .await
            .values()
            .filter(|r| r.is_favorite)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        Ok(self.routes.read().await.len())
    }
}

/// Backend chosen from `StoreConfig`: the JSON file when a path is set,
/// otherwise memory only.
#[derive(Debug)]
pub enum ConfiguredBackend {
    Memory(InMemoryBackend),
    File(JsonFileBackend),
}

impl ConfiguredBackend {
    pub async fn from_config(config: &StoreConfig) -> Result<Self, PersistenceError> {
        match &config.path {
            Some(path) => Ok(Self::File(JsonFileBackend::open(path).await?)),
            None => {
                debug!("no store path configured; saved routes kept in memory");
                Ok(Self::Memory(InMemoryBackend::new()))
            }
        }
    }
}

impl PersistenceBackend for ConfiguredBackend {
    async fn create(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        match self {
            Self::Memory(b) => b.create(route).await,
            Self::File(b) => b.create(route).await,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<SavedRoute>, PersistenceError> {
        match self {
            Self::Memory(b) => b.get(id).await,
            Self::File(b) => b.get(id).await,
        }
    }

    async fn replace(&self, route: SavedRoute) -> Result<(), PersistenceError> {
        match self {
            Self::Memory(b) => b.replace(route).await,
            Self::File(b) => b.replace(route).await,
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistenceError> {
        match self {
            Self::Memory(b) => b.remove(id).await,
            Self::File(b) => b.remove(id).await,
        }
    }

    async fn clear(&self) -> Result<usize, PersistenceError> {
        match self {
            Self::Memory(b) => b.clear().await,
            Self::File(b) => b.clear().await,
        }
    }

    async fn list(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        match self {
            Self::Memory(b) => b.list().await,
            Self::File(b) => b.list().await,
        }
    }

    async fn saved_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SavedRoute>, PersistenceError> {
        match self {
            Self::Memory(b) => b.saved_between(from, to).await,
            Self::File(b) => b.saved_between(from, to).await,
        }
    }

    async fn favorites(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
        match self {
            Self::Memory(b) => b.favorites().await,
            Self::File(b) => b.favorites().await,
        }
    }

    async fn count(&self) -> Result<usize, PersistenceError> {
        match self {
            Self::Memory(b) => b.count().await,
            Self::File(b) => b.count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::RouteAssembler;
    use crate::models::{OriginalRouteInputs, Stop};
    use chrono::Duration;

    fn route(id: &str, saved_at: DateTime<Utc>, favorite: bool) -> SavedRoute {
        let stops = vec![Stop::new("A", "a", 0.0, 0.0)];
        SavedRoute {
            id: id.to_string(),
            name: id.to_uppercase(),
            route_result: RouteAssembler::default().assemble(stops.clone(), vec![]).unwrap(),
            original_inputs: OriginalRouteInputs::new(stops),
            saved_at,
            is_favorite: favorite,
        }
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("saved-routes-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_memory_create_conflict_and_replace_missing() {
        let backend = InMemoryBackend::new();
        let now = Utc::now();
        backend.create(route("a", now, false)).await.unwrap();
        assert!(matches!(
            backend.create(route("a", now, false)).await,
            Err(PersistenceError::Conflict(_))
        ));
        assert!(matches!(
            backend.replace(route("missing", now, false)).await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_range_and_favorite_queries() {
        let backend = InMemoryBackend::new();
        let now = Utc::now();
        backend.create(route("old", now - Duration::days(10), true)).await.unwrap();
        backend.create(route("new", now - Duration::hours(1), false)).await.unwrap();

        let recent = backend.saved_between(now - Duration::days(1), now).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "new");

        let favorites = backend.favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, "old");
    }

    #[tokio::test]
    async fn test_file_backend_persists_across_reopen() {
        let path = temp_path();
        let now = Utc::now();
        {
            let backend = JsonFileBackend::open(&path).await.unwrap();
            backend.create(route("a", now, false)).await.unwrap();
            backend.create(route("b", now, true)).await.unwrap();
            assert!(backend.remove("a").await.unwrap());
            assert!(!backend.remove("a").await.unwrap());
        }
        let reopened = JsonFileBackend::open(&path).await.unwrap();
        let routes = reopened.list().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].id, "b");
        assert!(routes[0].is_favorite);

        assert_eq!(reopened.clear().await.unwrap(), 1);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_backend_missing_file_is_empty() {
        let backend = JsonFileBackend::open(temp_path()).await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_backend_follows_path() {
        let memory = ConfiguredBackend::from_config(&StoreConfig::default()).await.unwrap();
        assert!(matches!(memory, ConfiguredBackend::Memory(_)));

        let path = temp_path();
        let config = StoreConfig { path: Some(path.clone()) };
        let file = ConfiguredBackend::from_config(&config).await.unwrap();
        file.create(route("a", Utc::now(), false)).await.unwrap();
        assert!(matches!(&file, ConfiguredBackend::File(b) if b.path() == path.as_path()));
        assert!(tokio::fs::metadata(&path).await.is_ok());
        let _ = std::fs::remove_file(&path);
    }
}
