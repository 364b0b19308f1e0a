// Dashboard aggregation
// This file merges saved-route statistics with the external user and event
// collections into a DashboardSnapshot. Each metric group is computed on its
// own and falls back to neutral defaults when its source fails.
//
// Numan Thabit 2025 Nov

use anyhow::Result;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::windows::{growth_rate, success_rate, CalendarWindows};
use super::RouteStatistics;
use crate::config::StatsConfig;
use crate::metrics::AGGREGATION_FALLBACKS;
use crate::store::{PersistenceBackend, RouteStore};

/// External user collection
#[allow(async_fn_in_trait)]
pub trait UserDirectory: Send + Sync {
    async fn total_users(&self) -> Result<u64>;
    /// Users whose account was created in `[from, to)`
    async fn users_joined_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64>;
    /// Users flagged active since `since`
    async fn active_users_since(&self, since: DateTime<Utc>) -> Result<u64>;
}

/// External error/event collection
#[allow(async_fn_in_trait)]
pub trait EventLog: Send + Sync {
    async fn error_count_since(&self, since: DateTime<Utc>) -> Result<u64>;
    async fn total_events_since(&self, since: DateTime<Utc>) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SystemHealth {
    Healthy,
    Warning,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub total_users: u64,
    pub new_users_this_week: u64,
    pub active_users_today: u64,
    pub user_growth_rate: f64,
    pub total_routes: u64,
    pub routes_today: u64,
    pub routes_this_week: u64,
    pub routes_this_month: u64,
    pub route_growth_rate: f64,
    pub error_count: u64,
    pub success_rate: f64,
    pub total_events: u64,
    pub system_health: SystemHealth,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct UserStats {
    total: u64,
    new_this_week: u64,
    new_last_week: u64,
    active_today: u64,
}

#[derive(Debug)]
struct SystemStats {
    errors: u64,
    events: u64,
}

pub struct StatisticsAggregator<B, U, E> {
    store: Arc<RouteStore<B>>,
    users: U,
    events: E,
    config: StatsConfig,
}

impl<B, U, E> StatisticsAggregator<B, U, E>
where
    B: PersistenceBackend,
    U: UserDirectory,
    E: EventLog,
{
    pub fn new(store: Arc<RouteStore<B>>, users: U, events: E, config: StatsConfig) -> Self {
        Self {
            store,
            users,
            events,
            config,
        }
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot_at(&Local::now()).await
    }

    /// Never fails: a group whose source errors is reported with its defaults.
    pub async fn snapshot_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DashboardSnapshot {
        let windows = CalendarWindows::at(now);
        let (routes, users, system) = futures::join!(
            self.route_group(now),
            self.user_group(&windows),
            self.system_group(&windows)
        );

        let (routes, routes_known) = match routes {
            Ok(stats) => (stats, true),
            Err(err) => {
                fallback("routes", &err);
                (RouteStatistics::default(), false)
            }
        };
        let users = users.unwrap_or_else(|err| {
            fallback("users", &err);
            UserStats::default()
        });
        let (error_count, total_events, rate, health) = match system {
            Ok(s) => {
                // zero-filled route counts would read as 0% success
                let rate = if routes_known {
                    success_rate(routes.total_routes, s.errors)
                } else {
                    100.0
                };
                (s.errors, s.events, rate, self.health(s.errors))
            }
            Err(err) => {
                fallback("system", &err);
                (0, 0, 100.0, SystemHealth::Unknown)
            }
        };

        let snapshot = DashboardSnapshot {
            total_users: users.total,
            new_users_this_week: users.new_this_week,
            active_users_today: users.active_today,
            user_growth_rate: growth_rate(users.new_this_week, users.new_last_week),
            total_routes: routes.total_routes,
            routes_today: routes.today,
            routes_this_week: routes.this_week,
            routes_this_month: routes.this_month,
            route_growth_rate: routes.growth_rate,
            error_count,
            success_rate: rate,
            total_events,
            system_health: health,
            generated_at: windows.now,
        };
        debug!(
            users = snapshot.total_users,
            routes = snapshot.total_routes,
            errors = snapshot.error_count,
            health = ?snapshot.system_health,
            "dashboard snapshot computed"
        );
        snapshot
    }

    fn health(&self, errors: u64) -> SystemHealth {
        if errors < self.config.health_error_threshold {
            SystemHealth::Healthy
        } else {
            SystemHealth::Warning
        }
    }

    async fn route_group<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<RouteStatistics> {
        Ok(self.store.statistics_at(now).await?)
    }

    async fn user_group(&self, w: &CalendarWindows) -> Result<UserStats> {
        let (total, new_this_week, new_last_week, active_today) = futures::try_join!(
            self.users.total_users(),
            self.users.users_joined_between(w.week_start, w.now),
            self.users.users_joined_between(w.last_week_start, w.week_start),
            self.users.active_users_since(w.today_start),
        )?;
        Ok(UserStats {
            total,
            new_this_week,
            new_last_week,
            active_today,
        })
    }

    async fn system_group(&self, w: &CalendarWindows) -> Result<SystemStats> {
        let since = w.now - Duration::days(self.config.error_window_days);
        let (errors, events) = futures::try_join!(
            self.events.error_count_since(since),
            self.events.total_events_since(since),
        )?;
        Ok(SystemStats { errors, events })
    }
}

fn fallback(group: &str, err: &anyhow::Error) {
    AGGREGATION_FALLBACKS.with_label_values(&[group]).inc();
    warn!(group = group, error = %err, "metric group unavailable; using defaults");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::RouteAssembler;
    use crate::fingerprint::SimilarityRule;
    use crate::models::{OriginalRouteInputs, Stop};
    use crate::errors::PersistenceError;
    use crate::models::SavedRoute;
    use crate::store::InMemoryBackend;
    use anyhow::bail;

    struct Users {
        total: u64,
        this_week: u64,
        last_week: u64,
        active: u64,
    }

    impl UserDirectory for Users {
        async fn total_users(&self) -> Result<u64> {
            Ok(self.total)
        }

        async fn users_joined_between(&self, _from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64> {
            // this week's window ends now, last week's ends six days back
            if Utc::now() - to < Duration::days(1) {
                Ok(self.this_week)
            } else {
                Ok(self.last_week)
            }
        }

        async fn active_users_since(&self, _since: DateTime<Utc>) -> Result<u64> {
            Ok(self.active)
        }
    }

    struct BrokenUsers;

    impl UserDirectory for BrokenUsers {
        async fn total_users(&self) -> Result<u64> {
            bail!("users collection unreachable")
        }

        async fn users_joined_between(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<u64> {
            bail!("users collection unreachable")
        }

        async fn active_users_since(&self, _: DateTime<Utc>) -> Result<u64> {
            bail!("users collection unreachable")
        }
    }

    struct Events {
        errors: u64,
        total: u64,
    }

    impl EventLog for Events {
        async fn error_count_since(&self, _: DateTime<Utc>) -> Result<u64> {
            Ok(self.errors)
        }

        async fn total_events_since(&self, _: DateTime<Utc>) -> Result<u64> {
            Ok(self.total)
        }
    }

    struct BrokenEvents;

    impl EventLog for BrokenEvents {
        async fn error_count_since(&self, _: DateTime<Utc>) -> Result<u64> {
            bail!("errors collection unreachable")
        }

        async fn total_events_since(&self, _: DateTime<Utc>) -> Result<u64> {
            bail!("errors collection unreachable")
        }
    }

    struct UnreachableBackend;

    fn unreachable() -> PersistenceError {
        PersistenceError::Backend("route collection unreachable".into())
    }

    impl PersistenceBackend for UnreachableBackend {
        async fn create(&self, _: SavedRoute) -> Result<(), PersistenceError> {
            Err(unreachable())
        }

        async fn get(&self, _: &str) -> Result<Option<SavedRoute>, PersistenceError> {
            Err(unreachable())
        }

        async fn replace(&self, _: SavedRoute) -> Result<(), PersistenceError> {
            Err(unreachable())
        }

        async fn remove(&self, _: &str) -> Result<bool, PersistenceError> {
            Err(unreachable())
        }

        async fn clear(&self) -> Result<usize, PersistenceError> {
            Err(unreachable())
        }

        async fn list(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
            Err(unreachable())
        }

        async fn saved_between(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<SavedRoute>, PersistenceError> {
            Err(unreachable())
        }

        async fn favorites(&self) -> Result<Vec<SavedRoute>, PersistenceError> {
            Err(unreachable())
        }
    }

    async fn store_with(count: usize) -> Arc<RouteStore<InMemoryBackend>> {
        let store = RouteStore::new(InMemoryBackend::new(), SimilarityRule::new(0.75));
        for i in 0..count {
            let stops = vec![Stop::new(format!("S{i}"), format!("{i} Pine St"), 0.0, 0.0)];
            let result = RouteAssembler::default().assemble(stops.clone(), vec![]).unwrap();
            store.save(result, OriginalRouteInputs::new(stops)).await.unwrap();
        }
        Arc::new(store)
    }

    fn users() -> Users {
        Users {
            total: 120,
            this_week: 15,
            last_week: 10,
            active: 9,
        }
    }

    #[tokio::test]
    async fn test_full_snapshot() {
        let agg = StatisticsAggregator::new(store_with(8).await, users(), Events { errors: 2, total: 40 }, StatsConfig::default());
        let snap = agg.snapshot_at(&Utc::now()).await;
        assert_eq!(snap.total_users, 120);
        assert_eq!(snap.new_users_this_week, 15);
        assert_eq!(snap.active_users_today, 9);
        assert_eq!(snap.user_growth_rate, 50.0);
        assert_eq!(snap.total_routes, 8);
        assert_eq!(snap.routes_today, 8);
        assert_eq!(snap.error_count, 2);
        assert_eq!(snap.success_rate, 80.0);
        assert_eq!(snap.total_events, 40);
        assert_eq!(snap.system_health, SystemHealth::Healthy);
    }

    #[tokio::test]
    async fn test_error_threshold_flags_warning() {
        let agg = StatisticsAggregator::new(store_with(0).await, users(), Events { errors: 10, total: 10 }, StatsConfig::default());
        let snap = agg.snapshot_at(&Utc::now()).await;
        assert_eq!(snap.system_health, SystemHealth::Warning);
        assert_eq!(snap.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_event_failure_only_blanks_system_group() {
        let agg = StatisticsAggregator::new(store_with(3).await, users(), BrokenEvents, StatsConfig::default());
        let snap = agg.snapshot_at(&Utc::now()).await;
        assert_eq!(snap.success_rate, 100.0);
        assert_eq!(snap.system_health, SystemHealth::Unknown);
        assert_eq!(snap.error_count, 0);
        assert_eq!(snap.total_routes, 3);
        assert_eq!(snap.total_users, 120);
    }

    #[tokio::test]
    async fn test_user_failure_only_blanks_user_group() {
        let agg = StatisticsAggregator::new(store_with(2).await, BrokenUsers, Events { errors: 0, total: 5 }, StatsConfig::default());
        let snap = agg.snapshot_at(&Utc::now()).await;
        assert_eq!(snap.total_users, 0);
        assert_eq!(snap.user_growth_rate, 0.0);
        assert_eq!(snap.total_routes, 2);
        assert_eq!(snap.success_rate, 100.0);
        assert_eq!(snap.system_health, SystemHealth::Healthy);
    }

    #[tokio::test]
    async fn test_route_failure_leaves_success_rate_neutral() {
        let store = Arc::new(RouteStore::new(UnreachableBackend, SimilarityRule::new(0.75)));
        let agg = StatisticsAggregator::new(store, users(), Events { errors: 2, total: 50 }, StatsConfig::default());
        let snap = agg.snapshot_at(&Utc::now()).await;
        assert_eq!(snap.total_routes, 0);
        assert_eq!(snap.routes_this_week, 0);
        assert_eq!(snap.success_rate, 100.0);
        assert_eq!(snap.error_count, 2);
        assert_eq!(snap.total_events, 50);
        assert_eq!(snap.system_health, SystemHealth::Healthy);
        assert_eq!(snap.total_users, 120);
    }

    #[tokio::test]
    async fn test_snapshot_serializes_camel_case() {
        let agg = StatisticsAggregator::new(store_with(0).await, users(), Events { errors: 0, total: 0 }, StatsConfig::default());
        let json = serde_json::to_value(agg.snapshot_at(&Utc::now()).await).unwrap();
        assert_eq!(json["systemHealth"], "Healthy");
        assert_eq!(json["successRate"], 100.0);
        assert!(json.get("newUsersThisWeek").is_some());
    }
}
