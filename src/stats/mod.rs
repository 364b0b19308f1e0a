// Usage statistics
// This file computes windowed saved-route counts and re-exports the dashboard
// aggregator and the rate formulas it shares with the route store
//
// Numan Thabit 2025 Nov

pub mod aggregator;
pub mod windows;

pub use aggregator::{DashboardSnapshot, EventLog, StatisticsAggregator, SystemHealth, UserDirectory};
pub use windows::{growth_rate, success_rate, CalendarWindows};

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::models::SavedRoute;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatistics {
    pub total_routes: u64,
    pub favorites: u64,
    pub today: u64,
    pub this_week: u64,
    pub last_week: u64,
    pub this_month: u64,
    /// Week-over-week change in saved routes, percent
    pub growth_rate: f64,
}

impl RouteStatistics {
    /// Single pass over `routes`, bucketed by calendar days relative to `now`.
    pub fn compute<Tz: TimeZone>(routes: &[SavedRoute], now: &DateTime<Tz>) -> Self {
        let favorites = routes.iter().filter(|r| r.is_favorite).count() as u64;
        Self::from_windowed(routes.len() as u64, favorites, routes, &CalendarWindows::at(now))
    }

    /// Collection-wide counts plus window buckets over `recent`, which must
    /// hold every route saved in `[w.month_start, w.tomorrow_start)`.
    pub fn from_windowed(total_routes: u64, favorites: u64, recent: &[SavedRoute], w: &CalendarWindows) -> Self {
        let mut stats = RouteStatistics {
            total_routes,
            favorites,
            ..Default::default()
        };
        for route in recent {
            let at = route.saved_at;
            if at >= w.today_start {
                stats.today += 1;
            }
            if at >= w.week_start {
                stats.this_week += 1;
            } else if at >= w.last_week_start {
                stats.last_week += 1;
            }
            if at >= w.month_start {
                stats.this_month += 1;
            }
        }
        stats.growth_rate = growth_rate(stats.this_week, stats.last_week);
        stats
    }
}
