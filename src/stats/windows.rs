// Calendar windows and rate formulas

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Percentage change from `last` to `current`; 0.0 when there is no baseline.
pub fn growth_rate(current: u64, last: u64) -> f64 {
    if last == 0 {
        return 0.0;
    }
    (current as f64 - last as f64) / last as f64 * 100.0
}

/// Share of routes among routes plus errors, in percent; 100.0 when both are zero.
pub fn success_rate(total_routes: u64, error_count: u64) -> f64 {
    let denominator = total_routes + error_count;
    if denominator == 0 {
        return 100.0;
    }
    total_routes as f64 / denominator as f64 * 100.0
}

/// Day-aligned window starts in the caller's time zone, stored as UTC.
///
/// "This week" is the seven calendar days ending today, "last week" the seven
/// before that, "this month" the thirty ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindows {
    pub now: DateTime<Utc>,
    pub today_start: DateTime<Utc>,
    pub week_start: DateTime<Utc>,
    pub last_week_start: DateTime<Utc>,
    pub month_start: DateTime<Utc>,
    /// End of today, exclusive bound for every window
    pub tomorrow_start: DateTime<Utc>,
}

impl CalendarWindows {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let start = |days_back: i64| local_midnight(&tz, today - Duration::days(days_back));
        Self {
            now: now.with_timezone(&Utc),
            today_start: start(0),
            week_start: start(6),
            last_week_start: start(13),
            month_start: start(29),
            tomorrow_start: start(-1),
        }
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        // midnight skipped by a DST change
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
