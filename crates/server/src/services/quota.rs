//! Daily admission control for anonymous callers.
//!
//! The window is the current calendar day in server-local time,
//! `[start of day, start of next day)`. Counts come straight from the audit
//! log on every request; nothing is cached.
//!
//! Reading the count and appending the audit record are separate steps, so
//! concurrent requests from one origin can all observe the same count and
//! all be admitted.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveDate, TimeDelta, TimeZone, Utc};

use picmaker_core::Origin;

use crate::db::{AuditStore, RepositoryError};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed. `remaining` is what the response advertises.
    Admitted { used: u64, remaining: u64 },
    /// Over the daily limit. Nothing remains.
    Rejected { used: u64 },
}

impl Admission {
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Half-open UTC interval covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The server-local day containing now.
    #[must_use]
    pub fn today() -> Self {
        Self::containing(&Local::now())
    }

    /// The calendar day (in `at`'s own time zone) containing `at`.
    #[must_use]
    pub fn containing<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        let tz = at.timezone();
        let day = at.date_naive();
        let next = day.checked_add_days(Days::new(1)).unwrap_or(day);
        Self {
            start: start_of_day(&tz, day),
            end: start_of_day(&tz, next),
        }
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// First instant of `day` in `tz`. Midnight can fall into a DST gap in a few
/// zones; the first valid instant after it is used then.
fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + TimeDelta::hours(hours)))
                .earliest()
        })
        .map_or_else(|| midnight.and_utc(), |start| start.with_timezone(&Utc))
}

/// Counts anonymous pictures per origin and applies the daily limit.
#[derive(Clone)]
pub struct QuotaTracker {
    audit: Arc<dyn AuditStore>,
}

impl QuotaTracker {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditStore>) -> Self {
        Self { audit }
    }

    /// Anonymous pictures delivered to `origin` today.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the audit log cannot be read.
    pub async fn count_today(&self, origin: &Origin) -> Result<u64, RepositoryError> {
        self.count_in(origin, DayWindow::today()).await
    }

    /// Anonymous pictures delivered to `origin` within `window`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the audit log cannot be read.
    pub async fn count_in(
        &self,
        origin: &Origin,
        window: DayWindow,
    ) -> Result<u64, RepositoryError> {
        self.audit
            .count_free_between(origin, window.start, window.end)
            .await
    }

    /// Admit while today's count is at most `daily_limit`.
    ///
    /// A count equal to the limit is still admitted, so `daily_limit + 1`
    /// pictures can be delivered per day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the audit log cannot be read.
    pub async fn check_and_admit(
        &self,
        origin: &Origin,
        daily_limit: u64,
    ) -> Result<Admission, RepositoryError> {
        let used = self.count_today(origin).await?;
        Ok(decide(used, daily_limit))
    }
}

const fn decide(used: u64, daily_limit: u64) -> Admission {
    if used <= daily_limit {
        Admission::Admitted {
            used,
            remaining: daily_limit.saturating_sub(used),
        }
    } else {
        Admission::Rejected { used }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::FixedOffset;
    use picmaker_core::QualityTier;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::picture::NewFreePicture;

    #[test]
    fn test_fence_post_admits_limit_plus_one() {
        assert_eq!(decide(0, 2), Admission::Admitted { used: 0, remaining: 2 });
        assert_eq!(decide(1, 2), Admission::Admitted { used: 1, remaining: 1 });
        assert_eq!(decide(2, 2), Admission::Admitted { used: 2, remaining: 0 });
        assert_eq!(decide(3, 2), Admission::Rejected { used: 3 });
    }

    #[test]
    fn test_zero_limit_still_admits_first() {
        assert!(decide(0, 0).is_admitted());
        assert!(!decide(1, 0).is_admitted());
    }

    #[test]
    fn test_window_follows_local_midnight() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let at = tz.with_ymd_and_hms(2026, 3, 14, 0, 30, 0).unwrap();
        let window = DayWindow::containing(&at);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 13, 22, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 14, 22, 0, 0).unwrap());
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
    }

    #[tokio::test]
    async fn test_counts_only_this_origin_today() {
        let store = Arc::new(MemoryStore::new());
        let tracker = QuotaTracker::new(store.clone());
        let origin = Origin::from("192.0.2.10");
        let window = DayWindow::today();

        for (origin, created_at) in [
            (origin.clone(), window.start),
            (origin.clone(), window.end - TimeDelta::seconds(1)),
            (origin.clone(), window.start - TimeDelta::seconds(1)),
            (Origin::from("192.0.2.11"), window.start),
        ] {
            store
                .append_free(NewFreePicture {
                    origin,
                    quality: QualityTier::Preview,
                    created_at,
                })
                .await
                .unwrap();
        }

        assert_eq!(tracker.count_in(&origin, window).await.unwrap(), 2);
        assert_eq!(
            tracker.count_in(&Origin::from("192.0.2.99"), window).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let tracker = QuotaTracker::new(store);
        assert!(
            tracker
                .check_and_admit(&Origin::from("192.0.2.1"), 5)
                .await
                .is_err()
        );
    }
}
