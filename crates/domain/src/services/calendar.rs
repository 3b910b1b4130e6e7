//! Business-day boundaries for quota resets and scheduled jobs.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

use crate::models::user_membership::UserMembership;

/// Default business timezone, UTC+08:00.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Computes local calendar boundaries at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl BusinessCalendar {
    /// Returns `None` for offsets outside +/-24h.
    pub fn new(offset_secs: i32) -> Option<Self> {
        FixedOffset::east_opt(offset_secs).map(|offset| Self { offset })
    }

    /// Local date of `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Start of the local day containing `now`, as UTC.
    pub fn start_of_day(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = self.today(now).and_hms_opt(0, 0, 0).unwrap_or_default();
        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now)
    }

    /// Next local midnight strictly after `now`, as UTC.
    pub fn next_midnight(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_day(now) + Duration::days(1)
    }

    /// Applies lazy daily/monthly resets to a membership. Returns true if changed.
    pub fn reset_membership(&self, membership: &mut UserMembership, now: DateTime<Utc>) -> bool {
        membership.reset_counters(self.today(now))
    }
}
