//! Query time window for a scrape cycle

use chrono::{DateTime, TimeDelta, Utc};

/// Length of every query window
pub const WINDOW_SECS: i64 = 60;

/// A one-minute window aligned to minute boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window ending on the last full minute at least `scrape_delay_secs` before `now`.
    ///
    /// The end is floored, never rounded up, so the window never reaches into
    /// data the provider may still be aggregating.
    pub fn compute(now: DateTime<Utc>, scrape_delay_secs: u32) -> Self {
        let delayed = now - TimeDelta::seconds(i64::from(scrape_delay_secs));
        let excess = TimeDelta::seconds(delayed.timestamp().rem_euclid(WINDOW_SECS))
            + TimeDelta::nanoseconds(i64::from(delayed.timestamp_subsec_nanos()));
        let end = delayed - excess;

        Self {
            start: end - TimeDelta::seconds(WINDOW_SECS),
            end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_is_minute_aligned() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 30).unwrap()
            + TimeDelta::milliseconds(750);
        let window = TimeWindow::compute(now, 300);

        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 5, 1, 12, 4, 0).unwrap());
    }

    #[test]
    fn test_window_on_exact_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap();
        let window = TimeWindow::compute(now, 0);
        assert_eq!(window.end, now);
        assert_eq!(window.end - window.start, TimeDelta::seconds(60));
    }

    #[test]
    fn test_window_properties_hold_across_inputs() {
        let base = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        for offset_ms in (0..180_000).step_by(7_919) {
            for delay in [0, 1, 59, 60, 61, 300, 3600] {
                let now = base + TimeDelta::milliseconds(offset_ms);
                let window = TimeWindow::compute(now, delay);

                assert_eq!(window.end.timestamp() % 60, 0);
                assert_eq!(window.end.timestamp_subsec_nanos(), 0);
                assert!(window.end <= now - TimeDelta::seconds(i64::from(delay)));
                assert_eq!(window.end - window.start, TimeDelta::seconds(60));
            }
        }
    }

    #[test]
    fn test_window_before_epoch_floors_down() {
        let now = DateTime::from_timestamp(-30, 0).unwrap();
        let window = TimeWindow::compute(now, 0);
        assert_eq!(window.end.timestamp(), -60);
    }
}
