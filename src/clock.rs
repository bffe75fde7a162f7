use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Wall-clock time in the plant's authoritative zone.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// `None` when the offset falls outside chrono's calendar.
    fn days_ago(&self, days: i64) -> Option<NaiveDate> {
        Duration::try_days(days).and_then(|offset| self.today().checked_sub_signed(offset))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// A clock pinned to one instant, used for `--at` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_days_follow_the_pinned_instant() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(0, 10, 0))
            .unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(clock.days_ago(1), NaiveDate::from_ymd_opt(2026, 2, 28));
        assert!(clock.days_ago(i64::MAX).is_none());
        assert!(clock.days_ago(1_000_000_000).is_none());
    }

    #[test]
    fn system_clock_applies_offset() {
        let utc = SystemClock::new(FixedOffset::east_opt(0).unwrap()).now();
        let kst = SystemClock::new(FixedOffset::east_opt(9 * 3600).unwrap()).now();
        let gap = (kst - utc).num_minutes();
        assert!((539..=541).contains(&gap));
    }
}
