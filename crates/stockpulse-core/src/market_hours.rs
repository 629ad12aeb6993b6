//! Regular-session gate for price refreshes.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::UtcDateTime;

/// Regular trading session of an exchange, in exchange-local time.
///
/// Both boundary minutes are inside the session: with the NYSE defaults,
/// 09:30 and 16:00 are open, 09:29 and 16:01 are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    timezone: Tz,
    open_minute: u32,
    close_minute: u32,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self::us_equities()
    }
}

impl MarketHours {
    pub const fn new(timezone: Tz, open: (u32, u32), close: (u32, u32)) -> Self {
        Self {
            timezone,
            open_minute: open.0 * 60 + open.1,
            close_minute: close.0 * 60 + close.1,
        }
    }

    /// NYSE/Nasdaq regular session, 09:30–16:00 America/New_York.
    pub const fn us_equities() -> Self {
        Self::new(chrono_tz::America::New_York, (9, 30), (16, 0))
    }

    pub fn is_open(&self, at: UtcDateTime) -> bool {
        let Some(utc) = DateTime::<Utc>::from_timestamp(at.unix_seconds(), 0) else {
            return false;
        };
        let local = utc.with_timezone(&self.timezone);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let minute_of_day = local.hour() * 60 + local.minute();
        minute_of_day >= self.open_minute && minute_of_day <= self.close_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> UtcDateTime {
        UtcDateTime::parse(value).expect("timestamp")
    }

    #[test]
    fn boundary_minutes_are_inside_the_session() {
        let hours = MarketHours::us_equities();
        // 2024-01-10 is a Wednesday; New York is on EST (UTC-5).
        assert!(!hours.is_open(at("2024-01-10T14:29:59Z")));
        assert!(hours.is_open(at("2024-01-10T14:30:00Z")));
        assert!(hours.is_open(at("2024-01-10T21:00:59Z")));
        assert!(!hours.is_open(at("2024-01-10T21:01:00Z")));
    }

    #[test]
    fn follows_daylight_saving_time() {
        let hours = MarketHours::us_equities();
        // 2024-07-10 is a Wednesday; New York is on EDT (UTC-4).
        assert!(hours.is_open(at("2024-07-10T13:30:00Z")));
        assert!(!hours.is_open(at("2024-07-10T12:00:00Z")));
        assert!(!hours.is_open(at("2024-07-10T20:30:00Z")));
    }

    #[test]
    fn weekends_and_early_morning_are_closed() {
        let hours = MarketHours::us_equities();
        assert!(!hours.is_open(at("2024-01-13T16:00:00Z")));
        assert!(!hours.is_open(at("2024-01-14T16:00:00Z")));
        assert!(!hours.is_open(at("2024-01-10T13:00:00Z")));
    }
}
