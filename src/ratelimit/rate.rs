//! Event rates and the time windows they are expressed in.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

/// Time window a rate is expressed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            TimeWindow::Second => "s",
            TimeWindow::Minute => "min",
            TimeWindow::Hour => "h",
            TimeWindow::Day => "d",
        }
    }
}

/// A token refill rate in events per second.
///
/// `Rate::INFINITE` disables limiting entirely. Rates order by magnitude, so
/// the most restrictive of a set of rates is its minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate(f64);

impl Rate {
    /// No limit at all.
    pub const INFINITE: Rate = Rate(f64::INFINITY);

    /// A rate that never refills.
    pub const ZERO: Rate = Rate(0.0);

    /// `events` per second.
    pub fn per_second(events: f64) -> Self {
        Rate(events)
    }

    /// One event every `interval`. A zero interval is unbounded.
    pub fn every(interval: Duration) -> Self {
        if interval.is_zero() {
            return Rate::INFINITE;
        }
        Rate(1.0 / interval.as_secs_f64())
    }

    /// `events` per `window`.
    pub fn per(events: f64, window: TimeWindow) -> Self {
        Rate(events / window.duration().as_secs_f64())
    }

    /// Events per second as a float.
    pub fn as_per_second(self) -> f64 {
        self.0
    }

    pub fn is_infinite(self) -> bool {
        self.0.is_infinite() && self.0 > 0.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    /// Whether this rate can back a token bucket.
    pub(crate) fn is_valid(self) -> bool {
        !self.0.is_nan() && self.0 >= 0.0
    }

    /// Tokens accrued over `elapsed`.
    pub(crate) fn tokens_over(self, elapsed: Duration) -> f64 {
        if elapsed.is_zero() || self.is_zero() {
            return 0.0;
        }
        elapsed.as_secs_f64() * self.0
    }

    /// Time needed to accrue `tokens`, or `None` if that never happens.
    pub(crate) fn duration_for(self, tokens: f64) -> Option<Duration> {
        if tokens <= 0.0 {
            return Some(Duration::ZERO);
        }
        if self.is_zero() {
            return None;
        }
        Duration::try_from_secs_f64(tokens / self.0).ok()
    }

    /// Total order used when sorting limiters, most restrictive first.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Rate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

/// Renders in the shortest window holding at least one event, e.g. `2/s`,
/// `10/min` or `1.5/h`, rounded to three decimals.
impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            return write!(f, "unlimited");
        }

        let windows = [
            TimeWindow::Second,
            TimeWindow::Minute,
            TimeWindow::Hour,
            TimeWindow::Day,
        ];
        let window = windows
            .into_iter()
            .find(|window| self.0 * window.duration().as_secs_f64() >= 1.0)
            .unwrap_or(if self.is_zero() { TimeWindow::Second } else { TimeWindow::Day });

        let count = format!("{:.3}", self.0 * window.duration().as_secs_f64());
        let count = count.trim_end_matches('0').trim_end_matches('.');
        write!(f, "{}/{}", count, window.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_rate_constructors_agree() {
        assert_eq!(Rate::every(Duration::from_millis(500)), Rate::per_second(2.0));
        assert_eq!(Rate::per(120.0, TimeWindow::Minute), Rate::per_second(2.0));
        assert_eq!(Rate::every(Duration::ZERO), Rate::INFINITE);
    }

    #[test]
    fn test_rate_ordering() {
        let per_minute = Rate::per(10.0, TimeWindow::Minute);
        let per_second = Rate::per_second(2.0);

        assert!(per_minute < per_second);
        assert!(per_second < Rate::INFINITE);
        assert_eq!(Rate::ZERO.total_cmp(&per_minute), Ordering::Less);
    }

    #[test]
    fn test_duration_for_tokens() {
        let rate = Rate::per_second(2.0);

        assert_eq!(rate.duration_for(1.0), Some(Duration::from_millis(500)));
        assert_eq!(rate.duration_for(0.0), Some(Duration::ZERO));
        assert_eq!(Rate::ZERO.duration_for(1.0), None);
    }

    #[test]
    fn test_tokens_over_elapsed() {
        let rate = Rate::per_second(4.0);

        assert_eq!(rate.tokens_over(Duration::from_millis(250)), 1.0);
        assert_eq!(Rate::ZERO.tokens_over(Duration::from_secs(100)), 0.0);
    }

    #[test]
    fn test_validity() {
        assert!(Rate::ZERO.is_valid());
        assert!(Rate::INFINITE.is_valid());
        assert!(!Rate::per_second(-1.0).is_valid());
        assert!(!Rate::per_second(f64::NAN).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(Rate::per_second(2.0).to_string(), "2/s");
        assert_eq!(Rate::per_second(1.5).to_string(), "1.5/s");
        assert_eq!(Rate::INFINITE.to_string(), "unlimited");
        assert_eq!(Rate::ZERO.to_string(), "0/s");
    }

    #[test]
    fn test_display_picks_readable_window() {
        assert_eq!(Rate::per(1.0, TimeWindow::Minute).to_string(), "1/min");
        assert_eq!(Rate::per(10.0, TimeWindow::Minute).to_string(), "10/min");
        assert_eq!(Rate::per_second(0.5).to_string(), "30/min");
        assert_eq!(Rate::per(90.0, TimeWindow::Hour).to_string(), "1.5/min");
        assert_eq!(Rate::per(3.0, TimeWindow::Hour).to_string(), "3/h");
        assert_eq!(Rate::per(1.0, TimeWindow::Day).to_string(), "1/d");
        assert_eq!(Rate::per(0.5, TimeWindow::Day).to_string(), "0.5/d");
        assert_eq!(Rate::every(Duration::from_secs(7)).to_string(), "8.571/min");
    }
}
