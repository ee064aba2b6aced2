use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// A simple clock abstraction for deterministic time in the reducer,
/// storage adapter, and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Renders a timestamp in the canonical storage form: RFC 3339 with
/// millisecond precision and a `Z` suffix (`2024-01-01T00:00:00.000Z`).
///
/// All timestamps crossing the persistence boundary use this exact shape;
/// [`parse_timestamp`] accepts nothing else.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a canonical timestamp string, rejecting any rendering that does
/// not round-trip byte-for-byte through [`format_timestamp`].
///
/// Loose inputs such as `"2024-1-1"` or second-precision RFC 3339 strings
/// return `None`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    if format_timestamp(parsed) == raw {
        Some(parsed)
    } else {
        None
    }
}

/// Deterministic timestamp for tests and doc examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_timestamp_round_trips() {
        let rendered = format_timestamp(fixed_now());
        assert_eq!(rendered, "2023-11-14T22:13:20.000Z");
        assert_eq!(parse_timestamp(&rendered), Some(fixed_now()));
    }

    #[test]
    fn loose_timestamps_are_rejected() {
        assert_eq!(parse_timestamp("2024-1-1"), None);
        assert_eq!(parse_timestamp("2024-01-01"), None);
        // Valid RFC 3339, but not the canonical millisecond rendering.
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), None);
        assert_eq!(parse_timestamp("2024-01-01T00:00:00.000+00:00"), None);
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        let before = clock.now();
        clock.advance(Duration::days(1));
        assert_eq!(clock.now() - before, Duration::days(1));
    }
}
