use std::fmt;

use crate::error::ConfigError;

/// Number of seconds in one day.
pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Largest end bound accepted for a time range. Ranges may run past
/// midnight, but never by more than a full day.
pub const MAX_RANGE_END: u32 = 2 * SECONDS_PER_DAY;

/// A window within a day, including the start and excluding the end. Both
/// bounds are seconds since local midnight.
///
/// The end may exceed `SECONDS_PER_DAY`, which expresses a window crossing
/// midnight. When evaluating a given date only the part before the next
/// midnight matters, so such a range simply covers the rest of its day.
///
/// Ordering is lexicographic on (start, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeRange {
    start: u32,
    end: u32,
}

impl TimeRange {
    /// Creates a time range from second offsets. The bounds are expected to
    /// have been validated already, see `TimeRange::checked`.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "time range starts after it ends");
        debug_assert!(end <= MAX_RANGE_END, "time range ends too far past midnight");
        TimeRange { start, end }
    }

    /// Creates a time range, rejecting bounds that are out of order or that
    /// run more than a day past midnight.
    pub fn checked(start: u32, end: u32) -> Result<Self, ConfigError> {
        if start > end || end > MAX_RANGE_END {
            return Err(ConfigError::InvalidTimeRange { start, end });
        }
        Ok(TimeRange { start, end })
    }

    /// Creates a time range from hours and minutes, e.g. `hm(8, 30, 12, 30)`
    /// for 08:30-12:30.
    pub fn hm(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        TimeRange::new(
            start_hour * 3600 + start_minute * 60,
            end_hour * 3600 + end_minute * 60,
        )
    }

    /// The whole day, 00:00-24:00.
    pub fn all_day() -> Self {
        TimeRange { start: 0, end: SECONDS_PER_DAY }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// The end bound, cut off at the next midnight.
    pub fn end_within_day(&self) -> u32 {
        self.end.min(SECONDS_PER_DAY)
    }

    /// Whether the given number of seconds since midnight falls inside the
    /// range.
    pub fn contains(&self, seconds: u32) -> bool {
        self.start <= seconds && seconds < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 3600,
            (self.start % 3600) / 60,
            self.end / 3600,
            (self.end % 3600) / 60
        )
    }
}

/// Displays a list of time ranges separated by commas, e.g.
/// `08:30-12:30, 18:30-21:15`.
pub struct TimeRanges<'a>(pub &'a [TimeRange]);

impl fmt::Display for TimeRanges<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

/// Returns how far a run of overlapping or touching ranges reaches when
/// starting at `seconds`, capped at midnight. Returns `seconds` itself if no
/// range contains it.
pub fn covered_until(ranges: &[TimeRange], seconds: u32) -> u32 {
    let mut reach = seconds;
    while reach < SECONDS_PER_DAY {
        match ranges.iter().filter(|range| range.contains(reach)).map(TimeRange::end).max() {
            Some(end) => reach = end.min(SECONDS_PER_DAY),
            None => break,
        }
    }
    reach
}
