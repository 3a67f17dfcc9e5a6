use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime,
    NaiveTime, Offset as _, SubsecRound as _, TimeZone, Timelike as _, Utc, Weekday,
};
use tracing::warn;

use crate::data::timerange::SECONDS_PER_DAY;

/// Time zones of the IANA database, the usual calendar to evaluate in.
pub use chrono_tz::Tz;

/// A single moment in time, independent of any time zone.
pub type Timestamp = DateTime<Utc>;

/// A moment broken down into the local calendar date and the number of
/// seconds since local midnight of that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalInstant {
    pub date: NaiveDate,
    pub seconds: u32,
}

impl LocalInstant {
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

/// Converts between timestamps and the local calendar in which time periods
/// are expressed. This is the only environment dependency of evaluation;
/// tests pick a fixed zone.
pub trait Calendar {
    /// The offset of local time from UTC at `instant`.
    fn offset_at(&self, instant: Timestamp) -> FixedOffset;

    /// Returns the timestamp `seconds` after local midnight of `date`.
    /// `seconds` may exceed one day, in which case the result lands on a
    /// following date. Returns `None` if the result is out of range.
    fn at(&self, date: NaiveDate, seconds: u32) -> Option<Timestamp>;

    /// Breaks a timestamp down into local date and time of day, or returns
    /// `None` when the local time is not representable.
    fn local(&self, instant: Timestamp) -> Option<LocalInstant> {
        let offset = Duration::seconds(self.offset_at(instant).local_minus_utc().into());
        let local = instant.naive_utc().checked_add_signed(offset)?;
        Some(LocalInstant { date: local.date(), seconds: local.time().num_seconds_from_midnight() })
    }

    /// The first instant after `from`, and no later than `until`, at which
    /// the offset differs from the one at `from`.
    ///
    /// Offsets are sampled every six hours, so a change that is undone
    /// within less than that goes unnoticed.
    fn next_transition(&self, from: Timestamp, until: Timestamp) -> Option<Timestamp> {
        let offset = self.offset_at(from);
        let mut low = from;
        while low < until {
            let high = low.checked_add_signed(Duration::hours(6)).map_or(until, |h| h.min(until));
            if self.offset_at(high) == offset {
                low = high;
                continue;
            }
            let mut high = high;
            while high - low > Duration::seconds(1) {
                let middle = low + (high - low) / 2;
                if self.offset_at(middle) == offset {
                    low = middle;
                } else {
                    high = middle;
                }
            }
            // offsets change on whole seconds
            let whole = high.trunc_subsecs(0);
            if whole > low && self.offset_at(whole) != offset {
                return Some(whole);
            }
            return Some(high);
        }
        None
    }
}

/// Any `chrono` time zone is a calendar. Local times that fall in a DST gap
/// are moved forward by the length of the gap; local times that occur twice
/// resolve to the earlier occurrence.
impl<Z: TimeZone> Calendar for Z {
    fn offset_at(&self, instant: Timestamp) -> FixedOffset {
        self.offset_from_utc_datetime(&instant.naive_utc()).fix()
    }

    fn at(&self, date: NaiveDate, seconds: u32) -> Option<Timestamp> {
        let date = date.checked_add_days(Days::new(u64::from(seconds / SECONDS_PER_DAY)))?;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds % SECONDS_PER_DAY, 0)?;
        let naive = date.and_time(time);
        let offset = match self.offset_from_local_datetime(&naive) {
            LocalResult::Single(offset) => offset.fix(),
            // the larger offset is the earlier instant
            LocalResult::Ambiguous(first, second) => {
                let (first, second) = (first.fix(), second.fix());
                if first.local_minus_utc() >= second.local_minus_utc() {
                    first
                } else {
                    second
                }
            }
            LocalResult::None => {
                // use the offset in effect before the gap, which lands as far
                // past the gap as the requested time was into it
                let before = naive.checked_sub_signed(Duration::hours(3))?;
                warn!(%naive, "local time does not exist, shifting past the gap");
                self.offset_from_local_datetime(&before).earliest()?.fix()
            }
        };
        to_utc(naive, offset)
    }
}

fn to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Option<Timestamp> {
    let utc = naive.checked_sub_signed(Duration::seconds(offset.local_minus_utc().into()))?;
    Some(Utc.from_utc_datetime(&utc))
}

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock stuck at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
