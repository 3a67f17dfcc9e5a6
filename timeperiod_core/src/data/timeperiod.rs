use std::fmt;

use chrono::Weekday;

use super::{
    daterange::{weekday_name, DateRange, ExceptionKind},
    timerange::{TimeRange, TimeRanges},
};

/// Weekdays in the order the weekly schedule stores them.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// A named set of recurring time windows.
///
/// A time period is built once from resolved configuration and never
/// modified afterwards; a configuration reload builds new values instead.
/// All the builder methods therefore consume `self`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimePeriod {
    name: String,
    alias: String,
    /// The base schedule, indexed by days since Sunday. Each list is sorted.
    weekly: [Vec<TimeRange>; 7],
    /// Calendar exceptions, indexed by `ExceptionKind::index`. On any date
    /// matched by at least one exception, the exceptions replace the weekly
    /// schedule for that date.
    exceptions: [Vec<DateRange>; 5],
    /// Names of time periods whose valid times are removed from this one.
    /// These are looked up in a `Registry`, never owned.
    excluded: Vec<String>,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TimePeriod { name: name.into(), alias: alias.into(), ..Default::default() }
    }

    /// Sets the time ranges of one day of the weekly schedule.
    pub fn with_weekday(mut self, weekday: Weekday, mut ranges: Vec<TimeRange>) -> Self {
        ranges.sort();
        self.weekly[weekday.num_days_from_sunday() as usize] = ranges;
        self
    }

    /// Sets the same time ranges on every day of the week.
    pub fn with_every_day(self, ranges: Vec<TimeRange>) -> Self {
        WEEKDAYS.iter().fold(self, |period, &weekday| period.with_weekday(weekday, ranges.clone()))
    }

    /// Adds a calendar exception to the list matching its kind.
    pub fn with_exception(mut self, exception: DateRange) -> Self {
        self.exceptions[exception.kind().index()].push(exception);
        self
    }

    /// Adds the name of a time period to exclude.
    pub fn with_exclusion(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn weekday_ranges(&self, weekday: Weekday) -> &[TimeRange] {
        &self.weekly[weekday.num_days_from_sunday() as usize]
    }

    /// Whether any day of the weekly schedule has time ranges.
    pub fn has_weekly_ranges(&self) -> bool {
        self.weekly.iter().any(|ranges| !ranges.is_empty())
    }

    pub fn exceptions(&self, kind: ExceptionKind) -> &[DateRange] {
        &self.exceptions[kind.index()]
    }

    /// Iterates over all exceptions, kind by kind.
    pub fn all_exceptions(&self) -> impl Iterator<Item = &DateRange> {
        self.exceptions.iter().flatten()
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Renders the exceptions as `{calendar_date:{...},[],month_date:...}`,
    /// the compact form used in debug logs.
    pub fn exceptions_dump(&self) -> ExceptionsDump<'_> {
        ExceptionsDump(&self.exceptions)
    }
}

/// Renders a time period the way a configuration dump shows it. Weekdays
/// without time ranges are left out.
impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "timeperiod_name {}", self.name)?;
        writeln!(f, "alias {}", self.alias)?;
        for weekday in WEEKDAYS {
            let ranges = self.weekday_ranges(weekday);
            if !ranges.is_empty() {
                writeln!(f, "{} {}", weekday_name(weekday), TimeRanges(ranges))?;
            }
        }
        for exception in self.all_exceptions() {
            writeln!(f, "{exception}")?;
        }
        if !self.excluded.is_empty() {
            writeln!(f, "exclude {}", self.excluded.join(","))?;
        }
        Ok(())
    }
}

pub struct ExceptionsDump<'a>(&'a [Vec<DateRange>; 5]);

impl fmt::Display for ExceptionsDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for kind in ExceptionKind::ALL {
            write!(f, "{}:", kind.name())?;
            for exception in &self.0[kind.index()] {
                write!(f, "{{{exception}}},")?;
            }
            f.write_str("[],")?;
        }
        f.write_str("}")
    }
}
