use std::fmt;

use chrono::{Datelike, Month, NaiveDate, Weekday};

use super::timerange::{TimeRange, TimeRanges};

/// The five kinds of calendar exceptions a time period can carry. A time
/// period keeps one list of date ranges per kind, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExceptionKind {
    /// `2016-10-25 - 2016-10-28`
    CalendarDate,
    /// `october 25 - november 3`
    MonthDate,
    /// `day 3 - 10`
    MonthDay,
    /// `thursday 2 april - tuesday -1 may`
    MonthWeekDay,
    /// `wednesday 1 - friday 2`
    WeekDay,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 5] = [
        ExceptionKind::CalendarDate,
        ExceptionKind::MonthDate,
        ExceptionKind::MonthDay,
        ExceptionKind::MonthWeekDay,
        ExceptionKind::WeekDay,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The name used for this kind in configuration dumps.
    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::CalendarDate => "calendar_date",
            ExceptionKind::MonthDate => "month_date",
            ExceptionKind::MonthDay => "month_day",
            ExceptionKind::MonthWeekDay => "month_week_day",
            ExceptionKind::WeekDay => "week_day",
        }
    }
}

/// A day of a given month, year unspecified. Negative days count from the
/// end of the month, `-1` being the last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthAndDay {
    pub month: Month,
    pub day: i32,
}

/// The nth weekday of a given month, year unspecified. Negative offsets
/// count from the end of the month, `-1` being the last such weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayOfMonth {
    pub weekday: Weekday,
    pub offset: i32,
    pub month: Month,
}

/// The nth weekday of whatever month is being considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NthWeekday {
    pub weekday: Weekday,
    pub offset: i32,
}

/// The rule deciding on which dates a `DateRange` applies. Both bounds of
/// every variant are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    /// An absolute, non-recurring span of dates.
    CalendarDate { start: NaiveDate, end: NaiveDate },
    /// A span recurring every year. The span never wraps into the next year.
    MonthDate { start: MonthAndDay, end: MonthAndDay },
    /// A span of days of the month, recurring every month. When the end day
    /// comes before the start day the span runs into the following month.
    MonthDay { start: i32, end: i32 },
    /// A span between two weekdays of given months, recurring every year.
    /// When the end month comes before the start month the span runs into
    /// the following year.
    MonthWeekDay { start: WeekdayOfMonth, end: WeekdayOfMonth },
    /// A span between two weekdays of the same month, recurring every month.
    WeekDay { start: NthWeekday, end: NthWeekday },
}

impl Recurrence {
    pub fn kind(&self) -> ExceptionKind {
        match self {
            Recurrence::CalendarDate { .. } => ExceptionKind::CalendarDate,
            Recurrence::MonthDate { .. } => ExceptionKind::MonthDate,
            Recurrence::MonthDay { .. } => ExceptionKind::MonthDay,
            Recurrence::MonthWeekDay { .. } => ExceptionKind::MonthWeekDay,
            Recurrence::WeekDay { .. } => ExceptionKind::WeekDay,
        }
    }
}

/// A calendar exception: a recurrence rule, an optional skip interval, and
/// the time ranges that apply on every date the rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateRange {
    recurrence: Recurrence,
    /// 0 or 1 means every day of the span. Any larger value keeps only the
    /// days that are a multiple of `skip_interval` days after the start of
    /// the span.
    skip_interval: u32,
    /// Sorted at construction.
    timeranges: Vec<TimeRange>,
}

impl DateRange {
    pub fn new(recurrence: Recurrence, skip_interval: u32, mut timeranges: Vec<TimeRange>) -> Self {
        debug_assert!(
            recurrence_is_well_formed(&recurrence),
            "malformed recurrence {recurrence:?}"
        );
        timeranges.sort();
        DateRange { recurrence, skip_interval, timeranges }
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    pub fn kind(&self) -> ExceptionKind {
        self.recurrence.kind()
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip_interval
    }

    pub fn timeranges(&self) -> &[TimeRange] {
        &self.timeranges
    }
}

fn recurrence_is_well_formed(recurrence: &Recurrence) -> bool {
    fn day_ok(day: i32) -> bool {
        day != 0 && (-31..=31).contains(&day)
    }
    match recurrence {
        Recurrence::CalendarDate { start, end } => start <= end,
        Recurrence::MonthDate { start, end } => {
            day_ok(start.day)
                && day_ok(end.day)
                && start.month.number_from_month() <= end.month.number_from_month()
        }
        Recurrence::MonthDay { start, end } => day_ok(*start) && day_ok(*end),
        Recurrence::MonthWeekDay { start, end } => start.offset != 0 && end.offset != 0,
        Recurrence::WeekDay { start, end } => start.offset != 0 && end.offset != 0,
    }
}

pub(crate) fn month_name(month: Month) -> &'static str {
    const NAMES: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    NAMES[month.number_from_month() as usize - 1]
}

pub(crate) fn weekday_name(weekday: Weekday) -> &'static str {
    const NAMES: [&str; 7] =
        ["sunday", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday"];
    NAMES[weekday.num_days_from_sunday() as usize]
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::CalendarDate { start, end } => {
                write_calendar_date(f, start)?;
                if start != end {
                    f.write_str(" - ")?;
                    write_calendar_date(f, end)?;
                }
                Ok(())
            }
            Recurrence::MonthDate { start, end } => {
                write!(f, "{} {}", month_name(start.month), start.day)?;
                if start.month != end.month {
                    write!(f, " - {} {}", month_name(end.month), end.day)
                } else if start.day != end.day {
                    write!(f, " - {}", end.day)
                } else {
                    Ok(())
                }
            }
            Recurrence::MonthDay { start, end } => {
                write!(f, "day {start}")?;
                if start != end {
                    write!(f, " - {end}")?;
                }
                Ok(())
            }
            Recurrence::MonthWeekDay { start, end } => {
                write!(
                    f,
                    "{} {} {}",
                    weekday_name(start.weekday),
                    start.offset,
                    month_name(start.month)
                )?;
                if start != end {
                    write!(
                        f,
                        " - {} {} {}",
                        weekday_name(end.weekday),
                        end.offset,
                        month_name(end.month)
                    )?;
                }
                Ok(())
            }
            Recurrence::WeekDay { start, end } => {
                write!(f, "{} {}", weekday_name(start.weekday), start.offset)?;
                if start != end {
                    write!(f, " - {} {}", weekday_name(end.weekday), end.offset)?;
                }
                Ok(())
            }
        }
    }
}

fn write_calendar_date(f: &mut fmt::Formatter<'_>, date: &NaiveDate) -> fmt::Result {
    write!(f, "{:02}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Renders the exception the way configuration dumps show it, e.g.
/// `october 27 - 28 08:30-12:30, 18:30-21:15` or `day 1 - 15 / 3 00:00-24:00`.
impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.recurrence)?;
        if self.skip_interval != 0 {
            write!(f, " / {}", self.skip_interval)?;
        }
        write!(f, " {}", TimeRanges(&self.timeranges))
    }
}
