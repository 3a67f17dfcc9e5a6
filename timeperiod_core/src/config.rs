//! External representation of time periods, as handed over by the
//! configuration layer, and settings of the search procedures.
//!
//! The configuration objects keep the flat field layout of the engine's
//! configuration messages: every date range carries the full set of start
//! and end fields, and its kind is given by the list it sits in. Converting
//! them with `TryFrom` validates every field and yields the canonical
//! `TimePeriod`.

use chrono::{Duration, Month, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    data::{
        daterange::{DateRange, ExceptionKind, MonthAndDay, NthWeekday, Recurrence, WeekdayOfMonth},
        timeperiod::{TimePeriod, WEEKDAYS},
        timerange::TimeRange,
    },
    error::ConfigError,
};

/// Characters that may not appear in object names, unless configured
/// otherwise.
pub const DEFAULT_ILLEGAL_OBJECT_CHARS: &str = "`~!$%^&*|'\"<>?,()=";

/// Default search horizon: one year plus a week, so that yearly exceptions
/// get a chance to come around again.
pub const DEFAULT_HORIZON_DAYS: u32 = 366 + 7;

/// Settings for building registries and searching for valid times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// How many days `next_valid`/`next_invalid` look ahead before giving
    /// up.
    pub horizon_days: u32,
    /// Characters rejected in time period names.
    pub illegal_object_chars: String,
}

impl SearchSettings {
    pub fn horizon(&self) -> Duration {
        Duration::days(i64::from(self.horizon_days))
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            horizon_days: DEFAULT_HORIZON_DAYS,
            illegal_object_chars: DEFAULT_ILLEGAL_OBJECT_CHARS.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeConfig {
    pub range_start: u32,
    pub range_end: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaysConfig {
    pub sunday: Vec<TimeRangeConfig>,
    pub monday: Vec<TimeRangeConfig>,
    pub tuesday: Vec<TimeRangeConfig>,
    pub wednesday: Vec<TimeRangeConfig>,
    pub thursday: Vec<TimeRangeConfig>,
    pub friday: Vec<TimeRangeConfig>,
    pub saturday: Vec<TimeRangeConfig>,
}

impl DaysConfig {
    /// The seven lists, starting on Sunday.
    fn by_weekday(&self) -> [&[TimeRangeConfig]; 7] {
        [
            &self.sunday,
            &self.monday,
            &self.tuesday,
            &self.wednesday,
            &self.thursday,
            &self.friday,
            &self.saturday,
        ]
    }
}

/// A date range in flat form. Months are 0-based and weekdays count from
/// Sunday. Which fields matter depends on the exception kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRangeConfig {
    pub syear: i32,
    pub smon: u32,
    pub smday: i32,
    pub swday: u32,
    pub swday_offset: i32,
    /// 0 means the range ends on its start date (calendar dates only).
    pub eyear: i32,
    pub emon: u32,
    pub emday: i32,
    pub ewday: u32,
    pub ewday_offset: i32,
    pub skip_interval: u32,
    pub timerange: Vec<TimeRangeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionsConfig {
    pub calendar_date: Vec<DateRangeConfig>,
    pub month_date: Vec<DateRangeConfig>,
    pub month_day: Vec<DateRangeConfig>,
    pub month_week_day: Vec<DateRangeConfig>,
    pub week_day: Vec<DateRangeConfig>,
}

impl ExceptionsConfig {
    fn by_kind(&self) -> [(ExceptionKind, &[DateRangeConfig]); 5] {
        [
            (ExceptionKind::CalendarDate, &self.calendar_date),
            (ExceptionKind::MonthDate, &self.month_date),
            (ExceptionKind::MonthDay, &self.month_day),
            (ExceptionKind::MonthWeekDay, &self.month_week_day),
            (ExceptionKind::WeekDay, &self.week_day),
        ]
    }
}

/// A fully resolved time period definition, templates already merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimePeriodConfig {
    pub timeperiod_name: String,
    pub alias: String,
    pub timeranges: DaysConfig,
    pub exceptions: ExceptionsConfig,
    pub exclude: Vec<String>,
}

impl TryFrom<TimePeriodConfig> for TimePeriod {
    type Error = ConfigError;

    fn try_from(config: TimePeriodConfig) -> Result<Self, Self::Error> {
        let TimePeriodConfig { timeperiod_name, alias, timeranges, exceptions, exclude } = config;
        if timeperiod_name.is_empty() || alias.is_empty() {
            return Err(ConfigError::MissingName(timeperiod_name));
        }

        let mut period = TimePeriod::new(timeperiod_name, alias);
        for (weekday, ranges) in WEEKDAYS.into_iter().zip(timeranges.by_weekday()) {
            period = period.with_weekday(weekday, time_ranges(ranges)?);
        }
        for (kind, ranges) in exceptions.by_kind() {
            for range in ranges {
                period = period.with_exception(range.to_date_range(kind)?);
            }
        }
        Ok(exclude.into_iter().fold(period, TimePeriod::with_exclusion))
    }
}

impl DateRangeConfig {
    /// Validates the fields that matter for `kind` and builds the date range.
    pub fn to_date_range(&self, kind: ExceptionKind) -> Result<DateRange, ConfigError> {
        let recurrence = match kind {
            ExceptionKind::CalendarDate => {
                let start = calendar_date(self.syear, self.smon, self.smday)?;
                let end = if self.eyear == 0 {
                    start
                } else {
                    calendar_date(self.eyear, self.emon, self.emday)?
                };
                Recurrence::CalendarDate { start, end }
            }
            ExceptionKind::MonthDate => {
                let start = MonthAndDay { month: month(self.smon)?, day: day(self.smday)? };
                let end = MonthAndDay { month: month(self.emon)?, day: day(self.emday)? };
                Recurrence::MonthDate { start, end }
            }
            ExceptionKind::MonthDay => {
                Recurrence::MonthDay { start: day(self.smday)?, end: day(self.emday)? }
            }
            ExceptionKind::MonthWeekDay => Recurrence::MonthWeekDay {
                start: WeekdayOfMonth {
                    weekday: weekday(self.swday)?,
                    offset: offset(self.swday_offset)?,
                    month: month(self.smon)?,
                },
                end: WeekdayOfMonth {
                    weekday: weekday(self.ewday)?,
                    offset: offset(self.ewday_offset)?,
                    month: month(self.emon)?,
                },
            },
            ExceptionKind::WeekDay => Recurrence::WeekDay {
                start: NthWeekday {
                    weekday: weekday(self.swday)?,
                    offset: offset(self.swday_offset)?,
                },
                end: NthWeekday {
                    weekday: weekday(self.ewday)?,
                    offset: offset(self.ewday_offset)?,
                },
            },
        };
        if ends_before_start(&recurrence) {
            return Err(ConfigError::EndBeforeStart(recurrence.to_string()));
        }
        Ok(DateRange::new(recurrence, self.skip_interval, time_ranges(&self.timerange)?))
    }
}

fn ends_before_start(recurrence: &Recurrence) -> bool {
    match recurrence {
        Recurrence::CalendarDate { start, end } => end < start,
        // month dates never wrap into the next year; negative days can only
        // be compared once a year is known
        Recurrence::MonthDate { start, end } => {
            let (start_month, end_month) =
                (start.month.number_from_month(), end.month.number_from_month());
            end_month < start_month
                || (end_month == start_month
                    && start.day.signum() == end.day.signum()
                    && end.day < start.day)
        }
        Recurrence::MonthDay { .. }
        | Recurrence::MonthWeekDay { .. }
        | Recurrence::WeekDay { .. } => false,
    }
}

fn time_ranges(ranges: &[TimeRangeConfig]) -> Result<Vec<TimeRange>, ConfigError> {
    ranges.iter().map(|range| TimeRange::checked(range.range_start, range.range_end)).collect()
}

fn month(month0: u32) -> Result<Month, ConfigError> {
    u8::try_from(month0.saturating_add(1))
        .ok()
        .and_then(|number| Month::try_from(number).ok())
        .ok_or(ConfigError::InvalidMonth(month0))
}

fn weekday(days_from_sunday: u32) -> Result<chrono::Weekday, ConfigError> {
    usize::try_from(days_from_sunday)
        .ok()
        .and_then(|index| WEEKDAYS.get(index).copied())
        .ok_or(ConfigError::InvalidWeekday(days_from_sunday))
}

fn day(day: i32) -> Result<i32, ConfigError> {
    if day == 0 || !(-31..=31).contains(&day) {
        return Err(ConfigError::InvalidDay(day));
    }
    Ok(day)
}

fn offset(offset: i32) -> Result<i32, ConfigError> {
    if offset == 0 {
        return Err(ConfigError::ZeroWeekdayOffset);
    }
    Ok(offset)
}

fn calendar_date(year: i32, month0: u32, day: i32) -> Result<NaiveDate, ConfigError> {
    let month = month0.saturating_add(1);
    let invalid = ConfigError::InvalidDate { year, month, day };
    let day = u32::try_from(day).map_err(|_| invalid.clone())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(invalid)
}
