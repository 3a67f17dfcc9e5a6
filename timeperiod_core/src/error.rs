use thiserror::Error;

/// Error type for building time periods and registries out of configuration.
///
/// Evaluating a time period never fails; everything that can go wrong is
/// caught here, before a registry is handed to the evaluator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Name or alias for time period '{0}' is empty.")]
    MissingName(String),
    #[error("The name of time period '{0}' contains one or more illegal characters.")]
    IllegalName(String),
    #[error("Time period '{0}' has already been defined.")]
    DuplicateName(String),
    #[error("Excluded time period '{excluded}' specified in time period '{period}' is not defined anywhere.")]
    UnknownExclusion { period: String, excluded: String },
    #[error("Time period '{0}' excludes itself through its exclusions.")]
    ExclusionCycle(String),
    #[error("Invalid time range {start}-{end}: start after end or end more than a day past midnight.")]
    InvalidTimeRange { start: u32, end: u32 },
    #[error("Month {0} is out of range 0-11.")]
    InvalidMonth(u32),
    #[error("Weekday {0} is out of range 0-6.")]
    InvalidWeekday(u32),
    #[error("Day of month {0} is out of range 1-31 or -31 to -1.")]
    InvalidDay(i32),
    #[error("Weekday offset must not be 0.")]
    ZeroWeekdayOffset,
    #[error("Invalid calendar date {year}-{month}-{day}.")]
    InvalidDate { year: i32, month: u32, day: i32 },
    #[error("Date range '{0}' ends before it starts.")]
    EndBeforeStart(String),
}
