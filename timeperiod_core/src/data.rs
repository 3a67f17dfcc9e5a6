pub mod daterange;
pub mod registry;
pub mod timeperiod;
pub mod timerange;

pub use daterange::{DateRange, ExceptionKind, MonthAndDay, NthWeekday, Recurrence, WeekdayOfMonth};
pub use registry::{Entry, Registry, TimePeriodId};
pub use timeperiod::TimePeriod;
pub use timerange::TimeRange;
