//! Time periods: named sets of recurring time windows, with calendar
//! exceptions and exclusions, and the queries a scheduler asks of them.
//!
//! Build `TimePeriod`s (directly or from `config::TimePeriodConfig`), put
//! them in a `Registry`, and ask an `Evaluator` whether an instant is valid
//! or when the next valid or invalid instant is.

pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod recurrence;
pub mod search;

pub use calendar::{Calendar, Clock, FixedClock, SystemClock, Timestamp, Tz};
pub use config::{SearchSettings, TimePeriodConfig};
pub use data::{DateRange, Registry, TimePeriod, TimePeriodId, TimeRange};
pub use error::ConfigError;
pub use evaluate::Evaluator;
