use std::borrow::Cow;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{error, trace};

use crate::{
    calendar::{Calendar, Timestamp},
    config::SearchSettings,
    data::{
        registry::{Entry, Registry, TimePeriodId},
        timeperiod::TimePeriod,
        timerange::TimeRange,
    },
    recurrence,
};

/// How deep exclusions of exclusions are followed. Registries reject cycles,
/// so this only cuts off absurdly long chains.
pub const MAX_EXCLUSION_DEPTH: usize = 16;

/// Answers validity queries for the time periods of one registry, in one
/// local calendar.
///
/// An evaluator only borrows the registry and holds no mutable state, so any
/// number of them can run concurrently against the same registry.
#[derive(Debug, Clone)]
pub struct Evaluator<'r, C> {
    pub(crate) registry: &'r Registry,
    pub(crate) calendar: C,
    /// Search horizon used when the caller does not give one.
    pub(crate) horizon: Duration,
}

impl<'r, C: Calendar> Evaluator<'r, C> {
    pub fn new(registry: &'r Registry, calendar: C) -> Self {
        Evaluator::with_settings(registry, calendar, &SearchSettings::default())
    }

    pub fn with_settings(registry: &'r Registry, calendar: C, settings: &SearchSettings) -> Self {
        Evaluator { registry, calendar, horizon: settings.horizon() }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Whether `instant` is inside one of the period's time windows and not
    /// inside any of its excluded periods.
    pub fn is_valid(&self, period: &TimePeriod, instant: Timestamp) -> bool {
        trace!(period = period.name(), %instant, "checking time against period");
        let excluded = self.resolve(period);
        self.is_valid_at_depth(Entry { period, excluded: &excluded }, instant, 0)
    }

    /// Same as `is_valid`, except that no period at all means any time is
    /// valid.
    pub fn check_time(&self, period: Option<&TimePeriod>, instant: Timestamp) -> bool {
        period.map_or(true, |period| self.is_valid(period, instant))
    }

    /// Finds the IDs of the periods excluded from `period`. Periods stored in
    /// the registry come with their exclusions already resolved; for any
    /// other period the names are looked up, and names missing from the
    /// registry do not exclude anything.
    pub(crate) fn resolve<'a>(&self, period: &'a TimePeriod) -> Cow<'a, [TimePeriodId]>
    where
        'r: 'a,
    {
        let registry: &'r Registry = self.registry;
        if let Some(id) = registry.id_of(period.name()) {
            if registry.get(id).is_some_and(|stored| std::ptr::eq(stored, period)) {
                return Cow::Borrowed(registry.excluded_ids(id));
            }
        }
        let ids = period
            .excluded()
            .iter()
            .filter_map(|name| {
                let id = registry.id_of(name);
                if id.is_none() {
                    error!(
                        period = period.name(),
                        excluded = %name,
                        "excluded time period is not in the registry"
                    );
                }
                id
            })
            .collect();
        Cow::Owned(ids)
    }

    pub(crate) fn is_valid_at_depth(
        &self,
        entry: Entry<'_>,
        instant: Timestamp,
        depth: usize,
    ) -> bool {
        let Some(local) = self.calendar.local(instant) else {
            return false;
        };
        covers(&day_ranges(entry.period, local.date), local.seconds)
            && !self
                .excluded(entry, depth)
                .iter()
                .filter_map(|&id| self.registry.entry(id))
                .any(|excluded| self.is_valid_at_depth(excluded, instant, depth + 1))
    }

    /// The exclusions of `entry` to follow at `depth`. Exclusions nested
    /// deeper than `MAX_EXCLUSION_DEPTH` do not exclude anything.
    pub(crate) fn excluded<'a>(&self, entry: Entry<'a>, depth: usize) -> &'a [TimePeriodId] {
        if depth >= MAX_EXCLUSION_DEPTH && !entry.excluded.is_empty() {
            error!(
                period = entry.period.name(),
                depth,
                "exclusions nested too deep, ignoring them"
            );
            return &[];
        }
        entry.excluded
    }
}

/// The time ranges that apply to `date`: those of every exception matching
/// the date if there is any, the weekly schedule of the date's weekday
/// otherwise. The result is sorted.
pub fn day_ranges(period: &TimePeriod, date: NaiveDate) -> Cow<'_, [TimeRange]> {
    let mut matching =
        period.all_exceptions().filter(|exception| recurrence::matches(exception, date));
    let Some(first) = matching.next() else {
        return Cow::Borrowed(period.weekday_ranges(date.weekday()));
    };
    let Some(second) = matching.next() else {
        return Cow::Borrowed(first.timeranges());
    };
    let mut ranges = first.timeranges().to_vec();
    ranges.extend_from_slice(second.timeranges());
    for exception in matching {
        ranges.extend_from_slice(exception.timeranges());
    }
    ranges.sort();
    Cow::Owned(ranges)
}

fn covers(ranges: &[TimeRange], seconds: u32) -> bool {
    ranges.iter().any(|range| range.contains(seconds))
}
