//! Searching forward for the next valid or invalid instant of a time period.
//!
//! Both searches are bounded by a limit instant derived from the horizon and
//! always terminate: dates are walked one at a time (or, when a period only
//! has exceptions, from one matching date to the next), and every step
//! taken because of an exclusion moves strictly forward.
//!
//! Local time is not monotonic around DST changes, so the walk over local
//! dates only ever covers a stretch of constant UTC offset. When the offset
//! changes before the walk finds an answer, it starts over at the change.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::trace;

use crate::{
    calendar::{Calendar, Clock, Timestamp},
    data::{
        registry::Entry,
        timeperiod::TimePeriod,
        timerange::{covered_until, SECONDS_PER_DAY},
    },
    evaluate::{day_ranges, Evaluator},
    recurrence,
};

/// How an instant is affected by the exclusions of a time period.
///
/// Variants are ordered so that taking the maximum over several exclusions
/// gives the combined effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Exclusion {
    Clear,
    /// Excluded up to, but not including, the given instant.
    Until(Timestamp),
    /// Excluded at least until the search limit.
    Forever,
}

fn search_limit(from: Timestamp, horizon: Duration) -> Timestamp {
    from.checked_add_signed(horizon).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl<'r, C: Calendar> Evaluator<'r, C> {
    /// Returns the earliest valid instant at or after `from`, or `None` if
    /// there is none before `from + horizon`. Returns `from` itself when it
    /// is valid.
    pub fn next_valid(
        &self,
        period: &TimePeriod,
        from: Timestamp,
        horizon: Duration,
    ) -> Option<Timestamp> {
        trace!(period = period.name(), %from, "searching next valid time");
        let excluded = self.resolve(period);
        let entry = Entry { period, excluded: &excluded };
        self.next_valid_until(entry, from, search_limit(from, horizon), 0)
    }

    /// Returns the earliest invalid instant at or after `from`, or `None` if
    /// the period stays valid until `from + horizon`. Returns `from` itself
    /// when it is invalid.
    pub fn next_invalid(
        &self,
        period: &TimePeriod,
        from: Timestamp,
        horizon: Duration,
    ) -> Option<Timestamp> {
        trace!(period = period.name(), %from, "searching next invalid time");
        let excluded = self.resolve(period);
        let entry = Entry { period, excluded: &excluded };
        self.next_invalid_until(entry, from, search_limit(from, horizon), 0)
    }

    /// Picks when to schedule something that would preferably happen at
    /// `preferred`. Times in the past are moved to now. Without a period the
    /// (moved) preferred time is used as is; if the period has no valid time
    /// within the horizon, the original preferred time is returned.
    pub fn next_valid_time(
        &self,
        period: Option<&TimePeriod>,
        preferred: Timestamp,
        clock: &impl Clock,
    ) -> Timestamp {
        let start = preferred.max(clock.now());
        match period {
            None => start,
            Some(period) => self.next_valid(period, start, self.horizon).unwrap_or(preferred),
        }
    }

    /// Like `next_valid_time`, but returns `None` when the period has no
    /// valid time within the horizon, so that notifications can be dropped
    /// instead of sent at the wrong time.
    pub fn next_valid_time_for_notification(
        &self,
        period: Option<&TimePeriod>,
        preferred: Timestamp,
        clock: &impl Clock,
    ) -> Option<Timestamp> {
        let start = preferred.max(clock.now());
        match period {
            None => Some(start),
            Some(period) => self.next_valid(period, start, self.horizon),
        }
    }

    pub(crate) fn next_valid_until(
        &self,
        entry: Entry<'_>,
        from: Timestamp,
        limit: Timestamp,
        depth: usize,
    ) -> Option<Timestamp> {
        let mut candidate = from;
        loop {
            let covered = self.next_covered(entry.period, candidate, limit)?;
            match self.excluded_at(entry, covered, limit, depth) {
                Exclusion::Clear => return Some(covered),
                Exclusion::Until(end) if end > covered => candidate = end,
                // never stay in place
                Exclusion::Until(_) => {
                    candidate = covered.checked_add_signed(Duration::seconds(1))?;
                }
                Exclusion::Forever => return None,
            }
        }
    }

    pub(crate) fn next_invalid_until(
        &self,
        entry: Entry<'_>,
        from: Timestamp,
        limit: Timestamp,
        depth: usize,
    ) -> Option<Timestamp> {
        if !self.is_valid_at_depth(entry, from, depth) {
            return Some(from);
        }
        // valid right now, so the period ends either where its own time
        // windows end or where one of its exclusions starts
        let own_end = self.coverage_end(entry.period, from, limit);
        self.excluded(entry, depth)
            .iter()
            .filter_map(|&id| self.registry.entry(id))
            .filter_map(|excluded| self.next_valid_until(excluded, from, limit, depth + 1))
            .chain(own_end)
            .min()
    }

    fn excluded_at(
        &self,
        entry: Entry<'_>,
        instant: Timestamp,
        limit: Timestamp,
        depth: usize,
    ) -> Exclusion {
        let mut exclusion = Exclusion::Clear;
        let excluded = self.excluded(entry, depth).iter().filter_map(|&id| self.registry.entry(id));
        for excluded in excluded {
            if !self.is_valid_at_depth(excluded, instant, depth + 1) {
                continue;
            }
            match self.next_invalid_until(excluded, instant, limit, depth + 1) {
                Some(end) => exclusion = exclusion.max(Exclusion::Until(end)),
                None => return Exclusion::Forever,
            }
        }
        exclusion
    }

    // Finds the earliest instant at or after `from` that lies in one of the
    // period's own time windows, ignoring exclusions.
    fn next_covered(
        &self,
        period: &TimePeriod,
        from: Timestamp,
        limit: Timestamp,
    ) -> Option<Timestamp> {
        let mut from = from;
        loop {
            let offset = self.calendar.offset_at(from);
            let found = first_covered(&offset, period, from, limit);
            match self.calendar.next_transition(from, found.unwrap_or(limit)) {
                Some(transition) => from = transition,
                None => return found,
            }
        }
    }

    // Finds where the run of the period's own time windows containing `from`
    // ends.
    fn coverage_end(
        &self,
        period: &TimePeriod,
        from: Timestamp,
        limit: Timestamp,
    ) -> Option<Timestamp> {
        let mut from = from;
        loop {
            let offset = self.calendar.offset_at(from);
            let end = coverage_end_in(&offset, period, from, limit);
            match self.calendar.next_transition(from, end.unwrap_or(limit)) {
                // the run may or may not go on under the new offset
                Some(transition) => from = transition,
                None => return end,
            }
        }
    }
}

/// Walks local dates in `calendar` from `from` for the first instant covered
/// by the period's time windows.
fn first_covered(
    calendar: &impl Calendar,
    period: &TimePeriod,
    from: Timestamp,
    limit: Timestamp,
) -> Option<Timestamp> {
    if from > limit {
        return None;
    }
    let start = calendar.local(from)?;
    let last_date = calendar.local(limit).map_or(NaiveDate::MAX, |local| local.date);
    let mut date = start.date;
    // nothing before this time of day counts on the current date
    let mut floor = start.seconds;
    loop {
        let earliest = day_ranges(period, date)
            .iter()
            .filter_map(|range| {
                let start = range.start().max(floor);
                (start < range.end_within_day()).then_some(start)
            })
            .min();
        if let Some(seconds) = earliest {
            let found = calendar.at(date, seconds)?.max(from);
            return (found <= limit).then_some(found);
        }
        floor = 0;
        date = next_candidate_date(period, date, last_date)?;
    }
}

/// Walks local dates in `calendar` from `from` for the end of the run of time
/// windows covering it, or returns `from` if nothing covers it. Windows
/// touching across midnight count as one run.
fn coverage_end_in(
    calendar: &impl Calendar,
    period: &TimePeriod,
    from: Timestamp,
    limit: Timestamp,
) -> Option<Timestamp> {
    let start = calendar.local(from)?;
    let mut date = start.date;
    let mut seconds = start.seconds;
    loop {
        let reach = covered_until(&day_ranges(period, date), seconds);
        if reach < SECONDS_PER_DAY {
            let end = calendar.at(date, reach)?.max(from);
            return (end <= limit).then_some(end);
        }
        date = date.succ_opt()?;
        seconds = 0;
        if calendar.at(date, 0)? > limit {
            return None;
        }
    }
}

/// The next date after `date`, and no later than `last_date`, on which the
/// period can have time ranges at all.
fn next_candidate_date(
    period: &TimePeriod,
    date: NaiveDate,
    last_date: NaiveDate,
) -> Option<NaiveDate> {
    let next = date.succ_opt()?;
    if next > last_date {
        return None;
    }
    if period.has_weekly_ranges() {
        return Some(next);
    }
    // without a weekly schedule only exceptions can provide time ranges
    period
        .all_exceptions()
        .filter_map(|exception| recurrence::next_match(exception, next, last_date))
        .min()
}
