//! Deciding on which calendar dates a `DateRange` applies.
//!
//! Every recurrence kind repeats over a cycle: a calendar date occurs once,
//! month dates and month weekdays once a year, month days and weekdays once a
//! month. For a given cycle the rule resolves to at most one concrete span of
//! dates, which may run into the next cycle but never further. Matching a
//! date therefore only needs the spans of the date's own cycle and the one
//! before it, and finding the next match walks forward one cycle at a time.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::data::daterange::{DateRange, Recurrence};

/// A concrete span of dates produced by a recurrence, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occurrence {
    first: NaiveDate,
    last: NaiveDate,
}

impl Occurrence {
    fn new(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        (first <= last).then_some(Occurrence { first, last })
    }

    /// Whether `date` is in the span and, with a skip interval above 1, a
    /// whole number of intervals after its first date.
    fn includes(&self, date: NaiveDate, skip_interval: u32) -> bool {
        self.first <= date
            && date <= self.last
            && (skip_interval <= 1
                || (date - self.first).num_days() % i64::from(skip_interval) == 0)
    }

    /// The earliest date of the span that is on or after `from` and that
    /// honors the skip interval.
    fn first_on_or_after(&self, from: NaiveDate, skip_interval: u32) -> Option<NaiveDate> {
        let mut date = self.first.max(from);
        if skip_interval > 1 {
            let interval = i64::from(skip_interval);
            let remainder = (date - self.first).num_days() % interval;
            if remainder != 0 {
                let forward = u64::try_from(interval - remainder).ok()?;
                date = date.checked_add_days(Days::new(forward))?;
            }
        }
        (date <= self.last).then_some(date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Once,
    Yearly,
    Monthly,
}

fn cycle_of(recurrence: &Recurrence) -> Cycle {
    match recurrence {
        Recurrence::CalendarDate { .. } => Cycle::Once,
        Recurrence::MonthDate { .. } | Recurrence::MonthWeekDay { .. } => Cycle::Yearly,
        Recurrence::MonthDay { .. } | Recurrence::WeekDay { .. } => Cycle::Monthly,
    }
}

/// Number of the cycle containing `date`: the year for yearly cycles, the
/// count of months since year 0 for monthly ones.
fn cycle_index(cycle: Cycle, date: NaiveDate) -> i64 {
    match cycle {
        Cycle::Once => 0,
        Cycle::Yearly => i64::from(date.year()),
        Cycle::Monthly => i64::from(date.year()) * 12 + i64::from(date.month0()),
    }
}

/// Year and 1-based month of a monthly cycle index.
fn year_month(index: i64) -> Option<(i32, u32)> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

fn cycle_start(cycle: Cycle, index: i64) -> Option<NaiveDate> {
    match cycle {
        Cycle::Once => Some(NaiveDate::MIN),
        Cycle::Yearly => NaiveDate::from_ymd_opt(i32::try_from(index).ok()?, 1, 1),
        Cycle::Monthly => {
            let (year, month) = year_month(index)?;
            NaiveDate::from_ymd_opt(year, month, 1)
        }
    }
}

/// Resolves a recurrence to its concrete span of dates in the given cycle.
/// Returns `None` when the rule has no occurrence in that cycle, e.g.
/// February 29 outside leap years or a fifth Monday that does not exist.
fn occurrence(recurrence: &Recurrence, index: i64) -> Option<Occurrence> {
    match *recurrence {
        Recurrence::CalendarDate { start, end } => Occurrence::new(start, end),
        Recurrence::MonthDate { start, end } => {
            let year = i32::try_from(index).ok()?;
            let first = day_of_month(year, start.month.number_from_month(), start.day)?;
            let last = day_of_month_clamped(year, end.month.number_from_month(), end.day)?;
            Occurrence::new(first, last)
        }
        Recurrence::MonthDay { start, end } => {
            let (year, month) = year_month(index)?;
            let first = day_of_month(year, month, start)?;
            let mut last = day_of_month_clamped(year, month, end)?;
            if last < first {
                let (year, month) = year_month(index + 1)?;
                last = day_of_month_clamped(year, month, end)?;
            }
            Occurrence::new(first, last)
        }
        Recurrence::MonthWeekDay { start, end } => {
            let year = i32::try_from(index).ok()?;
            let start_month = start.month.number_from_month();
            let end_month = end.month.number_from_month();
            let end_year = if end_month < start_month { year.checked_add(1)? } else { year };
            let first = weekday_of_month(year, start_month, start.weekday, start.offset)?;
            let last = weekday_of_month(end_year, end_month, end.weekday, end.offset)?;
            Occurrence::new(first, last)
        }
        Recurrence::WeekDay { start, end } => {
            let (year, month) = year_month(index)?;
            let first = weekday_of_month(year, month, start.weekday, start.offset)?;
            let last = match weekday_of_month(year, month, end.weekday, end.offset) {
                Some(last) => last,
                // the end slipped past the end of the month
                None if end.offset > 0 => last_day_of_month(year, month)?,
                None => return None,
            };
            Occurrence::new(first, last)
        }
    }
}

/// Whether the date range applies on `date`.
pub fn matches(range: &DateRange, date: NaiveDate) -> bool {
    let recurrence = range.recurrence();
    let cycle = cycle_of(recurrence);
    let (earliest, latest) = match cycle {
        Cycle::Once => (0, 0),
        _ => {
            let index = cycle_index(cycle, date);
            (index - 1, index)
        }
    };
    (earliest..=latest).any(|index| {
        occurrence(recurrence, index)
            .is_some_and(|occurrence| occurrence.includes(date, range.skip_interval()))
    })
}

/// Returns the earliest date on or after `from`, and no later than `until`,
/// on which the date range applies.
pub fn next_match(range: &DateRange, from: NaiveDate, until: NaiveDate) -> Option<NaiveDate> {
    if from > until {
        return None;
    }
    let recurrence = range.recurrence();
    let skip_interval = range.skip_interval();
    let cycle = cycle_of(recurrence);
    if cycle == Cycle::Once {
        return occurrence(recurrence, 0)?
            .first_on_or_after(from, skip_interval)
            .filter(|date| *date <= until);
    }

    // a span starts within its own cycle but may overlap the next span, so
    // keep going until cycles start past the best candidate
    let mut best: Option<NaiveDate> = None;
    let mut index = cycle_index(cycle, from) - 1;
    loop {
        let Some(start) = cycle_start(cycle, index) else {
            return best;
        };
        if start > until || best.is_some_and(|best| start > best) {
            return best;
        }
        let candidate = occurrence(recurrence, index)
            .and_then(|occurrence| occurrence.first_on_or_after(from, skip_interval))
            .filter(|date| *date <= until);
        best = best.into_iter().chain(candidate).min();
        index += 1;
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) =
        if month == 12 { (year.checked_add(1)?, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// A positive day must exist in the month. A negative day counts back from
/// the last day of the month and stops at the first.
fn day_of_month(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    if day > 0 {
        return NaiveDate::from_ymd_opt(year, month, u32::try_from(day).ok()?);
    }
    if day == 0 {
        return None;
    }
    let last = last_day_of_month(year, month)?;
    let back = u64::from(day.unsigned_abs() - 1);
    match last.checked_sub_days(Days::new(back)) {
        Some(date) if date.month() == month => Some(date),
        _ => NaiveDate::from_ymd_opt(year, month, 1),
    }
}

/// Same as `day_of_month`, but a positive day past the end of the month
/// stands for the last day of the month.
fn day_of_month_clamped(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    if day > 0 {
        let last = last_day_of_month(year, month)?;
        if day > i32::try_from(last.day()).ok()? {
            return Some(last);
        }
    }
    day_of_month(year, month, day)
}

/// The nth weekday of a month. Positive offsets above 5 count as 5. A
/// negative offset counts back from the last such weekday and stops at the
/// first one.
fn weekday_of_month(year: i32, month: u32, weekday: Weekday, offset: i32) -> Option<NaiveDate> {
    if offset > 0 {
        let n = u8::try_from(offset.min(5)).ok()?;
        return NaiveDate::from_weekday_of_month_opt(year, month, weekday, n);
    }
    if offset == 0 {
        return None;
    }
    let last = last_day_of_month(year, month)?;
    let back = (7 + last.weekday().num_days_from_sunday() - weekday.num_days_from_sunday()) % 7;
    let last_occurrence = last.checked_sub_days(Days::new(back.into()))?;
    let weeks_back = u64::from(offset.unsigned_abs() - 1) * 7;
    match last_occurrence.checked_sub_days(Days::new(weeks_back)) {
        Some(date) if date.month() == month => Some(date),
        _ => NaiveDate::from_weekday_of_month_opt(year, month, weekday, 1),
    }
}

#[cfg(test)]
mod test {
    use chrono::Month;

    use super::*;
    use crate::data::{
        daterange::{MonthAndDay, NthWeekday, WeekdayOfMonth},
        timerange::TimeRange,
    };

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn range(recurrence: Recurrence, skip_interval: u32) -> DateRange {
        DateRange::new(recurrence, skip_interval, vec![TimeRange::all_day()])
    }

    fn month_date(start: (Month, i32), end: (Month, i32)) -> Recurrence {
        Recurrence::MonthDate {
            start: MonthAndDay { month: start.0, day: start.1 },
            end: MonthAndDay { month: end.0, day: end.1 },
        }
    }

    fn month_week_day(start: (Weekday, i32, Month), end: (Weekday, i32, Month)) -> Recurrence {
        Recurrence::MonthWeekDay {
            start: WeekdayOfMonth { weekday: start.0, offset: start.1, month: start.2 },
            end: WeekdayOfMonth { weekday: end.0, offset: end.1, month: end.2 },
        }
    }

    fn week_day(start: (Weekday, i32), end: (Weekday, i32)) -> Recurrence {
        Recurrence::WeekDay {
            start: NthWeekday { weekday: start.0, offset: start.1 },
            end: NthWeekday { weekday: end.0, offset: end.1 },
        }
    }

    #[test]
    fn calendar_date_span_and_skip() {
        let every_third = range(
            Recurrence::CalendarDate { start: date(2016, 10, 1), end: date(2016, 10, 31) },
            3,
        );
        assert!(matches(&every_third, date(2016, 10, 1)));
        assert!(!matches(&every_third, date(2016, 10, 2)));
        assert!(matches(&every_third, date(2016, 10, 4)));
        assert!(matches(&every_third, date(2016, 10, 31)));
        assert!(!matches(&every_third, date(2016, 11, 3)));
        assert!(!matches(&every_third, date(2015, 10, 1)));

        let until = date(2017, 12, 31);
        assert_eq!(next_match(&every_third, date(2016, 10, 2), until), Some(date(2016, 10, 4)));
        assert_eq!(next_match(&every_third, date(2016, 9, 2), until), Some(date(2016, 10, 1)));
        assert_eq!(next_match(&every_third, date(2016, 11, 1), until), None);
    }

    #[test]
    fn skip_interval_of_zero_or_one_is_continuous() {
        for skip_interval in [0, 1] {
            let span = range(
                Recurrence::CalendarDate { start: date(2016, 10, 1), end: date(2016, 10, 3) },
                skip_interval,
            );
            assert!(matches(&span, date(2016, 10, 1)));
            assert!(matches(&span, date(2016, 10, 2)));
            assert!(matches(&span, date(2016, 10, 3)));
        }
    }

    #[test]
    fn month_date_recurs_yearly() {
        let oct_27_28 = range(month_date((Month::October, 27), (Month::October, 28)), 0);
        assert!(matches(&oct_27_28, date(2016, 10, 27)));
        assert!(matches(&oct_27_28, date(2031, 10, 28)));
        assert!(!matches(&oct_27_28, date(2016, 10, 29)));

        let until = date(2018, 1, 1);
        assert_eq!(next_match(&oct_27_28, date(2016, 10, 28), until), Some(date(2016, 10, 28)));
        assert_eq!(next_match(&oct_27_28, date(2016, 10, 30), until), Some(date(2017, 10, 27)));
        assert_eq!(next_match(&oct_27_28, date(2016, 10, 30), date(2017, 10, 1)), None);
    }

    #[test]
    fn month_date_leap_day() {
        let leap_day = range(month_date((Month::February, 29), (Month::February, 29)), 0);
        assert!(matches(&leap_day, date(2016, 2, 29)));
        assert!(!matches(&leap_day, date(2017, 2, 28)));
        assert!(!matches(&leap_day, date(2017, 3, 1)));
        assert_eq!(
            next_match(&leap_day, date(2016, 3, 1), date(2025, 1, 1)),
            Some(date(2020, 2, 29))
        );
    }

    #[test]
    fn month_date_negative_end_and_skip() {
        let end_of_february = range(month_date((Month::February, 20), (Month::February, -1)), 0);
        assert!(matches(&end_of_february, date(2016, 2, 29)));
        assert!(matches(&end_of_february, date(2017, 2, 28)));

        let every_other_day = range(month_date((Month::March, 1), (Month::March, 10)), 2);
        assert!(matches(&every_other_day, date(2016, 3, 3)));
        assert!(!matches(&every_other_day, date(2016, 3, 4)));
        assert_eq!(
            next_match(&every_other_day, date(2016, 3, 10), date(2017, 12, 31)),
            Some(date(2017, 3, 1))
        );
    }

    #[test]
    fn month_day_recurs_monthly() {
        let first_days = range(Recurrence::MonthDay { start: 1, end: 3 }, 0);
        assert!(matches(&first_days, date(2016, 2, 2)));
        assert!(!matches(&first_days, date(2016, 2, 4)));
        assert_eq!(
            next_match(&first_days, date(2016, 12, 4), date(2017, 12, 31)),
            Some(date(2017, 1, 1))
        );

        let last_day = range(Recurrence::MonthDay { start: -1, end: -1 }, 0);
        assert!(matches(&last_day, date(2016, 2, 29)));
        assert!(!matches(&last_day, date(2016, 2, 28)));
        assert!(matches(&last_day, date(2016, 4, 30)));

        let day_31 = range(Recurrence::MonthDay { start: 31, end: 31 }, 0);
        assert_eq!(
            next_match(&day_31, date(2016, 4, 1), date(2016, 12, 31)),
            Some(date(2016, 5, 31))
        );
    }

    #[test]
    fn month_day_span_wraps_into_next_month() {
        let around_month_end = range(Recurrence::MonthDay { start: 25, end: 5 }, 0);
        assert!(matches(&around_month_end, date(2016, 10, 25)));
        assert!(matches(&around_month_end, date(2016, 11, 3)));
        assert!(matches(&around_month_end, date(2017, 1, 5)));
        assert!(!matches(&around_month_end, date(2016, 11, 10)));
        assert_eq!(
            next_match(&around_month_end, date(2016, 11, 10), date(2016, 12, 31)),
            Some(date(2016, 11, 25))
        );
    }

    #[test]
    fn overlapping_spans_give_the_earliest_match() {
        // january's span runs from the 29th to february 28th, february's own
        // span starts on the 26th
        let month_end = range(Recurrence::MonthDay { start: -3, end: 28 }, 3);
        assert!(matches(&month_end, date(2017, 2, 26)));
        assert!(!matches(&month_end, date(2017, 2, 27)));
        assert_eq!(
            next_match(&month_end, date(2017, 2, 26), date(2017, 12, 31)),
            Some(date(2017, 2, 26))
        );
        assert_eq!(
            next_match(&month_end, date(2017, 2, 27), date(2017, 12, 31)),
            Some(date(2017, 2, 28))
        );
    }

    #[test]
    fn month_week_day_resolves_nth_weekday() {
        let thanksgiving = range(
            month_week_day((Weekday::Thu, 4, Month::November), (Weekday::Thu, 4, Month::November)),
            0,
        );
        assert!(matches(&thanksgiving, date(2016, 11, 24)));
        assert!(!matches(&thanksgiving, date(2016, 11, 17)));

        let memorial_day = range(
            month_week_day((Weekday::Mon, -1, Month::May), (Weekday::Mon, -1, Month::May)),
            0,
        );
        assert!(matches(&memorial_day, date(2016, 5, 30)));
        assert_eq!(
            next_match(&memorial_day, date(2016, 6, 1), date(2017, 12, 31)),
            Some(date(2017, 5, 29))
        );
    }

    #[test]
    fn month_week_day_span_wraps_into_next_year() {
        let winter = range(
            month_week_day((Weekday::Mon, 1, Month::November), (Weekday::Fri, -1, Month::February)),
            0,
        );
        assert!(!matches(&winter, date(2016, 11, 6)));
        assert!(matches(&winter, date(2016, 11, 7)));
        assert!(matches(&winter, date(2017, 1, 15)));
        assert!(matches(&winter, date(2017, 2, 24)));
        assert!(!matches(&winter, date(2017, 2, 25)));
    }

    #[test]
    fn month_week_day_skip_counts_days() {
        let october_tuesdays = range(
            month_week_day((Weekday::Tue, 1, Month::October), (Weekday::Tue, -1, Month::October)),
            7,
        );
        assert!(matches(&october_tuesdays, date(2016, 10, 4)));
        assert!(matches(&october_tuesdays, date(2016, 10, 11)));
        assert!(!matches(&october_tuesdays, date(2016, 10, 12)));
        assert!(matches(&october_tuesdays, date(2016, 10, 25)));
    }

    #[test]
    fn week_day_recurs_monthly() {
        let first_wednesday = range(week_day((Weekday::Wed, 1), (Weekday::Wed, 1)), 0);
        assert!(matches(&first_wednesday, date(2016, 10, 5)));
        assert!(!matches(&first_wednesday, date(2016, 10, 12)));
        assert_eq!(
            next_match(&first_wednesday, date(2016, 10, 6), date(2016, 12, 31)),
            Some(date(2016, 11, 2))
        );
    }

    #[test]
    fn week_day_end_past_month_clamps_to_last_day() {
        // october 2016 has no fifth friday
        let late_month = range(week_day((Weekday::Fri, 4), (Weekday::Fri, 5)), 0);
        assert!(matches(&late_month, date(2016, 10, 28)));
        assert!(matches(&late_month, date(2016, 10, 31)));
        assert!(matches(&late_month, date(2016, 9, 30)));
        assert!(!matches(&late_month, date(2016, 10, 1)));

        let fifth_monday = range(week_day((Weekday::Mon, 5), (Weekday::Mon, 5)), 0);
        assert!(matches(&fifth_monday, date(2016, 10, 31)));
        assert_eq!(next_match(&fifth_monday, date(2016, 11, 1), date(2016, 12, 31)), None);
        assert_eq!(
            next_match(&fifth_monday, date(2016, 11, 1), date(2017, 12, 31)),
            Some(date(2017, 1, 30))
        );
    }

    #[test]
    fn weekday_of_month_negative_offsets() {
        assert_eq!(weekday_of_month(2016, 10, Weekday::Fri, -1), Some(date(2016, 10, 28)));
        assert_eq!(weekday_of_month(2016, 10, Weekday::Fri, -2), Some(date(2016, 10, 21)));
        // reaching past the start of the month stops at the first occurrence
        assert_eq!(weekday_of_month(2016, 10, Weekday::Fri, -9), Some(date(2016, 10, 7)));
        assert_eq!(weekday_of_month(2016, 10, Weekday::Fri, 9), None);
    }

    #[test]
    fn day_of_month_negative_offsets() {
        assert_eq!(day_of_month(2016, 2, -1), Some(date(2016, 2, 29)));
        assert_eq!(day_of_month(2016, 2, -3), Some(date(2016, 2, 27)));
        assert_eq!(day_of_month(2016, 2, -31), Some(date(2016, 2, 1)));
        assert_eq!(day_of_month(2016, 2, 30), None);
        assert_eq!(day_of_month_clamped(2016, 2, 30), Some(date(2016, 2, 29)));
    }

    #[test]
    fn matching_is_deterministic() {
        let oct_25 = range(month_date((Month::October, 25), (Month::October, 25)), 0);
        let day = date(2016, 10, 25);
        assert_eq!(matches(&oct_25, day), matches(&oct_25, day));
        assert!(matches(&oct_25, day));
    }

    #[test]
    fn next_match_respects_until() {
        let oct_25 = range(month_date((Month::October, 25), (Month::October, 25)), 0);
        assert_eq!(next_match(&oct_25, date(2016, 10, 26), date(2016, 10, 25)), None);
        assert_eq!(next_match(&oct_25, date(2016, 10, 26), date(2017, 10, 24)), None);
        assert_eq!(
            next_match(&oct_25, date(2016, 10, 26), date(2017, 10, 25)),
            Some(date(2017, 10, 25))
        );
    }
}
