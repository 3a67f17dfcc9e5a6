use std::sync::Arc;

use chrono::{Duration, Month, TimeZone, Utc};
use timeperiod_core::{
    data::{DateRange, MonthAndDay, Recurrence},
    Evaluator, Registry, SearchSettings, TimePeriod, TimePeriodConfig, TimeRange, Timestamp,
};

fn october(start: i32, end: i32, ranges: Vec<TimeRange>) -> DateRange {
    DateRange::new(
        Recurrence::MonthDate {
            start: MonthAndDay { month: Month::October, day: start },
            end: MonthAndDay { month: Month::October, day: end },
        },
        0,
        ranges,
    )
}

fn exceptions_period() -> TimePeriod {
    TimePeriod::new("test", "test")
        .with_exception(october(25, 25, vec![TimeRange::hm(10, 45, 14, 25)]))
        .with_exception(october(
            27,
            28,
            vec![TimeRange::hm(8, 30, 12, 30), TimeRange::hm(18, 30, 21, 15)],
        ))
}

fn registry(periods: Vec<TimePeriod>) -> Registry {
    Registry::build(periods, &SearchSettings::default()).unwrap()
}

fn year() -> Duration {
    Duration::days(366)
}

fn next_valid_from(now: Timestamp) -> Option<Timestamp> {
    let registry = registry(vec![exceptions_period()]);
    let evaluator = Evaluator::new(&registry, Utc);
    evaluator.next_valid(registry.get_by_name("test").unwrap(), now, year())
}

#[test_log::test]
fn before_the_first_exception() {
    let now = Utc.with_ymd_and_hms(2016, 10, 24, 12, 0, 0).unwrap();
    assert_eq!(
        next_valid_from(now),
        Some(Utc.with_ymd_and_hms(2016, 10, 25, 10, 45, 0).unwrap())
    );
}

#[test_log::test]
fn between_two_exceptions() {
    let now = Utc.with_ymd_and_hms(2016, 10, 26, 12, 0, 0).unwrap();
    assert_eq!(
        next_valid_from(now),
        Some(Utc.with_ymd_and_hms(2016, 10, 27, 8, 30, 0).unwrap())
    );
}

#[test_log::test]
fn inside_an_exception_window() {
    let now = Utc.with_ymd_and_hms(2016, 10, 28, 20, 59, 0).unwrap();
    assert_eq!(next_valid_from(now), Some(now));
}

#[test_log::test]
fn after_the_exceptions_wraps_to_next_year() {
    let now = Utc.with_ymd_and_hms(2016, 10, 30, 13, 37, 42).unwrap();
    assert_eq!(
        next_valid_from(now),
        Some(Utc.with_ymd_and_hms(2017, 10, 25, 10, 45, 0).unwrap())
    );
}

#[test_log::test]
fn empty_period_is_never_valid() {
    let registry = registry(vec![TimePeriod::new("empty", "empty")]);
    let evaluator = Evaluator::new(&registry, Utc);
    let empty = registry.get_by_name("empty").unwrap();

    for now in [
        Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2016, 10, 25, 10, 45, 0).unwrap(),
        Utc.with_ymd_and_hms(2017, 6, 30, 23, 59, 59).unwrap(),
    ] {
        assert!(!evaluator.is_valid(empty, now));
        assert_eq!(evaluator.next_valid(empty, now, year()), None);
        assert_eq!(evaluator.next_invalid(empty, now, year()), Some(now));
    }
}

#[test_log::test]
fn excluded_period_invalidates_its_window() {
    let registry = registry(vec![
        TimePeriod::new("a", "a").with_every_day(vec![TimeRange::hm(9, 0, 17, 0)]),
        TimePeriod::new("b", "b").with_every_day(vec![TimeRange::all_day()]).with_exclusion("a"),
    ]);
    let evaluator = Evaluator::new(&registry, Utc);
    let b = registry.get_by_name("b").unwrap();

    let start = Utc.with_ymd_and_hms(2016, 10, 24, 9, 0, 0).unwrap();
    for minutes in (0..8 * 60).step_by(7) {
        assert!(!evaluator.is_valid(b, start + Duration::minutes(minutes)));
    }
    assert!(evaluator.is_valid(b, start - Duration::seconds(1)));
    assert_eq!(
        evaluator.next_valid(b, start, year()),
        Some(Utc.with_ymd_and_hms(2016, 10, 24, 17, 0, 0).unwrap())
    );
}

#[test_log::test]
fn period_from_json_configuration() {
    let json = r#"{
        "timeperiod_name": "test",
        "alias": "test",
        "exceptions": {
            "month_date": [
                { "smon": 9, "smday": 25, "emon": 9, "emday": 25,
                  "timerange": [{ "range_start": 38700, "range_end": 51900 }] },
                { "smon": 9, "smday": 27, "emon": 9, "emday": 28,
                  "timerange": [
                    { "range_start": 66600, "range_end": 76500 },
                    { "range_start": 30600, "range_end": 45000 }
                  ] }
            ]
        }
    }"#;
    let config: TimePeriodConfig = serde_json::from_str(json).unwrap();
    let period = TimePeriod::try_from(config).unwrap();
    assert_eq!(period, exceptions_period());
    assert_eq!(
        period.to_string(),
        "timeperiod_name test\n\
         alias test\n\
         october 25 10:45-14:25\n\
         october 27 - 28 08:30-12:30, 18:30-21:15\n"
    );
}

type Verdict = (bool, Option<Timestamp>, Option<Timestamp>);

fn evaluate_work(registry: &Registry, instants: &[Timestamp]) -> Vec<Verdict> {
    let evaluator = Evaluator::new(registry, Utc);
    let work = registry.get_by_name("work").unwrap();
    instants
        .iter()
        .map(|&now| {
            (
                evaluator.is_valid(work, now),
                evaluator.next_valid(work, now, year()),
                evaluator.next_invalid(work, now, year()),
            )
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_evaluation_agrees_with_sequential() {
    let registry = Arc::new(registry(vec![
        exceptions_period(),
        TimePeriod::new("work", "work")
            .with_every_day(vec![TimeRange::hm(9, 0, 17, 0)])
            .with_exclusion("test"),
    ]));
    let start = Utc.with_ymd_and_hms(2016, 10, 20, 0, 0, 0).unwrap();
    let instants: Vec<Timestamp> = (0..200).map(|i| start + Duration::minutes(i * 97)).collect();

    let expected = evaluate_work(&registry, &instants);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let instants = instants.clone();
            tokio::spawn(async move { evaluate_work(&registry, &instants) })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), expected);
    }
}
