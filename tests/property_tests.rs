//! Property-based tests for timestamp generation and line protocol.
//!
//! These tests use proptest to verify that core invariants hold
//! across a wide range of random inputs.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use kapacitor_unit::metric::{parse_all, parse_line, serialize};
use kapacitor_unit::{Counter, FieldValue, Metric};

fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        (-1.0e12f64..1.0e12).prop_map(FieldValue::Float),
        any::<i64>().prop_map(FieldValue::Integer),
        any::<u64>().prop_map(FieldValue::Unsigned),
        "[a-zA-Z0-9 ,=\"\\\\]{0,12}".prop_map(FieldValue::String),
        any::<bool>().prop_map(FieldValue::Boolean),
    ]
}

fn metric() -> impl Strategy<Value = Metric> {
    (
        "[a-z][a-z0-9_ ,]{0,8}",
        prop::collection::btree_map("[a-z][a-z0-9 ,=]{0,6}", "[a-z0-9][a-z0-9 ,=]{0,6}", 0..4),
        prop::collection::btree_map("[a-z][a-z0-9_ ,=\"]{0,6}", field_value(), 1..5),
        0i64..i64::MAX,
    )
        .prop_map(|(measurement, tags, fields, nanos)| Metric {
            measurement,
            tags,
            fields: fields.into_iter().collect::<BTreeMap<_, _>>(),
            timestamp: DateTime::from_timestamp_nanos(nanos),
        })
}

proptest! {
    /// The counter yields exactly `total` timestamps, each within the jitter
    /// window of its evenly spaced base, the last base one step before `end`.
    #[test]
    fn counter_spacing_and_bounds(
        total in 1usize..60,
        step_ms in 1u64..120_000,
        jitter_frac in 0.0f64..=1.0,
        end_secs in 1_000_000_000i64..2_000_000_000,
        seed in any::<u64>(),
    ) {
        let step = Duration::from_millis(step_ms);
        let jitter = step.mul_f64(jitter_frac);
        let end = DateTime::from_timestamp(end_secs, 0).unwrap();
        let counter = Counter::with_rng(end, step, jitter, total, StdRng::seed_from_u64(seed));

        prop_assert_eq!(counter.base_at(total - 1), end - TimeDelta::from_std(step).unwrap());
        prop_assert_eq!(
            counter.base_at(0),
            end - TimeDelta::from_std(step).unwrap() * i32::try_from(total).unwrap()
        );
        let bases: Vec<DateTime<Utc>> = (0..total).map(|i| counter.base_at(i)).collect();
        let stamps: Vec<DateTime<Utc>> = counter.collect();
        prop_assert_eq!(stamps.len(), total);

        let window = TimeDelta::from_std(jitter).unwrap();
        for (i, (stamp, base)) in stamps.iter().zip(&bases).enumerate() {
            let offset = (*stamp - *base).abs();
            if jitter <= Duration::from_nanos(1) {
                prop_assert_eq!(offset, TimeDelta::zero());
            } else {
                prop_assert!(offset < window, "stamp {} off by {:?}", i, offset);
            }
            if i > 0 {
                prop_assert_eq!(*base - bases[i - 1], TimeDelta::from_std(step).unwrap());
            }
        }
    }

    /// Without jitter the counter is strictly increasing.
    #[test]
    fn counter_without_jitter_is_monotonic(total in 2usize..100, step_ms in 1u64..10_000) {
        let counter = Counter::with_rng(
            Utc::now(),
            Duration::from_millis(step_ms),
            Duration::ZERO,
            total,
            StdRng::seed_from_u64(0),
        );
        let stamps: Vec<DateTime<Utc>> = counter.collect();
        prop_assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    /// Serializing a metric and parsing it back yields the same metric.
    #[test]
    fn serialize_then_parse_is_identity(original in metric()) {
        let bytes = serialize(&original).unwrap();
        let line = String::from_utf8(bytes).unwrap();
        prop_assert!(line.ends_with('\n'));
        let parsed = parse_line(&line, Utc::now()).unwrap();
        prop_assert_eq!(parsed, original);
    }

    /// `parse_all` consumes one counter step per line, whatever the line count.
    #[test]
    fn parse_all_consumes_one_timestamp_per_line(values in prop::collection::vec(-1000i64..1000, 1..40)) {
        let lines: Vec<String> = values.iter().map(|v| format!("cpu value={v}i")).collect();
        let mut counter = Counter::with_rng(
            Utc::now(),
            Duration::from_secs(10),
            Duration::ZERO,
            lines.len(),
            StdRng::seed_from_u64(7),
        );
        let metrics = parse_all(&lines, &mut counter).unwrap();
        prop_assert_eq!(metrics.len(), values.len());
        prop_assert_eq!(counter.remaining(), 0);
        for (metric, v) in metrics.iter().zip(&values) {
            prop_assert_eq!(metric.field("value"), Some(&FieldValue::Integer(*v)));
        }
    }
}
