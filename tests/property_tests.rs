//! Property-based tests for sweep-bench
//!
//! - Token grammar: any noise around a token, any metadata
//! - Trial means and grid cardinality
//! - Baseline merge invariants
//! - Run with ProptestConfig::with_cases(100)

use std::time::Duration;

use proptest::prelude::*;
use sweep_bench::experiment::{Axis, Column, ExperimentDescriptor, Grid};
use sweep_bench::merge::{merge, MergePlan};
use sweep_bench::runner::{Invocation, TrialRunner};
use sweep_bench::table::Table;
use sweep_bench::token::TimingToken;

// ============================================================================
// Strategies
// ============================================================================

/// Output noise containing neither delimiter
fn arb_noise() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:=\n]{0,40}"
}

/// Metadata field without delimiter or separator
fn arb_field() -> impl Strategy<Value = String> {
    "[a-z0-9.]{1,8}"
}

/// Non-negative elapsed time
fn arb_elapsed() -> impl Strategy<Value = f64> {
    0.0f64..1.0e4
}

/// Per-size serial times and per-(size, concurrency) parallel times
fn arb_timings() -> impl Strategy<Value = (Vec<u32>, Vec<f64>, Vec<Vec<f64>>)> {
    (
        proptest::collection::btree_set(2u32..64, 1..5),
        proptest::collection::vec(0.001f64..100.0, 1..6),
    )
        .prop_flat_map(|(counts, serial)| {
            let counts: Vec<u32> = counts.into_iter().collect();
            let sizes = serial.len();
            let parallel = proptest::collection::vec(
                proptest::collection::vec(0.001f64..100.0, counts.len()),
                sizes,
            );
            (Just(counts), Just(serial), parallel)
        })
}

fn timing_table(counts: &[u32], serial: &[f64], parallel: &[Vec<f64>]) -> Table {
    let mut table = Table::new(["threads", "size", "time"]);
    for (size, time) in serial.iter().enumerate() {
        table
            .push(["1".to_string(), size.to_string(), time.to_string()])
            .unwrap();
    }
    for (size, times) in parallel.iter().enumerate() {
        for (count, time) in counts.iter().zip(times) {
            table
                .push([count.to_string(), size.to_string(), time.to_string()])
                .unwrap();
        }
    }
    table
}

fn plan() -> MergePlan {
    MergePlan::new("threads", "time", ["size"])
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the token survives arbitrary surrounding noise
    #[test]
    fn prop_token_extracted_from_noise(
        before in arb_noise(),
        after in arb_noise(),
        fields in proptest::collection::vec(arb_field(), 0..5),
        elapsed in arb_elapsed(),
    ) {
        let mut payload = fields.clone();
        payload.push(elapsed.to_string());
        let output = format!("{before}|{}|{after}", payload.join(","));

        let token = TimingToken::parse(&output).unwrap();
        prop_assert_eq!(token.metadata(), fields.as_slice());
        prop_assert_eq!(token.elapsed(), elapsed);
    }

    /// Property: output without a delimiter is always rejected
    #[test]
    fn prop_no_delimiter_rejected(noise in arb_noise()) {
        prop_assert!(TimingToken::parse(&noise).is_err());
    }

    /// Property: constant elapsed time averages to itself for any retry count
    #[test]
    fn prop_mean_of_constant_is_constant(
        retries in 1u32..20,
        elapsed in arb_elapsed(),
    ) {
        let output = format!("|x,{elapsed}|");
        let exec = move |_: &Invocation| -> sweep_bench::Result<String> { Ok(output.clone()) };
        let runner = TrialRunner::new(exec, retries).unwrap().with_pause(Duration::ZERO);
        let inv = Invocation {
            program: "./p".into(),
            concurrency: 1,
            args: Vec::new(),
        };
        let m = runner.measure(&inv).unwrap();
        prop_assert_eq!(m.mean_time, elapsed);
        prop_assert_eq!(m.samples, retries);
    }

    /// Property: grid size is the product of axis lengths, and every point is distinct
    #[test]
    fn prop_grid_cardinality(lens in proptest::collection::vec(1usize..5, 1..4)) {
        let axes: Vec<Axis> = lens
            .iter()
            .enumerate()
            .map(|(i, &n)| Axis::new(format!("a{i}"), (0..n).map(|v| v as i64)))
            .collect();
        let grid = Grid::new(&axes);
        let expected: usize = lens.iter().product();
        prop_assert_eq!(grid.len(), expected);

        let points: Vec<String> = grid.points().map(|p| p.to_string()).collect();
        prop_assert_eq!(points.len(), expected);
        let unique: std::collections::HashSet<&String> = points.iter().collect();
        prop_assert_eq!(unique.len(), expected);
    }

    /// Property: baseline rows have speedup and efficiency exactly 1
    #[test]
    fn prop_baseline_is_unity((counts, serial, parallel) in arb_timings()) {
        let table = timing_table(&counts, &serial, &parallel);
        let merged = merge(&table, &plan()).unwrap();
        prop_assert_eq!(merged.len(), table.len());
        for row in merged.rows().iter().filter(|r| r.is_baseline()) {
            prop_assert_eq!(row.speedup(), 1.0);
            prop_assert_eq!(row.efficiency(), 1.0);
        }
    }

    /// Property: speedup is serial/time and efficiency is speedup/concurrency
    #[test]
    fn prop_speedup_definition((counts, serial, parallel) in arb_timings()) {
        let table = timing_table(&counts, &serial, &parallel);
        let merged = merge(&table, &plan()).unwrap();
        for row in merged.rows() {
            let expected = row.serial_time() / row.mean_time();
            prop_assert_eq!(row.speedup(), expected);
            prop_assert_eq!(row.efficiency(), expected / f64::from(row.concurrency()));
        }
    }

    /// Property: merging a merged table changes nothing
    #[test]
    fn prop_merge_idempotent((counts, serial, parallel) in arb_timings()) {
        let table = timing_table(&counts, &serial, &parallel);
        let once = merge(&table, &plan()).unwrap();
        let twice = merge(&once.to_table(), &plan()).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: removing any baseline row makes the merge fail
    #[test]
    fn prop_missing_baseline_fails(
        (counts, serial, parallel) in arb_timings(),
        pick in any::<prop::sample::Index>(),
    ) {
        let full = timing_table(&counts, &serial, &parallel);
        let victim = pick.index(serial.len());
        let mut table = Table::new(full.columns().iter().cloned());
        for (i, row) in full.rows().iter().enumerate() {
            if i != victim {
                table.push(row.iter().cloned()).unwrap();
            }
        }
        let is_join_error = matches!(merge(&table, &plan()), Err(sweep_bench::Error::Join { .. }));
        prop_assert!(is_join_error);
    }
}

#[test]
fn descriptor_default_join_keys_exclude_concurrency() {
    let descriptor = ExperimentDescriptor::builder("d")
        .concurrency_axis("np", &[1, 2])
        .axis(Axis::new("n", [10, 20]))
        .schema(vec![Column::axis("np"), Column::axis("n"), Column::mean_time("t")])
        .build()
        .unwrap();
    assert_eq!(descriptor.join_keys(), ["n"]);
}
