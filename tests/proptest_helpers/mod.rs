#![allow(dead_code)]

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A WIDER-style box `[x, y, w, h]` with non-negative size, either on the
/// integer grid (as most of the dataset is) or with fractional parts.
pub fn arb_box() -> BoxedStrategy<[f64; 4]> {
    let integral = (0u32..2048, 0u32..2048, 0u32..512, 0u32..512)
        .prop_map(|(x, y, w, h)| [x as f64, y as f64, w as f64, h as f64]);
    let fractional = (0.0f64..2048.0, 0.0f64..2048.0, 0.0f64..512.0, 0.0f64..512.0)
        .prop_map(|(x, y, w, h)| [x, y, w, h]);
    prop_oneof![integral, fractional].boxed()
}

/// A box that may have negative width or height.
pub fn arb_signed_box() -> BoxedStrategy<[f64; 4]> {
    (0.0f64..2048.0, 0.0f64..2048.0, -512.0f64..512.0, -512.0f64..512.0)
        .prop_map(|(x, y, w, h)| [x, y, w, h])
        .boxed()
}

fn stem_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[0-9]{1,2}_[A-Za-z]{1,8}_[0-9]{1,4}").expect("valid stem regex")
}

fn event_name_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[0-9]{1,2}--[A-Za-z_]{1,12}").expect("valid event regex")
}

/// Events with their stems and boxes: `(event, [(stem, boxes)])`.
///
/// Stems may repeat; the table format does not forbid it.
pub fn arb_events(
    max_events: usize,
    max_files: usize,
    max_boxes: usize,
) -> BoxedStrategy<Vec<(String, Vec<(String, Vec<[f64; 4]>)>)>> {
    proptest::collection::vec(
        (
            event_name_strategy(),
            proptest::collection::vec(
                (
                    stem_strategy(),
                    proptest::collection::vec(arb_box(), 0..=max_boxes),
                ),
                0..=max_files,
            ),
        ),
        0..=max_events,
    )
    .boxed()
}
