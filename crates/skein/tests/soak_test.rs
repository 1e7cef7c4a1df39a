//! Integration test for the soak driver against a bounded pool.

use std::sync::Arc;

use skein::{run_soak, PoolConfig, SoakConfig, StringPool};

#[test]
fn test_soak_on_small_page_budget() {
    let config = PoolConfig::from_toml_str("max_pages = 2\ninitial_pages = 1\n").unwrap();
    let pool = Arc::new(StringPool::with_config(config).unwrap());

    let report = run_soak(
        &pool,
        &SoakConfig {
            producers: 4,
            consumers: 4,
            strings_per_producer: 2_000,
            queue_depth: 64,
        },
    );

    assert_eq!(report.delivered + report.failed_allocations, 8_000);
    assert_eq!(report.mismatches, 0);
    assert_eq!(report.stats.live_allocations, 0);
    assert!(report.stats.pages <= 2);
}
