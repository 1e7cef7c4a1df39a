//! # SKEIN Soak
//!
//! Hammers one string pool from many threads and reports what is left.
//!
//! ```bash
//! # Default pool, default load
//! ./skein_soak
//!
//! # Pool from a TOML file, 8 producers x 100k strings
//! RUST_LOG=skein_core=debug ./skein_soak pool.toml 8 100000
//! ```

use std::sync::Arc;
use std::time::Instant;

use skein::{run_soak, PoolConfig, SoakConfig, StringPool};
use tracing_subscriber::{fmt, EnvFilter};

fn parse_arg(args: &[String], index: usize, default: usize) -> usize {
    args.get(index)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,skein_core=info"));
    fmt().with_env_filter(filter).with_thread_ids(true).init();

    let args: Vec<String> = std::env::args().collect();

    let pool_config = match args.get(1) {
        Some(path) => match PoolConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(%path, error = %e, "failed to load pool config");
                std::process::exit(1);
            }
        },
        None => PoolConfig::default(),
    };

    let defaults = SoakConfig::default();
    let soak = SoakConfig {
        producers: parse_arg(&args, 2, defaults.producers),
        strings_per_producer: parse_arg(&args, 3, defaults.strings_per_producer),
        ..defaults
    };

    let pool = match StringPool::with_config(pool_config) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize string pool");
            std::process::exit(1);
        }
    };

    tracing::info!(
        producers = soak.producers,
        consumers = soak.consumers,
        strings_per_producer = soak.strings_per_producer,
        max_pages = pool_config.max_pages,
        "starting soak"
    );

    let start = Instant::now();
    let report = run_soak(&pool, &soak);
    let elapsed = start.elapsed();

    println!("═══════════════════════════════════════════════");
    println!("  SKEIN SOAK");
    println!("═══════════════════════════════════════════════");
    println!("  delivered:        {}", report.delivered);
    println!("  mismatches:       {}", report.mismatches);
    println!("  failed allocs:    {}", report.failed_allocations);
    println!("  pages:            {}", report.stats.pages);
    println!("  live allocations: {}", report.stats.live_allocations);
    println!("  elapsed:          {:.2?}", elapsed);

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown(),
        Err(_) => tracing::warn!("pool still shared at exit"),
    }

    if report.mismatches > 0 {
        std::process::exit(2);
    }
}
