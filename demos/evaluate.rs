//! Evaluate Example
//!
//! This example evaluates every fare path of a fixture set and validates it
//! against a maximum penalty request.
//!
//! Use `-f` to load a fixture set by name
//! Use `-m` to pick `info`, `or` or `and` mode
//! Use `--max-fee` and `-q` to add criteria; set `RUST_LOG=debug` to see
//! every permutation outcome

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use max_penalty::{
    fixtures::Fixture,
    prelude::*,
    utils::ExampleEvaluateArgs,
};

/// Logs exclusions and per-kind results as they happen
#[derive(Debug, Default)]
struct LoggingObserver;

impl PenaltyObserver for LoggingObserver {
    fn on_record_excluded(
        &mut self,
        fare_basis: &str,
        record: RecordKey,
        error: &InvalidDepartureCode,
    ) {
        warn!(fare_basis, ?record, %error, "record excluded");
    }

    fn on_result(&mut self, kind: PenaltyKind, results: &MaxPenaltyResults) {
        info!(%kind, %results, "maximum penalty");
    }
}

/// Evaluate Example
pub fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = ExampleEvaluateArgs::parse();

    let mut fixture = Fixture::with_base_path(&args.base_path);

    fixture.load_rates(&args.fixture)?.load_fares(&args.fixture)?;

    let currency = args.currency(fixture.currency()?)?;
    let evaluator = PenaltyEvaluator::new(fixture.rates(), currency, fixture.as_of()?);

    let validator = PenaltyValidator::new(evaluator, args.request()?)?
        .with_failed_fares_threshold(args.config.failed_fares_threshold);

    let mut observer = LoggingObserver;

    for (index, fare_path) in fixture.fare_paths().iter().enumerate() {
        let validation = validator.validate_fare(fixture.arena(), fare_path, &mut observer)?;

        info!(fare_path = index, state = %validation.state(), "fare validated");
    }

    let stats = validator.stats();

    if stats.failed_fares > 0 {
        info!(
            failed_fares = stats.failed_fares,
            message = %stats.message(validator.request()),
            "some fares failed"
        );
    }

    Ok(())
}
