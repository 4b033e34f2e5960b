//! Utils

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rusty_money::{Money, iso::Currency};

use crate::{
    application::RecordApplication,
    config::EngineConfig,
    filters::{MaxPenaltyRequest, PenaltyFilter, PenaltyMode, Query},
    fixtures::{FixtureError, find_currency, parse_price},
};

/// Departure scope selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DepartureArg {
    /// Before travel commences
    Before,

    /// After travel commences
    After,

    /// Before and after travel commences
    #[default]
    Both,
}

impl From<DepartureArg> for RecordApplication {
    fn from(arg: DepartureArg) -> Self {
        match arg {
            DepartureArg::Before => RecordApplication::BEFORE,
            DepartureArg::After => RecordApplication::AFTER,
            DepartureArg::Both => RecordApplication::BOTH,
        }
    }
}

/// Arguments for the evaluation example
#[derive(Debug, Parser)]
pub struct ExampleEvaluateArgs {
    /// Fixture set to evaluate
    #[clap(short, long, default_value = "round_trip_mixed")]
    pub fixture: String,

    /// Directory holding the fixture sets
    #[clap(long, default_value = "./fixtures")]
    pub base_path: PathBuf,

    /// How the change and refund criteria combine
    #[clap(short, long, value_enum, default_value_t = PenaltyMode::Info)]
    pub mode: PenaltyMode,

    /// Departure scope the criteria apply to
    #[clap(short, long, value_enum, default_value_t = DepartureArg::Both)]
    pub departure: DepartureArg,

    /// Changeability query for change and refund
    #[clap(short, long, value_enum)]
    pub query: Option<Query>,

    /// Maximum change and refund fee (e.g. "150.00 USD")
    #[clap(long)]
    pub max_fee: Option<String>,

    /// Explicit evaluation currency code
    #[clap(long)]
    pub currency: Option<String>,

    /// Engine configuration
    #[command(flatten)]
    pub config: EngineConfig,
}

impl ExampleEvaluateArgs {
    /// Build the request; change and refund share the same criteria.
    ///
    /// # Errors
    ///
    /// Returns an error if the maximum fee cannot be parsed.
    pub fn request(&self) -> Result<MaxPenaltyRequest, FixtureError> {
        let mut filter = PenaltyFilter::new(self.departure.into());

        if let Some(query) = self.query {
            filter = filter.with_query(query);
        }

        if let Some(max_fee) = self.max_fee.as_deref() {
            let (minor_units, currency) = parse_price(max_fee)?;

            filter = filter.with_max_fee(Money::from_minor(minor_units, currency));
        }

        Ok(MaxPenaltyRequest::new(self.mode, filter, filter))
    }

    /// Evaluation currency chosen by the configured source.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit currency code is unknown.
    pub fn currency(&self, agent: &'static Currency) -> Result<&'static Currency, FixtureError> {
        let explicit = self.currency.as_deref().map(find_currency).transpose()?;

        Ok(self.config.preferred_currency_source.select(agent, explicit))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{EUR, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn defaults_request_info_mode() -> TestResult {
        let args = ExampleEvaluateArgs::try_parse_from(["evaluate"])?;
        let request = args.request()?;

        assert_eq!(request, MaxPenaltyRequest::info());
        assert_eq!(args.currency(USD)?, USD);

        Ok(())
    }

    #[test]
    fn criteria_apply_to_both_kinds() -> TestResult {
        let args = ExampleEvaluateArgs::try_parse_from([
            "evaluate",
            "--mode",
            "or",
            "--departure",
            "after",
            "--max-fee",
            "150.00 USD",
        ])?;
        let request = args.request()?;

        assert_eq!(request.mode, PenaltyMode::Or);
        assert_eq!(request.change, request.refund);
        assert_eq!(request.change.departure, RecordApplication::AFTER);
        assert_eq!(request.change.max_fee, Some(Money::from_minor(15_000, USD)));
        assert!(request.validate().is_ok());

        Ok(())
    }

    #[test]
    fn explicit_currency_needs_override_source() -> TestResult {
        let agent = ExampleEvaluateArgs::try_parse_from(["evaluate", "--currency", "EUR"])?;
        let explicit = ExampleEvaluateArgs::try_parse_from([
            "evaluate",
            "--currency",
            "EUR",
            "--preferred-currency-source",
            "explicit-override",
        ])?;

        assert_eq!(agent.currency(USD)?, USD);
        assert_eq!(explicit.currency(USD)?, EUR);

        Ok(())
    }

    #[test]
    fn bad_max_fee_is_rejected() -> TestResult {
        let args = ExampleEvaluateArgs::try_parse_from(["evaluate", "--max-fee", "lots"])?;

        assert!(matches!(args.request(), Err(FixtureError::InvalidPrice(_))));

        Ok(())
    }
}
