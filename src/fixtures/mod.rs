//! Fixtures

use std::{fs, path::PathBuf, str::FromStr};

use jiff::civil::Date;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::iso::{self, Currency};
use thiserror::Error;

use crate::{
    currency::{CurrencyConverter, RateTable},
    evaluation::PenaltyEvaluator,
    fares::{FareComponent, FareComponentKey, FareError, FarePath, PenaltyArena, PricingUnit},
    fixtures::{fares::FaresFixture, rates::RatesFixture},
    records::{PenaltyKind, PenaltyRuleRecord},
};

pub mod fares;
pub mod rates;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage
    #[error("Invalid percentage: {0}")]
    InvalidPercentage(String),

    /// Invalid exchange rate
    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Fare basis defined twice
    #[error("Duplicate fare component: {0}")]
    DuplicateFareComponent(String),

    /// Fare path references an unknown fare basis
    #[error("Fare component not found: {0}")]
    FareComponentNotFound(String),

    /// Fare path index out of range
    #[error("Fare path not found: {0}")]
    FarePathNotFound(usize),

    /// No rates loaded yet
    #[error("No rates loaded yet; evaluation currency unknown")]
    NoRates,

    /// Arena error
    #[error(transparent)]
    Fare(#[from] FareError),
}

/// Look up an ISO currency by code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] for unknown codes.
pub fn find_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    iso::find(code.trim()).ok_or_else(|| FixtureError::UnknownCurrency(code.trim().to_string()))
}

/// Parse a price such as `"150.00 USD"` into minor units and currency.
///
/// # Errors
///
/// Returns an error if the amount is malformed, has more decimals than the
/// currency allows, or the currency is unknown.
pub fn parse_price(value: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let (amount, code) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| FixtureError::InvalidPrice(value.to_string()))?;

    let currency = find_currency(code)?;

    let amount = Decimal::from_str(amount.trim())
        .map_err(|_err| FixtureError::InvalidPrice(value.to_string()))?;

    let minor_units = amount
        .checked_mul(Decimal::from(10_i64.pow(currency.exponent)))
        .filter(|minor| minor.fract().is_zero())
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(value.to_string()))?;

    Ok((minor_units, currency))
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Fare components and records
    arena: PenaltyArena,

    /// Fare basis -> arena key
    component_keys: FxHashMap<String, FareComponentKey>,

    /// Fare paths in file order
    fare_paths: Vec<FarePath>,

    /// Exchange rates
    rates: RateTable,

    /// Evaluation currency
    currency: Option<&'static Currency>,

    /// Date rates are effective on
    as_of: Option<Date>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            arena: PenaltyArena::new(),
            component_keys: FxHashMap::default(),
            fare_paths: Vec::new(),
            rates: RateTable::new(),
            currency: None,
            as_of: None,
        }
    }

    /// Load the evaluation currency, date and exchange rates
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds unknown
    /// currencies or invalid rates.
    pub fn load_rates(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("rates").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: RatesFixture = serde_norway::from_str(&contents)?;

        self.rates = RateTable::try_from(&fixture)?;
        self.currency = Some(find_currency(&fixture.currency)?);
        self.as_of = Some(fixture.as_of);

        Ok(self)
    }

    /// Load fare components, their records and fare paths
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a fare path
    /// references an unknown fare component.
    pub fn load_fares(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("fares").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: FaresFixture = serde_norway::from_str(&contents)?;

        for component_fixture in &fixture.fare_components {
            if self.component_keys.contains_key(&component_fixture.fare_basis) {
                return Err(FixtureError::DuplicateFareComponent(
                    component_fixture.fare_basis.clone(),
                ));
            }

            let fare_component = FareComponent::try_from(component_fixture)?;
            let key = self.arena.insert_fare_component(fare_component);

            for (kind, records) in [
                (PenaltyKind::Change, &component_fixture.change),
                (PenaltyKind::Refund, &component_fixture.refund),
            ] {
                for record in records {
                    self.arena
                        .attach_record(key, kind, PenaltyRuleRecord::try_from(record)?)?;
                }
            }

            self.component_keys
                .insert(component_fixture.fare_basis.clone(), key);
        }

        for path_fixture in fixture.fare_paths {
            let mut pricing_units = Vec::with_capacity(path_fixture.pricing_units.len());

            for fare_bases in &path_fixture.pricing_units {
                let keys = fare_bases
                    .iter()
                    .map(|basis| self.fare_component_key(basis))
                    .collect::<Result<Vec<_>, _>>()?;

                pricing_units.push(PricingUnit::new(keys));
            }

            self.fare_paths
                .push(FarePath::new(path_fixture.trip_type.into(), pricing_units));
        }

        Ok(self)
    }

    /// Load a complete fixture set (rates and fares with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_rates(name)?.load_fares(name)?;

        Ok(fixture)
    }

    /// Get a fare component key by its fare basis
    ///
    /// # Errors
    ///
    /// Returns an error if the fare component is not found.
    pub fn fare_component_key(&self, fare_basis: &str) -> Result<FareComponentKey, FixtureError> {
        self.component_keys
            .get(fare_basis)
            .copied()
            .ok_or_else(|| FixtureError::FareComponentNotFound(fare_basis.to_string()))
    }

    /// Get a fare path by its position in the file
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such fare path.
    pub fn fare_path(&self, index: usize) -> Result<&FarePath, FixtureError> {
        self.fare_paths
            .get(index)
            .ok_or(FixtureError::FarePathNotFound(index))
    }

    /// Get all fare paths
    pub fn fare_paths(&self) -> &[FarePath] {
        &self.fare_paths
    }

    /// Get the arena holding fare components and records
    pub fn arena(&self) -> &PenaltyArena {
        &self.arena
    }

    /// Get the exchange rates
    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// Get the evaluation currency
    ///
    /// # Errors
    ///
    /// Returns an error if no rates have been loaded yet.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoRates)
    }

    /// Get the date rates are effective on
    ///
    /// # Errors
    ///
    /// Returns an error if no rates have been loaded yet.
    pub fn as_of(&self) -> Result<Date, FixtureError> {
        self.as_of.ok_or(FixtureError::NoRates)
    }

    /// Create an evaluator using the fixture's rates, currency and date
    ///
    /// # Errors
    ///
    /// Returns an error if no rates have been loaded yet.
    pub fn evaluator(&self) -> Result<PenaltyEvaluator<'_>, FixtureError> {
        Ok(PenaltyEvaluator::new(
            &self.rates as &dyn CurrencyConverter,
            self.currency()?,
            self.as_of()?,
        ))
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use rusty_money::iso::{JPY, USD};
    use testresult::TestResult;

    use crate::fares::RuleSource;

    use super::*;

    fn write_fixture(base: &Path, category: &str, name: &str, contents: &str) -> TestResult {
        let dir = base.join(category);

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    #[test]
    fn parse_price_reads_minor_units() -> TestResult {
        assert_eq!(parse_price("150.00 USD")?, (15_000, USD));
        assert_eq!(parse_price("12.5 USD")?, (1_250, USD));
        assert_eq!(parse_price("1200 JPY")?, (1_200, JPY));

        Ok(())
    }

    #[test]
    fn parse_price_rejects_malformed_prices() {
        for value in ["150.00", "abc USD", "1.001 USD", "1.5 JPY"] {
            assert!(
                matches!(parse_price(value), Err(FixtureError::InvalidPrice(_))),
                "price {value}"
            );
        }

        assert!(matches!(
            parse_price("1.00 ZZZ"),
            Err(FixtureError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn fixture_from_set_loads_rates_and_fares() -> TestResult {
        let fixture = Fixture::from_set("scenario_b")?;

        assert_eq!(fixture.currency()?, USD);
        assert_eq!(fixture.fare_paths().len(), 1);
        assert_eq!(fixture.fare_path(0)?.component_count(), 2);

        let first = fixture.fare_component_key("Y1")?;

        assert_eq!(
            fixture
                .arena()
                .candidates(first, PenaltyKind::Change)?
                .len(),
            2
        );

        Ok(())
    }

    #[test]
    fn fixture_rejects_unknown_fare_basis_in_path() -> TestResult {
        let dir = tempfile::tempdir()?;

        write_fixture(
            dir.path(),
            "fares",
            "broken",
            r#"
fare_components:
  - fare_basis: Y
    amount: "100.00 USD"
fare_paths:
  - pricing_units:
      - [Y, Q]
"#,
        )?;

        let mut fixture = Fixture::with_base_path(dir.path());
        let result = fixture.load_fares("broken");

        assert!(matches!(
            result,
            Err(FixtureError::FareComponentNotFound(basis)) if basis == "Q"
        ));

        Ok(())
    }

    #[test]
    fn fixture_rejects_duplicate_fare_basis() -> TestResult {
        let dir = tempfile::tempdir()?;

        write_fixture(
            dir.path(),
            "fares",
            "duplicate",
            r#"
fare_components:
  - fare_basis: Y
    amount: "100.00 USD"
  - fare_basis: Y
    amount: "200.00 USD"
fare_paths: []
"#,
        )?;

        let result = Fixture::with_base_path(dir.path()).load_fares("duplicate").map(|_| ());

        assert!(matches!(result, Err(FixtureError::DuplicateFareComponent(_))));

        Ok(())
    }

    #[test]
    fn fixture_without_rates_has_no_currency() {
        let fixture = Fixture::default();

        assert!(matches!(fixture.currency(), Err(FixtureError::NoRates)));
        assert!(matches!(fixture.evaluator(), Err(FixtureError::NoRates)));
        assert!(matches!(fixture.fare_path(0), Err(FixtureError::FarePathNotFound(0))));
    }

    #[test]
    fn missing_fixture_file_is_an_io_error() {
        let result = Fixture::with_base_path("./does-not-exist").load_rates("none").map(|_| ());

        assert!(matches!(result, Err(FixtureError::Io(_))));
    }
}
