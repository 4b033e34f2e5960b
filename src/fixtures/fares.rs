//! Fare Fixtures

use decimal_percentage::Percentage;
use rusty_money::Money;
use serde::Deserialize;

use crate::{
    fares::{FareComponent, TripType},
    fixtures::{FixtureError, parse_price},
    records::{CombinationCode, DepartureCodes, FeeClassification, PenaltyRuleRecord},
};

/// Wrapper for fare components and fare paths in YAML
#[derive(Debug, Deserialize)]
pub struct FaresFixture {
    /// Fare components in insertion order
    pub fare_components: Vec<FareComponentFixture>,

    /// Fare paths referencing fare components by fare basis
    pub fare_paths: Vec<FarePathFixture>,
}

/// Fare component fixture from YAML
#[derive(Debug, Deserialize)]
pub struct FareComponentFixture {
    /// Fare basis, unique within the set
    pub fare_basis: String,

    /// Fare amount (e.g. "500.00 USD")
    pub amount: String,

    /// Forced non-changeable
    #[serde(default)]
    pub hard_non: bool,

    /// Travel on the component has started
    #[serde(default)]
    pub partially_flown: bool,

    /// Change records in rule source order
    #[serde(default)]
    pub change: Vec<RecordFixture>,

    /// Refund records in rule source order
    #[serde(default)]
    pub refund: Vec<RecordFixture>,
}

impl TryFrom<&FareComponentFixture> for FareComponent {
    type Error = FixtureError;

    fn try_from(fixture: &FareComponentFixture) -> Result<Self, Self::Error> {
        let (minor_units, currency) = parse_price(&fixture.amount)?;

        Ok(
            FareComponent::new(fixture.fare_basis.clone(), Money::from_minor(minor_units, currency))
                .with_hard_non(fixture.hard_non)
                .with_partially_flown(fixture.partially_flown),
        )
    }
}

/// Fare path fixture from YAML
#[derive(Debug, Deserialize)]
pub struct FarePathFixture {
    /// Trip type
    #[serde(default)]
    pub trip_type: TripTypeFixture,

    /// Pricing units, each a list of fare bases in travel order
    pub pricing_units: Vec<Vec<String>>,
}

/// Trip type from YAML
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripTypeFixture {
    /// One way
    #[default]
    OneWay,

    /// Round trip
    RoundTrip,

    /// Circle trip
    CircleTrip,

    /// Open jaw
    OpenJaw,
}

impl From<TripTypeFixture> for TripType {
    fn from(fixture: TripTypeFixture) -> Self {
        match fixture {
            TripTypeFixture::OneWay => TripType::OneWay,
            TripTypeFixture::RoundTrip => TripType::RoundTrip,
            TripTypeFixture::CircleTrip => TripType::CircleTrip,
            TripTypeFixture::OpenJaw => TripType::OpenJaw,
        }
    }
}

/// Penalty rule record fixture from YAML
#[derive(Debug, Deserialize)]
pub struct RecordFixture {
    /// Rule source vendor
    #[serde(default = "default_vendor")]
    pub vendor: String,

    /// Raw departure codes
    #[serde(default)]
    pub departure: DepartureFixture,

    /// Fee
    pub fee: FeeFixture,

    /// Combination code
    #[serde(default)]
    pub combination: CombinationFixture,

    /// Same carrier restriction
    #[serde(default)]
    pub same_carrier_restriction: bool,

    /// Refund only applies to partially flown tickets
    #[serde(default)]
    pub partially_flown_only: bool,
}

fn default_vendor() -> String {
    String::from("ATP")
}

impl TryFrom<&RecordFixture> for PenaltyRuleRecord {
    type Error = FixtureError;

    fn try_from(fixture: &RecordFixture) -> Result<Self, Self::Error> {
        Ok(PenaltyRuleRecord::new(FeeClassification::try_from(&fixture.fee)?)
            .with_vendor(fixture.vendor.clone())
            .with_departure(fixture.departure.into())
            .with_combination(fixture.combination.into())
            .with_same_carrier_restriction(fixture.same_carrier_restriction)
            .with_partially_flown_only(fixture.partially_flown_only))
    }
}

/// Raw departure codes from YAML; missing fields are unrestricted.
///
/// Codes are read verbatim so invalid codes reach the engine.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DepartureFixture {
    /// Journey code
    pub journey: char,

    /// Pricing unit code
    pub pricing_unit: char,

    /// Fare component code
    pub fare_component: char,
}

impl Default for DepartureFixture {
    fn default() -> Self {
        Self {
            journey: ' ',
            pricing_unit: ' ',
            fare_component: ' ',
        }
    }
}

impl From<DepartureFixture> for DepartureCodes {
    fn from(fixture: DepartureFixture) -> Self {
        DepartureCodes {
            journey: fixture.journey,
            pricing_unit: fixture.pricing_unit,
            fare_component: fixture.fare_component,
        }
    }
}

/// Fee from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeFixture {
    /// Fixed fee (e.g. "100.00 USD")
    FixedAmount {
        /// Fee amount
        value: String,
    },

    /// Highest of a fixed fee and a share of the fare amount
    HighestOfComponentAndPercentage {
        /// Fee amount
        value: String,

        /// Share of the fare as a decimal (e.g. 0.25 for 25%)
        percent: f64,
    },

    /// Zero fee
    NoFeeApplies,

    /// Undetermined fee
    FeeNotDetermined,

    /// Waived fee
    Waived,

    /// Cancel and start over, optionally charging a fee instead
    CancelAndStartOver {
        /// Fee charged instead of blocking
        #[serde(default)]
        fee_override: Option<String>,
    },

    /// Non-changeable or non-refundable
    NonChangeable,
}

impl TryFrom<&FeeFixture> for FeeClassification {
    type Error = FixtureError;

    fn try_from(fixture: &FeeFixture) -> Result<Self, Self::Error> {
        let money = |value: &str| -> Result<_, FixtureError> {
            let (minor_units, currency) = parse_price(value)?;

            Ok(Money::from_minor(minor_units, currency))
        };

        Ok(match fixture {
            FeeFixture::FixedAmount { value } => FeeClassification::FixedAmount(money(value)?),
            FeeFixture::HighestOfComponentAndPercentage { value, percent } => {
                if !(0.0..=1.0).contains(percent) {
                    return Err(FixtureError::InvalidPercentage(percent.to_string()));
                }

                FeeClassification::HighestOfComponentAndPercentage {
                    amount: money(value)?,
                    percent: Percentage::from(*percent),
                }
            }
            FeeFixture::NoFeeApplies => FeeClassification::NoFeeApplies,
            FeeFixture::FeeNotDetermined => FeeClassification::FeeNotDetermined,
            FeeFixture::Waived => FeeClassification::Waived,
            FeeFixture::CancelAndStartOver { fee_override } => {
                FeeClassification::CancelAndStartOver {
                    fee_override: fee_override.as_deref().map(money).transpose()?,
                }
            }
            FeeFixture::NonChangeable => FeeClassification::NonChangeable,
        })
    }
}

/// Combination code from YAML
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationFixture {
    /// Highest fee governs
    #[default]
    Plain,

    /// First component's fee is added
    SumFromFirstComponent,

    /// Every fee is added
    SumAcrossAll,
}

impl From<CombinationFixture> for CombinationCode {
    fn from(fixture: CombinationFixture) -> Self {
        match fixture {
            CombinationFixture::Plain => CombinationCode::Plain,
            CombinationFixture::SumFromFirstComponent => CombinationCode::SumFromFirstComponent,
            CombinationFixture::SumAcrossAll => CombinationCode::SumAcrossAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::EUR;
    use testresult::TestResult;

    use crate::application::{DepartureField, InvalidDepartureCode};

    use super::*;

    #[test]
    fn record_fixture_defaults_to_unrestricted_plain() -> TestResult {
        let yaml = r"
fee:
  type: no_fee_applies
";
        let fixture: RecordFixture = serde_norway::from_str(yaml)?;
        let record = PenaltyRuleRecord::try_from(&fixture)?;

        assert_eq!(record.vendor(), "ATP");
        assert_eq!(record.departure(), DepartureCodes::UNRESTRICTED);
        assert_eq!(record.combination(), CombinationCode::Plain);
        assert_eq!(record.fee(), &FeeClassification::NoFeeApplies);

        Ok(())
    }

    #[test]
    fn record_fixture_keeps_invalid_departure_codes() -> TestResult {
        let yaml = r#"
departure:
  journey: "X"
fee:
  type: waived
"#;
        let fixture: RecordFixture = serde_norway::from_str(yaml)?;
        let record = PenaltyRuleRecord::try_from(&fixture)?;

        assert_eq!(
            record.departure_indicators().err(),
            Some(InvalidDepartureCode {
                code: 'X',
                field: DepartureField::Journey,
            })
        );

        Ok(())
    }

    #[test]
    fn fee_fixture_parses_percentage_fee() -> TestResult {
        let fixture = FeeFixture::HighestOfComponentAndPercentage {
            value: "25.00 EUR".to_string(),
            percent: 0.2,
        };

        let fee = FeeClassification::try_from(&fixture)?;

        assert!(matches!(
            fee,
            FeeClassification::HighestOfComponentAndPercentage { amount, percent }
                if amount.to_minor_units() == 2_500
                    && amount.currency() == EUR
                    && percent == Percentage::from(0.2)
        ));

        Ok(())
    }

    #[test]
    fn fee_fixture_rejects_out_of_range_percentage() {
        let fixture = FeeFixture::HighestOfComponentAndPercentage {
            value: "25.00 EUR".to_string(),
            percent: 1.5,
        };

        assert!(matches!(
            FeeClassification::try_from(&fixture),
            Err(FixtureError::InvalidPercentage(_))
        ));
    }

    #[test]
    fn cancel_and_start_over_override_is_optional() -> TestResult {
        let blocked: FeeFixture = serde_norway::from_str("type: cancel_and_start_over")?;
        let charged: FeeFixture = serde_norway::from_str(
            "type: cancel_and_start_over\nfee_override: \"80.00 EUR\"",
        )?;

        assert!(FeeClassification::try_from(&blocked)?.is_hard_block());
        assert!(!FeeClassification::try_from(&charged)?.is_hard_block());

        Ok(())
    }

    #[test]
    fn fee_fixture_rejects_unknown_type() {
        let result: Result<FeeFixture, _> = serde_norway::from_str("type: mystery_fee");

        assert!(result.is_err());
    }
}
