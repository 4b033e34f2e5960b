//! Penalty Rule Records

use std::fmt;

use decimal_percentage::Percentage;
use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;

use crate::application::{DepartureField, InvalidDepartureCode, RecordApplication};

new_key_type! {
    /// Penalty Rule Record Key
    pub struct RecordKey;
}

/// Which penalty a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenaltyKind {
    /// Voluntary change penalty
    Change,

    /// Voluntary refund penalty
    Refund,
}

impl fmt::Display for PenaltyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PenaltyKind::Change => f.write_str("CHANGE"),
            PenaltyKind::Refund => f.write_str("REFUND"),
        }
    }
}

/// Raw departure codes as they appear on the upstream rule record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepartureCodes {
    /// Journey departure indicator
    pub journey: char,

    /// Pricing unit departure indicator
    pub pricing_unit: char,

    /// Fare component departure indicator
    pub fare_component: char,
}

impl DepartureCodes {
    /// No departure restriction on any field.
    pub const UNRESTRICTED: Self = Self::journey(' ');

    /// Restrict only the journey indicator.
    pub const fn journey(code: char) -> Self {
        Self {
            journey: code,
            pricing_unit: ' ',
            fare_component: ' ',
        }
    }
}

impl Default for DepartureCodes {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}

/// Parsed departure indicators of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepartureIndicators {
    /// Journey departure application
    pub journey: RecordApplication,

    /// Pricing unit departure application
    pub pricing_unit: RecordApplication,

    /// Fare component departure application
    pub fare_component: RecordApplication,
}

impl TryFrom<DepartureCodes> for DepartureIndicators {
    type Error = InvalidDepartureCode;

    fn try_from(codes: DepartureCodes) -> Result<Self, Self::Error> {
        Ok(Self {
            journey: RecordApplication::parse(codes.journey, DepartureField::Journey)?,
            pricing_unit: RecordApplication::parse(
                codes.pricing_unit,
                DepartureField::PricingUnit,
            )?,
            fare_component: RecordApplication::parse(
                codes.fare_component,
                DepartureField::FareComponent,
            )?,
        })
    }
}

/// How the fee of a record is determined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeeClassification {
    /// A fixed fee.
    FixedAmount(Money<'static, Currency>),

    /// The highest of a fixed fee and a percentage of the fare component amount.
    HighestOfComponentAndPercentage {
        /// Fixed fee
        amount: Money<'static, Currency>,

        /// Fraction of the fare component amount (e.g. 0.25)
        percent: Percentage,
    },

    /// No fee is charged; the fee is zero.
    NoFeeApplies,

    /// The fee cannot be determined from the record.
    FeeNotDetermined,

    /// The fee is waived; the fee is zero.
    Waived,

    /// Ticket must be cancelled and repriced from scratch.
    ///
    /// Blocks the change unless the record carries an override fee.
    CancelAndStartOver {
        /// Fee charged instead of the block, if any
        fee_override: Option<Money<'static, Currency>>,
    },

    /// Explicitly non-changeable or non-refundable.
    NonChangeable,
}

impl FeeClassification {
    /// Whether this classification blocks the change or refund outright.
    pub const fn is_hard_block(&self) -> bool {
        matches!(
            self,
            FeeClassification::NonChangeable
                | FeeClassification::CancelAndStartOver { fee_override: None }
        )
    }
}

/// How fees of the fare components in one permutation combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationCode {
    /// The single highest applicable fee governs.
    #[default]
    Plain,

    /// The first fare component's fee is added on top of the governing fee.
    SumFromFirstComponent,

    /// Every applicable fee is added.
    SumAcrossAll,
}

/// A single candidate change or refund rule for one fare component.
///
/// The same carrier restriction is informational. Whether fees add up is
/// decided by the combination code alone, which the rule source already sets
/// to [`CombinationCode::SumAcrossAll`] when a restriction requires it.
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyRuleRecord {
    vendor: String,
    departure: DepartureCodes,
    fee: FeeClassification,
    combination: CombinationCode,
    same_carrier_restriction: bool,
    partially_flown_only: bool,
}

impl PenaltyRuleRecord {
    /// Create an unrestricted, plain-combination record with the given fee.
    pub fn new(fee: FeeClassification) -> Self {
        Self {
            vendor: String::from("ATP"),
            departure: DepartureCodes::UNRESTRICTED,
            fee,
            combination: CombinationCode::Plain,
            same_carrier_restriction: false,
            partially_flown_only: false,
        }
    }

    /// Set the rule source this record came from.
    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Set the raw departure codes.
    #[must_use]
    pub fn with_departure(mut self, departure: DepartureCodes) -> Self {
        self.departure = departure;
        self
    }

    /// Set the combination code.
    #[must_use]
    pub fn with_combination(mut self, combination: CombinationCode) -> Self {
        self.combination = combination;
        self
    }

    /// Mark the record as restricted to the same carrier.
    #[must_use]
    pub fn with_same_carrier_restriction(mut self, restricted: bool) -> Self {
        self.same_carrier_restriction = restricted;
        self
    }

    /// Mark the record as applying only to partially flown tickets (refund only).
    #[must_use]
    pub fn with_partially_flown_only(mut self, partially_flown_only: bool) -> Self {
        self.partially_flown_only = partially_flown_only;
        self
    }

    /// Rule source label
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Raw departure codes
    pub fn departure(&self) -> DepartureCodes {
        self.departure
    }

    /// Parse the departure codes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDepartureCode`] for the first field holding an unknown code.
    pub fn departure_indicators(&self) -> Result<DepartureIndicators, InvalidDepartureCode> {
        DepartureIndicators::try_from(self.departure)
    }

    /// Fee classification
    pub fn fee(&self) -> &FeeClassification {
        &self.fee
    }

    /// Combination code
    pub fn combination(&self) -> CombinationCode {
        self.combination
    }

    /// Whether the record is restricted to the same carrier
    pub fn same_carrier_restriction(&self) -> bool {
        self.same_carrier_restriction
    }

    /// Whether the record only applies to partially flown tickets
    pub fn partially_flown_only(&self) -> bool {
        self.partially_flown_only
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn new_record_is_unrestricted_plain() -> TestResult {
        let record = PenaltyRuleRecord::new(FeeClassification::NoFeeApplies);

        let indicators = record.departure_indicators()?;

        assert_eq!(indicators.journey, RecordApplication::BOTH);
        assert_eq!(indicators.pricing_unit, RecordApplication::BOTH);
        assert_eq!(indicators.fare_component, RecordApplication::BOTH);
        assert_eq!(record.combination(), CombinationCode::Plain);
        assert!(!record.partially_flown_only());

        Ok(())
    }

    #[test]
    fn departure_indicators_reports_first_bad_field() {
        let record = PenaltyRuleRecord::new(FeeClassification::Waived).with_departure(
            DepartureCodes {
                journey: 'B',
                pricing_unit: 'Z',
                fare_component: 'Q',
            },
        );

        let err = record.departure_indicators().err();

        assert_eq!(
            err,
            Some(InvalidDepartureCode {
                code: 'Z',
                field: DepartureField::PricingUnit,
            })
        );
    }

    #[test]
    fn hard_blocks() {
        let fee = Money::from_minor(5_000, USD);

        assert!(FeeClassification::NonChangeable.is_hard_block());
        assert!(FeeClassification::CancelAndStartOver { fee_override: None }.is_hard_block());
        assert!(
            !FeeClassification::CancelAndStartOver {
                fee_override: Some(fee)
            }
            .is_hard_block()
        );
        assert!(!FeeClassification::FixedAmount(fee).is_hard_block());
        assert!(!FeeClassification::FeeNotDetermined.is_hard_block());
    }

    #[test]
    fn builder_sets_fields() {
        let record = PenaltyRuleRecord::new(FeeClassification::FeeNotDetermined)
            .with_vendor("SITA")
            .with_combination(CombinationCode::SumAcrossAll)
            .with_same_carrier_restriction(true)
            .with_partially_flown_only(true);

        assert_eq!(record.vendor(), "SITA");
        assert_eq!(record.combination(), CombinationCode::SumAcrossAll);
        assert!(record.same_carrier_restriction());
        assert!(record.partially_flown_only());
    }
}
