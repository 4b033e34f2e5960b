//! Fee Aggregation
//!
//! Turns one permutation into one outcome for one temporal scope.

use jiff::civil::Date;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    application::RecordApplication,
    currency::{CurrencyConverter, money_to_decimal},
    error::PenaltyError,
    permutations::{Permutation, PermutationCell},
    records::{CombinationCode, FeeClassification},
    resolver::ApplicationResolver,
};

/// Outcome of one permutation for one temporal scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyOutcome {
    /// Fee in the evaluation currency, unrounded.
    Fee(Decimal),

    /// Unconditionally non-changeable or non-refundable.
    Non,

    /// A contributing record could not determine its fee.
    Unknown,

    /// No fare component applies in this scope.
    Unset,
}

/// What a single matching fare component contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contribution {
    Fee(Decimal),
    Non,
    Unknown,
}

/// A matching component's fee with what is needed to combine it.
#[derive(Debug, Clone, Copy)]
struct FeeShare {
    amount: Decimal,
    combination: CombinationCode,
    is_first_in_fare_path: bool,
}

/// Combines the fees of one permutation's fare components.
#[derive(Clone, Copy)]
pub struct FeeAggregator<'c> {
    converter: &'c dyn CurrencyConverter,
    currency: &'static Currency,
    as_of: Date,
}

impl std::fmt::Debug for FeeAggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeeAggregator")
            .field("currency", &self.currency.iso_alpha_code)
            .field("as_of", &self.as_of)
            .finish_non_exhaustive()
    }
}

impl<'c> FeeAggregator<'c> {
    /// Create an aggregator normalising fees into `currency` at `as_of` rates.
    pub fn new(
        converter: &'c dyn CurrencyConverter,
        currency: &'static Currency,
        as_of: Date,
    ) -> Self {
        Self {
            converter,
            currency,
            as_of,
        }
    }

    /// Evaluation currency
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Resolve and aggregate a permutation for one scope.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] if a fee cannot be converted or summed.
    pub fn aggregate(
        &self,
        permutation: &Permutation<'_>,
        scope: RecordApplication,
        resolver: &ApplicationResolver,
    ) -> Result<PenaltyOutcome, PenaltyError> {
        let applications = resolver.resolve_permutation(permutation);

        self.aggregate_resolved(permutation, &applications, scope)
    }

    /// Aggregate a permutation whose cells were already resolved.
    ///
    /// `applications` holds one resolved application per cell, in cell order.
    /// A `Non` from any matching component decides the whole permutation.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] if a fee cannot be converted or summed.
    pub fn aggregate_resolved(
        &self,
        permutation: &Permutation<'_>,
        applications: &[RecordApplication],
        scope: RecordApplication,
    ) -> Result<PenaltyOutcome, PenaltyError> {
        let mut matched = false;
        let mut unknown = false;
        let mut shares: SmallVec<[FeeShare; 8]> = SmallVec::new();

        for (cell, application) in permutation.cells().iter().zip(applications) {
            if !scope.matches(*application) {
                continue;
            }

            matched = true;

            match self.contribution(cell)? {
                Contribution::Non => return Ok(PenaltyOutcome::Non),
                Contribution::Unknown => unknown = true,
                Contribution::Fee(amount) => shares.push(FeeShare {
                    amount,
                    combination: cell.record.combination(),
                    is_first_in_fare_path: cell.position.is_first_in_fare_path(),
                }),
            }
        }

        if !matched {
            return Ok(PenaltyOutcome::Unset);
        }

        if unknown {
            return Ok(PenaltyOutcome::Unknown);
        }

        Ok(PenaltyOutcome::Fee(combine(&shares)?))
    }

    fn contribution(&self, cell: &PermutationCell<'_>) -> Result<Contribution, PenaltyError> {
        if cell.fare_component.is_hard_non() {
            return Ok(Contribution::Non);
        }

        let contribution = match cell.record.fee() {
            FeeClassification::NonChangeable
            | FeeClassification::CancelAndStartOver { fee_override: None } => Contribution::Non,
            FeeClassification::FeeNotDetermined => Contribution::Unknown,
            FeeClassification::NoFeeApplies | FeeClassification::Waived => {
                Contribution::Fee(Decimal::ZERO)
            }
            FeeClassification::FixedAmount(amount)
            | FeeClassification::CancelAndStartOver {
                fee_override: Some(amount),
            } => Contribution::Fee(self.normalize(amount)?),
            FeeClassification::HighestOfComponentAndPercentage { amount, percent } => {
                let fixed = self.normalize(amount)?;
                let fare = self.normalize(&cell.fare_component.fare_amount())?;
                let share = *percent * fare;

                Contribution::Fee(fixed.max(share))
            }
        };

        Ok(contribution)
    }

    fn normalize(&self, money: &Money<'static, Currency>) -> Result<Decimal, PenaltyError> {
        Ok(self.converter.convert(
            money_to_decimal(money),
            money.currency(),
            self.currency,
            self.as_of,
        )?)
    }
}

/// Combine the fees of the matching components of one permutation.
fn combine(shares: &[FeeShare]) -> Result<Decimal, PenaltyError> {
    if shares
        .iter()
        .any(|share| share.combination == CombinationCode::SumAcrossAll)
    {
        return shares.iter().try_fold(Decimal::ZERO, |total, share| {
            total
                .checked_add(share.amount)
                .ok_or(PenaltyError::AmountOverflow)
        });
    }

    if let Some((first, rest)) = shares.split_first() {
        if first.is_first_in_fare_path
            && first.combination == CombinationCode::SumFromFirstComponent
        {
            return first
                .amount
                .checked_add(highest(rest))
                .ok_or(PenaltyError::AmountOverflow);
        }
    }

    Ok(highest(shares))
}

fn highest(shares: &[FeeShare]) -> Decimal {
    shares
        .iter()
        .map(|share| share.amount)
        .max()
        .unwrap_or(Decimal::ZERO)
}
