//! Maximum Penalty Reducer
//!
//! Folds the outcomes of every permutation into the worst case for one
//! temporal scope.

use std::fmt;

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};

use crate::{
    aggregate::PenaltyOutcome,
    application::RecordApplication,
    currency::{decimal_to_money, format_money},
    error::PenaltyError,
};

/// Maximum penalty for one temporal scope.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MaxPenaltyResult {
    /// Highest fee over all permutations, rounded to the currency.
    Fee(Money<'static, Currency>),

    /// Every applicable permutation is non-changeable or non-refundable.
    Non,

    /// No permutation applies, or only undetermined fees were found.
    #[default]
    Unset,
}

impl MaxPenaltyResult {
    /// The fee, if one is known.
    pub fn fee(&self) -> Option<&Money<'static, Currency>> {
        match self {
            MaxPenaltyResult::Fee(fee) => Some(fee),
            MaxPenaltyResult::Non | MaxPenaltyResult::Unset => None,
        }
    }

    /// Whether the scope is unconditionally non-changeable or non-refundable.
    pub fn is_non(&self) -> bool {
        matches!(self, MaxPenaltyResult::Non)
    }

    /// Whether nothing is known for the scope.
    pub fn is_unset(&self) -> bool {
        matches!(self, MaxPenaltyResult::Unset)
    }
}

impl fmt::Display for MaxPenaltyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxPenaltyResult::Fee(fee) => f.write_str(&format_money(fee)),
            MaxPenaltyResult::Non => f.write_str("NON"),
            MaxPenaltyResult::Unset => f.write_str("UNSET"),
        }
    }
}

/// Maximum penalties before and after travel commences.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaxPenaltyResults {
    /// Before departure
    pub before: MaxPenaltyResult,

    /// After departure
    pub after: MaxPenaltyResult,
}

impl MaxPenaltyResults {
    /// Both scopes unset.
    pub const UNSET: Self = Self {
        before: MaxPenaltyResult::Unset,
        after: MaxPenaltyResult::Unset,
    };

    /// Result of a single-bit scope. `BOTH` and `INVALID` have no single result.
    pub fn scope(&self, scope: RecordApplication) -> Option<&MaxPenaltyResult> {
        if scope == RecordApplication::BEFORE {
            Some(&self.before)
        } else if scope == RecordApplication::AFTER {
            Some(&self.after)
        } else {
            None
        }
    }

    /// Mutable result of a single-bit scope.
    pub fn scope_mut(&mut self, scope: RecordApplication) -> Option<&mut MaxPenaltyResult> {
        if scope == RecordApplication::BEFORE {
            Some(&mut self.before)
        } else if scope == RecordApplication::AFTER {
            Some(&mut self.after)
        } else {
            None
        }
    }
}

impl fmt::Display for MaxPenaltyResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "before {} / after {}", self.before, self.after)
    }
}

/// Streaming worst-case fold over permutation outcomes.
///
/// A single fee anywhere beats `Non`: non-changeability only absorbs inside one
/// permutation, never across permutations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumPenaltyReducer {
    highest_fee: Option<Decimal>,
    non: usize,
    unknown: usize,
}

impl MaximumPenaltyReducer {
    /// Create an empty reducer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one permutation's outcome.
    pub fn push(&mut self, outcome: PenaltyOutcome) {
        match outcome {
            PenaltyOutcome::Fee(amount) => {
                self.highest_fee = Some(self.highest_fee.map_or(amount, |fee| fee.max(amount)));
            }
            PenaltyOutcome::Non => self.non += 1,
            PenaltyOutcome::Unknown => self.unknown += 1,
            PenaltyOutcome::Unset => {}
        }
    }

    /// Produce the result, rounding the highest fee to `currency` once.
    ///
    /// # Errors
    ///
    /// Returns [`PenaltyError::AmountOverflow`] if the fee does not fit the
    /// currency's minor units.
    pub fn finish(self, currency: &'static Currency) -> Result<MaxPenaltyResult, PenaltyError> {
        if let Some(amount) = self.highest_fee {
            return decimal_to_money(amount, currency)
                .map(MaxPenaltyResult::Fee)
                .ok_or(PenaltyError::AmountOverflow);
        }

        if self.non > 0 && self.unknown == 0 {
            return Ok(MaxPenaltyResult::Non);
        }

        Ok(MaxPenaltyResult::Unset)
    }

    /// Reduce a sequence of outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`PenaltyError::AmountOverflow`] if the fee does not fit the
    /// currency's minor units.
    pub fn reduce(
        outcomes: impl IntoIterator<Item = PenaltyOutcome>,
        currency: &'static Currency,
    ) -> Result<MaxPenaltyResult, PenaltyError> {
        let mut reducer = Self::new();

        for outcome in outcomes {
            reducer.push(outcome);
        }

        reducer.finish(currency)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::iso::{JPY, USD};
    use testresult::TestResult;

    use super::*;

    use PenaltyOutcome::{Fee, Non, Unknown, Unset};

    #[test]
    fn all_non_reduces_to_non() -> TestResult {
        assert_eq!(MaximumPenaltyReducer::reduce([Non, Non, Unset], USD)?, MaxPenaltyResult::Non);

        Ok(())
    }

    #[test]
    fn a_single_fee_defeats_non() -> TestResult {
        let result = MaximumPenaltyReducer::reduce([Non, Fee(dec!(75)), Non], USD)?;

        assert_eq!(result, MaxPenaltyResult::Fee(Money::from_minor(7_500, USD)));

        Ok(())
    }

    #[test]
    fn worst_case_fee_wins() -> TestResult {
        let outcomes = [Fee(dec!(80)), Unknown, Fee(dec!(150)), Fee(dec!(0))];
        let result = MaximumPenaltyReducer::reduce(outcomes, USD)?;

        assert_eq!(result, MaxPenaltyResult::Fee(Money::from_minor(15_000, USD)));

        Ok(())
    }

    #[test]
    fn unknown_and_unset_only_is_unset() -> TestResult {
        assert_eq!(MaximumPenaltyReducer::reduce([Unknown, Unset], USD)?, MaxPenaltyResult::Unset);
        assert_eq!(MaximumPenaltyReducer::reduce([Non, Unknown], USD)?, MaxPenaltyResult::Unset);
        assert_eq!(
            MaximumPenaltyReducer::reduce(std::iter::empty(), USD)?,
            MaxPenaltyResult::Unset
        );

        Ok(())
    }

    #[test]
    fn rounding_happens_once_at_finish() -> TestResult {
        let result = MaximumPenaltyReducer::reduce([Fee(dec!(10.004)), Fee(dec!(10.005))], USD)?;

        assert_eq!(result, MaxPenaltyResult::Fee(Money::from_minor(1_001, USD)));

        let yen = MaximumPenaltyReducer::reduce([Fee(dec!(1234.5))], JPY)?;

        assert_eq!(yen, MaxPenaltyResult::Fee(Money::from_minor(1_235, JPY)));

        Ok(())
    }

    #[test]
    fn results_by_scope() {
        let results = MaxPenaltyResults {
            before: MaxPenaltyResult::Non,
            after: MaxPenaltyResult::Unset,
        };

        assert_eq!(results.scope(RecordApplication::BEFORE), Some(&MaxPenaltyResult::Non));
        assert_eq!(results.scope(RecordApplication::AFTER), Some(&MaxPenaltyResult::Unset));
        assert_eq!(results.scope(RecordApplication::BOTH), None);
        assert_eq!(results.to_string(), "before NON / after UNSET");
    }
}
