//! Maximum Penalty Filters
//!
//! What the caller asks of a fare's penalties: report them only, or require the
//! fare to be (non-)changeable or below a maximum fee.

use std::fmt;

use clap::ValueEnum;
use jiff::civil::Date;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    application::RecordApplication,
    currency::{CurrencyConverter, decimal_to_money, money_to_decimal},
    error::PenaltyError,
    evaluation::PenaltyReport,
    records::PenaltyKind,
    reducer::{MaxPenaltyResult, MaxPenaltyResults},
};

/// How change and refund filters combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PenaltyMode {
    /// Report penalties without filtering fares.
    #[default]
    Info,

    /// At least one filter must pass.
    Or,

    /// Both filters must pass.
    And,
}

impl PenaltyMode {
    /// Combine the verdicts of the change and refund filters.
    pub fn passes(self, change: bool, refund: bool) -> bool {
        match self {
            PenaltyMode::Info => true,
            PenaltyMode::Or => change || refund,
            PenaltyMode::And => change && refund,
        }
    }
}

impl fmt::Display for PenaltyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PenaltyMode::Info => f.write_str("INFO"),
            PenaltyMode::Or => f.write_str("OR"),
            PenaltyMode::And => f.write_str("AND"),
        }
    }
}

/// Changeability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Query {
    /// Fare must be changeable (refundable) with a known fee.
    Changeable,

    /// Fare must be non-changeable (non-refundable).
    NonChangeable,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Changeable => f.write_str("CHANGEABLE"),
            Query::NonChangeable => f.write_str("NONCHANGEABLE"),
        }
    }
}

/// Criteria for one penalty kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyFilter {
    /// Scopes the criteria are checked in
    pub departure: RecordApplication,

    /// Required changeability
    pub query: Option<Query>,

    /// Highest acceptable fee
    pub max_fee: Option<Money<'static, Currency>>,
}

impl Default for PenaltyFilter {
    fn default() -> Self {
        Self {
            departure: RecordApplication::BOTH,
            query: None,
            max_fee: None,
        }
    }
}

impl PenaltyFilter {
    /// Filter with no criteria over the given scopes.
    pub fn new(departure: RecordApplication) -> Self {
        Self {
            departure,
            ..Self::default()
        }
    }

    /// Require a changeability.
    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Require fees not above `max_fee`.
    #[must_use]
    pub fn with_max_fee(mut self, max_fee: Money<'static, Currency>) -> Self {
        self.max_fee = Some(max_fee);
        self
    }

    /// Whether the filter asks anything of a fare.
    pub fn has_criteria(&self) -> bool {
        self.query.is_some() || self.max_fee.is_some()
    }

    /// Check a fare's results against this filter.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] if a fee cannot be converted into the
    /// currency of the maximum fee.
    pub fn check(
        &self,
        results: &MaxPenaltyResults,
        converter: &dyn CurrencyConverter,
        as_of: Date,
    ) -> Result<FilterVerdict, PenaltyError> {
        let checked: Vec<&MaxPenaltyResult> = self
            .departure
            .scopes()
            .filter_map(|scope| results.scope(scope))
            .collect();

        match self.query {
            Some(Query::Changeable) => {
                let passed = !checked.iter().any(|result| result.is_non())
                    && checked.iter().any(|result| result.fee().is_some());

                if !passed {
                    return Ok(FilterVerdict::QueryFailed);
                }
            }
            Some(Query::NonChangeable) => {
                if checked.is_empty() || !checked.iter().all(|result| result.is_non()) {
                    return Ok(FilterVerdict::QueryFailed);
                }
            }
            None => {}
        }

        let Some(max_fee) = self.max_fee else {
            return Ok(FilterVerdict::Passed);
        };

        let limit = money_to_decimal(&max_fee);
        let mut highest = None;
        let mut within = !checked.is_empty();

        for result in checked {
            let Some(fee) = result.fee() else {
                within = false;
                continue;
            };

            let converted = converter.convert(
                money_to_decimal(fee),
                fee.currency(),
                max_fee.currency(),
                as_of,
            )?;

            if converted > limit {
                within = false;
            }

            highest = Some(highest.map_or(converted, |current: Decimal| current.max(converted)));
        }

        if within {
            return Ok(FilterVerdict::Passed);
        }

        let found = highest
            .map(|amount| {
                decimal_to_money(amount, max_fee.currency()).ok_or(PenaltyError::AmountOverflow)
            })
            .transpose()?;

        Ok(FilterVerdict::AmountExceeded { found })
    }
}

/// Outcome of checking one filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterVerdict {
    /// The fare meets the criteria.
    Passed,

    /// The changeability query failed.
    QueryFailed,

    /// A checked scope had no fee or a fee above the maximum.
    AmountExceeded {
        /// Highest fee of the checked scopes, in the maximum fee's currency
        found: Option<Money<'static, Currency>>,
    },
}

impl FilterVerdict {
    /// Whether the filter passed.
    pub fn passed(&self) -> bool {
        matches!(self, FilterVerdict::Passed)
    }
}

/// Verdicts of both filters of a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestVerdict {
    /// Change filter verdict
    pub change: FilterVerdict,

    /// Refund filter verdict
    pub refund: FilterVerdict,

    /// Whether the fare passes under the request mode
    pub passed: bool,
}

impl RequestVerdict {
    /// Verdict of one penalty kind.
    pub fn verdict(&self, kind: PenaltyKind) -> &FilterVerdict {
        match kind {
            PenaltyKind::Change => &self.change,
            PenaltyKind::Refund => &self.refund,
        }
    }
}

/// Invalid maximum penalty requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Info mode carries filter criteria.
    #[error("NO ADDITIONAL ATTRIBUTES SHOULD BE SPECIFIED IN MAXIMUM PENALTY INFO MODE")]
    AttributesInInfoMode,

    /// A filtering mode without any criteria.
    #[error("ADDITIONAL ATTRIBUTES SHOULD BE SPECIFIED FOR MAXIMUM PENALTY")]
    MissingAttributes,

    /// Or mode with differing change and refund criteria.
    #[error("MAX CHANGE AND MAX REFUND ATTRIBUTES SHOULD BE IDENTICAL IN MAXIMUM PENALTY OR MODE")]
    OrModeMismatch,

    /// Change filter with both a query and a maximum fee.
    #[error("MAX CHANGE AMOUNT SHOULD NOT BE SPECIFIED IN ANY/NONCHANGEABLE MODE")]
    ChangeQueryWithAmount,

    /// Refund filter with both a query and a maximum fee.
    #[error("MAX REFUND AMOUNT SHOULD NOT BE SPECIFIED IN ANY/NONCHANGEABLE MODE")]
    RefundQueryWithAmount,
}

/// A caller's maximum penalty request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaxPenaltyRequest {
    /// How the filters combine
    pub mode: PenaltyMode,

    /// Change criteria
    pub change: PenaltyFilter,

    /// Refund criteria
    pub refund: PenaltyFilter,
}

impl MaxPenaltyRequest {
    /// Report penalties only.
    pub fn info() -> Self {
        Self::default()
    }

    /// Request with the given mode and filters.
    pub fn new(mode: PenaltyMode, change: PenaltyFilter, refund: PenaltyFilter) -> Self {
        Self {
            mode,
            change,
            refund,
        }
    }

    /// Filter of one penalty kind.
    pub fn filter(&self, kind: PenaltyKind) -> &PenaltyFilter {
        match kind {
            PenaltyKind::Change => &self.change,
            PenaltyKind::Refund => &self.refund,
        }
    }

    /// Reject inconsistent requests.
    ///
    /// # Errors
    ///
    /// Returns the first [`FilterError`] the request violates.
    pub fn validate(&self) -> Result<(), FilterError> {
        let (change, refund) = (&self.change, &self.refund);

        if self.mode == PenaltyMode::Info {
            let unrestricted = change.departure == RecordApplication::BOTH
                && refund.departure == RecordApplication::BOTH;

            if !unrestricted || change.has_criteria() || refund.has_criteria() {
                return Err(FilterError::AttributesInInfoMode);
            }

            return Ok(());
        }

        if !change.has_criteria() && !refund.has_criteria() {
            return Err(FilterError::MissingAttributes);
        }

        if self.mode == PenaltyMode::Or
            && (change.query != refund.query || change.max_fee != refund.max_fee)
        {
            return Err(FilterError::OrModeMismatch);
        }

        if change.query.is_some() && change.max_fee.is_some() {
            return Err(FilterError::ChangeQueryWithAmount);
        }

        if refund.query.is_some() && refund.max_fee.is_some() {
            return Err(FilterError::RefundQueryWithAmount);
        }

        Ok(())
    }

    /// Check a fare's penalty report against the request.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] if a fee cannot be converted.
    pub fn check(
        &self,
        report: &PenaltyReport,
        converter: &dyn CurrencyConverter,
        as_of: Date,
    ) -> Result<RequestVerdict, PenaltyError> {
        if self.mode == PenaltyMode::Info {
            return Ok(RequestVerdict {
                change: FilterVerdict::Passed,
                refund: FilterVerdict::Passed,
                passed: true,
            });
        }

        let change = self.change.check(&report.change, converter, as_of)?;
        let refund = self.refund.check(&report.refund, converter, as_of)?;

        Ok(RequestVerdict {
            change,
            refund,
            passed: self.mode.passes(change.passed(), refund.passed()),
        })
    }
}
