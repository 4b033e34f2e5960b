//! Penalty Validator
//!
//! Checks each candidate fare's maximum penalties against the caller's request
//! and aborts the whole batch once too many fares have failed.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::RecordApplication,
    currency::{format_money, money_to_decimal},
    error::PenaltyError,
    evaluation::{PenaltyEvaluator, PenaltyReport},
    fares::{FarePath, RuleSource},
    filters::{FilterError, FilterVerdict, MaxPenaltyRequest, PenaltyFilter, Query, RequestVerdict},
    observer::PenaltyObserver,
    records::PenaltyKind,
};

/// Lifecycle of one fare's validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// Not evaluated yet
    #[default]
    NotStarted,

    /// Penalties are being evaluated
    Evaluating,

    /// The fare meets the request
    Passed,

    /// The fare does not meet the request
    Failed,
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationState::NotStarted => f.write_str("not started"),
            ValidationState::Evaluating => f.write_str("evaluating"),
            ValidationState::Passed => f.write_str("passed"),
            ValidationState::Failed => f.write_str("failed"),
        }
    }
}

/// Failures observed for one filter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterStats {
    /// The changeability query failed for some fare
    pub query_failed: bool,

    /// The maximum fee was exceeded for some fare
    pub amount_failed: bool,

    /// Lowest penalty among fares that exceeded the maximum fee
    pub min_penalty: Option<Money<'static, Currency>>,
}

impl FilterStats {
    fn record(&mut self, verdict: &FilterVerdict) {
        match verdict {
            FilterVerdict::Passed => {}
            FilterVerdict::QueryFailed => self.query_failed = true,
            FilterVerdict::AmountExceeded { found } => {
                self.amount_failed = true;

                if let Some(found) = found {
                    let lower = self
                        .min_penalty
                        .is_none_or(|min| money_to_decimal(found) < money_to_decimal(&min));

                    if lower {
                        self.min_penalty = Some(*found);
                    }
                }
            }
        }
    }
}

/// Failure statistics of one pricing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FailureStats {
    /// Change filter failures
    pub change: FilterStats,

    /// Refund filter failures
    pub refund: FilterStats,

    /// Number of fares that failed the request
    pub failed_fares: u32,
}

impl FailureStats {
    /// Statistics of one penalty kind's filter.
    pub fn filter(&self, kind: PenaltyKind) -> &FilterStats {
        match kind {
            PenaltyKind::Change => &self.change,
            PenaltyKind::Refund => &self.refund,
        }
    }

    /// Count a failed fare.
    pub fn record_failure(&mut self, verdict: &RequestVerdict) {
        self.change.record(&verdict.change);
        self.refund.record(&verdict.refund);
        self.failed_fares = self.failed_fares.saturating_add(1);
    }

    /// Message explaining why no fare met the request.
    ///
    /// Describes the first failing filter, change before refund.
    pub fn message(&self, request: &MaxPenaltyRequest) -> String {
        [PenaltyKind::Change, PenaltyKind::Refund]
            .into_iter()
            .find_map(|kind| filter_message(kind, request.filter(kind), self.filter(kind)))
            .unwrap_or_else(|| String::from("MAXIMUM PENALTY CRITERIA NOT MET"))
    }
}

fn filter_message(
    kind: PenaltyKind,
    filter: &PenaltyFilter,
    stats: &FilterStats,
) -> Option<String> {
    let departure = match filter.departure {
        scope if scope == RecordApplication::BEFORE => " BEFORE DEPARTURE",
        scope if scope == RecordApplication::AFTER => " AFTER DEPARTURE",
        _ => "",
    };

    if stats.query_failed {
        let fares = match (kind, filter.query) {
            (PenaltyKind::Change, Some(Query::NonChangeable)) => "NON-CHANGEABLE",
            (PenaltyKind::Change, _) => "CHANGEABLE",
            (PenaltyKind::Refund, Some(Query::NonChangeable)) => "NON-REFUNDABLE",
            (PenaltyKind::Refund, _) => "REFUNDABLE",
        };

        return Some(format!("NO {fares} FARES FOUND{departure}"));
    }

    if stats.amount_failed {
        let max_fee = filter.max_fee.map(|fee| format_money(&fee)).unwrap_or_default();
        let mut message = format!("NO FARES WITH {kind} PENALTY LESS THAN {max_fee}{departure}");

        if let Some(min) = stats.min_penalty {
            message.push_str(" - LOWEST FOUND ");
            message.push_str(&format_money(&min));
        }

        return Some(message);
    }

    None
}

/// Failure statistics shared by every validator of one pricing transaction.
#[derive(Debug, Clone, Default)]
pub struct SharedFailureStats(Arc<Mutex<FailureStats>>);

impl SharedFailureStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current statistics.
    pub fn snapshot(&self) -> FailureStats {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failed fare and return the statistics as of that update.
    fn record_failure(&self, verdict: &RequestVerdict) -> FailureStats {
        let mut stats = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        stats.record_failure(verdict);

        *stats
    }
}

/// Errors raised while validating fares.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Too many fares failed; the whole batch is abandoned.
    #[error("{message}")]
    TooManyFailedFares {
        /// Explanation built from the failure statistics
        message: String,

        /// Number of failed fares
        failed_fares: u32,
    },

    /// Penalty evaluation failed.
    #[error(transparent)]
    Penalty(#[from] PenaltyError),

    /// The request is inconsistent.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// One fare's validation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FareValidation {
    state: ValidationState,
    report: Option<PenaltyReport>,
    verdict: Option<RequestVerdict>,
}

impl FareValidation {
    /// Current state
    pub fn state(&self) -> ValidationState {
        self.state
    }

    /// Evaluated penalties, once finished
    pub fn report(&self) -> Option<&PenaltyReport> {
        self.report.as_ref()
    }

    /// Filter verdicts, once finished
    pub fn verdict(&self) -> Option<&RequestVerdict> {
        self.verdict.as_ref()
    }

    fn start(&mut self) {
        if self.state == ValidationState::NotStarted {
            self.state = ValidationState::Evaluating;
        }
    }

    fn finish(&mut self, report: PenaltyReport, verdict: RequestVerdict) {
        if self.state != ValidationState::Evaluating {
            return;
        }

        self.state = if verdict.passed {
            ValidationState::Passed
        } else {
            ValidationState::Failed
        };

        self.report = Some(report);
        self.verdict = Some(verdict);
    }
}

/// Validates candidate fares against a maximum penalty request.
#[derive(Debug, Clone)]
pub struct PenaltyValidator<'c> {
    evaluator: PenaltyEvaluator<'c>,
    request: MaxPenaltyRequest,
    failed_fares_threshold: u32,
    stats: SharedFailureStats,
}

impl<'c> PenaltyValidator<'c> {
    /// Create a validator for a request. The failed fares threshold starts
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] if the request is inconsistent.
    pub fn new(
        evaluator: PenaltyEvaluator<'c>,
        request: MaxPenaltyRequest,
    ) -> Result<Self, FilterError> {
        request.validate()?;

        Ok(Self {
            evaluator,
            request,
            failed_fares_threshold: 0,
            stats: SharedFailureStats::new(),
        })
    }

    /// Abort once `threshold` fares have failed; `0` never aborts.
    #[must_use]
    pub fn with_failed_fares_threshold(mut self, threshold: u32) -> Self {
        self.failed_fares_threshold = threshold;
        self
    }

    /// Share failure statistics with other validators of the transaction.
    #[must_use]
    pub fn with_stats(mut self, stats: SharedFailureStats) -> Self {
        self.stats = stats;
        self
    }

    /// The caller's request
    pub fn request(&self) -> &MaxPenaltyRequest {
        &self.request
    }

    /// Current failure statistics.
    pub fn stats(&self) -> FailureStats {
        self.stats.snapshot()
    }

    fn threshold_reached(&self, stats: &FailureStats) -> bool {
        self.failed_fares_threshold > 0 && stats.failed_fares >= self.failed_fares_threshold
    }

    fn too_many_failed_fares(&self, stats: &FailureStats) -> ValidatorError {
        ValidatorError::TooManyFailedFares {
            message: stats.message(&self.request),
            failed_fares: stats.failed_fares,
        }
    }

    /// Evaluate and check one fare.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError::TooManyFailedFares`] once the threshold is
    /// reached; the fare is then not evaluated. Evaluation errors are
    /// propagated.
    #[tracing::instrument(
        name = "penalty.validate_fare",
        skip(self, source, fare_path, observer),
        fields(mode = %self.request.mode, state = tracing::field::Empty),
        err
    )]
    pub fn validate_fare<S: RuleSource>(
        &self,
        source: &S,
        fare_path: &FarePath,
        observer: &mut dyn PenaltyObserver,
    ) -> Result<FareValidation, ValidatorError> {
        let stats = self.stats.snapshot();

        if self.threshold_reached(&stats) {
            return Err(self.too_many_failed_fares(&stats));
        }

        let mut validation = FareValidation::default();

        validation.start();

        let report = self
            .evaluator
            .evaluate_request(source, fare_path, &self.request, observer)?;

        let verdict = self
            .request
            .check(&report, self.evaluator.converter(), self.evaluator.as_of())?;

        validation.finish(report, verdict);

        tracing::Span::current().record("state", tracing::field::display(validation.state()));

        if validation.state() == ValidationState::Failed {
            let stats = self.stats.record_failure(&verdict);

            if self.threshold_reached(&stats) {
                warn!(
                    failed_fares = stats.failed_fares,
                    threshold = self.failed_fares_threshold,
                    "too many fares failed maximum penalty validation"
                );

                return Err(self.too_many_failed_fares(&stats));
            }
        }

        Ok(validation)
    }

    /// Validate fares in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidatorError`]; later fares are not started.
    pub fn validate_batch<S: RuleSource>(
        &self,
        source: &S,
        fare_paths: &[FarePath],
        observer: &mut dyn PenaltyObserver,
    ) -> Result<Vec<FareValidation>, ValidatorError> {
        let mut validations = Vec::with_capacity(fare_paths.len());

        for fare_path in fare_paths {
            validations.push(self.validate_fare(source, fare_path, observer)?);
        }

        info!(
            fares = validations.len(),
            passed = validations
                .iter()
                .filter(|v| v.state() == ValidationState::Passed)
                .count(),
            "maximum penalty validation finished"
        );

        Ok(validations)
    }
}
