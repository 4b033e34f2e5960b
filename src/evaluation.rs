//! Penalty Evaluation
//!
//! Drives options, permutations, resolution, aggregation and reduction for one
//! fare path.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use jiff::civil::Date;
use rusty_money::iso::Currency;
use tracing::{debug, info};

use crate::{
    aggregate::FeeAggregator,
    application::RecordApplication,
    currency::CurrencyConverter,
    error::PenaltyError,
    fares::{FarePath, RuleSource},
    filters::{MaxPenaltyRequest, PenaltyMode},
    observer::{NoopObserver, PenaltyObserver},
    options::OptionsIndex,
    permutations::generate,
    records::PenaltyKind,
    reducer::{MaxPenaltyResults, MaximumPenaltyReducer},
    resolver::ApplicationResolver,
};

/// Cooperative cancellation shared with the surrounding transaction.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Change and refund maxima of one fare path.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PenaltyReport {
    /// Change penalties
    pub change: MaxPenaltyResults,

    /// Refund penalties
    pub refund: MaxPenaltyResults,
}

impl PenaltyReport {
    /// Results of one penalty kind.
    pub fn results(&self, kind: PenaltyKind) -> &MaxPenaltyResults {
        match kind {
            PenaltyKind::Change => &self.change,
            PenaltyKind::Refund => &self.refund,
        }
    }
}

/// Evaluates maximum penalties in one currency.
#[derive(Clone)]
pub struct PenaltyEvaluator<'c> {
    converter: &'c dyn CurrencyConverter,
    currency: &'static Currency,
    as_of: Date,
    cancellation: Option<CancellationFlag>,
}

impl std::fmt::Debug for PenaltyEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenaltyEvaluator")
            .field("currency", &self.currency.iso_alpha_code)
            .field("as_of", &self.as_of)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl<'c> PenaltyEvaluator<'c> {
    /// Create an evaluator reporting in `currency` at rates effective on `as_of`.
    pub fn new(
        converter: &'c dyn CurrencyConverter,
        currency: &'static Currency,
        as_of: Date,
    ) -> Self {
        Self {
            converter,
            currency,
            as_of,
            cancellation: None,
        }
    }

    /// Check `flag` between permutations.
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    /// Evaluation currency
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Converter used for fees
    pub fn converter(&self) -> &'c dyn CurrencyConverter {
        self.converter
    }

    /// Date exchange rates are taken at
    pub fn as_of(&self) -> Date {
        self.as_of
    }

    /// Evaluate one penalty kind of a fare path.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] if a component has no records, a fee cannot
    /// be converted or the evaluation is cancelled.
    pub fn evaluate<S: RuleSource>(
        &self,
        source: &S,
        fare_path: &FarePath,
        kind: PenaltyKind,
        requested: RecordApplication,
    ) -> Result<MaxPenaltyResults, PenaltyError> {
        self.evaluate_with_observer(source, fare_path, kind, requested, &mut NoopObserver)
    }

    /// Evaluate one penalty kind of a fare path, reporting to `observer`.
    ///
    /// Every requested scope is reduced separately; scopes that were not
    /// requested stay `Unset`.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] if a component has no records, a fee cannot
    /// be converted or the evaluation is cancelled.
    #[tracing::instrument(
        name = "penalty.evaluate",
        skip(self, source, fare_path, observer),
        fields(
            %kind,
            %requested,
            currency = self.currency.iso_alpha_code,
            components = fare_path.component_count(),
            permutations = tracing::field::Empty
        ),
        err
    )]
    pub fn evaluate_with_observer<S: RuleSource>(
        &self,
        source: &S,
        fare_path: &FarePath,
        kind: PenaltyKind,
        requested: RecordApplication,
        observer: &mut dyn PenaltyObserver,
    ) -> Result<MaxPenaltyResults, PenaltyError> {
        let options = OptionsIndex::build(source, fare_path, kind, observer)?;
        let permutations = generate(&options, fare_path, requested)?;

        tracing::Span::current().record("permutations", permutations.total());

        let resolver = ApplicationResolver::new(kind);
        let aggregator = FeeAggregator::new(self.converter, self.currency, self.as_of);

        let mut before = MaximumPenaltyReducer::new();
        let mut after = MaximumPenaltyReducer::new();

        for permutation in permutations {
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationFlag::is_cancelled)
            {
                info!(number = permutation.number(), "penalty evaluation cancelled");
                return Err(PenaltyError::Cancelled);
            }

            observer.on_permutation(&permutation);

            let applications = resolver.resolve_permutation(&permutation);

            for scope in requested.scopes() {
                let outcome = aggregator.aggregate_resolved(&permutation, &applications, scope)?;

                debug!(number = permutation.number(), %scope, ?outcome, "permutation aggregated");

                observer.on_outcome(permutation.number(), scope, outcome);

                if scope == RecordApplication::BEFORE {
                    before.push(outcome);
                } else {
                    after.push(outcome);
                }
            }
        }

        let results = MaxPenaltyResults {
            before: before.finish(self.currency)?,
            after: after.finish(self.currency)?,
        };

        info!(%results, "maximum penalty evaluated");

        observer.on_result(kind, &results);

        Ok(results)
    }

    /// Evaluate change and refund penalties for a caller request.
    ///
    /// Info mode always evaluates both scopes; otherwise each kind evaluates the
    /// departure of its filter.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError`] from either evaluation.
    pub fn evaluate_request<S: RuleSource>(
        &self,
        source: &S,
        fare_path: &FarePath,
        request: &MaxPenaltyRequest,
        observer: &mut dyn PenaltyObserver,
    ) -> Result<PenaltyReport, PenaltyError> {
        let departure = |kind: PenaltyKind| match request.mode {
            PenaltyMode::Info => RecordApplication::BOTH,
            PenaltyMode::Or | PenaltyMode::And => request.filter(kind).departure,
        };

        Ok(PenaltyReport {
            change: self.evaluate_with_observer(
                source,
                fare_path,
                PenaltyKind::Change,
                departure(PenaltyKind::Change),
                observer,
            )?,
            refund: self.evaluate_with_observer(
                source,
                fare_path,
                PenaltyKind::Refund,
                departure(PenaltyKind::Refund),
                observer,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rusty_money::{
        Money,
        iso::{EUR, USD},
    };
    use testresult::TestResult;

    use crate::{
        aggregate::PenaltyOutcome,
        currency::RateTable,
        fares::{FareComponent, PenaltyArena, PricingUnit, TripType},
        permutations::Permutation,
        records::{DepartureCodes, FeeClassification, PenaltyRuleRecord},
        reducer::MaxPenaltyResult,
    };

    use super::*;

    fn usd(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, USD)
    }

    fn fixed(minor: i64, departure: char) -> PenaltyRuleRecord {
        PenaltyRuleRecord::new(FeeClassification::FixedAmount(usd(minor)))
            .with_departure(DepartureCodes::journey(departure))
    }

    fn scenario_a() -> Result<(PenaltyArena, FarePath), PenaltyError> {
        let mut arena = PenaltyArena::new();
        let fc = arena.insert_fare_component(FareComponent::new("Y26", usd(100_000)));

        arena.attach_record(fc, PenaltyKind::Change, fixed(10_000, 'B'))?;
        arena.attach_record(fc, PenaltyKind::Change, fixed(20_000, 'A'))?;

        Ok((arena, FarePath::new(TripType::OneWay, [PricingUnit::new([fc])])))
    }

    #[derive(Default)]
    struct Recorder {
        permutations: Vec<u64>,
        outcomes: Vec<(u64, RecordApplication, PenaltyOutcome)>,
        results: Vec<(PenaltyKind, MaxPenaltyResults)>,
    }

    impl PenaltyObserver for Recorder {
        fn on_permutation(&mut self, permutation: &Permutation<'_>) {
            self.permutations.push(permutation.number());
        }

        fn on_outcome(&mut self, number: u64, scope: RecordApplication, outcome: PenaltyOutcome) {
            self.outcomes.push((number, scope, outcome));
        }

        fn on_result(&mut self, kind: PenaltyKind, results: &MaxPenaltyResults) {
            self.results.push((kind, *results));
        }
    }

    #[test]
    fn before_and_after_are_reduced_separately() -> TestResult {
        let (arena, path) = scenario_a()?;
        let rates = RateTable::new();
        let evaluator = PenaltyEvaluator::new(&rates, USD, date(2026, 5, 1));

        let results =
            evaluator.evaluate(&arena, &path, PenaltyKind::Change, RecordApplication::BOTH)?;

        assert_eq!(results.before, MaxPenaltyResult::Fee(usd(10_000)));
        assert_eq!(results.after, MaxPenaltyResult::Fee(usd(20_000)));

        Ok(())
    }

    #[test]
    fn unrequested_scope_stays_unset() -> TestResult {
        let (arena, path) = scenario_a()?;
        let rates = RateTable::new();
        let evaluator = PenaltyEvaluator::new(&rates, USD, date(2026, 5, 1));

        let results =
            evaluator.evaluate(&arena, &path, PenaltyKind::Change, RecordApplication::BEFORE)?;

        assert_eq!(results.before, MaxPenaltyResult::Fee(usd(10_000)));
        assert_eq!(results.after, MaxPenaltyResult::Unset);

        let pruned =
            evaluator.evaluate(&arena, &path, PenaltyKind::Change, RecordApplication::AFTER)?;

        assert_eq!(pruned, MaxPenaltyResults::UNSET);

        Ok(())
    }

    #[test]
    fn observer_sees_every_permutation_and_outcome() -> TestResult {
        let (arena, path) = scenario_a()?;
        let rates = RateTable::new();
        let evaluator = PenaltyEvaluator::new(&rates, USD, date(2026, 5, 1));
        let mut recorder = Recorder::default();

        let results = evaluator.evaluate_with_observer(
            &arena,
            &path,
            PenaltyKind::Change,
            RecordApplication::BOTH,
            &mut recorder,
        )?;

        assert_eq!(recorder.permutations, vec![1, 2]);
        assert_eq!(
            recorder.outcomes,
            vec![
                (1, RecordApplication::BEFORE, PenaltyOutcome::Fee(rust_decimal::dec!(100))),
                (1, RecordApplication::AFTER, PenaltyOutcome::Unset),
                (2, RecordApplication::BEFORE, PenaltyOutcome::Unset),
                (2, RecordApplication::AFTER, PenaltyOutcome::Fee(rust_decimal::dec!(200))),
            ]
        );
        assert_eq!(recorder.results, vec![(PenaltyKind::Change, results)]);

        Ok(())
    }

    #[test]
    fn cancelled_evaluation_stops_between_permutations() -> TestResult {
        let (arena, path) = scenario_a()?;
        let rates = RateTable::new();
        let flag = CancellationFlag::new();
        let evaluator =
            PenaltyEvaluator::new(&rates, USD, date(2026, 5, 1)).with_cancellation(flag.clone());

        flag.cancel();

        let result =
            evaluator.evaluate(&arena, &path, PenaltyKind::Change, RecordApplication::BOTH);

        assert!(matches!(result, Err(PenaltyError::Cancelled)));

        Ok(())
    }

    #[test]
    fn results_are_in_the_evaluation_currency() -> TestResult {
        let (arena, path) = scenario_a()?;
        let rates = RateTable::new().with_rate(USD, EUR, rust_decimal::dec!(0.9));
        let evaluator = PenaltyEvaluator::new(&rates, EUR, date(2026, 5, 1));

        let results =
            evaluator.evaluate(&arena, &path, PenaltyKind::Change, RecordApplication::BOTH)?;

        assert_eq!(results.before, MaxPenaltyResult::Fee(Money::from_minor(9_000, EUR)));
        assert_eq!(results.after, MaxPenaltyResult::Fee(Money::from_minor(18_000, EUR)));

        Ok(())
    }

    #[test]
    fn refund_records_are_evaluated_independently() -> TestResult {
        let (mut arena, path) = scenario_a()?;
        let fc = path
            .components()
            .next()
            .map(|(key, _)| key)
            .ok_or("no component")?;

        arena.attach_record(
            fc,
            PenaltyKind::Refund,
            PenaltyRuleRecord::new(FeeClassification::NonChangeable),
        )?;

        let rates = RateTable::new();
        let evaluator = PenaltyEvaluator::new(&rates, USD, date(2026, 5, 1));
        let report = evaluator.evaluate_request(
            &arena,
            &path,
            &MaxPenaltyRequest::info(),
            &mut NoopObserver,
        )?;

        assert_eq!(report.change.after, MaxPenaltyResult::Fee(usd(20_000)));
        assert_eq!(report.refund.before, MaxPenaltyResult::Non);
        assert_eq!(report.results(PenaltyKind::Refund).after, MaxPenaltyResult::Non);

        Ok(())
    }
}
