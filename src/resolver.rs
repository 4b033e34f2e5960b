//! Application Resolver
//!
//! Works out when a chosen record actually applies, given where its fare
//! component sits in the itinerary.

use smallvec::SmallVec;

use crate::{
    application::RecordApplication,
    permutations::{Permutation, PermutationCell},
    records::{DepartureIndicators, PenaltyKind},
};

/// Resolves the effective application of permutation cells.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationResolver {
    kind: PenaltyKind,
}

impl ApplicationResolver {
    /// Create a resolver for a penalty kind.
    pub const fn new(kind: PenaltyKind) -> Self {
        Self { kind }
    }

    /// Penalty kind being resolved
    pub const fn kind(&self) -> PenaltyKind {
        self.kind
    }

    /// Combine a record's departure indicators with its position.
    ///
    /// Fare component and pricing unit departure only narrow the journey
    /// indicator for the first fare component and the first pricing unit
    /// respectively; elsewhere they are widened to `BOTH`.
    pub const fn resolve_indicators(
        indicators: DepartureIndicators,
        is_first_fare_component: bool,
        is_first_pricing_unit: bool,
    ) -> RecordApplication {
        let fare_component = if is_first_fare_component {
            indicators.fare_component.restrict(RecordApplication::BOTH)
        } else {
            indicators.fare_component.combine(RecordApplication::BOTH)
        };

        let pricing_unit = if is_first_pricing_unit {
            indicators.pricing_unit.restrict(RecordApplication::BOTH)
        } else {
            indicators.pricing_unit.combine(RecordApplication::BOTH)
        };

        indicators
            .journey
            .restrict(fare_component.restrict(pricing_unit))
    }

    /// Resolve a single cell.
    ///
    /// `partially_flown` tells whether any fare component of the permutation is
    /// partially flown. Refund records restricted to partially flown tickets
    /// resolve to `INVALID` when none is.
    pub fn resolve(&self, cell: &PermutationCell<'_>, partially_flown: bool) -> RecordApplication {
        if self.kind == PenaltyKind::Refund
            && cell.record.partially_flown_only()
            && !partially_flown
        {
            return RecordApplication::INVALID;
        }

        Self::resolve_indicators(
            cell.indicators,
            cell.position.is_first_in_fare_path(),
            cell.position.is_in_first_pricing_unit(),
        )
    }

    /// Resolve every cell of a permutation, in cell order.
    pub fn resolve_permutation(
        &self,
        permutation: &Permutation<'_>,
    ) -> SmallVec<[RecordApplication; 8]> {
        let partially_flown = permutation.has_partially_flown_component();

        permutation
            .cells()
            .iter()
            .map(|cell| self.resolve(cell, partially_flown))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        fares::{FareComponent, FarePath, PenaltyArena, PricingUnit, TripType},
        observer::NoopObserver,
        options::OptionsIndex,
        permutations::generate,
        records::{DepartureCodes, FeeClassification, PenaltyRuleRecord},
    };

    use super::*;

    const B: RecordApplication = RecordApplication::BEFORE;
    const A: RecordApplication = RecordApplication::AFTER;
    const BOTH: RecordApplication = RecordApplication::BOTH;

    fn indicators(
        journey: RecordApplication,
        pricing_unit: RecordApplication,
        fare_component: RecordApplication,
    ) -> DepartureIndicators {
        DepartureIndicators {
            journey,
            pricing_unit,
            fare_component,
        }
    }

    #[test]
    fn unrestricted_record_applies_both() {
        let resolved =
            ApplicationResolver::resolve_indicators(indicators(BOTH, BOTH, BOTH), true, true);

        assert_eq!(resolved, BOTH);
    }

    #[test]
    fn journey_indicator_always_narrows() {
        for (first_fc, first_pu) in [(true, true), (false, true), (false, false)] {
            assert_eq!(
                ApplicationResolver::resolve_indicators(
                    indicators(B, BOTH, BOTH),
                    first_fc,
                    first_pu
                ),
                B
            );
        }
    }

    #[test]
    fn fare_component_indicator_only_narrows_first_component() {
        let after_fc = indicators(BOTH, BOTH, A);

        assert_eq!(ApplicationResolver::resolve_indicators(after_fc, true, true), A);
        assert_eq!(ApplicationResolver::resolve_indicators(after_fc, false, true), BOTH);
    }

    #[test]
    fn pricing_unit_indicator_only_narrows_first_pricing_unit() {
        let before_pu = indicators(BOTH, B, BOTH);

        assert_eq!(ApplicationResolver::resolve_indicators(before_pu, false, true), B);
        assert_eq!(ApplicationResolver::resolve_indicators(before_pu, false, false), BOTH);
    }

    #[test]
    fn conflicting_indicators_resolve_to_invalid() {
        assert_eq!(
            ApplicationResolver::resolve_indicators(indicators(B, BOTH, A), true, true),
            RecordApplication::INVALID
        );
        assert_eq!(
            ApplicationResolver::resolve_indicators(indicators(B, BOTH, A), false, true),
            B
        );
    }

    #[test]
    fn partially_flown_only_refund_records_need_a_flown_component() -> TestResult {
        let mut arena = PenaltyArena::new();
        let out = arena.insert_fare_component(FareComponent::new("OUT", Money::from_minor(1, USD)));
        let back =
            arena.insert_fare_component(FareComponent::new("BACK", Money::from_minor(1, USD)));
        let flown = arena.insert_fare_component(
            FareComponent::new("FLOWN", Money::from_minor(1, USD)).with_partially_flown(true),
        );

        for fc in [out, back, flown] {
            for kind in [PenaltyKind::Change, PenaltyKind::Refund] {
                arena.attach_record(
                    fc,
                    kind,
                    PenaltyRuleRecord::new(FeeClassification::Waived)
                        .with_departure(DepartureCodes::journey('A'))
                        .with_partially_flown_only(true),
                )?;
            }
        }

        let unflown = FarePath::new(TripType::RoundTrip, [PricingUnit::new([out, back])]);
        let partially = FarePath::new(TripType::RoundTrip, [PricingUnit::new([out, flown])]);

        let refund = ApplicationResolver::new(PenaltyKind::Refund);
        let change = ApplicationResolver::new(PenaltyKind::Change);

        for (path, kind, resolver, expected) in [
            (&unflown, PenaltyKind::Refund, refund, RecordApplication::INVALID),
            (&partially, PenaltyKind::Refund, refund, A),
            (&unflown, PenaltyKind::Change, change, A),
        ] {
            let options = OptionsIndex::build(&arena, path, kind, &mut NoopObserver)?;

            for permutation in generate(&options, path, BOTH)? {
                let resolved = resolver.resolve_permutation(&permutation);

                assert!(
                    resolved.iter().all(|app| *app == expected),
                    "{kind}: expected {expected}, got {resolved:?}"
                );
            }
        }

        Ok(())
    }
}
