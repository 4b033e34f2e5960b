//! Fares
//!
//! Read-only views of the priced itinerary: fare components grouped into
//! pricing units, grouped into a fare path. Components and rule records live in
//! a [`PenaltyArena`] owned by the caller; everything else borrows from it.

use rusty_money::{Money, iso::Currency};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use thiserror::Error;

use crate::records::{PenaltyKind, PenaltyRuleRecord, RecordKey};

new_key_type! {
    /// Fare Component Key
    pub struct FareComponentKey;
}

/// Errors looking up fares or records in the arena.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FareError {
    /// The fare component key is not present in the arena.
    #[error("fare component {0:?} not found")]
    ComponentNotFound(FareComponentKey),

    /// The rule record key is not present in the arena.
    #[error("penalty rule record {0:?} not found")]
    RecordNotFound(RecordKey),
}

/// Shape of the journey priced by a fare path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripType {
    /// Single direction, no return
    #[default]
    OneWay,

    /// Out and back
    RoundTrip,

    /// Returns to origin through more than one turnaround
    CircleTrip,

    /// Return with a surface gap
    OpenJaw,
}

/// One priced fare within a pricing unit.
#[derive(Debug, Clone)]
pub struct FareComponent {
    fare_basis: String,
    fare_amount: Money<'static, Currency>,
    hard_non: bool,
    partially_flown: bool,
    change_records: SmallVec<[RecordKey; 4]>,
    refund_records: SmallVec<[RecordKey; 4]>,
}

impl FareComponent {
    /// Create a fare component with no candidate records.
    pub fn new(fare_basis: impl Into<String>, fare_amount: Money<'static, Currency>) -> Self {
        Self {
            fare_basis: fare_basis.into(),
            fare_amount,
            hard_non: false,
            partially_flown: false,
            change_records: SmallVec::new(),
            refund_records: SmallVec::new(),
        }
    }

    /// Force every applicable penalty on this component to non-changeable.
    #[must_use]
    pub fn with_hard_non(mut self, hard_non: bool) -> Self {
        self.hard_non = hard_non;
        self
    }

    /// Flag the component as partially flown.
    #[must_use]
    pub fn with_partially_flown(mut self, partially_flown: bool) -> Self {
        self.partially_flown = partially_flown;
        self
    }

    /// Fare basis code
    pub fn fare_basis(&self) -> &str {
        &self.fare_basis
    }

    /// Fare amount of the component
    pub fn fare_amount(&self) -> Money<'static, Currency> {
        self.fare_amount
    }

    /// Whether an upstream rule already forces non-changeable
    pub fn is_hard_non(&self) -> bool {
        self.hard_non
    }

    /// Whether the component is partially flown
    pub fn is_partially_flown(&self) -> bool {
        self.partially_flown
    }

    /// Candidate record keys for a penalty kind, in rule source order.
    pub fn records(&self, kind: PenaltyKind) -> &[RecordKey] {
        match kind {
            PenaltyKind::Change => &self.change_records,
            PenaltyKind::Refund => &self.refund_records,
        }
    }

    fn records_mut(&mut self, kind: PenaltyKind) -> &mut SmallVec<[RecordKey; 4]> {
        match kind {
            PenaltyKind::Change => &mut self.change_records,
            PenaltyKind::Refund => &mut self.refund_records,
        }
    }
}

/// Fare components priced together.
#[derive(Debug, Clone, Default)]
pub struct PricingUnit {
    fare_components: SmallVec<[FareComponentKey; 4]>,
}

impl PricingUnit {
    /// Create a pricing unit from its fare components, in travel order.
    pub fn new(fare_components: impl IntoIterator<Item = FareComponentKey>) -> Self {
        Self {
            fare_components: fare_components.into_iter().collect(),
        }
    }

    /// Fare components in travel order
    pub fn fare_components(&self) -> &[FareComponentKey] {
        &self.fare_components
    }
}

/// Where a fare component sits in its fare path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FareComponentPosition {
    /// Zero-based index across the whole fare path
    pub index: usize,

    /// Zero-based index of the owning pricing unit
    pub pricing_unit: usize,

    /// Zero-based index within the owning pricing unit
    pub sequence_in_pricing_unit: usize,
}

impl FareComponentPosition {
    /// First fare component of the fare path
    pub const fn is_first_in_fare_path(&self) -> bool {
        self.index == 0
    }

    /// Owned by the first pricing unit of the fare path
    pub const fn is_in_first_pricing_unit(&self) -> bool {
        self.pricing_unit == 0
    }

    /// First fare component of its pricing unit
    pub const fn is_first_in_pricing_unit(&self) -> bool {
        self.sequence_in_pricing_unit == 0
    }
}

/// A priced itinerary: pricing units in travel order.
#[derive(Debug, Clone, Default)]
pub struct FarePath {
    trip_type: TripType,
    pricing_units: SmallVec<[PricingUnit; 4]>,
}

impl FarePath {
    /// Create a fare path.
    pub fn new(trip_type: TripType, pricing_units: impl IntoIterator<Item = PricingUnit>) -> Self {
        Self {
            trip_type,
            pricing_units: pricing_units.into_iter().collect(),
        }
    }

    /// Trip type
    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }

    /// Pricing units in travel order
    pub fn pricing_units(&self) -> &[PricingUnit] {
        &self.pricing_units
    }

    /// Fare components in itinerary order with their positions.
    pub fn components(
        &self,
    ) -> impl Iterator<Item = (FareComponentKey, FareComponentPosition)> + '_ {
        self.pricing_units
            .iter()
            .enumerate()
            .flat_map(|(pricing_unit, pu)| {
                pu.fare_components()
                    .iter()
                    .enumerate()
                    .map(move |(sequence, key)| (pricing_unit, sequence, *key))
            })
            .enumerate()
            .map(|(index, (pricing_unit, sequence_in_pricing_unit, key))| {
                (
                    key,
                    FareComponentPosition {
                        index,
                        pricing_unit,
                        sequence_in_pricing_unit,
                    },
                )
            })
    }

    /// Total number of fare components.
    pub fn component_count(&self) -> usize {
        self.pricing_units
            .iter()
            .map(|pu| pu.fare_components().len())
            .sum()
    }

    /// A one-way made of a single fare component: nothing can be left to travel
    /// once it has departed.
    pub fn is_single_direction_one_way(&self) -> bool {
        self.trip_type == TripType::OneWay && self.component_count() == 1
    }
}

/// Source of ordered candidate records per fare component.
pub trait RuleSource {
    /// Look up a fare component.
    ///
    /// # Errors
    ///
    /// Returns [`FareError::ComponentNotFound`] for unknown keys.
    fn fare_component(&self, key: FareComponentKey) -> Result<&FareComponent, FareError>;

    /// Look up a rule record.
    ///
    /// # Errors
    ///
    /// Returns [`FareError::RecordNotFound`] for unknown keys.
    fn record(&self, key: RecordKey) -> Result<&PenaltyRuleRecord, FareError>;

    /// Candidate record keys of a fare component, in rule source order.
    ///
    /// # Errors
    ///
    /// Returns [`FareError::ComponentNotFound`] for unknown keys.
    fn candidates(
        &self,
        key: FareComponentKey,
        kind: PenaltyKind,
    ) -> Result<&[RecordKey], FareError> {
        Ok(self.fare_component(key)?.records(kind))
    }
}

/// Arena owning fare components and rule records for one pricing transaction.
#[derive(Debug, Default)]
pub struct PenaltyArena {
    fare_components: SlotMap<FareComponentKey, FareComponent>,
    records: SlotMap<RecordKey, PenaltyRuleRecord>,
}

impl PenaltyArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fare component.
    pub fn insert_fare_component(&mut self, fare_component: FareComponent) -> FareComponentKey {
        self.fare_components.insert(fare_component)
    }

    /// Add a record and append it to a fare component's candidates.
    ///
    /// # Errors
    ///
    /// Returns [`FareError::ComponentNotFound`] if the fare component is unknown.
    pub fn attach_record(
        &mut self,
        fare_component: FareComponentKey,
        kind: PenaltyKind,
        record: PenaltyRuleRecord,
    ) -> Result<RecordKey, FareError> {
        let component = self
            .fare_components
            .get_mut(fare_component)
            .ok_or(FareError::ComponentNotFound(fare_component))?;

        let key = self.records.insert(record);

        component.records_mut(kind).push(key);

        Ok(key)
    }

    /// Number of fare components
    pub fn fare_component_count(&self) -> usize {
        self.fare_components.len()
    }

    /// Number of records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl RuleSource for PenaltyArena {
    fn fare_component(&self, key: FareComponentKey) -> Result<&FareComponent, FareError> {
        self.fare_components
            .get(key)
            .ok_or(FareError::ComponentNotFound(key))
    }

    fn record(&self, key: RecordKey) -> Result<&PenaltyRuleRecord, FareError> {
        self.records.get(key).ok_or(FareError::RecordNotFound(key))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::records::FeeClassification;

    use super::*;

    fn component(basis: &str) -> FareComponent {
        FareComponent::new(basis, Money::from_minor(10_000, USD))
    }

    #[test]
    fn components_are_positioned_in_itinerary_order() {
        let mut arena = PenaltyArena::new();
        let a = arena.insert_fare_component(component("A"));
        let b = arena.insert_fare_component(component("B"));
        let c = arena.insert_fare_component(component("C"));

        let path = FarePath::new(
            TripType::CircleTrip,
            [PricingUnit::new([a, b]), PricingUnit::new([c])],
        );

        let positions: Vec<_> = path.components().collect();

        assert_eq!(path.component_count(), 3);
        assert_eq!(
            positions,
            vec![
                (
                    a,
                    FareComponentPosition {
                        index: 0,
                        pricing_unit: 0,
                        sequence_in_pricing_unit: 0
                    }
                ),
                (
                    b,
                    FareComponentPosition {
                        index: 1,
                        pricing_unit: 0,
                        sequence_in_pricing_unit: 1
                    }
                ),
                (
                    c,
                    FareComponentPosition {
                        index: 2,
                        pricing_unit: 1,
                        sequence_in_pricing_unit: 0
                    }
                ),
            ]
        );
    }

    #[test]
    fn position_predicates() {
        let position = FareComponentPosition {
            index: 2,
            pricing_unit: 1,
            sequence_in_pricing_unit: 0,
        };

        assert!(!position.is_first_in_fare_path());
        assert!(!position.is_in_first_pricing_unit());
        assert!(position.is_first_in_pricing_unit());
    }

    #[test]
    fn single_direction_one_way_requires_one_component() {
        let mut arena = PenaltyArena::new();
        let a = arena.insert_fare_component(component("A"));
        let b = arena.insert_fare_component(component("B"));

        let single = FarePath::new(TripType::OneWay, [PricingUnit::new([a])]);
        let two = FarePath::new(TripType::OneWay, [PricingUnit::new([a, b])]);
        let round = FarePath::new(TripType::RoundTrip, [PricingUnit::new([a])]);

        assert!(single.is_single_direction_one_way());
        assert!(!two.is_single_direction_one_way());
        assert!(!round.is_single_direction_one_way());
    }

    #[test]
    fn attach_record_preserves_order_per_kind() -> TestResult {
        let mut arena = PenaltyArena::new();
        let fc = arena.insert_fare_component(component("A"));

        let first = arena.attach_record(
            fc,
            PenaltyKind::Change,
            PenaltyRuleRecord::new(FeeClassification::Waived),
        )?;
        let second = arena.attach_record(
            fc,
            PenaltyKind::Change,
            PenaltyRuleRecord::new(FeeClassification::NoFeeApplies),
        )?;
        let refund = arena.attach_record(
            fc,
            PenaltyKind::Refund,
            PenaltyRuleRecord::new(FeeClassification::NonChangeable),
        )?;

        assert_eq!(arena.candidates(fc, PenaltyKind::Change)?, &[first, second]);
        assert_eq!(arena.candidates(fc, PenaltyKind::Refund)?, &[refund]);
        assert_eq!(arena.record(second)?.fee(), &FeeClassification::NoFeeApplies);
        assert_eq!(arena.record_count(), 3);

        Ok(())
    }

    #[test]
    fn missing_keys_error() {
        let mut arena = PenaltyArena::new();
        let fc = arena.insert_fare_component(component("A"));
        let other = PenaltyArena::new();

        assert_eq!(
            other.fare_component(fc).err(),
            Some(FareError::ComponentNotFound(fc))
        );
        assert_eq!(
            other.record(RecordKey::default()).err(),
            Some(FareError::RecordNotFound(RecordKey::default()))
        );
    }
}
