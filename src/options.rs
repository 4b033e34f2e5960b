//! Options Index
//!
//! Candidate rule records per fare component, in rule source order. The order
//! of the options defines permutation numbering.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::{
    error::PenaltyError,
    fares::{FareComponent, FareComponentKey, FareComponentPosition, FarePath, RuleSource},
    observer::PenaltyObserver,
    records::{DepartureIndicators, PenaltyKind, PenaltyRuleRecord, RecordKey},
};

/// A usable candidate record with its parsed departure indicators.
#[derive(Debug, Clone, Copy)]
pub struct RecordOption<'a> {
    /// Arena key of the record
    pub key: RecordKey,

    /// The record
    pub record: &'a PenaltyRuleRecord,

    /// Parsed departure indicators
    pub indicators: DepartureIndicators,
}

/// Candidate records of a single fare component.
#[derive(Debug, Clone)]
pub struct ComponentOptions<'a> {
    key: FareComponentKey,
    fare_component: &'a FareComponent,
    position: FareComponentPosition,
    options: Vec<RecordOption<'a>>,
}

impl<'a> ComponentOptions<'a> {
    /// Create an empty option list for a fare component.
    pub fn new(
        key: FareComponentKey,
        fare_component: &'a FareComponent,
        position: FareComponentPosition,
    ) -> Self {
        Self {
            key,
            fare_component,
            position,
            options: Vec::new(),
        }
    }

    /// Append an option.
    pub fn push(&mut self, option: RecordOption<'a>) {
        self.options.push(option);
    }

    /// Fare component key
    pub fn key(&self) -> FareComponentKey {
        self.key
    }

    /// The fare component
    pub fn fare_component(&self) -> &'a FareComponent {
        self.fare_component
    }

    /// Position in the fare path
    pub fn position(&self) -> FareComponentPosition {
        self.position
    }

    /// Options in rule source order
    pub fn options(&self) -> &[RecordOption<'a>] {
        &self.options
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether no candidate was found
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Ordered map of itinerary position to candidate records.
///
/// Entries are keyed by the fare component's index in the fare path, so a
/// fare component used twice keeps one entry per position.
#[derive(Debug, Clone, Default)]
pub struct OptionsIndex<'a> {
    components: Vec<ComponentOptions<'a>>,
    lookup: FxHashMap<usize, usize>,
}

impl<'a> OptionsIndex<'a> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index for every fare component of a fare path.
    ///
    /// Records whose departure codes cannot be read are logged, reported to the
    /// observer and left out; the rest of the component's options survive.
    ///
    /// # Errors
    ///
    /// Returns a [`PenaltyError::Fare`] if a fare component or record is missing
    /// from the rule source.
    pub fn build<S: RuleSource>(
        source: &'a S,
        fare_path: &FarePath,
        kind: PenaltyKind,
        observer: &mut dyn PenaltyObserver,
    ) -> Result<Self, PenaltyError> {
        let mut index = Self::new();

        for (key, position) in fare_path.components() {
            let fare_component = source.fare_component(key)?;
            let mut component = ComponentOptions::new(key, fare_component, position);

            for record_key in source.candidates(key, kind)? {
                let record = source.record(*record_key)?;

                match record.departure_indicators() {
                    Ok(indicators) => component.push(RecordOption {
                        key: *record_key,
                        record,
                        indicators,
                    }),
                    Err(error) => {
                        warn!(
                            fare_basis = fare_component.fare_basis(),
                            vendor = record.vendor(),
                            %kind,
                            %error,
                            "excluding penalty record with invalid departure code"
                        );

                        observer.on_record_excluded(
                            fare_component.fare_basis(),
                            *record_key,
                            &error,
                        );
                    }
                }
            }

            index.insert(component);
        }

        Ok(index)
    }

    /// Insert or replace the options at a fare path position.
    ///
    /// A replaced position keeps its original insertion slot.
    pub fn insert(&mut self, component: ComponentOptions<'a>) {
        let index = component.position().index;

        if let Some(slot) = self
            .lookup
            .get(&index)
            .and_then(|idx| self.components.get_mut(*idx))
        {
            *slot = component;
            return;
        }

        self.lookup.insert(index, self.components.len());
        self.components.push(component);
    }

    /// Options at a fare path position.
    pub fn get(&self, index: usize) -> Option<&ComponentOptions<'a>> {
        self.lookup
            .get(&index)
            .and_then(|idx| self.components.get(*idx))
    }

    /// Iterate components in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentOptions<'a>> {
        self.components.iter()
    }

    /// Number of indexed fare components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no fare component is indexed
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
