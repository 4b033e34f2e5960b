//! Permutations
//!
//! Every way of choosing one candidate record per fare component. The cross
//! product is streamed: only the current choice of indices is held, so memory
//! stays flat however many permutations there are.

use smallvec::SmallVec;
use tracing::debug;

use crate::{
    application::RecordApplication,
    error::PenaltyError,
    fares::{FareComponent, FareComponentKey, FareComponentPosition, FarePath},
    options::{ComponentOptions, OptionsIndex, RecordOption},
    records::{DepartureIndicators, PenaltyRuleRecord, RecordKey},
};

/// One fare component's chosen record within a permutation.
#[derive(Debug, Clone, Copy)]
pub struct PermutationCell<'a> {
    /// Fare component key
    pub fare_component_key: FareComponentKey,

    /// The fare component
    pub fare_component: &'a FareComponent,

    /// Position of the fare component in the fare path
    pub position: FareComponentPosition,

    /// Index of the chosen option in the component's option list
    pub option_index: usize,

    /// Arena key of the chosen record
    pub record_key: RecordKey,

    /// The chosen record
    pub record: &'a PenaltyRuleRecord,

    /// Parsed departure indicators of the chosen record
    pub indicators: DepartureIndicators,
}

/// One record per fare component, in itinerary order.
#[derive(Debug, Clone)]
pub struct Permutation<'a> {
    number: u64,
    cells: SmallVec<[PermutationCell<'a>; 8]>,
}

impl<'a> Permutation<'a> {
    /// One-based permutation number
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Cells in itinerary order
    pub fn cells(&self) -> &[PermutationCell<'a>] {
        &self.cells
    }

    /// Whether any fare component in the permutation is partially flown.
    pub fn has_partially_flown_component(&self) -> bool {
        self.cells
            .iter()
            .any(|cell| cell.fare_component.is_partially_flown())
    }
}

/// Streaming cross product of the options of every fare component.
///
/// The last fare component's option advances fastest; numbering starts at one.
#[derive(Debug, Clone)]
pub struct Permutations<'s, 'a> {
    columns: SmallVec<[&'s ComponentOptions<'a>; 8]>,
    odometer: SmallVec<[usize; 8]>,
    next_number: u64,
    total: u64,
    exhausted: bool,
}

impl<'s, 'a> Permutations<'s, 'a> {
    fn empty() -> Self {
        Self {
            columns: SmallVec::new(),
            odometer: SmallVec::new(),
            next_number: 1,
            total: 0,
            exhausted: true,
        }
    }

    /// Total number of permutations (saturating).
    pub fn total(&self) -> u64 {
        self.total
    }

    fn cell(column: &ComponentOptions<'a>, option_index: usize) -> Option<PermutationCell<'a>> {
        let RecordOption {
            key,
            record,
            indicators,
        } = *column.options().get(option_index)?;

        Some(PermutationCell {
            fare_component_key: column.key(),
            fare_component: column.fare_component(),
            position: column.position(),
            option_index,
            record_key: key,
            record,
            indicators,
        })
    }

    fn advance(&mut self) {
        let mut carried = true;

        for (slot, column) in self.odometer.iter_mut().zip(&self.columns).rev() {
            *slot += 1;

            if *slot < column.len() {
                carried = false;
                break;
            }

            *slot = 0;
        }

        self.exhausted = carried;
    }
}

impl<'a> Iterator for Permutations<'_, 'a> {
    type Item = Permutation<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let cells = self
            .columns
            .iter()
            .zip(&self.odometer)
            .map(|(column, option_index)| Self::cell(column, *option_index))
            .collect::<Option<SmallVec<[PermutationCell<'a>; 8]>>>();

        let Some(cells) = cells else {
            self.exhausted = true;
            return None;
        };

        let permutation = Permutation {
            number: self.next_number,
            cells,
        };

        self.next_number += 1;
        self.advance();

        Some(permutation)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.exhausted {
            return (0, Some(0));
        }

        let remaining = self.total.saturating_sub(self.next_number - 1);

        match usize::try_from(remaining) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Generate the permutations of a fare path's options.
///
/// A single fare component priced as a one-way has nothing left to travel once
/// it departs, so an `AFTER`-only request yields no permutations at all.
///
/// # Errors
///
/// Returns [`PenaltyError::MissingFare`] if any fare component of the fare path
/// has no option in the index.
pub fn generate<'s, 'a>(
    options: &'s OptionsIndex<'a>,
    fare_path: &FarePath,
    requested: RecordApplication,
) -> Result<Permutations<'s, 'a>, PenaltyError> {
    let mut columns: SmallVec<[&'s ComponentOptions<'a>; 8]> = SmallVec::new();

    for (key, position) in fare_path.components() {
        let indexed = options
            .get(position.index)
            .filter(|column| column.key() == key);

        let column = indexed
            .filter(|column| !column.is_empty())
            .ok_or_else(|| PenaltyError::MissingFare {
                fare_basis: indexed
                    .map(|column| column.fare_component().fare_basis().to_string())
                    .unwrap_or_default(),
                position: position.index,
            })?;

        columns.push(column);
    }

    if columns.is_empty()
        || (requested == RecordApplication::AFTER && fare_path.is_single_direction_one_way())
    {
        debug!(%requested, "no permutations to evaluate");
        return Ok(Permutations::empty());
    }

    let total = columns
        .iter()
        .map(|column| u64::try_from(column.len()).unwrap_or(u64::MAX))
        .fold(1u64, u64::saturating_mul);

    debug!(components = columns.len(), total, "generating permutations");

    Ok(Permutations {
        odometer: SmallVec::from_elem(0, columns.len()),
        columns,
        next_number: 1,
        total,
        exhausted: false,
    })
}
