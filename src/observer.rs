//! Penalty Observer

use crate::{
    aggregate::PenaltyOutcome,
    application::{InvalidDepartureCode, RecordApplication},
    permutations::Permutation,
    records::{PenaltyKind, RecordKey},
    reducer::MaxPenaltyResults,
};

/// Diagnostics sink receiving callbacks while a fare path is evaluated.
///
/// Observers are passive: nothing they do changes computed results. Every
/// method has an empty default so sinks only implement what they display.
pub trait PenaltyObserver {
    /// A record was dropped from a fare component's options because its
    /// departure codes could not be read.
    fn on_record_excluded(
        &mut self,
        _fare_basis: &str,
        _record: RecordKey,
        _error: &InvalidDepartureCode,
    ) {
    }

    /// A permutation is about to be evaluated.
    fn on_permutation(&mut self, _permutation: &Permutation<'_>) {}

    /// A permutation was aggregated for one temporal scope.
    fn on_outcome(&mut self, _number: u64, _scope: RecordApplication, _outcome: PenaltyOutcome) {}

    /// All permutations of a penalty kind were reduced.
    fn on_result(&mut self, _kind: PenaltyKind, _results: &MaxPenaltyResults) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PenaltyObserver for NoopObserver {}
