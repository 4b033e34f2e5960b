//! Max Penalty prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    aggregate::{FeeAggregator, PenaltyOutcome},
    application::{DepartureField, InvalidDepartureCode, RecordApplication},
    config::{ConfigError, EngineConfig, PreferredCurrencySource},
    currency::{ConversionError, CurrencyConverter, RateTable},
    error::PenaltyError,
    evaluation::{CancellationFlag, PenaltyEvaluator, PenaltyReport},
    fares::{
        FareComponent, FareComponentKey, FareComponentPosition, FareError, FarePath, PenaltyArena,
        PricingUnit, RuleSource, TripType,
    },
    filters::{
        FilterError, FilterVerdict, MaxPenaltyRequest, PenaltyFilter, PenaltyMode, Query,
        RequestVerdict,
    },
    observer::{NoopObserver, PenaltyObserver},
    options::{ComponentOptions, OptionsIndex, RecordOption},
    permutations::{Permutation, PermutationCell, Permutations, generate},
    records::{
        CombinationCode, DepartureCodes, DepartureIndicators, FeeClassification, PenaltyKind,
        PenaltyRuleRecord, RecordKey,
    },
    reducer::{MaxPenaltyResult, MaxPenaltyResults, MaximumPenaltyReducer},
    resolver::ApplicationResolver,
    validator::{
        FailureStats, FareValidation, FilterStats, PenaltyValidator, SharedFailureStats,
        ValidationState, ValidatorError,
    },
};
