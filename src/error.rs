//! Penalty evaluation errors

use thiserror::Error;

use crate::{currency::ConversionError, fares::FareError};

/// Errors that end a single fare path evaluation.
#[derive(Debug, Error)]
pub enum PenaltyError {
    /// A fare component has no usable candidate rule record.
    #[error("no penalty rule records for fare component {fare_basis} at position {position}")]
    MissingFare {
        /// Fare basis of the offending component
        fare_basis: String,

        /// Zero-based position of the component in the fare path
        position: usize,
    },

    /// The currency converter could not convert a fee.
    #[error("currency conversion unavailable: {0}")]
    CurrencyConversionUnavailable(#[from] ConversionError),

    /// Arena lookup failed.
    #[error(transparent)]
    Fare(#[from] FareError),

    /// A penalty amount could not be represented.
    #[error("penalty amount overflowed")]
    AmountOverflow,

    /// The surrounding transaction cancelled the evaluation.
    #[error("penalty evaluation cancelled")]
    Cancelled,
}
