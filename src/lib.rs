//! Max Penalty
//!
//! Max Penalty computes the worst-case change and refund penalty of a priced itinerary, before and
//! after travel commences, from the penalty rule records attached to its fare components.

pub mod aggregate;
pub mod application;
pub mod config;
pub mod currency;
pub mod error;
pub mod evaluation;
pub mod fares;
pub mod filters;
pub mod fixtures;
pub mod observer;
pub mod options;
pub mod permutations;
pub mod prelude;
pub mod records;
pub mod reducer;
pub mod resolver;
pub mod validator;
pub mod utils;
