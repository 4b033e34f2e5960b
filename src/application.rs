//! Record Application
//!
//! A two-bit set describing *when* a penalty rule applies relative to the
//! start of travel: before departure, after departure, or both.

use std::{
    fmt,
    ops::{BitAnd, BitOr},
};

use thiserror::Error;

/// Raw rule field a departure code was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureField {
    /// Departure of the journey
    Journey,

    /// Departure of the pricing unit
    PricingUnit,

    /// Departure of the fare component
    FareComponent,
}

impl fmt::Display for DepartureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartureField::Journey => f.write_str("journey"),
            DepartureField::PricingUnit => f.write_str("pricing unit"),
            DepartureField::FareComponent => f.write_str("fare component"),
        }
    }
}

/// A rule record carried a departure code outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid {field} departure code {code:?}")]
pub struct InvalidDepartureCode {
    /// The offending raw code
    pub code: char,

    /// Field the code was read from
    pub field: DepartureField,
}

/// When a rule applies: `BEFORE`, `AFTER`, `BOTH` or `INVALID`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordApplication(u8);

impl RecordApplication {
    /// Applies nowhere.
    pub const INVALID: Self = Self(0);

    /// Applies before travel commences.
    pub const BEFORE: Self = Self(1);

    /// Applies after travel commences.
    pub const AFTER: Self = Self(2);

    /// Applies before and after travel commences.
    pub const BOTH: Self = Self(Self::BEFORE.0 | Self::AFTER.0);

    /// The single-bit temporal scopes, in reporting order.
    pub const SCOPES: [Self; 2] = [Self::BEFORE, Self::AFTER];

    /// Map a raw departure code to an application.
    ///
    /// `'B'` is before, `'A'` is after and a blank is unrestricted. Anything else
    /// is unknown and yields `None`; it never falls back to `BOTH`.
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'B' => Some(Self::BEFORE),
            'A' => Some(Self::AFTER),
            ' ' => Some(Self::BOTH),
            _ => None,
        }
    }

    /// Parse a raw departure code read from `field`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDepartureCode`] if the code is not one of `'B'`, `'A'` or `' '`.
    pub fn parse(code: char, field: DepartureField) -> Result<Self, InvalidDepartureCode> {
        Self::from_code(code).ok_or(InvalidDepartureCode { code, field })
    }

    /// The raw code for this application (`'?'` for `INVALID`).
    pub const fn code(self) -> char {
        match self.0 {
            1 => 'B',
            2 => 'A',
            3 => ' ',
            _ => '?',
        }
    }

    /// Union of both applications.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of both applications.
    #[must_use]
    pub const fn restrict(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Whether `candidate` shares at least one scope with `self`.
    pub const fn matches(self, candidate: Self) -> bool {
        self.0 & candidate.0 != 0
    }

    /// Whether any scope is set.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Iterate the single-bit scopes contained in this application.
    pub fn scopes(self) -> impl Iterator<Item = Self> {
        Self::SCOPES
            .into_iter()
            .filter(move |scope| self.matches(*scope))
    }
}

impl BitOr for RecordApplication {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.combine(rhs)
    }
}

impl BitAnd for RecordApplication {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.restrict(rhs)
    }
}

impl fmt::Display for RecordApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => f.write_str("BEFORE"),
            2 => f.write_str("AFTER"),
            3 => f.write_str("BOTH"),
            _ => f.write_str("INVALID"),
        }
    }
}

impl fmt::Debug for RecordApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordApplication({self})")
    }
}
