//! Currency conversion
//!
//! Fees are normalised into one evaluation currency before they are compared or
//! summed. Rate lookup is the caller's business; the engine only talks to a
//! [`CurrencyConverter`].

use jiff::civil::Date;
use rust_decimal::{Decimal, RoundingStrategy};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// Errors raised by a currency converter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// No rate is known for the currency pair.
    #[error("no exchange rate from {from} to {to} on {as_of}")]
    RateUnavailable {
        /// Source currency code
        from: &'static str,

        /// Target currency code
        to: &'static str,

        /// Conversion date
        as_of: Date,
    },

    /// The converted amount does not fit a decimal.
    #[error("converting {amount} {from} to {to} overflowed")]
    Overflow {
        /// Amount being converted
        amount: Decimal,

        /// Source currency code
        from: &'static str,

        /// Target currency code
        to: &'static str,
    },
}

/// Converts amounts between currencies.
pub trait CurrencyConverter: Send + Sync {
    /// Convert `amount` in `from` into `to` using rates effective on `as_of`.
    ///
    /// The result is not rounded.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if no rate is available or the result overflows.
    fn convert(
        &self,
        amount: Decimal,
        from: &'static Currency,
        to: &'static Currency,
        as_of: Date,
    ) -> Result<Decimal, ConversionError>;
}

/// In-memory table of exchange rates.
///
/// Same-currency conversions are the identity. A rate stored for `A -> B` is
/// also used, inverted, for `B -> A`.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: FxHashMap<(&'static str, &'static str), Decimal>,
}

impl RateTable {
    /// Create an empty rate table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rate: one unit of `from` buys `rate` units of `to`.
    #[must_use]
    pub fn with_rate(
        mut self,
        from: &'static Currency,
        to: &'static Currency,
        rate: Decimal,
    ) -> Self {
        self.insert(from, to, rate);
        self
    }

    /// Add or replace a rate.
    pub fn insert(&mut self, from: &'static Currency, to: &'static Currency, rate: Decimal) {
        self.rates
            .insert((from.iso_alpha_code, to.iso_alpha_code), rate);
    }

    /// Number of stored rates
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether the table holds no rates
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    fn rate(&self, from: &'static str, to: &'static str) -> Option<Decimal> {
        if let Some(rate) = self.rates.get(&(from, to)) {
            return Some(*rate);
        }

        self.rates
            .get(&(to, from))
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
    }
}

impl CurrencyConverter for RateTable {
    fn convert(
        &self,
        amount: Decimal,
        from: &'static Currency,
        to: &'static Currency,
        as_of: Date,
    ) -> Result<Decimal, ConversionError> {
        if from.iso_alpha_code == to.iso_alpha_code {
            return Ok(amount);
        }

        let rate = self
            .rate(from.iso_alpha_code, to.iso_alpha_code)
            .ok_or(ConversionError::RateUnavailable {
                from: from.iso_alpha_code,
                to: to.iso_alpha_code,
                as_of,
            })?;

        amount.checked_mul(rate).ok_or(ConversionError::Overflow {
            amount,
            from: from.iso_alpha_code,
            to: to.iso_alpha_code,
        })
    }
}

/// Unrounded decimal value of a money amount in major units.
pub(crate) fn money_to_decimal(money: &Money<'_, Currency>) -> Decimal {
    Decimal::new(money.to_minor_units(), money.currency().exponent)
}

/// Round a decimal to the currency's minor units (midpoint away from zero).
///
/// Returns `None` if the rounded amount does not fit minor units.
pub(crate) fn decimal_to_money(
    amount: Decimal,
    currency: &'static Currency,
) -> Option<Money<'static, Currency>> {
    let mut rounded =
        amount.round_dp_with_strategy(currency.exponent, RoundingStrategy::MidpointAwayFromZero);

    rounded.rescale(currency.exponent);

    let minor = i64::try_from(rounded.mantissa()).ok()?;

    Some(Money::from_minor(minor, currency))
}

/// Format a money amount as `<amount> <code>`, e.g. `150.00 USD`.
pub(crate) fn format_money(money: &Money<'_, Currency>) -> String {
    format!(
        "{} {}",
        money_to_decimal(money),
        money.currency().iso_alpha_code
    )
}
