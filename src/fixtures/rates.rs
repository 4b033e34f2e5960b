//! Exchange Rate Fixtures

use std::str::FromStr;

use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    currency::RateTable,
    fixtures::{FixtureError, find_currency},
};

/// Evaluation currency, date and rates in YAML
#[derive(Debug, Deserialize)]
pub struct RatesFixture {
    /// Evaluation currency code
    pub currency: String,

    /// Date rates are effective on
    pub as_of: Date,

    /// Exchange rates
    #[serde(default)]
    pub rates: Vec<RateFixture>,
}

/// One exchange rate: one unit of `from` buys `rate` units of `to`
#[derive(Debug, Deserialize)]
pub struct RateFixture {
    /// Source currency code
    pub from: String,

    /// Target currency code
    pub to: String,

    /// Rate as a decimal string (e.g. "1.10")
    pub rate: String,
}

impl TryFrom<&RatesFixture> for RateTable {
    type Error = FixtureError;

    fn try_from(fixture: &RatesFixture) -> Result<Self, Self::Error> {
        let mut table = RateTable::new();

        for rate in &fixture.rates {
            let value = Decimal::from_str(rate.rate.trim())
                .ok()
                .filter(|value| value.is_sign_positive() && !value.is_zero())
                .ok_or_else(|| FixtureError::InvalidRate(rate.rate.clone()))?;

            table.insert(find_currency(&rate.from)?, find_currency(&rate.to)?, value);
        }

        Ok(table)
    }
}
