//! Fixed-point monetary computation for quotations, orders and invoices.
//!
//! Every stored amount is derived here from the document's line items and its
//! document-level rates:
//!
//! ```text
//! item.total      = quantity × unit_price
//! subtotal        = Σ item.total
//! tax_amount      = subtotal × tax_rate / 100
//! discount_amount = subtotal × discount_percentage / 100
//! total_amount    = max(0, subtotal + tax_amount − discount_amount)
//! ```
//!
//! Amounts are `rust_decimal::Decimal` rounded half-away-from-zero to the
//! currency scale, so recomputing the same items always yields the same totals.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lowest number of decimal places any stored amount carries.
pub const MIN_SCALE: u32 = 2;

/// Errors raised while deriving monetary amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("quantity must be greater than zero (line {line})")]
    NonPositiveQuantity { line: usize },

    #[error("unit price must be greater than zero (line {line})")]
    NonPositiveUnitPrice { line: usize },

    #[error("{field} must be between 0 and 100, got {value}")]
    RateOutOfRange { field: &'static str, value: Decimal },

    #[error("amount overflow while computing {0}")]
    Overflow(&'static str),

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// ISO-4217 currencies accepted on financial documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Idr,
    Usd,
    Eur,
    Gbp,
    Sgd,
    Myr,
    Aud,
    Jpy,
    Kwd,
    Bhd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Idr => "IDR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Sgd => "SGD",
            Currency::Myr => "MYR",
            Currency::Aud => "AUD",
            Currency::Jpy => "JPY",
            Currency::Kwd => "KWD",
            Currency::Bhd => "BHD",
        }
    }

    /// ISO minor units.
    pub fn minor_units(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            Currency::Kwd | Currency::Bhd => 3,
            _ => 2,
        }
    }

    /// Decimal places used for stored amounts: the ISO minor units, never
    /// fewer than [`MIN_SCALE`].
    pub fn scale(&self) -> u32 {
        self.minor_units().max(MIN_SCALE)
    }

    /// Round `value` to this currency's scale with a fixed representation.
    pub fn round(&self, value: Decimal) -> Decimal {
        let scale = self.scale();
        let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(scale);
        rounded
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IDR" => Ok(Currency::Idr),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "SGD" => Ok(Currency::Sgd),
            "MYR" => Ok(Currency::Myr),
            "AUD" => Ok(Currency::Aud),
            "JPY" => Ok(Currency::Jpy),
            "KWD" => Ok(Currency::Kwd),
            "BHD" => Ok(Currency::Bhd),
            other => Err(MoneyError::UnsupportedCurrency(other.to_string())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

/// Document-level percentages applied to the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rates {
    pub tax_rate: Decimal,
    pub discount_percentage: Decimal,
}

impl Rates {
    pub fn new(tax_rate: Decimal, discount_percentage: Decimal) -> Result<Self, MoneyError> {
        let rates = Self {
            tax_rate,
            discount_percentage,
        };
        rates.validate()?;
        Ok(rates)
    }

    pub fn validate(&self) -> Result<(), MoneyError> {
        check_percentage("tax_rate", self.tax_rate)?;
        check_percentage("discount_percentage", self.discount_percentage)
    }
}

fn check_percentage(field: &'static str, value: Decimal) -> Result<(), MoneyError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(MoneyError::RateOutOfRange { field, value });
    }
    Ok(())
}

/// Quantity and price of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount {
    pub fn new(quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            quantity,
            unit_price,
        }
    }
}

/// Derived amounts of a financial document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl Totals {
    pub fn zero(currency: Currency) -> Self {
        let zero = currency.round(Decimal::ZERO);
        Self {
            subtotal: zero,
            tax_amount: zero,
            discount_amount: zero,
            total_amount: zero,
        }
    }

    /// `total_amount == subtotal + tax_amount − discount_amount`, allowing for
    /// the non-negative clamp.
    pub fn is_consistent(&self) -> bool {
        let expected = self.subtotal + self.tax_amount - self.discount_amount;
        self.total_amount == expected.max(Decimal::ZERO)
    }
}

/// `quantity × unit_price`, rounded to the currency scale.
pub fn line_total(
    line: usize,
    amount: &LineAmount,
    currency: Currency,
) -> Result<Decimal, MoneyError> {
    if amount.quantity <= Decimal::ZERO {
        return Err(MoneyError::NonPositiveQuantity { line });
    }
    if amount.unit_price <= Decimal::ZERO {
        return Err(MoneyError::NonPositiveUnitPrice { line });
    }

    amount
        .quantity
        .checked_mul(amount.unit_price)
        .map(|total| currency.round(total))
        .ok_or(MoneyError::Overflow("line total"))
}

/// Derive line totals and document totals for `lines`.
///
/// Returns the rounded total of each line, in input order, with the document
/// totals. An empty slice yields zero totals.
pub fn compute_totals(
    lines: &[LineAmount],
    rates: &Rates,
    currency: Currency,
) -> Result<(Vec<Decimal>, Totals), MoneyError> {
    rates.validate()?;

    let mut line_totals = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;
    for (index, amount) in lines.iter().enumerate() {
        let total = line_total(index + 1, amount, currency)?;
        subtotal = subtotal
            .checked_add(total)
            .ok_or(MoneyError::Overflow("subtotal"))?;
        line_totals.push(total);
    }
    let subtotal = currency.round(subtotal);

    let tax_amount = percentage_of(subtotal, rates.tax_rate, currency, "tax amount")?;
    let discount_amount = percentage_of(
        subtotal,
        rates.discount_percentage,
        currency,
        "discount amount",
    )?;

    let total_amount = subtotal
        .checked_add(tax_amount)
        .and_then(|v| v.checked_sub(discount_amount))
        .ok_or(MoneyError::Overflow("total amount"))?
        .max(Decimal::ZERO);

    Ok((
        line_totals,
        Totals {
            subtotal,
            tax_amount,
            discount_amount,
            total_amount: currency.round(total_amount),
        },
    ))
}

fn percentage_of(
    base: Decimal,
    percent: Decimal,
    currency: Currency,
    what: &'static str,
) -> Result<Decimal, MoneyError> {
    base.checked_mul(percent)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .map(|v| currency.round(v))
        .ok_or(MoneyError::Overflow(what))
}
