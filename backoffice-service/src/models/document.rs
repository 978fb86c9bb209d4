//! Shared shape of quotations, orders and invoices.

use crate::domain::{Currency, MoneyError, Rates, Totals};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The three kinds of financial document.
///
/// Table and column names returned here are compile-time constants and are the
/// only identifiers ever interpolated into SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quotation,
    Order,
    Invoice,
}

impl DocumentKind {
    pub fn table(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotations",
            DocumentKind::Order => "orders",
            DocumentKind::Invoice => "invoices",
        }
    }

    pub fn items_table(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation_items",
            DocumentKind::Order => "order_items",
            DocumentKind::Invoice => "invoice_items",
        }
    }

    pub fn parent_column(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation_id",
            DocumentKind::Order => "order_id",
            DocumentKind::Invoice => "invoice_id",
        }
    }

    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "QUO",
            DocumentKind::Order => "ORD",
            DocumentKind::Invoice => "INV",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "Quotation",
            DocumentKind::Order => "Order",
            DocumentKind::Invoice => "Invoice",
        }
    }
}

/// Line item of a quotation, order or invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub organization_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for one line item; totals are always derived server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl From<&LineItem> for NewLineItem {
    fn from(item: &LineItem) -> Self {
        Self {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// Accessors shared by every financial document row.
pub trait FinancialDocument {
    const KIND: DocumentKind;

    fn id(&self) -> Uuid;
    fn organization_id(&self) -> Uuid;
    fn currency_code(&self) -> &str;
    fn rates(&self) -> Rates;
    fn totals(&self) -> Totals;

    fn currency(&self) -> Result<Currency, MoneyError> {
        self.currency_code().parse()
    }

    /// Restore the currency scale on stored amounts. Postgres hands back a
    /// zero `NUMERIC` without decimal places.
    fn with_currency_scale(self) -> Self
    where
        Self: Sized;
}

macro_rules! financial_document {
    ($ty:ty, $kind:expr) => {
        impl $crate::models::FinancialDocument for $ty {
            const KIND: $crate::models::DocumentKind = $kind;

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            fn organization_id(&self) -> ::uuid::Uuid {
                self.organization_id
            }

            fn currency_code(&self) -> &str {
                &self.currency
            }

            fn rates(&self) -> $crate::domain::Rates {
                $crate::domain::Rates {
                    tax_rate: self.tax_rate,
                    discount_percentage: self.discount_percentage,
                }
            }

            fn totals(&self) -> $crate::domain::Totals {
                $crate::domain::Totals {
                    subtotal: self.subtotal,
                    tax_amount: self.tax_amount,
                    discount_amount: self.discount_amount,
                    total_amount: self.total_amount,
                }
            }

            fn with_currency_scale(mut self) -> Self {
                if let Ok(currency) = self.currency.parse::<$crate::domain::Currency>() {
                    self.subtotal = currency.round(self.subtotal);
                    self.tax_amount = currency.round(self.tax_amount);
                    self.discount_amount = currency.round(self.discount_amount);
                    self.total_amount = currency.round(self.total_amount);
                }
                self
            }
        }
    };
}

pub(crate) use financial_document;

/// A document together with its ordered line items.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail<T> {
    #[serde(flatten)]
    pub document: T,
    pub items: Vec<LineItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quotation;
    use chrono::NaiveDate;

    fn quotation(currency: &str) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            project_id: None,
            quotation_number: "QUO-203001-0001".to_string(),
            title: "Scale".to_string(),
            status: "draft".to_string(),
            currency: currency.to_string(),
            issue_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            valid_until: None,
            tax_rate: Decimal::new(11, 0),
            discount_percentage: Decimal::ZERO,
            subtotal: Decimal::new(25000, 2),
            tax_amount: Decimal::new(2750, 2),
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::new(27750, 2),
            notes: None,
            terms: None,
            created_by: Uuid::new_v4(),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn zero_amounts_regain_currency_scale() {
        let usd = quotation("USD").with_currency_scale();
        assert_eq!(usd.discount_amount.to_string(), "0.00");
        assert_eq!(usd.subtotal.to_string(), "250.00");
        assert_eq!(usd.total_amount.to_string(), "277.50");

        let kwd = quotation("KWD").with_currency_scale();
        assert_eq!(kwd.discount_amount.to_string(), "0.000");
        assert_eq!(kwd.tax_amount.to_string(), "27.500");
    }

    #[test]
    fn unknown_currency_leaves_amounts_untouched() {
        let row = quotation("XYZ").with_currency_scale();
        assert_eq!(row.discount_amount.to_string(), "0");
    }
}
