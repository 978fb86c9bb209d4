//! Quotation model.

use super::document::{financial_document, DocumentKind, NewLineItem};
use crate::domain::{Currency, QuotationStatus, Rates, TransitionError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quotation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub quotation_number: String,
    pub title: String,
    pub status: String,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub discount_percentage: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

financial_document!(Quotation, DocumentKind::Quotation);

impl Quotation {
    pub fn status(&self) -> Result<QuotationStatus, TransitionError> {
        self.status.parse()
    }
}

#[derive(Debug, Clone)]
pub struct CreateQuotation {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub currency: Currency,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub rates: Rates,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Uuid,
    pub items: Vec<NewLineItem>,
}

/// Draft-only edits. Rate or currency changes trigger a recomputation.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuotation {
    pub title: Option<String>,
    pub project_id: Option<Uuid>,
    pub currency: Option<Currency>,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QuotationFilter {
    pub status: Option<QuotationStatus>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub search: Option<String>,
}
