//! Invoice model.

use super::document::{financial_document, DocumentKind, NewLineItem};
use crate::domain::{Currency, InvoiceStatus, Rates, TransitionError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub invoice_number: String,
    pub status: String,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub discount_percentage: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

financial_document!(Invoice, DocumentKind::Invoice);

impl Invoice {
    pub fn status(&self) -> Result<InvoiceStatus, TransitionError> {
        self.status.parse()
    }
}

#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub currency: Currency,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub rates: Rates,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}
