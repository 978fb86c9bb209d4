//! Order model.

use super::document::{financial_document, DocumentKind, NewLineItem};
use crate::domain::{Currency, OrderStatus, Rates, TransitionError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub order_number: String,
    pub status: String,
    pub currency: String,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub discount_percentage: Decimal,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

financial_document!(Order, DocumentKind::Order);

impl Order {
    pub fn status(&self) -> Result<OrderStatus, TransitionError> {
        self.status.parse()
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub currency: Currency,
    pub order_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,
    pub rates: Rates,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
}
