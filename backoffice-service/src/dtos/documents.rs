use crate::models::NewLineItem;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,
    #[validate(custom(function = "super::positive_decimal"))]
    pub quantity: Decimal,
    #[validate(custom(function = "super::positive_decimal"))]
    pub unit_price: Decimal,
}

impl From<LineItemRequest> for NewLineItem {
    fn from(item: LineItemRequest) -> Self {
        Self {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

pub fn into_line_items(items: Vec<LineItemRequest>) -> Vec<NewLineItem> {
    items.into_iter().map(NewLineItem::from).collect()
}

/// Body of `PUT /:id/items`.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceItemsRequest {
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationRequest {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    /// ISO-4217 code; the configured default when omitted.
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuotationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub project_id: Option<Uuid>,
    pub currency: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveQuotationRequest {
    pub approver_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectQuotationRequest {
    pub reason: Option<String>,
}

/// Body of the quotation/order conversion endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    /// Order date or invoice issue date; today when omitted.
    pub date: Option<NaiveDate>,
    /// Delivery date of the created order.
    pub delivery_date: Option<NaiveDate>,
    /// Due date of the created invoice.
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub currency: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,
}

/// Body of `POST /:id/status` for orders, invoices and tickets.
#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}
