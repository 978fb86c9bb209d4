use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{currency_or_default, page_request, parse_status, rates_or_default, today};
use crate::domain::{OrderStatus, Permission};
use crate::dtos::{
    into_line_items, ConvertRequest, CreateOrderRequest, ListQuery, ReplaceItemsRequest,
    StatusRequest,
};
use crate::middleware::TenantContext;
use crate::models::{CreateOrder, DocumentDetail, Invoice, Order, OrderFilter, Paginated};
use crate::startup::AppState;

const SORTABLE: &[&str] = &[
    "created_at",
    "updated_at",
    "order_number",
    "order_date",
    "total_amount",
    "status",
];

pub async fn list_orders(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Order>>, AppError> {
    tenant.require(&[Permission::OrderRead])?;
    let page = page_request(&query, SORTABLE)?;
    let filter = OrderFilter {
        status: parse_status::<OrderStatus>(query.status.as_deref())?,
        client_id: query.client_id,
        quotation_id: query.quotation_id,
    };

    let (orders, total) = state
        .db
        .list_orders(tenant.organization_id, &filter, &page)
        .await?;
    Ok(Json(Paginated::new(orders, &page, total)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id))]
pub async fn create_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<DocumentDetail<Order>>), AppError> {
    tenant.require(&[Permission::OrderWrite])?;
    payload.validate()?;

    let currency = currency_or_default(&state, payload.currency.as_deref())?;
    let rates = rates_or_default(&state, payload.tax_rate, payload.discount_percentage)?;

    let order = state
        .db
        .create_order(&CreateOrder {
            organization_id: tenant.organization_id,
            client_id: payload.client_id,
            project_id: payload.project_id,
            quotation_id: None,
            currency,
            order_date: payload.order_date.unwrap_or_else(today),
            delivery_date: payload.delivery_date,
            rates,
            notes: payload.notes,
            created_by: tenant.user_id,
            items: into_line_items(payload.items),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetail<Order>>, AppError> {
    tenant.require(&[Permission::OrderRead])?;

    let order = state
        .db
        .get_order(tenant.organization_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    Ok(Json(order))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn replace_order_items(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> Result<Json<DocumentDetail<Order>>, AppError> {
    tenant.require(&[Permission::OrderWrite])?;
    payload.validate()?;

    let order = state
        .db
        .replace_order_items(tenant.organization_id, id, &into_line_items(payload.items))
        .await?;

    Ok(Json(order))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Order>, AppError> {
    tenant.require(&[Permission::OrderWrite])?;
    let target: OrderStatus = payload.status.parse()?;

    let order = state
        .db
        .transition_order_status(tenant.organization_id, id, target)
        .await?;

    Ok(Json(order))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn delete_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.require(&[Permission::OrderWrite])?;

    state.db.delete_order(tenant.organization_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn convert_to_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ConvertRequest>>,
) -> Result<(StatusCode, Json<DocumentDetail<Invoice>>), AppError> {
    tenant.require(&[Permission::OrderRead, Permission::InvoiceWrite])?;
    let Json(payload) = payload.unwrap_or_default();

    let invoice = state
        .db
        .convert_order_to_invoice(
            tenant.organization_id,
            id,
            tenant.user_id,
            payload.date.unwrap_or_else(today),
            payload.due_date,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}
