use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{currency_or_default, page_request, parse_status, rates_or_default, today};
use crate::domain::{InvoiceStatus, Permission};
use crate::dtos::{
    into_line_items, CreateInvoiceRequest, ListQuery, ReplaceItemsRequest, StatusRequest,
};
use crate::middleware::TenantContext;
use crate::models::{CreateInvoice, DocumentDetail, Invoice, InvoiceFilter, Paginated};
use crate::startup::AppState;

const SORTABLE: &[&str] = &[
    "created_at",
    "updated_at",
    "invoice_number",
    "issue_date",
    "due_date",
    "total_amount",
    "status",
];

pub async fn list_invoices(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Invoice>>, AppError> {
    tenant.require(&[Permission::InvoiceRead])?;
    let page = page_request(&query, SORTABLE)?;
    let filter = InvoiceFilter {
        status: parse_status::<InvoiceStatus>(query.status.as_deref())?,
        client_id: query.client_id,
        order_id: query.order_id,
    };

    let (invoices, total) = state
        .db
        .list_invoices(tenant.organization_id, &filter, &page)
        .await?;
    Ok(Json(Paginated::new(invoices, &page, total)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<DocumentDetail<Invoice>>), AppError> {
    tenant.require(&[Permission::InvoiceWrite])?;
    payload.validate()?;

    let currency = currency_or_default(&state, payload.currency.as_deref())?;
    let rates = rates_or_default(&state, payload.tax_rate, payload.discount_percentage)?;
    let issue_date = payload.issue_date.unwrap_or_else(today);
    if matches!(payload.due_date, Some(due) if due < issue_date) {
        return Err(AppError::validation(
            "due_date",
            "before_issue_date",
            "Due date cannot be before the issue date",
        ));
    }

    let invoice = state
        .db
        .create_invoice(&CreateInvoice {
            organization_id: tenant.organization_id,
            client_id: payload.client_id,
            project_id: payload.project_id,
            quotation_id: None,
            order_id: None,
            currency,
            issue_date,
            due_date: payload.due_date,
            rates,
            notes: payload.notes,
            created_by: tenant.user_id,
            items: into_line_items(payload.items),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetail<Invoice>>, AppError> {
    tenant.require(&[Permission::InvoiceRead])?;

    let invoice = state
        .db
        .get_invoice(tenant.organization_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice"))?;

    Ok(Json(invoice))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn replace_invoice_items(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> Result<Json<DocumentDetail<Invoice>>, AppError> {
    tenant.require(&[Permission::InvoiceWrite])?;
    payload.validate()?;

    let invoice = state
        .db
        .replace_invoice_items(tenant.organization_id, id, &into_line_items(payload.items))
        .await?;

    Ok(Json(invoice))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Invoice>, AppError> {
    tenant.require(&[Permission::InvoiceWrite])?;
    let target: InvoiceStatus = payload.status.parse()?;

    let invoice = state
        .db
        .transition_invoice_status(tenant.organization_id, id, target)
        .await?;

    Ok(Json(invoice))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.require(&[Permission::InvoiceWrite])?;

    state.db.delete_invoice(tenant.organization_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
