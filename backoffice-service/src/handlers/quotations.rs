//! Quotation handlers: CRUD, line items, the send/approve/reject lifecycle
//! and conversion into orders and invoices.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{currency_or_default, page_request, parse_status, rates_or_default, today};
use crate::domain::{Currency, Permission, QuotationStatus};
use crate::dtos::{
    into_line_items, ApproveQuotationRequest, ConvertRequest, CreateQuotationRequest, ListQuery,
    RejectQuotationRequest, ReplaceItemsRequest, UpdateQuotationRequest,
};
use crate::middleware::TenantContext;
use crate::models::{
    CreateQuotation, DocumentDetail, Invoice, Order, Paginated, Quotation, QuotationFilter,
    UpdateQuotation,
};
use crate::startup::AppState;

const SORTABLE: &[&str] = &[
    "created_at",
    "updated_at",
    "quotation_number",
    "issue_date",
    "valid_until",
    "total_amount",
    "status",
];

pub async fn list_quotations(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Quotation>>, AppError> {
    tenant.require(&[Permission::QuotationRead])?;
    let page = page_request(&query, SORTABLE)?;
    let filter = QuotationFilter {
        status: parse_status::<QuotationStatus>(query.status.as_deref())?,
        client_id: query.client_id,
        project_id: query.project_id,
        search: query.search,
    };

    let (quotations, total) = state
        .db
        .list_quotations(tenant.organization_id, &filter, &page, today())
        .await?;
    Ok(Json(Paginated::new(quotations, &page, total)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id))]
pub async fn create_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<DocumentDetail<Quotation>>), AppError> {
    tenant.require(&[Permission::QuotationWrite])?;
    payload.validate()?;

    let currency = currency_or_default(&state, payload.currency.as_deref())?;
    let rates = rates_or_default(&state, payload.tax_rate, payload.discount_percentage)?;
    let issue_date = payload.issue_date.unwrap_or_else(today);
    let valid_until = payload.valid_until.unwrap_or_else(|| {
        issue_date + Duration::days(state.config.policy.quotation_validity_days)
    });
    if valid_until < issue_date {
        return Err(AppError::validation(
            "valid_until",
            "before_issue_date",
            "Validity date cannot be before the issue date",
        ));
    }

    let quotation = state
        .db
        .create_quotation(&CreateQuotation {
            organization_id: tenant.organization_id,
            client_id: payload.client_id,
            project_id: payload.project_id,
            title: payload.title,
            currency,
            issue_date,
            valid_until: Some(valid_until),
            rates,
            notes: payload.notes,
            terms: payload.terms,
            created_by: tenant.user_id,
            items: into_line_items(payload.items),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetail<Quotation>>, AppError> {
    tenant.require(&[Permission::QuotationRead])?;

    let quotation = state
        .db
        .get_quotation(tenant.organization_id, id, today())
        .await?
        .ok_or_else(|| AppError::not_found("Quotation"))?;

    Ok(Json(quotation))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn update_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuotationRequest>,
) -> Result<Json<DocumentDetail<Quotation>>, AppError> {
    tenant.require(&[Permission::QuotationWrite])?;
    payload.validate()?;

    let currency = payload
        .currency
        .as_deref()
        .map(str::parse::<Currency>)
        .transpose()?;

    let quotation = state
        .db
        .update_quotation(
            tenant.organization_id,
            id,
            &UpdateQuotation {
                title: payload.title,
                project_id: payload.project_id,
                currency,
                valid_until: payload.valid_until,
                tax_rate: payload.tax_rate,
                discount_percentage: payload.discount_percentage,
                notes: payload.notes,
                terms: payload.terms,
            },
            today(),
        )
        .await?;

    Ok(Json(quotation))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn replace_quotation_items(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> Result<Json<DocumentDetail<Quotation>>, AppError> {
    tenant.require(&[Permission::QuotationWrite])?;
    payload.validate()?;

    let quotation = state
        .db
        .replace_quotation_items(
            tenant.organization_id,
            id,
            &into_line_items(payload.items),
            today(),
        )
        .await?;

    Ok(Json(quotation))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn delete_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.require(&[Permission::QuotationWrite])?;

    state.db.delete_quotation(tenant.organization_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn send_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Quotation>, AppError> {
    tenant.require(&[Permission::QuotationWrite])?;

    let quotation = state
        .db
        .send_quotation(tenant.organization_id, id, today())
        .await?;

    Ok(Json(quotation))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn approve_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ApproveQuotationRequest>>,
) -> Result<Json<Quotation>, AppError> {
    tenant.require(&[Permission::QuotationApprove])?;
    let Json(payload) = payload.unwrap_or_default();

    let quotation = state
        .db
        .approve_quotation(
            tenant.organization_id,
            id,
            tenant.user_id,
            payload.approver_id,
            state.config.policy.approval_policy(),
            today(),
        )
        .await?;

    Ok(Json(quotation))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn reject_quotation(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<RejectQuotationRequest>>,
) -> Result<Json<Quotation>, AppError> {
    tenant.require(&[Permission::QuotationApprove])?;
    let Json(payload) = payload.unwrap_or_default();

    let quotation = state
        .db
        .reject_quotation(tenant.organization_id, id, payload.reason.as_deref(), today())
        .await?;

    Ok(Json(quotation))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn convert_to_order(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ConvertRequest>>,
) -> Result<(StatusCode, Json<DocumentDetail<Order>>), AppError> {
    tenant.require(&[Permission::QuotationRead, Permission::OrderWrite])?;
    let Json(payload) = payload.unwrap_or_default();

    let order = state
        .db
        .convert_quotation_to_order(
            tenant.organization_id,
            id,
            tenant.user_id,
            payload.date.unwrap_or_else(today),
            payload.delivery_date,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn convert_to_invoice(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<ConvertRequest>>,
) -> Result<(StatusCode, Json<DocumentDetail<Invoice>>), AppError> {
    tenant.require(&[Permission::QuotationRead, Permission::InvoiceWrite])?;
    let Json(payload) = payload.unwrap_or_default();

    let invoice = state
        .db
        .convert_quotation_to_invoice(
            tenant.organization_id,
            id,
            tenant.user_id,
            payload.date.unwrap_or_else(today),
            payload.due_date,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}
