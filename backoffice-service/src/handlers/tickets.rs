use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{page_request, parse_status};
use crate::domain::{Permission, TicketStatus};
use crate::dtos::{CreateTicketRequest, ListQuery, StatusRequest, UpdateTicketRequest};
use crate::middleware::TenantContext;
use crate::models::{CreateTicket, Paginated, Ticket, TicketFilter, TicketPriority, UpdateTicket};
use crate::startup::AppState;

const SORTABLE: &[&str] = &["created_at", "updated_at", "ticket_number", "priority", "status"];

pub async fn list_tickets(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Ticket>>, AppError> {
    tenant.require(&[Permission::TicketRead])?;
    let page = page_request(&query, SORTABLE)?;
    let priority = query
        .priority
        .as_deref()
        .map(str::parse::<TicketPriority>)
        .transpose()
        .map_err(|message| AppError::validation("priority", "unknown", message))?;
    let filter = TicketFilter {
        status: parse_status::<TicketStatus>(query.status.as_deref())?,
        priority,
        assigned_to: query.assigned_to,
    };

    let (tickets, total) = state
        .db
        .list_tickets(tenant.organization_id, &filter, &page)
        .await?;
    Ok(Json(Paginated::new(tickets, &page, total)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id))]
pub async fn create_ticket(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    tenant.require(&[Permission::TicketWrite])?;
    payload.validate()?;

    let ticket = state
        .db
        .create_ticket(&CreateTicket {
            organization_id: tenant.organization_id,
            client_id: payload.client_id,
            project_id: payload.project_id,
            subject: payload.subject,
            description: payload.description,
            priority: payload.priority.unwrap_or(TicketPriority::Medium),
            assigned_to: payload.assigned_to,
            created_by: tenant.user_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    tenant.require(&[Permission::TicketRead])?;

    let ticket = state
        .db
        .get_ticket(tenant.organization_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))?;

    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, AppError> {
    tenant.require(&[Permission::TicketWrite])?;
    payload.validate()?;

    let ticket = state
        .db
        .update_ticket(
            tenant.organization_id,
            id,
            &UpdateTicket {
                subject: payload.subject,
                description: payload.description,
                priority: payload.priority,
                assigned_to: payload.assigned_to,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))?;

    Ok(Json(ticket))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn update_ticket_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Ticket>, AppError> {
    tenant.require(&[Permission::TicketWrite])?;
    let target: TicketStatus = payload.status.parse()?;

    let ticket = state
        .db
        .transition_ticket_status(tenant.organization_id, id, target)
        .await?;

    Ok(Json(ticket))
}
