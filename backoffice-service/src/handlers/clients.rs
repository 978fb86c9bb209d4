use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::page_request;
use crate::domain::Permission;
use crate::dtos::{ClientRequest, ListQuery, UpdateClientRequest};
use crate::middleware::TenantContext;
use crate::models::{Client, CreateClient, Paginated, UpdateClient};
use crate::startup::AppState;

const SORTABLE: &[&str] = &["created_at", "updated_at", "name", "company", "email"];

pub async fn list_clients(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Client>>, AppError> {
    tenant.require(&[Permission::ClientRead])?;
    let page = page_request(&query, SORTABLE)?;

    let (clients, total) = state
        .db
        .list_clients(tenant.organization_id, query.search.as_deref(), &page)
        .await?;
    Ok(Json(Paginated::new(clients, &page, total)))
}

pub async fn create_client(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<ClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    tenant.require(&[Permission::ClientWrite])?;
    payload.validate()?;

    let client = state
        .db
        .create_client(&CreateClient {
            organization_id: tenant.organization_id,
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
            company: payload.company,
            address: payload.address,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    tenant.require(&[Permission::ClientRead])?;

    let client = state
        .db
        .get_client(tenant.organization_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Client"))?;

    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    tenant.require(&[Permission::ClientWrite])?;
    payload.validate()?;

    let client = state
        .db
        .update_client(
            tenant.organization_id,
            id,
            &UpdateClient {
                name: payload.name,
                email: payload.email,
                phone: payload.phone,
                company: payload.company,
                address: payload.address,
                notes: payload.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Client"))?;

    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.require(&[Permission::ClientWrite])?;

    if !state.db.delete_client(tenant.organization_id, id).await? {
        return Err(AppError::not_found("Client"));
    }

    Ok(StatusCode::NO_CONTENT)
}
