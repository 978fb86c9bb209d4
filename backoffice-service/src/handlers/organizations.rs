//! Organization handlers. Super-admins manage every organization; other
//! users only see their own.

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
use crate::dtos::{CreateOrganizationRequest, ListQuery, UpdateOrganizationRequest};
use crate::middleware::auth::{require_permissions, AuthUser};
use crate::models::{
    CreateOrganization, Organization, PageRequest, Paginated, UpdateOrganization,
};
use crate::startup::AppState;

const SORTABLE: &[&str] = &["created_at", "name", "slug", "plan"];

pub async fn list_organizations(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Organization>>, AppError> {
    require_permissions(claims.role, &[Permission::OrganizationRead])?;
    let page = page_request(&query, SORTABLE)?;

    if claims.role.is_super_admin() {
        let (organizations, total) = state.db.list_organizations(&page).await?;
        return Ok(Json(Paginated::new(organizations, &page, total)));
    }

    let own = match claims.org {
        Some(id) => state.db.get_organization(id).await?,
        None => None,
    };
    let organizations: Vec<Organization> = own.into_iter().collect();
    let total = organizations.len() as i64;
    Ok(Json(Paginated::new(organizations, &PageRequest { page: 1, ..page }, total)))
}

pub async fn create_organization(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    require_permissions(claims.role, &[Permission::OrganizationManage])?;
    payload.validate()?;

    let organization = state
        .db
        .create_organization(&CreateOrganization {
            name: payload.name,
            slug: payload.slug,
            email: payload.email,
            phone: payload.phone,
            address: payload.address,
            plan: payload.plan.unwrap_or_else(|| "basic".to_string()),
            max_users: payload.max_users,
            max_projects: payload.max_projects,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(organization)))
}

pub async fn get_organization(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>, AppError> {
    require_permissions(claims.role, &[Permission::OrganizationRead])?;
    if !claims.role.is_super_admin() && claims.org != Some(id) {
        return Err(AppError::not_found("Organization"));
    }

    let organization = state
        .db
        .get_organization(id)
        .await?
        .ok_or_else(|| AppError::not_found("Organization"))?;

    Ok(Json(organization))
}

pub async fn update_organization(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, AppError> {
    require_permissions(claims.role, &[Permission::OrganizationManage])?;
    payload.validate()?;

    let organization = state
        .db
        .update_organization(
            id,
            &UpdateOrganization {
                name: payload.name,
                email: payload.email,
                phone: payload.phone,
                address: payload.address,
                plan: payload.plan,
                max_users: payload.max_users,
                max_projects: payload.max_projects,
                is_active: payload.is_active,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Organization"))?;

    tracing::info!(organization_id = %id, "Organization updated");

    Ok(Json(organization))
}
