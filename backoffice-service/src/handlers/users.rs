use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::page_request;
use crate::domain::{Permission, Role};
use crate::dtos::{CreateUserRequest, ListQuery, UpdateUserRequest};
use crate::middleware::TenantContext;
use crate::models::{CreateUser, Paginated, UpdateUser, User};
use crate::startup::AppState;

const SORTABLE: &[&str] = &["created_at", "email", "full_name", "role"];

/// Parse a requested role; only super-admins may hand out super-admin.
fn assignable_role(tenant: &TenantContext, raw: &str) -> Result<Role, AppError> {
    let role: Role = raw
        .parse()
        .map_err(|message: String| AppError::validation("role", "unknown", message))?;
    if role.is_super_admin() && !tenant.role.is_super_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Only super-admins can grant the super_admin role"
        )));
    }
    Ok(role)
}

pub async fn list_users(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<User>>, AppError> {
    tenant.require(&[Permission::UserRead])?;
    let page = page_request(&query, SORTABLE)?;

    let (users, total) = state.db.list_users(tenant.organization_id, &page).await?;
    Ok(Json(Paginated::new(users, &page, total)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id))]
pub async fn create_user(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    tenant.require(&[Permission::UserManage])?;
    payload.validate()?;
    let role = assignable_role(&tenant, &payload.role)?;

    let user = state
        .db
        .create_user(
            &CreateUser {
                organization_id: Some(tenant.organization_id),
                email: payload.email,
                full_name: payload.full_name,
                role,
            },
            state.config.policy.enforce_plan_limits,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    tenant.require(&[Permission::UserRead])?;

    let user = state
        .db
        .get_user(Some(tenant.organization_id), id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(user))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    tenant.require(&[Permission::UserManage])?;
    payload.validate()?;
    let role = payload
        .role
        .as_deref()
        .map(|raw| assignable_role(&tenant, raw))
        .transpose()?;

    let user = state
        .db
        .update_user(
            tenant.organization_id,
            id,
            &UpdateUser {
                full_name: payload.full_name,
                role,
                is_active: payload.is_active,
            },
            state.config.policy.enforce_plan_limits,
        )
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(user))
}

/// Deactivates the user.
#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id, id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.require(&[Permission::UserManage])?;
    if id == tenant.user_id {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Users cannot deactivate themselves"
        )));
    }

    if !state.db.deactivate_user(tenant.organization_id, id).await? {
        return Err(AppError::not_found("User"));
    }

    tracing::info!(user_id = %id, "User deactivated");

    Ok(StatusCode::NO_CONTENT)
}
