use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::MeResponse;
use crate::middleware::AuthUser;
use crate::startup::AppState;

/// Profile of the caller with the permission keys their role grants.
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .db
        .get_user(None, claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("User is no longer active")))?;

    let organization = match user.organization_id {
        Some(id) => state.db.get_organization(id).await?,
        None => None,
    };

    Ok(Json(MeResponse {
        user,
        organization,
        permissions: MeResponse::permission_keys(claims.role.permissions()),
    }))
}
