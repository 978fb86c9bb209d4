use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{page_request, parse_status};
use crate::domain::{Permission, ProjectStatus};
use crate::dtos::{CreateProjectRequest, ListQuery, UpdateProjectRequest};
use crate::middleware::TenantContext;
use crate::models::{CreateProject, Paginated, Project, UpdateProject};
use crate::startup::AppState;

const SORTABLE: &[&str] = &["created_at", "name", "status", "start_date", "end_date", "budget"];

fn check_dates(
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) -> Result<(), AppError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(AppError::validation(
            "end_date",
            "before_start",
            "End date cannot be before start date",
        )),
        _ => Ok(()),
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Project>>, AppError> {
    tenant.require(&[Permission::ProjectRead])?;
    let page = page_request(&query, SORTABLE)?;
    let status = parse_status::<ProjectStatus>(query.status.as_deref())?;

    let (projects, total) = state
        .db
        .list_projects(
            tenant.organization_id,
            query.client_id,
            status.map(|s| s.as_str()),
            &page,
        )
        .await?;
    Ok(Json(Paginated::new(projects, &page, total)))
}

#[tracing::instrument(skip_all, fields(organization_id = %tenant.organization_id))]
pub async fn create_project(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    tenant.require(&[Permission::ProjectWrite])?;
    payload.validate()?;
    check_dates(payload.start_date, payload.end_date)?;
    let status = parse_status::<ProjectStatus>(payload.status.as_deref())?
        .unwrap_or(ProjectStatus::Planning);

    let project = state
        .db
        .create_project(
            &CreateProject {
                organization_id: tenant.organization_id,
                client_id: payload.client_id,
                name: payload.name,
                description: payload.description,
                status,
                start_date: payload.start_date,
                end_date: payload.end_date,
                budget: payload.budget,
            },
            state.config.policy.enforce_plan_limits,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    tenant.require(&[Permission::ProjectRead])?;

    let project = state
        .db
        .get_project(tenant.organization_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))?;

    Ok(Json(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    tenant.require(&[Permission::ProjectWrite])?;
    payload.validate()?;
    check_dates(payload.start_date, payload.end_date)?;
    let status = parse_status::<ProjectStatus>(payload.status.as_deref())?;

    let project = state
        .db
        .update_project(
            tenant.organization_id,
            id,
            &UpdateProject {
                name: payload.name,
                description: payload.description,
                status,
                start_date: payload.start_date,
                end_date: payload.end_date,
                budget: payload.budget,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found("Project"))?;

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    tenant.require(&[Permission::ProjectWrite])?;

    if !state.db.delete_project(tenant.organization_id, id).await? {
        return Err(AppError::not_found("Project"));
    }

    Ok(StatusCode::NO_CONTENT)
}
