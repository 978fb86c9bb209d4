//! Organizations, users, clients and projects.

use super::database::{dependent_rows, Database};
use crate::models::{
    Client, CreateClient, CreateOrganization, CreateProject, CreateUser, Organization,
    PageRequest, PlanLimit, Project, UpdateClient, UpdateOrganization, UpdateProject,
    UpdateUser, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ORGANIZATION_COLUMNS: &str = "id, name, slug, email, phone, address, plan, max_users, \
     max_projects, is_active, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, organization_id, email, full_name, role, is_active, created_at, updated_at";
const CLIENT_COLUMNS: &str =
    "id, organization_id, name, email, phone, company, address, notes, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, organization_id, client_id, name, description, status, \
     start_date, end_date, budget, created_at, updated_at";

/// Rows removed by [`Database::clear_organization_data`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ClearedRows {
    pub tickets: u64,
    pub invoices: u64,
    pub orders: u64,
    pub quotations: u64,
    pub projects: u64,
    pub clients: u64,
}

impl Database {
    // -------------------------------------------------------------------------
    // Organization Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_organization(
        &self,
        input: &CreateOrganization,
    ) -> Result<Organization, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_organization"])
            .start_timer();

        let organization = sqlx::query_as::<_, Organization>(&format!(
            r#"
            INSERT INTO organizations (id, name, slug, email, phone, address, plan, max_users, max_projects)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.plan)
        .bind(input.max_users)
        .bind(input.max_projects)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        info!(organization_id = %organization.id, "Organization created");

        Ok(organization)
    }

    #[instrument(skip(self), fields(organization_id = %id))]
    pub async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_organization"])
            .start_timer();

        let organization = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(organization)
    }

    #[instrument(skip(self))]
    pub async fn list_organizations(
        &self,
        page: &PageRequest,
    ) -> Result<(Vec<Organization>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_organizations"])
            .start_timer();

        let organizations = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations ORDER BY {} LIMIT $1 OFFSET $2",
            page.order_by()
        ))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();

        Ok((organizations, total))
    }

    #[instrument(skip(self, input), fields(organization_id = %id))]
    pub async fn update_organization(
        &self,
        id: Uuid,
        input: &UpdateOrganization,
    ) -> Result<Option<Organization>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_organization"])
            .start_timer();

        let organization = sqlx::query_as::<_, Organization>(&format!(
            r#"
            UPDATE organizations SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                plan = COALESCE($6, plan),
                max_users = COALESCE($7, max_users),
                max_projects = COALESCE($8, max_projects),
                is_active = COALESCE($9, is_active)
            WHERE id = $1
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.plan)
        .bind(input.max_users)
        .bind(input.max_projects)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(organization)
    }

    /// Delete every client, project, document and ticket of an organization.
    /// The organization and its users are kept.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn clear_organization_data(
        &self,
        organization_id: Uuid,
    ) -> Result<ClearedRows, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["clear_organization_data"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let mut cleared = ClearedRows::default();

        // Children before parents; line items go with their documents.
        for (table, counter) in [
            ("tickets", &mut cleared.tickets),
            ("invoices", &mut cleared.invoices),
            ("orders", &mut cleared.orders),
            ("quotations", &mut cleared.quotations),
            ("projects", &mut cleared.projects),
            ("clients", &mut cleared.clients),
        ] {
            *counter = sqlx::query(&format!("DELETE FROM {table} WHERE organization_id = $1"))
                .bind(organization_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        sqlx::query("DELETE FROM document_sequences WHERE organization_id = $1")
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.observe_duration();

        warn!(?cleared, "Organization data cleared");

        Ok(cleared)
    }

    /// Lock the organization row and fail with a conflict when one more row
    /// of `limit` would exceed the plan.
    async fn ensure_plan_allows(
        conn: &mut PgConnection,
        organization_id: Uuid,
        limit: PlanLimit,
    ) -> Result<(), AppError> {
        let organization = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1 FOR UPDATE"
        ))
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Organization"))?;

        let count_sql = match limit {
            PlanLimit::Users => {
                "SELECT COUNT(*) FROM users WHERE organization_id = $1 AND is_active"
            }
            PlanLimit::Projects => "SELECT COUNT(*) FROM projects WHERE organization_id = $1",
        };
        let current: i64 = sqlx::query_scalar(count_sql)
            .bind(organization_id)
            .fetch_one(&mut *conn)
            .await?;

        if !organization.allows_another(limit, current) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Plan limit reached: organization allows at most {} {}s",
                organization.limit(limit).unwrap_or_default(),
                limit.label()
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(organization_id = ?input.organization_id))]
    pub async fn create_user(
        &self,
        input: &CreateUser,
        enforce_plan_limits: bool,
    ) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        if let (Some(organization_id), true) = (input.organization_id, enforce_plan_limits) {
            Self::ensure_plan_allows(&mut *tx, organization_id, PlanLimit::Users).await?;
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, organization_id, email, full_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.email.to_lowercase())
        .bind(&input.full_name)
        .bind(input.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Email '{}' is already registered", input.email))
            }
            other => AppError::from(other),
        })?;

        tx.commit().await?;
        timer.observe_duration();

        info!(user_id = %user.id, role = %user.role, "User created");

        Ok(user)
    }

    /// Fetch a user scoped to an organization; `None` scope means any user
    /// (super-admin lookups only).
    #[instrument(skip(self))]
    pub async fn get_user(
        &self,
        organization_id: Option<Uuid>,
        id: Uuid,
    ) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE id = $1 AND ($2::uuid IS NULL OR organization_id = $2)
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_users(
        &self,
        organization_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<User>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_users"])
            .start_timer();

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE organization_id = $1
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            page.order_by()
        ))
        .bind(organization_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();

        Ok((users, total))
    }

    /// Reactivating a user counts against the plan like creating one.
    #[instrument(skip(self, input), fields(organization_id = %organization_id, user_id = %id))]
    pub async fn update_user(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: &UpdateUser,
        enforce_plan_limits: bool,
    ) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_user"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        if input.is_active == Some(true) && enforce_plan_limits {
            let currently_active: Option<bool> = sqlx::query_scalar(
                "SELECT is_active FROM users WHERE id = $1 AND organization_id = $2",
            )
            .bind(id)
            .bind(organization_id)
            .fetch_optional(&mut *tx)
            .await?;
            if currently_active == Some(false) {
                Self::ensure_plan_allows(&mut *tx, organization_id, PlanLimit::Users).await?;
            }
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                full_name = COALESCE($3, full_name),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active)
            WHERE id = $1 AND organization_id = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .bind(&input.full_name)
        .bind(input.role.map(|r| r.as_str()))
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        Ok(user)
    }

    /// Users are deactivated rather than removed; documents keep pointing at
    /// their creator.
    #[instrument(skip(self), fields(organization_id = %organization_id, user_id = %id))]
    pub async fn deactivate_user(&self, organization_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_user"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE users SET is_active = FALSE WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .execute(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (id, organization_id, name, email, phone, company, address, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        info!(client_id = %client.id, "Client created");

        Ok(client)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, client_id = %id))]
    pub async fn get_client(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(client)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_clients(
        &self,
        organization_id: Uuid,
        search: Option<&str>,
        page: &PageRequest,
    ) -> Result<(Vec<Client>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let pattern = search.map(|s| format!("%{}%", s.trim()));

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS} FROM clients
            WHERE organization_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR company ILIKE $2 OR email ILIKE $2)
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            page.order_by()
        ))
        .bind(organization_id)
        .bind(&pattern)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM clients
            WHERE organization_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR company ILIKE $2 OR email ILIKE $2)
            "#,
        )
        .bind(organization_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok((clients, total))
    }

    #[instrument(skip(self, input), fields(organization_id = %organization_id, client_id = %id))]
    pub async fn update_client(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                address = COALESCE($7, address),
                notes = COALESCE($8, notes)
            WHERE id = $1 AND organization_id = $2
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(client)
    }

    /// Fails with a conflict while documents still reference the client.
    #[instrument(skip(self), fields(organization_id = %organization_id, client_id = %id))]
    pub async fn delete_client(&self, organization_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| dependent_rows(e, "Client"))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Project Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_project(
        &self,
        input: &CreateProject,
        enforce_plan_limits: bool,
    ) -> Result<Project, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_project"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        if enforce_plan_limits {
            Self::ensure_plan_allows(&mut *tx, input.organization_id, PlanLimit::Projects).await?;
        }

        if !Self::client_in_organization(&mut *tx, input.organization_id, input.client_id).await? {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Client does not belong to this organization"
            )));
        }

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (id, organization_id, client_id, name, description, status,
                                  start_date, end_date, budget)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.status.as_str())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(project_id = %project.id, "Project created");

        Ok(project)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, project_id = %id))]
    pub async fn get_project(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(project)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_projects(
        &self,
        organization_id: Uuid,
        client_id: Option<Uuid>,
        status: Option<&str>,
        page: &PageRequest,
    ) -> Result<(Vec<Project>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_projects"])
            .start_timer();

        let projects = sqlx::query_as::<_, Project>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS} FROM projects
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY {}
            LIMIT $4 OFFSET $5
            "#,
            page.order_by()
        ))
        .bind(organization_id)
        .bind(client_id)
        .bind(status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM projects
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(organization_id)
        .bind(client_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        Ok((projects, total))
    }

    #[instrument(skip(self, input), fields(organization_id = %organization_id, project_id = %id))]
    pub async fn update_project(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: &UpdateProject,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            UPDATE projects SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date),
                budget = COALESCE($8, budget)
            WHERE id = $1 AND organization_id = $2
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(project)
    }

    /// Documents referencing the project keep existing with `project_id` unset.
    #[instrument(skip(self), fields(organization_id = %organization_id, project_id = %id))]
    pub async fn delete_project(&self, organization_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_project"])
            .start_timer();

        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| dependent_rows(e, "Project"))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn client_in_organization(
        conn: &mut PgConnection,
        organization_id: Uuid,
        client_id: Uuid,
    ) -> Result<bool, AppError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1 AND organization_id = $2)",
        )
        .bind(client_id)
        .bind(organization_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(found)
    }

    pub(super) async fn project_in_organization(
        conn: &mut PgConnection,
        organization_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, AppError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1 AND organization_id = $2)",
        )
        .bind(project_id)
        .bind(organization_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(found)
    }

    pub(super) async fn active_user_in_organization(
        conn: &mut PgConnection,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE id = $1 AND organization_id = $2 AND is_active
            "#
        ))
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }
}
