//! Support tickets.

use super::database::Database;
use super::quotations::guarded;
use crate::domain::lifecycle;
use crate::domain::{TicketStatus, TransitionError};
use crate::models::{CreateTicket, PageRequest, Ticket, TicketFilter, UpdateTicket};
use crate::services::metrics::{record_transition, DB_QUERY_DURATION};
use chrono::Utc;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

const TICKET_COLUMNS: &str = "id, organization_id, client_id, project_id, ticket_number, \
     subject, description, priority, status, assigned_to, created_by, resolved_at, created_at, \
     updated_at";

const TICKET_PREFIX: &str = "TCK";

impl Database {
    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_ticket(&self, input: &CreateTicket) -> Result<Ticket, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_ticket"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        if let Some(client_id) = input.client_id {
            let resolved = Self::references_resolve(
                &mut *tx,
                input.organization_id,
                client_id,
                input.project_id,
            )
            .await?;
            if !resolved {
                return Err(TransitionError::UnresolvedReference.into());
            }
        } else if let Some(project_id) = input.project_id {
            if !Self::project_in_organization(&mut *tx, input.organization_id, project_id).await? {
                return Err(TransitionError::UnresolvedReference.into());
            }
        }
        if let Some(assignee) = input.assigned_to {
            Self::ensure_assignable(&mut *tx, input.organization_id, assignee).await?;
        }

        let number = Self::next_number(
            &mut *tx,
            input.organization_id,
            TICKET_PREFIX,
            Utc::now().date_naive(),
        )
        .await?;

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            INSERT INTO tickets (id, organization_id, client_id, project_id, ticket_number,
                                 subject, description, priority, status, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'open', $9, $10)
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&number)
        .bind(&input.subject)
        .bind(&input.description)
        .bind(input.priority.as_str())
        .bind(input.assigned_to)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(ticket_id = %ticket.id, ticket_number = %ticket.ticket_number, "Ticket created");

        Ok(ticket)
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, ticket_id = %id))]
    pub async fn get_ticket(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Ticket>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_ticket"])
            .start_timer();

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(ticket)
    }

    #[instrument(skip(self, filter), fields(organization_id = %organization_id))]
    pub async fn list_tickets(
        &self,
        organization_id: Uuid,
        filter: &TicketFilter,
        page: &PageRequest,
    ) -> Result<(Vec<Ticket>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tickets"])
            .start_timer();

        let status = filter.status.map(|s| s.as_str());
        let priority = filter.priority.map(|p| p.as_str());
        let conditions = r#"
            organization_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR priority = $3)
              AND ($4::uuid IS NULL OR assigned_to = $4)
        "#;

        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE {conditions} ORDER BY {} LIMIT $5 OFFSET $6",
            page.order_by()
        ))
        .bind(organization_id)
        .bind(status)
        .bind(priority)
        .bind(filter.assigned_to)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM tickets WHERE {conditions}"))
                .bind(organization_id)
                .bind(status)
                .bind(priority)
                .bind(filter.assigned_to)
                .fetch_one(&self.pool)
                .await?;

        timer.observe_duration();

        Ok((tickets, total))
    }

    #[instrument(skip(self, input), fields(organization_id = %organization_id, ticket_id = %id))]
    pub async fn update_ticket(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: &UpdateTicket,
    ) -> Result<Option<Ticket>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_ticket"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        if let Some(assignee) = input.assigned_to {
            Self::ensure_assignable(&mut *tx, organization_id, assignee).await?;
        }

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets SET
                subject = COALESCE($3, subject),
                description = COALESCE($4, description),
                priority = COALESCE($5, priority),
                assigned_to = COALESCE($6, assigned_to)
            WHERE id = $1 AND organization_id = $2
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .bind(&input.subject)
        .bind(&input.description)
        .bind(input.priority.map(|p| p.as_str()))
        .bind(input.assigned_to)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        Ok(ticket)
    }

    /// Reaching `resolved` stamps `resolved_at`; reopening clears it.
    #[instrument(skip(self), fields(organization_id = %organization_id, ticket_id = %id))]
    pub async fn transition_ticket_status(
        &self,
        organization_id: Uuid,
        id: Uuid,
        target: TicketStatus,
    ) -> Result<Ticket, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_ticket_status"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let current: String = sqlx::query_scalar(
            "SELECT status FROM tickets WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))?;
        let current: TicketStatus = current.parse()?;
        let next = lifecycle::transition_ticket(current, target)?;

        let ticket = guarded(
            sqlx::query_as::<_, Ticket>(&format!(
                r#"
                UPDATE tickets SET
                    status = $3,
                    resolved_at = CASE
                        WHEN $3 = 'resolved' THEN NOW()
                        WHEN $3 = 'open' THEN NULL
                        ELSE resolved_at
                    END
                WHERE id = $1 AND organization_id = $2 AND status = $4
                RETURNING {TICKET_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(organization_id)
            .bind(next.as_str())
            .bind(current.as_str())
            .fetch_optional(&mut *tx)
            .await?,
        )?;

        tx.commit().await?;
        timer.observe_duration();

        record_transition("ticket", next.as_str());
        info!(from = %current, to = %next, "Ticket transitioned");

        Ok(ticket)
    }

    async fn ensure_assignable(
        conn: &mut PgConnection,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        match Self::active_user_in_organization(conn, organization_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::validation(
                "assigned_to",
                "unknown_user",
                "Assignee is not an active member of this organization",
            )),
        }
    }
}
