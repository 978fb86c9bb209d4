//! Quotation persistence and lifecycle transitions.

use super::database::Database;
use super::documents::price;
use crate::domain::lifecycle::{self, ApprovalPolicy};
use crate::domain::{Permission, QuotationStatus, Rates, TransitionError};
use crate::models::{
    CreateInvoice, CreateOrder, CreateQuotation, DocumentDetail, DocumentKind,
    FinancialDocument, Invoice, NewLineItem, Order, PageRequest, Quotation, QuotationFilter,
    UpdateQuotation,
};
use crate::services::metrics::{
    record_transition, DB_QUERY_DURATION, DOCUMENTS_TOTAL, TRANSITIONS_TOTAL,
};
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

const QUOTATION_COLUMNS: &str = "id, organization_id, client_id, project_id, quotation_number, \
     title, status, currency, issue_date, valid_until, tax_rate, discount_percentage, subtotal, \
     tax_amount, discount_amount, total_amount, notes, terms, created_by, approved_by, \
     approved_at, rejection_reason, sent_at, created_at, updated_at";

const KIND: DocumentKind = DocumentKind::Quotation;

impl Database {
    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_quotation(
        &self,
        input: &CreateQuotation,
    ) -> Result<DocumentDetail<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_quotation"])
            .start_timer();

        let (line_totals, totals) = price(&input.items, &input.rates, input.currency)?;

        let mut tx = self.pool.begin().await?;

        if !Self::references_resolve(
            &mut *tx,
            input.organization_id,
            input.client_id,
            input.project_id,
        )
        .await?
        {
            return Err(TransitionError::UnresolvedReference.into());
        }

        let number = Self::next_number(
            &mut *tx,
            input.organization_id,
            KIND.number_prefix(),
            input.issue_date,
        )
        .await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            INSERT INTO quotations (id, organization_id, client_id, project_id, quotation_number,
                                    title, status, currency, issue_date, valid_until, tax_rate,
                                    discount_percentage, subtotal, tax_amount, discount_amount,
                                    total_amount, notes, terms, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18)
            RETURNING {QUOTATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&number)
        .bind(&input.title)
        .bind(input.currency.code())
        .bind(input.issue_date)
        .bind(input.valid_until)
        .bind(input.rates.tax_rate)
        .bind(input.rates.discount_percentage)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.discount_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .bind(&input.terms)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await?
        .with_currency_scale();

        let items = Self::insert_items(
            &mut *tx,
            KIND,
            input.organization_id,
            quotation.id,
            &input.items,
            &line_totals,
        )
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        DOCUMENTS_TOTAL.with_label_values(&["quotation"]).inc();
        info!(
            quotation_id = %quotation.id,
            quotation_number = %quotation.quotation_number,
            total_amount = %quotation.total_amount,
            "Quotation created"
        );

        Ok(DocumentDetail {
            document: quotation,
            items,
        })
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn get_quotation(
        &self,
        organization_id: Uuid,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<DocumentDetail<Quotation>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_quotation"])
            .start_timer();

        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            UPDATE quotations SET status = 'expired'
            WHERE id = $1 AND organization_id = $2
              AND status IN ('draft', 'sent') AND valid_until < $3
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(today)
        .execute(&mut *conn)
        .await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale);

        let detail = match quotation {
            Some(quotation) => {
                let items = Self::fetch_items(&mut *conn, KIND, organization_id, id).await?;
                Some(DocumentDetail {
                    document: quotation,
                    items,
                })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self, filter), fields(organization_id = %organization_id))]
    pub async fn list_quotations(
        &self,
        organization_id: Uuid,
        filter: &QuotationFilter,
        page: &PageRequest,
        today: NaiveDate,
    ) -> Result<(Vec<Quotation>, i64), AppError> {
        self.expire_due_quotations(Some(organization_id), today)
            .await?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_quotations"])
            .start_timer();

        let status = filter.status.map(|s| s.as_str());
        let pattern = filter.search.as_deref().map(|s| format!("%{}%", s.trim()));
        let conditions = r#"
            organization_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR client_id = $3)
              AND ($4::uuid IS NULL OR project_id = $4)
              AND ($5::text IS NULL OR title ILIKE $5 OR quotation_number ILIKE $5)
        "#;

        let quotations: Vec<Quotation> = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE {conditions} ORDER BY {} LIMIT $6 OFFSET $7",
            page.order_by()
        ))
        .bind(organization_id)
        .bind(status)
        .bind(filter.client_id)
        .bind(filter.project_id)
        .bind(&pattern)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(FinancialDocument::with_currency_scale)
        .collect();

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM quotations WHERE {conditions}"))
                .bind(organization_id)
                .bind(status)
                .bind(filter.client_id)
                .bind(filter.project_id)
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        timer.observe_duration();

        Ok((quotations, total))
    }

    /// Edit a draft quotation. Totals are recomputed from the stored items so
    /// rate and currency changes take effect immediately.
    #[instrument(skip(self, input), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn update_quotation(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: &UpdateQuotation,
        today: NaiveDate,
    ) -> Result<DocumentDetail<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quotation"])
            .start_timer();

        let (mut tx, quotation, current) = self.load_for_transition(organization_id, id, today).await?;
        ensure_editable(current)?;

        if let Some(project_id) = input.project_id {
            if !Self::project_in_organization(&mut *tx, organization_id, project_id).await? {
                return Err(TransitionError::UnresolvedReference.into());
            }
        }

        let currency = match input.currency {
            Some(currency) => currency,
            None => quotation.currency()?,
        };
        let rates = Rates::new(
            input.tax_rate.unwrap_or(quotation.tax_rate),
            input
                .discount_percentage
                .unwrap_or(quotation.discount_percentage),
        )?;

        sqlx::query(
            r#"
            UPDATE quotations SET
                title = COALESCE($3, title),
                project_id = COALESCE($4, project_id),
                valid_until = COALESCE($5, valid_until),
                notes = COALESCE($6, notes),
                terms = COALESCE($7, terms)
            WHERE id = $1 AND organization_id = $2 AND status = 'draft'
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&input.title)
        .bind(input.project_id)
        .bind(input.valid_until)
        .bind(&input.notes)
        .bind(&input.terms)
        .execute(&mut *tx)
        .await?;

        let existing = Self::fetch_items(&mut *tx, KIND, organization_id, id).await?;
        let items: Vec<NewLineItem> = existing.iter().map(NewLineItem::from).collect();
        let (_, items) =
            Self::replace_items(&mut *tx, KIND, organization_id, id, currency, &rates, &items)
                .await?;

        let quotation = Self::fetch_quotation(&mut *tx, organization_id, id).await?;
        tx.commit().await?;
        timer.observe_duration();

        Ok(DocumentDetail {
            document: quotation,
            items,
        })
    }

    /// Replace every line item of a draft quotation in one transaction.
    #[instrument(skip(self, items), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn replace_quotation_items(
        &self,
        organization_id: Uuid,
        id: Uuid,
        items: &[NewLineItem],
        today: NaiveDate,
    ) -> Result<DocumentDetail<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_quotation_items"])
            .start_timer();

        let (mut tx, quotation, current) = self.load_for_transition(organization_id, id, today).await?;
        ensure_editable(current)?;

        let (_, items) = Self::replace_items(
            &mut *tx,
            KIND,
            organization_id,
            id,
            quotation.currency()?,
            &quotation.rates(),
            items,
        )
        .await?;

        let quotation = Self::fetch_quotation(&mut *tx, organization_id, id).await?;
        tx.commit().await?;
        timer.observe_duration();

        Ok(DocumentDetail {
            document: quotation,
            items,
        })
    }

    /// Delete a draft quotation and, by cascade, its items.
    #[instrument(skip(self), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn delete_quotation(&self, organization_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_quotation"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        Self::delete_document_in_status(
            &mut *tx,
            KIND,
            organization_id,
            id,
            QuotationStatus::Draft.as_str(),
        )
        .await?;
        tx.commit().await?;
        timer.observe_duration();

        info!("Quotation deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn send_quotation(
        &self,
        organization_id: Uuid,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<Quotation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["send_quotation"])
            .start_timer();

        let (mut tx, quotation, current) = self.load_for_transition(organization_id, id, today).await?;

        let items = Self::fetch_items(&mut *tx, KIND, organization_id, id).await?;
        let resolved = Self::references_resolve(
            &mut *tx,
            organization_id,
            quotation.client_id,
            quotation.project_id,
        )
        .await?;
        let next = lifecycle::send_quotation(current, items.len(), resolved)?;

        let quotation = guarded(
            sqlx::query_as::<_, Quotation>(&format!(
                r#"
                UPDATE quotations SET status = $3, sent_at = NOW()
                WHERE id = $1 AND organization_id = $2 AND status = $4
                RETURNING {QUOTATION_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(organization_id)
            .bind(next.as_str())
            .bind(current.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(FinancialDocument::with_currency_scale),
        )?;

        tx.commit().await?;
        timer.observe_duration();

        record_transition("quotation", next.as_str());
        info!(from = %current, to = %next, "Quotation transitioned");

        Ok(quotation)
    }

    /// `sent → approved`. The approver must be the acting user, an active
    /// member of the same organization whose role may approve quotations.
    #[instrument(skip(self), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn approve_quotation(
        &self,
        organization_id: Uuid,
        id: Uuid,
        actor: Uuid,
        approver_id: Option<Uuid>,
        policy: ApprovalPolicy,
        today: NaiveDate,
    ) -> Result<Quotation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["approve_quotation"])
            .start_timer();

        let (mut tx, quotation, current) = self.load_for_transition(organization_id, id, today).await?;

        let next =
            lifecycle::approve_quotation(current, approver_id, quotation.created_by, policy)?;
        let approver_id = approver_id.ok_or(TransitionError::MissingApprover)?;
        if approver_id != actor {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Quotations can only be approved on the approver's own behalf"
            )));
        }

        let approver = Self::active_user_in_organization(&mut *tx, organization_id, approver_id)
            .await?
            .ok_or_else(|| {
                AppError::validation(
                    "approver_id",
                    "unknown_user",
                    "Approver is not an active member of this organization",
                )
            })?;
        if !approver
            .role()
            .is_some_and(|role| role.has(Permission::QuotationApprove))
        {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Approver's role cannot approve quotations"
            )));
        }

        let quotation = guarded(
            sqlx::query_as::<_, Quotation>(&format!(
                r#"
                UPDATE quotations SET status = $3, approved_by = $5, approved_at = NOW()
                WHERE id = $1 AND organization_id = $2 AND status = $4
                RETURNING {QUOTATION_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(organization_id)
            .bind(next.as_str())
            .bind(current.as_str())
            .bind(approver_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(FinancialDocument::with_currency_scale),
        )?;

        tx.commit().await?;
        timer.observe_duration();

        record_transition("quotation", next.as_str());
        info!(approved_by = %approver_id, "Quotation approved");

        Ok(quotation)
    }

    #[instrument(skip(self, reason), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn reject_quotation(
        &self,
        organization_id: Uuid,
        id: Uuid,
        reason: Option<&str>,
        today: NaiveDate,
    ) -> Result<Quotation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reject_quotation"])
            .start_timer();

        let (mut tx, _, current) = self.load_for_transition(organization_id, id, today).await?;
        let next = lifecycle::reject_quotation(current, reason)?;

        let quotation = guarded(
            sqlx::query_as::<_, Quotation>(&format!(
                r#"
                UPDATE quotations SET status = $3, rejection_reason = $5
                WHERE id = $1 AND organization_id = $2 AND status = $4
                RETURNING {QUOTATION_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(organization_id)
            .bind(next.as_str())
            .bind(current.as_str())
            .bind(reason.map(str::trim))
            .fetch_optional(&mut *tx)
            .await?
            .map(FinancialDocument::with_currency_scale),
        )?;

        tx.commit().await?;
        timer.observe_duration();

        record_transition("quotation", next.as_str());
        info!("Quotation rejected");

        Ok(quotation)
    }

    /// Expire every unresolved quotation whose `valid_until` lies before
    /// `today`, for one organization or (with `None`) all of them.
    #[instrument(skip(self))]
    pub async fn expire_due_quotations(
        &self,
        organization_id: Option<Uuid>,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["expire_due_quotations"])
            .start_timer();

        let expired = sqlx::query(
            r#"
            UPDATE quotations SET status = 'expired'
            WHERE ($1::uuid IS NULL OR organization_id = $1)
              AND status IN ('draft', 'sent')
              AND valid_until < $2
            "#,
        )
        .bind(organization_id)
        .bind(today)
        .execute(&self.pool)
        .await?
        .rows_affected();

        timer.observe_duration();

        if expired > 0 {
            TRANSITIONS_TOTAL
                .with_label_values(&["quotation", "expired"])
                .inc_by(expired as f64);
            info!(expired, "Quotations expired");
        }

        Ok(expired)
    }

    /// Create a pending order from an approved quotation. Items, rates,
    /// client and project are copied and totals recomputed.
    #[instrument(skip(self), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn convert_quotation_to_order(
        &self,
        organization_id: Uuid,
        id: Uuid,
        actor: Uuid,
        order_date: NaiveDate,
        delivery_date: Option<NaiveDate>,
    ) -> Result<DocumentDetail<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quotation_to_order"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let quotation = Self::lock_quotation(&mut *tx, organization_id, id).await?;
        lifecycle::ensure_convertible(quotation.status()?)?;

        let items = Self::fetch_items(&mut *tx, KIND, organization_id, id).await?;
        let input = CreateOrder {
            organization_id,
            client_id: quotation.client_id,
            project_id: quotation.project_id,
            quotation_id: Some(quotation.id),
            currency: quotation.currency()?,
            order_date,
            delivery_date,
            rates: quotation.rates(),
            notes: quotation.notes.clone(),
            created_by: actor,
            items: items.iter().map(NewLineItem::from).collect(),
        };
        let order = Self::insert_order(&mut *tx, &input).await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(order_id = %order.document.id, "Quotation converted to order");

        Ok(order)
    }

    /// Create a draft invoice from an approved quotation.
    #[instrument(skip(self), fields(organization_id = %organization_id, quotation_id = %id))]
    pub async fn convert_quotation_to_invoice(
        &self,
        organization_id: Uuid,
        id: Uuid,
        actor: Uuid,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
    ) -> Result<DocumentDetail<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quotation_to_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let quotation = Self::lock_quotation(&mut *tx, organization_id, id).await?;
        lifecycle::ensure_convertible(quotation.status()?)?;

        let items = Self::fetch_items(&mut *tx, KIND, organization_id, id).await?;
        let input = CreateInvoice {
            organization_id,
            client_id: quotation.client_id,
            project_id: quotation.project_id,
            quotation_id: Some(quotation.id),
            order_id: None,
            currency: quotation.currency()?,
            issue_date,
            due_date,
            rates: quotation.rates(),
            notes: quotation.notes.clone(),
            created_by: actor,
            items: items.iter().map(NewLineItem::from).collect(),
        };
        let invoice = Self::insert_invoice(&mut *tx, &input).await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(invoice_id = %invoice.document.id, "Quotation converted to invoice");

        Ok(invoice)
    }

    async fn lock_quotation(
        conn: &mut PgConnection,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Quotation, AppError> {
        sqlx::query_as::<_, Quotation>(&format!(
            r#"
            SELECT {QUOTATION_COLUMNS} FROM quotations
            WHERE id = $1 AND organization_id = $2
            FOR UPDATE
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale)
        .ok_or_else(|| AppError::not_found("Quotation"))
    }

    async fn fetch_quotation(
        conn: &mut PgConnection,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Quotation, AppError> {
        sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale)
        .ok_or_else(|| AppError::not_found("Quotation"))
    }

    /// Open a transaction holding the quotation row lock. A quotation found
    /// past its validity is expired and committed before the caller sees a
    /// conflict.
    async fn load_for_transition(
        &self,
        organization_id: Uuid,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<(Transaction<'static, Postgres>, Quotation, QuotationStatus), AppError> {
        let mut tx = self.pool.begin().await?;
        let quotation = Self::lock_quotation(&mut *tx, organization_id, id).await?;
        let current = quotation.status()?;

        if let Some(expired) = lifecycle::expire_quotation(current, quotation.valid_until, today) {
            sqlx::query(
                "UPDATE quotations SET status = $3 WHERE id = $1 AND organization_id = $2",
            )
            .bind(id)
            .bind(organization_id)
            .bind(expired.as_str())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            record_transition("quotation", expired.as_str());
            let deadline = quotation.valid_until.unwrap_or(today);
            return Err(TransitionError::Expired(deadline).into());
        }

        Ok((tx, quotation, current))
    }
}

fn ensure_editable(current: QuotationStatus) -> Result<(), AppError> {
    if current.is_editable() {
        Ok(())
    } else {
        Err(AppError::Conflict(anyhow::anyhow!(
            "Only draft quotations can be edited (current status '{}')",
            current
        )))
    }
}

/// Result of an `UPDATE ... WHERE status = <expected>`; no row means another
/// writer moved the document first.
pub(super) fn guarded<T>(row: Option<T>) -> Result<T, AppError> {
    row.ok_or_else(|| {
        AppError::Conflict(anyhow::anyhow!(
            "Status changed concurrently; reload and retry"
        ))
    })
}
