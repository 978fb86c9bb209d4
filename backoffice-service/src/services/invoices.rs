//! Invoice persistence and status transitions.

use super::database::{unique_conflict, Database};
use super::documents::price;
use super::quotations::guarded;
use crate::domain::lifecycle;
use crate::domain::{InvoiceStatus, TransitionError};
use crate::models::{
    CreateInvoice, DocumentDetail, DocumentKind, FinancialDocument, Invoice, InvoiceFilter,
    NewLineItem, PageRequest,
};
use crate::services::metrics::{record_transition, DB_QUERY_DURATION, DOCUMENTS_TOTAL};
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "id, organization_id, client_id, project_id, quotation_id, \
     order_id, invoice_number, status, currency, issue_date, due_date, tax_rate, \
     discount_percentage, subtotal, tax_amount, discount_amount, total_amount, notes, paid_at, \
     created_by, created_at, updated_at";

const KIND: DocumentKind = DocumentKind::Invoice;

impl Database {
    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<DocumentDetail<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let invoice = Self::insert_invoice(&mut *tx, input).await?;
        tx.commit().await?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Insert a draft invoice with its items inside the caller's transaction.
    pub(super) async fn insert_invoice(
        conn: &mut PgConnection,
        input: &CreateInvoice,
    ) -> Result<DocumentDetail<Invoice>, AppError> {
        let (line_totals, totals) = price(&input.items, &input.rates, input.currency)?;

        if !Self::references_resolve(conn, input.organization_id, input.client_id, input.project_id)
            .await?
        {
            return Err(TransitionError::UnresolvedReference.into());
        }

        let number = Self::next_number(
            conn,
            input.organization_id,
            KIND.number_prefix(),
            input.issue_date,
        )
        .await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (id, organization_id, client_id, project_id, quotation_id,
                                  order_id, invoice_number, status, currency, issue_date,
                                  due_date, tax_rate, discount_percentage, subtotal, tax_amount,
                                  discount_amount, total_amount, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft', $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(input.quotation_id)
        .bind(input.order_id)
        .bind(&number)
        .bind(input.currency.code())
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.rates.tax_rate)
        .bind(input.rates.discount_percentage)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.discount_amount)
        .bind(totals.total_amount)
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if input.order_id.is_some() {
                unique_conflict(e, "invoices_order_id_active_key", "Order has already been invoiced")
            } else {
                unique_conflict(
                    e,
                    "invoices_quotation_id_active_key",
                    "Quotation has already been invoiced",
                )
            }
        })?
        .with_currency_scale();

        let items = Self::insert_items(
            conn,
            KIND,
            input.organization_id,
            invoice.id,
            &input.items,
            &line_totals,
        )
        .await?;

        DOCUMENTS_TOTAL.with_label_values(&["invoice"]).inc();
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok(DocumentDetail {
            document: invoice,
            items,
        })
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, invoice_id = %id))]
    pub async fn get_invoice(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DocumentDetail<Invoice>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let mut conn = self.pool.acquire().await?;
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale);

        let detail = match invoice {
            Some(invoice) => {
                let items = Self::fetch_items(&mut *conn, KIND, organization_id, id).await?;
                Some(DocumentDetail {
                    document: invoice,
                    items,
                })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self, filter), fields(organization_id = %organization_id))]
    pub async fn list_invoices(
        &self,
        organization_id: Uuid,
        filter: &InvoiceFilter,
        page: &PageRequest,
    ) -> Result<(Vec<Invoice>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let status = filter.status.map(|s| s.as_str());
        let conditions = r#"
            organization_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR client_id = $3)
              AND ($4::uuid IS NULL OR order_id = $4)
        "#;

        let invoices: Vec<Invoice> = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE {conditions} ORDER BY {} LIMIT $5 OFFSET $6",
            page.order_by()
        ))
        .bind(organization_id)
        .bind(status)
        .bind(filter.client_id)
        .bind(filter.order_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(FinancialDocument::with_currency_scale)
        .collect();

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM invoices WHERE {conditions}"))
                .bind(organization_id)
                .bind(status)
                .bind(filter.client_id)
                .bind(filter.order_id)
                .fetch_one(&self.pool)
                .await?;

        timer.observe_duration();

        Ok((invoices, total))
    }

    /// Replace the items of a draft invoice.
    #[instrument(skip(self, items), fields(organization_id = %organization_id, invoice_id = %id))]
    pub async fn replace_invoice_items(
        &self,
        organization_id: Uuid,
        id: Uuid,
        items: &[NewLineItem],
    ) -> Result<DocumentDetail<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_invoice_items"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let invoice = Self::lock_invoice(&mut *tx, organization_id, id).await?;
        let current = invoice.status()?;
        if !current.is_editable() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only draft invoices can be edited (current status '{}')",
                current
            )));
        }

        let (_, items) = Self::replace_items(
            &mut *tx,
            KIND,
            organization_id,
            id,
            invoice.currency()?,
            &invoice.rates(),
            items,
        )
        .await?;

        let invoice = Self::lock_invoice(&mut *tx, organization_id, id).await?;
        tx.commit().await?;
        timer.observe_duration();

        Ok(DocumentDetail {
            document: invoice,
            items,
        })
    }

    /// Move an invoice along its lifecycle; reaching `paid` stamps `paid_at`.
    #[instrument(skip(self), fields(organization_id = %organization_id, invoice_id = %id))]
    pub async fn transition_invoice_status(
        &self,
        organization_id: Uuid,
        id: Uuid,
        target: InvoiceStatus,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_invoice_status"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let invoice = Self::lock_invoice(&mut *tx, organization_id, id).await?;
        let current = invoice.status()?;
        let next = lifecycle::transition_invoice(current, target)?;

        let invoice = guarded(
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                UPDATE invoices SET
                    status = $3,
                    paid_at = CASE WHEN $3 = 'paid' THEN NOW() ELSE paid_at END
                WHERE id = $1 AND organization_id = $2 AND status = $4
                RETURNING {INVOICE_COLUMNS}
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

        record_transition("invoice", next.as_str());
        info!(from = %current, to = %next, "Invoice transitioned");

        Ok(invoice)
    }

    /// Delete a draft invoice and its items.
    #[instrument(skip(self), fields(organization_id = %organization_id, invoice_id = %id))]
    pub async fn delete_invoice(&self, organization_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        Self::delete_document_in_status(
            &mut *tx,
            KIND,
            organization_id,
            id,
            InvoiceStatus::Draft.as_str(),
        )
        .await?;
        tx.commit().await?;
        timer.observe_duration();

        Ok(())
    }

    async fn lock_invoice(
        conn: &mut PgConnection,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Invoice, AppError> {
        sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE id = $1 AND organization_id = $2
            FOR UPDATE
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale)
        .ok_or_else(|| AppError::not_found("Invoice"))
    }
}
