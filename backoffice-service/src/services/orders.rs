//! Order persistence and status transitions.

use super::database::{unique_conflict, Database};
use super::documents::price;
use super::quotations::guarded;
use crate::domain::lifecycle;
use crate::domain::{OrderStatus, TransitionError};
use crate::models::{
    CreateInvoice, CreateOrder, DocumentDetail, DocumentKind, FinancialDocument, Invoice,
    NewLineItem, Order, OrderFilter, PageRequest,
};
use crate::services::metrics::{record_transition, DB_QUERY_DURATION, DOCUMENTS_TOTAL};
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, organization_id, client_id, project_id, quotation_id, \
     order_number, status, currency, order_date, delivery_date, tax_rate, discount_percentage, \
     subtotal, tax_amount, discount_amount, total_amount, notes, created_by, created_at, \
     updated_at";

const KIND: DocumentKind = DocumentKind::Order;

impl Database {
    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_order(&self, input: &CreateOrder) -> Result<DocumentDetail<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let order = Self::insert_order(&mut *tx, input).await?;
        tx.commit().await?;

        timer.observe_duration();

        Ok(order)
    }

    /// Insert a pending order with its items inside the caller's transaction.
    pub(super) async fn insert_order(
        conn: &mut PgConnection,
        input: &CreateOrder,
    ) -> Result<DocumentDetail<Order>, AppError> {
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
            input.order_date,
        )
        .await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (id, organization_id, client_id, project_id, quotation_id,
                                order_number, status, currency, order_date, delivery_date,
                                tax_rate, discount_percentage, subtotal, tax_amount,
                                discount_amount, total_amount, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.organization_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(input.quotation_id)
        .bind(&number)
        .bind(input.currency.code())
        .bind(input.order_date)
        .bind(input.delivery_date)
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
            unique_conflict(
                e,
                "orders_quotation_id_active_key",
                "Quotation has already been converted to an order",
            )
        })?
        .with_currency_scale();

        let items = Self::insert_items(
            conn,
            KIND,
            input.organization_id,
            order.id,
            &input.items,
            &line_totals,
        )
        .await?;

        DOCUMENTS_TOTAL.with_label_values(&["order"]).inc();
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_amount = %order.total_amount,
            "Order created"
        );

        Ok(DocumentDetail {
            document: order,
            items,
        })
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, order_id = %id))]
    pub async fn get_order(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DocumentDetail<Order>>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let mut conn = self.pool.acquire().await?;
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale);

        let detail = match order {
            Some(order) => {
                let items = Self::fetch_items(&mut *conn, KIND, organization_id, id).await?;
                Some(DocumentDetail {
                    document: order,
                    items,
                })
            }
            None => None,
        };

        timer.observe_duration();

        Ok(detail)
    }

    #[instrument(skip(self, filter), fields(organization_id = %organization_id))]
    pub async fn list_orders(
        &self,
        organization_id: Uuid,
        filter: &OrderFilter,
        page: &PageRequest,
    ) -> Result<(Vec<Order>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_orders"])
            .start_timer();

        let status = filter.status.map(|s| s.as_str());
        let conditions = r#"
            organization_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR client_id = $3)
              AND ($4::uuid IS NULL OR quotation_id = $4)
        "#;

        let orders: Vec<Order> = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {conditions} ORDER BY {} LIMIT $5 OFFSET $6",
            page.order_by()
        ))
        .bind(organization_id)
        .bind(status)
        .bind(filter.client_id)
        .bind(filter.quotation_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(FinancialDocument::with_currency_scale)
        .collect();

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders WHERE {conditions}"))
                .bind(organization_id)
                .bind(status)
                .bind(filter.client_id)
                .bind(filter.quotation_id)
                .fetch_one(&self.pool)
                .await?;

        timer.observe_duration();

        Ok((orders, total))
    }

    /// Replace the items of a pending order.
    #[instrument(skip(self, items), fields(organization_id = %organization_id, order_id = %id))]
    pub async fn replace_order_items(
        &self,
        organization_id: Uuid,
        id: Uuid,
        items: &[NewLineItem],
    ) -> Result<DocumentDetail<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_order_items"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let order = Self::lock_order(&mut *tx, organization_id, id).await?;
        let current = order.status()?;
        if !current.is_editable() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only pending orders can be edited (current status '{}')",
                current
            )));
        }

        let (_, items) = Self::replace_items(
            &mut *tx,
            KIND,
            organization_id,
            id,
            order.currency()?,
            &order.rates(),
            items,
        )
        .await?;

        let order = Self::lock_order(&mut *tx, organization_id, id).await?;
        tx.commit().await?;
        timer.observe_duration();

        Ok(DocumentDetail {
            document: order,
            items,
        })
    }

    #[instrument(skip(self), fields(organization_id = %organization_id, order_id = %id))]
    pub async fn transition_order_status(
        &self,
        organization_id: Uuid,
        id: Uuid,
        target: OrderStatus,
    ) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_order_status"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let order = Self::lock_order(&mut *tx, organization_id, id).await?;
        let current = order.status()?;
        let next = lifecycle::transition_order(current, target)?;

        let order = guarded(
            sqlx::query_as::<_, Order>(&format!(
                r#"
                UPDATE orders SET status = $3
                WHERE id = $1 AND organization_id = $2 AND status = $4
                RETURNING {ORDER_COLUMNS}
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

        record_transition("order", next.as_str());
        info!(from = %current, to = %next, "Order transitioned");

        Ok(order)
    }

    /// Delete a pending order and its items.
    #[instrument(skip(self), fields(organization_id = %organization_id, order_id = %id))]
    pub async fn delete_order(&self, organization_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_order"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        Self::delete_document_in_status(
            &mut *tx,
            KIND,
            organization_id,
            id,
            OrderStatus::Pending.as_str(),
        )
        .await?;
        tx.commit().await?;
        timer.observe_duration();

        Ok(())
    }

    /// Create a draft invoice billing a confirmed, processing or completed
    /// order.
    #[instrument(skip(self), fields(organization_id = %organization_id, order_id = %id))]
    pub async fn convert_order_to_invoice(
        &self,
        organization_id: Uuid,
        id: Uuid,
        actor: Uuid,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
    ) -> Result<DocumentDetail<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_order_to_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let order = Self::lock_order(&mut *tx, organization_id, id).await?;
        let current = order.status()?;
        if !current.is_invoiceable() {
            return Err(TransitionError::InvalidTransition {
                entity: "order",
                from: current.to_string(),
                to: "invoiced".to_string(),
            }
            .into());
        }

        let items = Self::fetch_items(&mut *tx, KIND, organization_id, id).await?;
        let input = CreateInvoice {
            organization_id,
            client_id: order.client_id,
            project_id: order.project_id,
            quotation_id: order.quotation_id,
            order_id: Some(order.id),
            currency: order.currency()?,
            issue_date,
            due_date,
            rates: order.rates(),
            notes: order.notes.clone(),
            created_by: actor,
            items: items.iter().map(NewLineItem::from).collect(),
        };
        let invoice = Self::insert_invoice(&mut *tx, &input).await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(invoice_id = %invoice.document.id, "Order invoiced");

        Ok(invoice)
    }

    async fn lock_order(
        conn: &mut PgConnection,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Order, AppError> {
        sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE id = $1 AND organization_id = $2
            FOR UPDATE
            "#
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(FinancialDocument::with_currency_scale)
        .ok_or_else(|| AppError::not_found("Order"))
    }
}
