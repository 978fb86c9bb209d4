//! Pieces shared by quotations, orders and invoices: numbering, line items
//! and stored totals.

use super::database::Database;
use crate::domain::{compute_totals, Currency, LineAmount, Rates, Totals};
use crate::models::{DocumentKind, LineItem, NewLineItem};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use uuid::Uuid;

/// Derive line totals and document totals for `items`.
pub(super) fn price(
    items: &[NewLineItem],
    rates: &Rates,
    currency: Currency,
) -> Result<(Vec<Decimal>, Totals), AppError> {
    let lines: Vec<LineAmount> = items
        .iter()
        .map(|item| LineAmount::new(item.quantity, item.unit_price))
        .collect();
    Ok(compute_totals(&lines, rates, currency)?)
}

/// `<PREFIX>-<YYYYMM>-<seq>`, sequence zero-padded to four digits.
pub(super) fn format_number(prefix: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, period_of(date), sequence)
}

fn period_of(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

impl Database {
    /// Next number from the per-organization counter. The upsert row lock
    /// serializes concurrent creators until commit.
    pub(super) async fn next_number(
        conn: &mut PgConnection,
        organization_id: Uuid,
        prefix: &'static str,
        date: NaiveDate,
    ) -> Result<String, AppError> {
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (organization_id, prefix, period, last_value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (organization_id, prefix, period)
            DO UPDATE SET last_value = document_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(organization_id)
        .bind(prefix)
        .bind(period_of(date))
        .fetch_one(&mut *conn)
        .await?;

        Ok(format_number(prefix, date, sequence))
    }

    /// Client and optional project both belong to the organization.
    pub(super) async fn references_resolve(
        conn: &mut PgConnection,
        organization_id: Uuid,
        client_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        if !Self::client_in_organization(conn, organization_id, client_id).await? {
            return Ok(false);
        }
        match project_id {
            Some(project_id) => Self::project_in_organization(conn, organization_id, project_id).await,
            None => Ok(true),
        }
    }

    pub(super) async fn insert_items(
        conn: &mut PgConnection,
        kind: DocumentKind,
        organization_id: Uuid,
        document_id: Uuid,
        items: &[NewLineItem],
        line_totals: &[Decimal],
    ) -> Result<Vec<LineItem>, AppError> {
        let sql = format!(
            r#"
            INSERT INTO {items} (id, {parent}, organization_id, description, quantity,
                                 unit_price, total_price, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, {parent} AS document_id, organization_id, description, quantity,
                      unit_price, total_price, position, created_at
            "#,
            items = kind.items_table(),
            parent = kind.parent_column(),
        );

        let mut stored = Vec::with_capacity(items.len());
        for (position, (item, total)) in items.iter().zip(line_totals).enumerate() {
            let line = sqlx::query_as::<_, LineItem>(&sql)
                .bind(Uuid::new_v4())
                .bind(document_id)
                .bind(organization_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(total)
                .bind(position as i32)
                .fetch_one(&mut *conn)
                .await?;
            stored.push(line);
        }
        Ok(stored)
    }

    pub(super) async fn fetch_items(
        conn: &mut PgConnection,
        kind: DocumentKind,
        organization_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let items = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            SELECT id, {parent} AS document_id, organization_id, description, quantity,
                   unit_price, total_price, position, created_at
            FROM {items}
            WHERE {parent} = $1 AND organization_id = $2
            ORDER BY position
            "#,
            items = kind.items_table(),
            parent = kind.parent_column(),
        ))
        .bind(document_id)
        .bind(organization_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(items)
    }

    /// Replace all items of a document and store the recomputed totals.
    pub(super) async fn replace_items(
        conn: &mut PgConnection,
        kind: DocumentKind,
        organization_id: Uuid,
        document_id: Uuid,
        currency: Currency,
        rates: &Rates,
        items: &[NewLineItem],
    ) -> Result<(Totals, Vec<LineItem>), AppError> {
        let (line_totals, totals) = price(items, rates, currency)?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1 AND organization_id = $2",
            kind.items_table(),
            kind.parent_column()
        ))
        .bind(document_id)
        .bind(organization_id)
        .execute(&mut *conn)
        .await?;

        let stored =
            Self::insert_items(conn, kind, organization_id, document_id, items, &line_totals)
                .await?;
        Self::write_totals(conn, kind, organization_id, document_id, currency, rates, &totals)
            .await?;

        Ok((totals, stored))
    }

    pub(super) async fn write_totals(
        conn: &mut PgConnection,
        kind: DocumentKind,
        organization_id: Uuid,
        document_id: Uuid,
        currency: Currency,
        rates: &Rates,
        totals: &Totals,
    ) -> Result<(), AppError> {
        sqlx::query(&format!(
            r#"
            UPDATE {} SET
                currency = $3,
                tax_rate = $4,
                discount_percentage = $5,
                subtotal = $6,
                tax_amount = $7,
                discount_amount = $8,
                total_amount = $9
            WHERE id = $1 AND organization_id = $2
            "#,
            kind.table()
        ))
        .bind(document_id)
        .bind(organization_id)
        .bind(currency.code())
        .bind(rates.tax_rate)
        .bind(rates.discount_percentage)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.discount_amount)
        .bind(totals.total_amount)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Physically delete a document in `status`; items go with it.
    pub(super) async fn delete_document_in_status(
        conn: &mut PgConnection,
        kind: DocumentKind,
        organization_id: Uuid,
        document_id: Uuid,
        status: &str,
    ) -> Result<(), AppError> {
        let current: Option<String> = sqlx::query_scalar(&format!(
            "SELECT status FROM {} WHERE id = $1 AND organization_id = $2 FOR UPDATE",
            kind.table()
        ))
        .bind(document_id)
        .bind(organization_id)
        .fetch_optional(&mut *conn)
        .await?;

        match current {
            None => Err(AppError::not_found(kind.label())),
            Some(current) if current != status => Err(AppError::Conflict(anyhow::anyhow!(
                "Only {} {}s can be deleted (current status '{}')",
                status,
                kind.label().to_lowercase(),
                current
            ))),
            Some(_) => {
                sqlx::query(&format!(
                    "DELETE FROM {} WHERE id = $1 AND organization_id = $2",
                    kind.table()
                ))
                .bind(document_id)
                .bind(organization_id)
                .execute(&mut *conn)
                .await?;
                Ok(())
            }
        }
    }
}
