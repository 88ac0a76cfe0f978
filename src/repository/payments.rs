use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgExecutor, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::{is_unique_violation, map_db_error, AppError, AppResult, DomainError};
use crate::models::{Payment, PaymentMethod, PaymentStatus};
use crate::schemas::{PaymentsQuery, UpdatePaymentInput};

const PAYMENT_COLUMNS: &str = "id, tenant_id, assignment_id, period_month, period_year, amount, \
     due_date, payment_date, status, payment_method, payment_reference, notes, \
     proof_of_payment, paid_at, paid_by, created_at, updated_at";

pub async fn list(
    pool: impl PgExecutor<'_>,
    query: &PaymentsQuery,
    restrict_tenant: Option<Uuid>,
    today: NaiveDate,
    sort: (&str, bool),
    limit: i64,
) -> AppResult<Vec<Payment>> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE 1=1"));

    // A tenant principal only ever sees their own rows, whatever the query says.
    if let Some(tenant_id) = restrict_tenant {
        builder.push(" AND tenant_id = ").push_bind(tenant_id);
    } else if let Some(tenant_id) = query.tenant {
        builder.push(" AND tenant_id = ").push_bind(tenant_id);
    }

    match query.status.as_deref().map(str::trim) {
        // `overdue` is a derived state: stored pending with a past due date.
        Some("overdue") => {
            builder
                .push(" AND status = 'pending' AND due_date < ")
                .push_bind(today);
        }
        Some("pending") => {
            builder.push(" AND status = 'pending' AND due_date >= ").push_bind(today);
        }
        Some("paid") => {
            builder.push(" AND status = 'paid'");
        }
        Some("cancelled") => {
            builder.push(" AND status = 'cancelled'");
        }
        Some(other) if !other.is_empty() => {
            return Err(AppError::BadRequest(format!(
                "Unknown payment status filter '{other}'."
            )));
        }
        _ => {}
    }

    if let Some(month) = query.period_month {
        builder.push(" AND period_month = ").push_bind(month);
    }
    if let Some(year) = query.period_year {
        builder.push(" AND period_year = ").push_bind(year);
    }
    if let Some(from) = query.due_date_from {
        builder.push(" AND due_date >= ").push_bind(from);
    }
    if let Some(to) = query.due_date_to {
        builder.push(" AND due_date <= ").push_bind(to);
    }

    let (sort_field, ascending) = sort;
    builder.push(format!(
        " ORDER BY {sort_field} {}",
        if ascending { "ASC" } else { "DESC" }
    ));
    builder.push(" LIMIT ").push_bind(limit);

    builder
        .build_query_as::<Payment>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: impl PgExecutor<'_>, payment_id: Uuid) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
    ))
    .bind(payment_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

pub async fn list_for_tenant(
    pool: impl PgExecutor<'_>,
    tenant_id: Uuid,
) -> AppResult<Vec<Payment>> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE tenant_id = $1
         ORDER BY period_year DESC, period_month DESC"
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

/// Payments whose due date falls inside the trailing history window.
pub async fn list_for_tenant_window(
    pool: impl PgExecutor<'_>,
    tenant_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<Payment>> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE tenant_id = $1 AND due_date >= $2 AND due_date <= $3
         ORDER BY period_year DESC, period_month DESC"
    ))
    .bind(tenant_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: impl PgExecutor<'_>,
    tenant_id: Uuid,
    assignment_id: Option<Uuid>,
    period_month: i32,
    period_year: i32,
    amount: Decimal,
    due_date: NaiveDate,
    notes: Option<&str>,
) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "INSERT INTO payments (tenant_id, assignment_id, period_month, period_year, amount, due_date, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(assignment_id)
    .bind(period_month)
    .bind(period_year)
    .bind(amount)
    .bind(due_date)
    .bind(notes)
    .fetch_one(pool)
    .await
    .map_err(|error| {
        // The unique constraint is the authoritative duplicate-period guard.
        if is_unique_violation(&error, "payments_one_per_period") {
            DomainError::DuplicatePeriod {
                month: period_month as u32,
                year: period_year,
            }
            .into()
        } else {
            map_db_error(error)
        }
    })
}

pub async fn exists_for_period(
    pool: impl PgExecutor<'_>,
    tenant_id: Uuid,
    period_month: i32,
    period_year: i32,
) -> AppResult<bool> {
    let row = sqlx::query(
        "SELECT 1 AS present FROM payments
         WHERE tenant_id = $1 AND period_month = $2 AND period_year = $3
         LIMIT 1",
    )
    .bind(tenant_id)
    .bind(period_month)
    .bind(period_year)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;
    Ok(row.is_some())
}

pub async fn update_fields(
    pool: impl PgExecutor<'_>,
    payment_id: Uuid,
    input: &UpdatePaymentInput,
) -> AppResult<Payment> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE payments SET updated_at = now()");
    if let Some(payment_date) = input.payment_date {
        builder.push(", payment_date = ").push_bind(payment_date);
    }
    if let Some(method) = input.payment_method {
        builder.push(", payment_method = ").push_bind(method);
    }
    if let Some(reference) = &input.payment_reference {
        builder.push(", payment_reference = ").push_bind(reference);
    }
    if let Some(notes) = &input.notes {
        builder.push(", notes = ").push_bind(notes);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(payment_id)
        .push(format!(" RETURNING {PAYMENT_COLUMNS}"));

    builder
        .build_query_as::<Payment>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

pub async fn mark_paid(
    pool: impl PgExecutor<'_>,
    payment_id: Uuid,
    payment_date: NaiveDate,
    payment_method: Option<PaymentMethod>,
    payment_reference: Option<&str>,
    notes: Option<&str>,
    paid_by: Uuid,
) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET
             status = 'paid',
             payment_date = $1,
             payment_method = COALESCE($2, payment_method),
             payment_reference = COALESCE($3, payment_reference),
             notes = COALESCE($4, notes),
             paid_at = now(),
             paid_by = $5,
             updated_at = now()
         WHERE id = $6
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(payment_date)
    .bind(payment_method)
    .bind(payment_reference)
    .bind(notes)
    .bind(paid_by)
    .bind(payment_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn set_status(
    pool: impl PgExecutor<'_>,
    payment_id: Uuid,
    status: PaymentStatus,
    notes: Option<&str>,
) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET status = $1, notes = COALESCE($2, notes), updated_at = now()
         WHERE id = $3
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(status)
    .bind(notes)
    .bind(payment_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn set_proof(
    pool: impl PgExecutor<'_>,
    payment_id: Uuid,
    reference: &str,
) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET proof_of_payment = $1, updated_at = now()
         WHERE id = $2
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(reference)
    .bind(payment_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn delete(pool: impl PgExecutor<'_>, payment_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM payments WHERE id = $1")
        .bind(payment_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatusTotals {
    pub total_payments: i64,
    pub paid_count: i64,
    pub pending_count: i64,
    pub overdue_count: i64,
    pub cancelled_count: i64,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub pending_amount: Decimal,
    pub overdue_amount: Decimal,
}

/// One aggregate pass over the payments table, splitting pending rows into
/// still-pending and overdue by `today`.
pub async fn status_totals(pool: impl PgExecutor<'_>, today: NaiveDate) -> AppResult<StatusTotals> {
    let row = sqlx::query(
        "SELECT
             COUNT(*) AS total_payments,
             COUNT(*) FILTER (WHERE status = 'paid') AS paid_count,
             COUNT(*) FILTER (WHERE status = 'pending' AND due_date >= $1) AS pending_count,
             COUNT(*) FILTER (WHERE status = 'pending' AND due_date < $1) AS overdue_count,
             COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_count,
             COALESCE(SUM(amount), 0) AS total_amount,
             COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0) AS paid_amount,
             COALESCE(SUM(amount) FILTER (WHERE status = 'pending' AND due_date >= $1), 0) AS pending_amount,
             COALESCE(SUM(amount) FILTER (WHERE status = 'pending' AND due_date < $1), 0) AS overdue_amount
         FROM payments",
    )
    .bind(today)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    Ok(StatusTotals {
        total_payments: row.try_get("total_payments").unwrap_or(0),
        paid_count: row.try_get("paid_count").unwrap_or(0),
        pending_count: row.try_get("pending_count").unwrap_or(0),
        overdue_count: row.try_get("overdue_count").unwrap_or(0),
        cancelled_count: row.try_get("cancelled_count").unwrap_or(0),
        total_amount: row.try_get("total_amount").unwrap_or_default(),
        paid_amount: row.try_get("paid_amount").unwrap_or_default(),
        pending_amount: row.try_get("pending_amount").unwrap_or_default(),
        overdue_amount: row.try_get("overdue_amount").unwrap_or_default(),
    })
}

pub async fn paid_revenue_for_period(
    pool: impl PgExecutor<'_>,
    period_month: i32,
    period_year: i32,
) -> AppResult<(i64, Decimal)> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS paid_count, COALESCE(SUM(amount), 0) AS revenue
         FROM payments
         WHERE status = 'paid' AND period_month = $1 AND period_year = $2",
    )
    .bind(period_month)
    .bind(period_year)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    Ok((
        row.try_get("paid_count").unwrap_or(0),
        row.try_get("revenue").unwrap_or_default(),
    ))
}

pub async fn period_counts(
    pool: impl PgExecutor<'_>,
    period_month: i32,
    period_year: i32,
) -> AppResult<(i64, i64)> {
    let row = sqlx::query(
        "SELECT
             COUNT(*) FILTER (WHERE status = 'paid') AS paid_count,
             COUNT(*) FILTER (WHERE status = 'pending') AS pending_count
         FROM payments
         WHERE period_month = $1 AND period_year = $2",
    )
    .bind(period_month)
    .bind(period_year)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    Ok((
        row.try_get("paid_count").unwrap_or(0),
        row.try_get("pending_count").unwrap_or(0),
    ))
}
