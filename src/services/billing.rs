//! The billing engine: payment creation, paid/cancelled transitions and
//! the monthly generation batch.
//!
//! Stored status is only ever pending | paid | cancelled. The overdue
//! display state is derived at read time (`Payment::display_status`), so
//! a payment goes overdue by the calendar alone, with no write involved.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult, DomainError};
use crate::models::{month_name, Payment, PaymentStatus};
use crate::repository::{assignments, payments};
use crate::schemas::{CreatePaymentInput, MarkPaidInput};

/// Due date for a billing period, clamped to the length of the month
/// (a due day of 31 in February falls on the 28th/29th).
pub fn due_date_for(year: i32, month: u32, due_day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, due_day).unwrap_or_else(|| {
        let last_day = days_in_month(year, month);
        NaiveDate::from_ymd_opt(year, month, last_day)
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default())
    })
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next_month_start
        .and_then(|date| date.pred_opt())
        .map(|date| date.day())
        .unwrap_or(28)
}

pub async fn create_payment(
    pool: &PgPool,
    input: &CreatePaymentInput,
    default_due_day: u32,
) -> AppResult<Payment> {
    if input.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Amount must be greater than 0.".to_string(),
        ));
    }

    let due_date = input.due_date.unwrap_or_else(|| {
        due_date_for(input.period_year, input.period_month as u32, default_due_day)
    });

    // The (tenant, month, year) unique constraint rejects duplicates even
    // under concurrent creates; the repository maps that violation to
    // DuplicatePeriod.
    payments::insert(
        pool,
        input.tenant_id,
        input.assignment_id,
        input.period_month,
        input.period_year,
        input.amount,
        due_date,
        input.notes.as_deref(),
    )
    .await
}

pub async fn mark_as_paid(
    pool: &PgPool,
    payment_id: Uuid,
    input: &MarkPaidInput,
    today: NaiveDate,
    paid_by: Uuid,
) -> AppResult<Payment> {
    let payment = payments::get(pool, payment_id).await?;
    if payment.status == PaymentStatus::Paid {
        return Err(AppError::BadRequest(
            "Payment is already marked as paid.".to_string(),
        ));
    }

    let payment_date = input.payment_date.unwrap_or(today);
    if payment_date > today {
        return Err(AppError::BadRequest(
            "Payment date cannot be in the future.".to_string(),
        ));
    }

    payments::mark_paid(
        pool,
        payment_id,
        payment_date,
        input.payment_method,
        input.payment_reference.as_deref(),
        input.notes.as_deref(),
        paid_by,
    )
    .await
}

pub async fn cancel_payment(
    pool: &PgPool,
    payment_id: Uuid,
    notes: Option<&str>,
) -> AppResult<Payment> {
    let payment = payments::get(pool, payment_id).await?;
    if payment.status == PaymentStatus::Paid {
        return Err(AppError::BadRequest(
            "Paid payments cannot be cancelled.".to_string(),
        ));
    }
    payments::set_status(pool, payment_id, PaymentStatus::Cancelled, notes).await
}

/// Paid payments are immutable for deletion; the audit trail stays.
pub async fn delete_payment(pool: &PgPool, payment_id: Uuid) -> AppResult<Payment> {
    let payment = payments::get(pool, payment_id).await?;
    if payment.status == PaymentStatus::Paid {
        return Err(DomainError::CannotDeletePaid.into());
    }
    payments::delete(pool, payment_id).await?;
    Ok(payment)
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPayment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedTenant {
    pub tenant_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub message: String,
    pub created_count: usize,
    pub skipped_count: usize,
    pub created_payments: Vec<GeneratedPayment>,
    pub skipped_tenants: Vec<SkippedTenant>,
}

/// Creates the month's pending payments for every active tenant with an
/// active assignment, at the assignment's snapshotted rent. Tenants that
/// already have a payment for the period are skipped, not failed, so the
/// batch is safe to re-run.
pub async fn generate_monthly(
    pool: &PgPool,
    month: u32,
    year: i32,
    due_day: u32,
) -> AppResult<GenerateReport> {
    let billable = assignments::list_billable(pool).await?;
    let due_date = due_date_for(year, month, due_day);

    let mut created = Vec::new();
    let mut skipped = Vec::new();

    for assignment in billable {
        if payments::exists_for_period(pool, assignment.tenant_id, month as i32, year).await? {
            skipped.push(SkippedTenant {
                tenant_id: assignment.tenant_id,
                reason: "Payment already exists".to_string(),
            });
            continue;
        }

        match payments::insert(
            pool,
            assignment.tenant_id,
            Some(assignment.id),
            month as i32,
            year,
            assignment.monthly_rent,
            due_date,
            None,
        )
        .await
        {
            Ok(payment) => created.push(GeneratedPayment {
                payment_id: payment.id,
                tenant_id: payment.tenant_id,
                amount: payment.amount,
                due_date: payment.due_date,
            }),
            // A concurrent create for the same period is a skip, not a
            // batch failure.
            Err(AppError::Domain(DomainError::DuplicatePeriod { .. })) => {
                skipped.push(SkippedTenant {
                    tenant_id: assignment.tenant_id,
                    reason: "Payment already exists".to_string(),
                });
            }
            Err(other) => return Err(other),
        }
    }

    tracing::info!(
        month,
        year,
        created = created.len(),
        skipped = skipped.len(),
        "Monthly payment generation completed"
    );

    Ok(GenerateReport {
        message: format!("Generated payments for {} {year}", month_name(month as i32)),
        created_count: created.len(),
        skipped_count: skipped.len(),
        created_payments: created,
        skipped_tenants: skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn due_day_within_month_is_used_directly() {
        assert_eq!(due_date_for(2025, 11, 5), date(2025, 11, 5));
        assert_eq!(due_date_for(2025, 1, 31), date(2025, 1, 31));
    }

    #[test]
    fn due_day_past_month_end_clamps() {
        assert_eq!(due_date_for(2025, 2, 31), date(2025, 2, 28));
        assert_eq!(due_date_for(2024, 2, 30), date(2024, 2, 29));
        assert_eq!(due_date_for(2025, 4, 31), date(2025, 4, 30));
    }

    #[test]
    fn december_clamping_wraps_the_year() {
        assert_eq!(due_date_for(2025, 12, 31), date(2025, 12, 31));
        assert_eq!(days_in_month(2025, 12), 31);
    }
}
