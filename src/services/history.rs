//! The history aggregator: a read-only reducer over the payment ledger
//! and the external complaint subsystem. Nothing here is persisted; the
//! rollup is recomputed per call and briefly memoized in the moka cache,
//! which the billing and ledger writers invalidate.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{month_name, DisplayStatus, Payment};
use crate::repository::{payments, tenants};
use crate::services::complaints::{self, ComplaintRecord};
use crate::services::local_today;
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub total: usize,
    pub on_time: usize,
    pub late: usize,
    pub unpaid: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentHistoryEntry {
    pub month: i32,
    pub year: i32,
    pub month_name: &'static str,
    pub amount: Decimal,
    pub status: DisplayStatus,
    pub payment_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub is_late: bool,
}

/// Buckets a tenant's payments: paid on or before due date → on_time,
/// paid after → late, still pending (incl. overdue) → unpaid. Cancelled
/// rows appear in the chronology but stay out of the counters.
pub fn bucket_payments(
    rows: &[Payment],
    today: NaiveDate,
) -> (PaymentSummary, Vec<PaymentHistoryEntry>) {
    let mut summary = PaymentSummary::default();
    let mut history = Vec::with_capacity(rows.len());

    for payment in rows {
        let status = payment.display_status(today);
        let is_late = match status {
            DisplayStatus::Paid => payment
                .payment_date
                .map(|paid_on| paid_on > payment.due_date)
                .unwrap_or(false),
            DisplayStatus::Overdue => true,
            _ => false,
        };

        match status {
            DisplayStatus::Paid if is_late => summary.late += 1,
            DisplayStatus::Paid => summary.on_time += 1,
            DisplayStatus::Pending | DisplayStatus::Overdue => summary.unpaid += 1,
            DisplayStatus::Cancelled => {}
        }
        if status != DisplayStatus::Cancelled {
            summary.total += 1;
        }

        history.push(PaymentHistoryEntry {
            month: payment.period_month,
            year: payment.period_year,
            month_name: month_name(payment.period_month),
            amount: payment.amount,
            status,
            payment_date: payment.payment_date,
            due_date: payment.due_date,
            is_late,
        });
    }

    (summary, history)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplaintSummary {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplaintMonth {
    pub month: u32,
    pub year: i32,
    pub month_name: &'static str,
    pub count: usize,
    pub categories: Vec<String>,
    pub statuses: BTreeMap<String, usize>,
}

/// Groups complaints per calendar month, newest month first.
pub fn bucket_complaints(rows: &[ComplaintRecord]) -> (ComplaintSummary, Vec<ComplaintMonth>) {
    let mut summary = ComplaintSummary::default();
    let mut monthly: BTreeMap<(i32, u32), ComplaintMonth> = BTreeMap::new();

    for complaint in rows {
        let created = complaint.created_at.date_naive();
        let key = (created.year(), created.month());
        let entry = monthly.entry(key).or_insert_with(|| ComplaintMonth {
            month: created.month(),
            year: created.year(),
            month_name: month_name(created.month() as i32),
            count: 0,
            categories: Vec::new(),
            statuses: BTreeMap::new(),
        });

        entry.count += 1;
        if !entry.categories.contains(&complaint.category) {
            entry.categories.push(complaint.category.clone());
        }
        *entry.statuses.entry(complaint.status.clone()).or_insert(0) += 1;

        summary.total += 1;
        *summary.by_category.entry(complaint.category.clone()).or_insert(0) += 1;
    }

    let history = monthly.into_values().rev().collect();
    (summary, history)
}

pub async fn get_history(
    state: &AppState,
    tenant_id: Uuid,
    window_months: u32,
) -> AppResult<Value> {
    let default_window = window_months == 12;
    if default_window {
        if let Some(cached) = state.history_cache.get(&tenant_id).await {
            return Ok(cached);
        }
    }

    let pool = state.db_pool()?;
    let tenant = tenants::get(pool, tenant_id).await?;

    let today = local_today(&state.config);
    let window_start = today
        .checked_sub_months(Months::new(window_months))
        .unwrap_or(today);

    let payment_rows =
        payments::list_for_tenant_window(pool, tenant_id, window_start, today).await?;
    let complaint_rows =
        complaints::complaints_for_tenant(state, tenant_id, window_start, today).await?;

    let (payment_summary, payment_history) = bucket_payments(&payment_rows, today);
    let (complaint_summary, complaint_history) = bucket_complaints(&complaint_rows);

    let response = json!({
        "tenant_id": tenant.id,
        "tenant_name": tenant.full_name,
        "window_months": window_months,
        "payment_summary": payment_summary,
        "payment_history": payment_history,
        "complaint_summary": complaint_summary,
        "complaint_history": complaint_history,
    });

    if default_window {
        state.history_cache.insert(tenant_id, response.clone()).await;
    }
    Ok(response)
}

/// Dropped from the cache whenever a billing or ledger write touches the
/// tenant, so the next read recomputes.
pub async fn invalidate(state: &AppState, tenant_id: Uuid) {
    state.history_cache.invalidate(&tenant_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payment, PaymentStatus};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payment(
        month: i32,
        status: PaymentStatus,
        due: NaiveDate,
        paid: Option<NaiveDate>,
    ) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            assignment_id: None,
            period_month: month,
            period_year: due.year(),
            amount: dec!(1_500_000),
            due_date: due,
            payment_date: paid,
            status,
            payment_method: None,
            payment_reference: None,
            notes: None,
            proof_of_payment: None,
            paid_at: None,
            paid_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn buckets_on_time_late_and_unpaid() {
        let today = date(2025, 11, 10);
        let rows = vec![
            // Paid on the due date: on time.
            payment(8, PaymentStatus::Paid, date(2025, 8, 5), Some(date(2025, 8, 5))),
            // Paid after the due date: late.
            payment(9, PaymentStatus::Paid, date(2025, 9, 5), Some(date(2025, 9, 12))),
            // Pending, past due: unpaid (overdue).
            payment(10, PaymentStatus::Pending, date(2025, 10, 5), None),
            // Pending, not yet due: unpaid.
            payment(11, PaymentStatus::Pending, date(2025, 11, 25), None),
            // Cancelled: listed, not counted.
            payment(7, PaymentStatus::Cancelled, date(2025, 7, 5), None),
        ];

        let (summary, history) = bucket_payments(&rows, today);
        assert_eq!(
            summary,
            PaymentSummary {
                total: 4,
                on_time: 1,
                late: 1,
                unpaid: 2,
            }
        );
        assert_eq!(history.len(), 5);
        assert!(history[2].is_late, "overdue pending rows are flagged late");
        assert_eq!(history[4].status, DisplayStatus::Cancelled);
    }

    #[test]
    fn empty_ledger_buckets_to_zero() {
        let (summary, history) = bucket_payments(&[], date(2025, 1, 1));
        assert_eq!(summary, PaymentSummary::default());
        assert!(history.is_empty());
    }

    fn complaint(category: &str, status: &str, y: i32, m: u32, d: u32) -> ComplaintRecord {
        ComplaintRecord {
            category: category.to_string(),
            status: status.to_string(),
            created_at: Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn groups_complaints_per_month_newest_first() {
        let rows = vec![
            complaint("plumbing", "resolved", 2025, 9, 2),
            complaint("plumbing", "open", 2025, 9, 20),
            complaint("electrical", "resolved", 2025, 10, 1),
        ];

        let (summary, history) = bucket_complaints(&rows);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_category.get("plumbing"), Some(&2));
        assert_eq!(summary.by_category.get("electrical"), Some(&1));

        assert_eq!(history.len(), 2);
        assert_eq!((history[0].year, history[0].month), (2025, 10));
        assert_eq!((history[1].year, history[1].month), (2025, 9));
        assert_eq!(history[1].count, 2);
        assert_eq!(history[1].statuses.get("open"), Some(&1));
    }
}
