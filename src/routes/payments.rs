use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, Months, NaiveDate};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::{require_admin, require_user, AuthUser},
    error::{AppError, AppResult},
    models::{month_name, Payment},
    repository::payments,
    schemas::{
        clamp_limit_in_range, parse_payment_sort, validate_input, CancelPaymentInput,
        CreatePaymentInput, GenerateMonthlyInput, MarkPaidInput, PaymentPath, PaymentsQuery,
        TenantPath, UpdatePaymentInput,
    },
    services::{billing, history, local_today, storage},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/payments",
            axum::routing::get(list_payments).post(create_payment),
        )
        .route(
            "/payments/statistics",
            axum::routing::get(payment_statistics),
        )
        .route(
            "/payments/generate-monthly",
            axum::routing::post(generate_monthly),
        )
        .route(
            "/payments/tenant/{tenant_id}",
            axum::routing::get(payments_by_tenant),
        )
        .route(
            "/payments/{payment_id}",
            axum::routing::get(get_payment)
                .patch(update_payment)
                .delete(delete_payment),
        )
        .route(
            "/payments/{payment_id}/mark-paid",
            axum::routing::post(mark_as_paid),
        )
        .route(
            "/payments/{payment_id}/cancel",
            axum::routing::post(cancel_payment),
        )
        .route(
            "/payments/{payment_id}/upload-proof",
            axum::routing::post(upload_proof),
        )
}

/// Serialized payment plus the read-time derivations the clients render.
fn payment_view(payment: &Payment, today: NaiveDate) -> Value {
    let mut view = serde_json::to_value(payment).unwrap_or(Value::Null);
    if let Some(object) = view.as_object_mut() {
        object.insert(
            "display_status".to_string(),
            serde_json::to_value(payment.display_status(today)).unwrap_or(Value::Null),
        );
        object.insert(
            "days_overdue".to_string(),
            Value::from(payment.days_overdue(today)),
        );
        object.insert(
            "period_display".to_string(),
            Value::String(format!(
                "{} {}",
                month_name(payment.period_month),
                payment.period_year
            )),
        );
    }
    view
}

async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db_pool()?;
    let today = local_today(&state.config);

    let restrict_tenant = tenant_scope(&user)?;
    let sort = parse_payment_sort(query.sort.as_deref());
    let limit = clamp_limit_in_range(query.limit, 1, 1000);

    let rows = payments::list(pool, &query, restrict_tenant, today, sort, limit).await?;
    let data = rows
        .iter()
        .map(|payment| payment_view(payment, today))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "count": data.len(), "payments": data })))
}

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = state.db_pool()?;

    let payment = billing::create_payment(pool, &payload, state.config.billing_due_day).await?;
    history::invalidate(&state, payment.tenant_id).await;

    let today = local_today(&state.config);
    Ok((
        axum::http::StatusCode::CREATED,
        Json(payment_view(&payment, today)),
    ))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let payment = payments::get(pool, path.payment_id).await?;
    ensure_payment_access(&user, &payment)?;

    Ok(Json(payment_view(&payment, local_today(&state.config))))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePaymentInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    // Tenant, period and amount are immutable by schema; only the
    // method/reference/notes/date fields are patchable.
    let payment = payments::update_fields(pool, path.payment_id, &payload).await?;
    history::invalidate(&state, payment.tenant_id).await;

    Ok(Json(payment_view(&payment, local_today(&state.config))))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let deleted = billing::delete_payment(pool, path.payment_id).await?;
    history::invalidate(&state, deleted.tenant_id).await;

    Ok(Json(json!({ "message": "Payment deleted successfully" })))
}

async fn mark_as_paid(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
    payload: Option<Json<MarkPaidInput>>,
) -> AppResult<Json<Value>> {
    let admin = require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let input = payload.map(|Json(input)| input).unwrap_or_default();
    let today = local_today(&state.config);
    let payment = billing::mark_as_paid(pool, path.payment_id, &input, today, admin.user_id).await?;
    history::invalidate(&state, payment.tenant_id).await;

    Ok(Json(json!({
        "message": "Payment marked as paid successfully",
        "payment": payment_view(&payment, today),
    })))
}

async fn cancel_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
    payload: Option<Json<CancelPaymentInput>>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let input = payload.map(|Json(input)| input).unwrap_or_default();
    let payment = billing::cancel_payment(pool, path.payment_id, input.notes.as_deref()).await?;
    history::invalidate(&state, payment.tenant_id).await;

    Ok(Json(json!({
        "message": "Payment cancelled",
        "payment": payment_view(&payment, local_today(&state.config)),
    })))
}

async fn generate_monthly(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateMonthlyInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = state.db_pool()?;

    let due_day = payload.due_day.unwrap_or(state.config.billing_due_day);
    let report = billing::generate_monthly(pool, payload.month, payload.year, due_day).await?;
    // The batch touches many tenants; drop the whole read-model cache.
    state.history_cache.invalidate_all();

    Ok(Json(serde_json::to_value(report).unwrap_or(Value::Null)))
}

async fn payments_by_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    if !user.can_access_tenant(path.tenant_id) {
        return Err(AppError::Forbidden(
            "You can only view your own payments.".to_string(),
        ));
    }
    let pool = state.db_pool()?;
    let today = local_today(&state.config);

    let rows = payments::list_for_tenant(pool, path.tenant_id).await?;
    let data = rows
        .iter()
        .map(|payment| payment_view(payment, today))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "count": data.len(), "payments": data })))
}

/// Proof upload is independent of status: a stored proof does not mark the
/// payment paid, and an overdue payment stays overdue until an admin
/// confirms it.
async fn upload_proof(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let payment = payments::get(pool, path.payment_id).await?;
    ensure_payment_access(&user, &payment)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("Invalid multipart body: {error}")))?
    {
        if field.name() != Some("proof_of_payment") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|error| AppError::BadRequest(format!("Could not read upload: {error}")))?;
        file = Some((content_type, bytes.to_vec()));
        break;
    }

    let (content_type, bytes) = file.ok_or_else(|| {
        AppError::BadRequest(
            "No file provided. Use multipart key \"proof_of_payment\".".to_string(),
        )
    })?;

    let reference = storage::upload_proof(&state, payment.id, &content_type, bytes).await?;
    let updated = payments::set_proof(pool, payment.id, &reference).await?;

    Ok(Json(json!({
        "message": "Proof of payment uploaded successfully",
        "payment": payment_view(&updated, local_today(&state.config)),
    })))
}

async fn payment_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;
    let today = local_today(&state.config);

    let totals = payments::status_totals(pool, today).await?;

    let mut monthly_revenue = Vec::with_capacity(12);
    for (year, month) in trailing_periods(today, 12) {
        let (_, revenue) = payments::paid_revenue_for_period(pool, month as i32, year).await?;
        monthly_revenue.push(json!({
            "year": year,
            "month": month,
            "month_name": month_name(month as i32),
            "revenue": revenue,
        }));
    }

    let (this_month_paid, this_month_pending) =
        payments::period_counts(pool, today.month() as i32, today.year()).await?;
    let (_, this_month_revenue) =
        payments::paid_revenue_for_period(pool, today.month() as i32, today.year()).await?;

    Ok(Json(json!({
        "total_payments": totals.total_payments,
        "paid_count": totals.paid_count,
        "pending_count": totals.pending_count,
        "overdue_count": totals.overdue_count,
        "cancelled_count": totals.cancelled_count,
        "total_amount": totals.total_amount,
        "paid_amount": totals.paid_amount,
        "pending_amount": totals.pending_amount,
        "overdue_amount": totals.overdue_amount,
        "monthly_revenue": monthly_revenue,
        "this_month_paid": this_month_paid,
        "this_month_pending": this_month_pending,
        "this_month_revenue": this_month_revenue,
    })))
}

/// Trailing billing periods ending at `today`'s month, oldest first.
fn trailing_periods(today: NaiveDate, count: u32) -> Vec<(i32, u32)> {
    let mut periods = Vec::with_capacity(count as usize);
    for offset in (0..count).rev() {
        let date = today
            .checked_sub_months(Months::new(offset))
            .unwrap_or(today);
        periods.push((date.year(), date.month()));
    }
    periods
}

fn tenant_scope(user: &AuthUser) -> AppResult<Option<Uuid>> {
    if user.is_admin() {
        return Ok(None);
    }
    user.tenant_id
        .map(Some)
        .ok_or_else(|| AppError::Forbidden("This account has no tenant profile.".to_string()))
}

fn ensure_payment_access(user: &AuthUser, payment: &Payment) -> AppResult<()> {
    if user.can_access_tenant(payment.tenant_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to view this payment.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn trailing_periods_walk_backwards_across_years() {
        let periods = trailing_periods(date(2026, 2, 10), 12);
        assert_eq!(periods.len(), 12);
        assert_eq!(periods.first(), Some(&(2025, 3)));
        assert_eq!(periods.last(), Some(&(2026, 2)));
    }

    #[test]
    fn trailing_periods_single_month() {
        assert_eq!(trailing_periods(date(2025, 6, 1), 1), vec![(2025, 6)]);
    }
}
