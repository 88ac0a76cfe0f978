use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{PaymentMethod, RoomStatus, RoomType};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: i64, min: i64, max: i64) -> i64 {
    limit.clamp(min, max)
}

fn default_limit() -> i64 {
    200
}

// ---------------------------------------------------------------------------
// Rooms

#[derive(Debug, Clone, Deserialize)]
pub struct RoomsQuery {
    pub status: Option<RoomStatus>,
    pub room_type: Option<RoomType>,
    pub floor: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomNumberPath {
    pub room_number: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoomInput {
    #[validate(length(min = 1, max = 20))]
    pub room_number: String,
    pub room_type: RoomType,
    #[validate(range(min = 1))]
    pub floor: i32,
    #[validate(range(min = 1, max = 10))]
    pub capacity: i32,
    pub price: Decimal,
    #[serde(default)]
    pub facilities: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoomInput {
    pub room_type: Option<RoomType>,
    pub floor: Option<i32>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    /// `occupied` is derived from the ledger and rejected here.
    pub status: Option<RoomStatus>,
    pub facilities: Option<String>,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Tenants & assignments

#[derive(Debug, Clone, Deserialize)]
pub struct TenantsQuery {
    pub is_active: Option<bool>,
    pub has_assignment: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantPath {
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantInput {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub occupation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTenantInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub occupation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoomInput {
    pub room_number: String,
    pub move_in_date: NaiveDate,
    /// Defaults to the room's listed price when omitted.
    pub monthly_rent: Option<Decimal>,
    pub lease_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UnassignInput {
    /// Defaults to today in the configured timezone.
    pub move_out_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRoomInput {
    pub new_room_number: String,
    pub move_in_date: NaiveDate,
    pub move_out_date: Option<NaiveDate>,
    pub monthly_rent: Option<Decimal>,
    pub lease_end_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Payments

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsQuery {
    /// Stored statuses plus the virtual `overdue` filter.
    pub status: Option<String>,
    pub tenant: Option<Uuid>,
    pub period_month: Option<i32>,
    pub period_year: Option<i32>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
    pub sort: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPath {
    pub payment_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentInput {
    pub tenant_id: Uuid,
    #[validate(range(min = 1, max = 12))]
    pub period_month: i32,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
    pub amount: Decimal,
    /// Defaults to the configured due day of the billing month.
    pub due_date: Option<NaiveDate>,
    pub assignment_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentInput {
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarkPaidInput {
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CancelPaymentInput {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateMonthlyInput {
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 31))]
    pub due_day: Option<u32>,
}

/// Sort keys accepted by the payment list endpoints. Anything else falls
/// back to newest-due-first.
pub fn parse_payment_sort(raw: Option<&str>) -> (&'static str, bool) {
    let raw = raw.map(str::trim).unwrap_or("-due_date");
    let (field, ascending) = match raw.strip_prefix('-') {
        Some(field) => (field, false),
        None => (raw, true),
    };
    match field {
        "due_date" => ("due_date", ascending),
        "payment_date" => ("payment_date", ascending),
        "amount" => ("amount", ascending),
        "created_at" => ("created_at", ascending),
        _ => ("due_date", false),
    }
}

// ---------------------------------------------------------------------------
// History

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_window_months")]
    pub window_months: u32,
}

fn default_window_months() -> u32 {
    12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(0, 1, 500), 1);
        assert_eq!(clamp_limit_in_range(9999, 1, 500), 500);
        assert_eq!(clamp_limit_in_range(42, 1, 500), 42);
    }

    #[test]
    fn payment_sort_whitelist() {
        assert_eq!(parse_payment_sort(Some("amount")), ("amount", true));
        assert_eq!(
            parse_payment_sort(Some("-payment_date")),
            ("payment_date", false)
        );
        assert_eq!(
            parse_payment_sort(Some("id; DROP TABLE")),
            ("due_date", false)
        );
        assert_eq!(parse_payment_sort(None), ("due_date", false));
    }
}
