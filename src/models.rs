use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Single,
    Double,
    Shared,
}

impl RoomType {
    /// Capacity ceiling implied by the room type.
    pub fn max_capacity(self) -> i32 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Shared => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

/// What the client sees. `Overdue` never hits the database; it is derived
/// from a pending status and a past due date at read time, so a payment
/// can become overdue without any write happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Other,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Room {
    pub id: Uuid,
    pub room_number: String,
    pub room_type: RoomType,
    pub floor: i32,
    pub capacity: i32,
    pub price: Decimal,
    pub status: RoomStatus,
    pub facilities: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub occupation: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub room_id: Uuid,
    pub move_in_date: NaiveDate,
    pub move_out_date: Option<NaiveDate>,
    pub lease_end_date: Option<NaiveDate>,
    pub monthly_rent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_current(&self) -> bool {
        self.move_out_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub assignment_id: Option<Uuid>,
    pub period_month: i32,
    pub period_year: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub proof_of_payment: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn display_status(&self, today: NaiveDate) -> DisplayStatus {
        match self.status {
            PaymentStatus::Paid => DisplayStatus::Paid,
            PaymentStatus::Cancelled => DisplayStatus::Cancelled,
            PaymentStatus::Pending if self.due_date < today => DisplayStatus::Overdue,
            PaymentStatus::Pending => DisplayStatus::Pending,
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.display_status(today) == DisplayStatus::Overdue
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }
}

pub fn month_name(month: i32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment(status: PaymentStatus, due: NaiveDate, paid: Option<NaiveDate>) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            assignment_id: None,
            period_month: due.format("%m").to_string().parse().unwrap(),
            period_year: 2025,
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pending_past_due_displays_overdue() {
        let p = payment(PaymentStatus::Pending, date(2025, 11, 5), None);
        assert_eq!(p.display_status(date(2025, 11, 10)), DisplayStatus::Overdue);
        assert_eq!(p.days_overdue(date(2025, 11, 10)), 5);
    }

    #[test]
    fn pending_before_due_stays_pending() {
        let p = payment(PaymentStatus::Pending, date(2025, 11, 5), None);
        assert_eq!(p.display_status(date(2025, 11, 4)), DisplayStatus::Pending);
        assert_eq!(p.days_overdue(date(2025, 11, 4)), 0);
    }

    #[test]
    fn paid_is_terminal_regardless_of_due_date() {
        let p = payment(
            PaymentStatus::Paid,
            date(2025, 11, 5),
            Some(date(2025, 11, 20)),
        );
        assert_eq!(p.display_status(date(2025, 12, 1)), DisplayStatus::Paid);
        assert_eq!(p.days_overdue(date(2025, 12, 1)), 0);
    }

    #[test]
    fn cancelled_is_excluded_from_overdue() {
        let p = payment(PaymentStatus::Cancelled, date(2025, 1, 5), None);
        assert_eq!(p.display_status(date(2025, 6, 1)), DisplayStatus::Cancelled);
    }

    #[test]
    fn due_date_boundary_is_not_overdue() {
        let p = payment(PaymentStatus::Pending, date(2025, 11, 5), None);
        assert_eq!(p.display_status(date(2025, 11, 5)), DisplayStatus::Pending);
    }

    #[test]
    fn room_type_capacity_ceilings() {
        assert_eq!(RoomType::Single.max_capacity(), 1);
        assert_eq!(RoomType::Double.max_capacity(), 2);
        assert_eq!(RoomType::Shared.max_capacity(), 10);
    }
}
