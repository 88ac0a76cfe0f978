use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::{is_unique_violation, map_db_error, AppResult, DomainError};
use crate::models::Assignment;

const ASSIGNMENT_COLUMNS: &str = "id, tenant_id, room_id, move_in_date, move_out_date, \
     lease_end_date, monthly_rent, created_at, updated_at";

pub async fn active_for_tenant(
    executor: impl PgExecutor<'_>,
    tenant_id: Uuid,
) -> AppResult<Option<Assignment>> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE tenant_id = $1 AND move_out_date IS NULL"
    ))
    .bind(tenant_id)
    .fetch_optional(executor)
    .await
    .map_err(map_db_error)
}

pub async fn active_for_room(
    executor: impl PgExecutor<'_>,
    room_id: Uuid,
) -> AppResult<Option<Assignment>> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE room_id = $1 AND move_out_date IS NULL"
    ))
    .bind(room_id)
    .fetch_optional(executor)
    .await
    .map_err(map_db_error)
}

/// Active assignments for a set of tenants in one round trip, for list
/// enrichment.
pub async fn active_for_tenants(
    executor: impl PgExecutor<'_>,
    tenant_ids: &[Uuid],
) -> AppResult<Vec<Assignment>> {
    if tenant_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE tenant_id = ANY($1) AND move_out_date IS NULL"
    ))
    .bind(tenant_ids)
    .fetch_all(executor)
    .await
    .map_err(map_db_error)
}

/// All assignments for a tenant, newest move-in first. History rows are
/// never mutated, only closed, so this is the tenant's full ledger.
pub async fn history_for_tenant(
    executor: impl PgExecutor<'_>,
    tenant_id: Uuid,
) -> AppResult<Vec<Assignment>> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE tenant_id = $1 ORDER BY move_in_date DESC"
    ))
    .bind(tenant_id)
    .fetch_all(executor)
    .await
    .map_err(map_db_error)
}

/// Active assignments joined against active tenants, for monthly billing.
pub async fn list_billable(executor: impl PgExecutor<'_>) -> AppResult<Vec<Assignment>> {
    sqlx::query_as::<_, Assignment>(
        "SELECT a.id, a.tenant_id, a.room_id, a.move_in_date, a.move_out_date,
                a.lease_end_date, a.monthly_rent, a.created_at, a.updated_at
         FROM assignments a
         JOIN tenants t ON t.id = a.tenant_id
         WHERE a.move_out_date IS NULL AND t.is_active = TRUE
         ORDER BY a.move_in_date ASC",
    )
    .fetch_all(executor)
    .await
    .map_err(map_db_error)
}

/// Inserts a new active assignment. The partial unique indexes are the
/// race-safe backstop: a concurrent insert for the same room or tenant
/// surfaces as the matching domain error instead of a double booking.
pub async fn insert_active(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    room_id: Uuid,
    room_number: &str,
    move_in_date: NaiveDate,
    lease_end_date: Option<NaiveDate>,
    monthly_rent: Decimal,
) -> AppResult<Assignment> {
    sqlx::query_as::<_, Assignment>(&format!(
        "INSERT INTO assignments (tenant_id, room_id, move_in_date, lease_end_date, monthly_rent)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(room_id)
    .bind(move_in_date)
    .bind(lease_end_date)
    .bind(monthly_rent)
    .fetch_one(&mut *conn)
    .await
    .map_err(|error| {
        if is_unique_violation(&error, "assignments_one_active_per_room") {
            DomainError::RoomOccupied(room_number.to_string()).into()
        } else if is_unique_violation(&error, "assignments_one_active_per_tenant") {
            DomainError::TenantAlreadyAssigned(room_number.to_string()).into()
        } else {
            map_db_error(error)
        }
    })
}

pub async fn close(
    conn: &mut PgConnection,
    assignment_id: Uuid,
    move_out_date: NaiveDate,
) -> AppResult<Assignment> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE assignments SET move_out_date = $1, updated_at = now()
         WHERE id = $2
         RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(move_out_date)
    .bind(assignment_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}
