//! The assignment ledger: the only writer of room occupancy.
//!
//! Every operation runs in a single transaction and row-locks the tenant
//! first, then the room, so concurrent calls serialize instead of racing
//! the occupancy checks. The partial unique indexes on the assignments
//! table remain as the final backstop.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{map_db_error, AppError, AppResult, DomainError};
use crate::models::{Assignment, Room, RoomStatus, Tenant};
use crate::repository::{assignments, rooms, tenants};
use crate::schemas::{AssignRoomInput, ChangeRoomInput};

/// Room numbers are stored uppercase; `a101` and `A101` are the same room.
pub fn canonical_room_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn validate_dates(move_in_date: NaiveDate, lease_end_date: Option<NaiveDate>) -> AppResult<()> {
    if let Some(lease_end) = lease_end_date {
        if lease_end < move_in_date {
            return Err(AppError::BadRequest(
                "Lease end date must be on or after move in date.".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn assign(
    pool: &PgPool,
    tenant_id: Uuid,
    input: &AssignRoomInput,
) -> AppResult<(Assignment, Room)> {
    validate_dates(input.move_in_date, input.lease_end_date)?;
    let room_number = canonical_room_number(&input.room_number);

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let tenant = tenants::get_for_update(&mut tx, tenant_id).await?;
    if !tenant.is_active {
        return Err(AppError::BadRequest(
            "Cannot assign a room to an inactive tenant.".to_string(),
        ));
    }
    if let Some(current) = assignments::active_for_tenant(&mut *tx, tenant_id).await? {
        let current_room = rooms::get_by_id(&mut *tx, current.room_id).await?;
        return Err(DomainError::TenantAlreadyAssigned(current_room.room_number).into());
    }

    let room = rooms::get_by_number_for_update(&mut tx, &room_number).await?;
    if room.status == RoomStatus::Maintenance {
        return Err(DomainError::RoomUnavailable(room.room_number).into());
    }
    if assignments::active_for_room(&mut *tx, room.id)
        .await?
        .is_some()
    {
        return Err(DomainError::RoomOccupied(room.room_number).into());
    }

    // Rent is snapshotted here; later room price changes never touch it.
    let monthly_rent = input.monthly_rent.unwrap_or(room.price);

    let assignment = assignments::insert_active(
        &mut tx,
        tenant_id,
        room.id,
        &room.room_number,
        input.move_in_date,
        input.lease_end_date,
        monthly_rent,
    )
    .await?;
    rooms::set_status(&mut tx, room.id, RoomStatus::Occupied).await?;

    tx.commit().await.map_err(map_db_error)?;

    tracing::info!(
        tenant_id = %tenant_id,
        room_number = %room.room_number,
        move_in_date = %input.move_in_date,
        "Room assigned"
    );

    Ok((
        assignment,
        Room {
            status: RoomStatus::Occupied,
            ..room
        },
    ))
}

pub async fn unassign(
    pool: &PgPool,
    tenant_id: Uuid,
    move_out_date: NaiveDate,
) -> AppResult<(Assignment, Room)> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    tenants::get_for_update(&mut tx, tenant_id).await?;
    let active = assignments::active_for_tenant(&mut *tx, tenant_id)
        .await?
        .ok_or(DomainError::NoActiveAssignment)?;

    if move_out_date < active.move_in_date {
        return Err(AppError::BadRequest(
            "Move out date must be on or after move in date.".to_string(),
        ));
    }

    let closed = assignments::close(&mut tx, active.id, move_out_date).await?;
    // At most one active assignment per room, so closing it always frees
    // the room.
    rooms::set_status(&mut tx, active.room_id, RoomStatus::Available).await?;
    let room = rooms::get_by_id(&mut *tx, active.room_id).await?;

    tx.commit().await.map_err(map_db_error)?;

    tracing::info!(
        tenant_id = %tenant_id,
        room_number = %room.room_number,
        move_out_date = %move_out_date,
        "Room unassigned"
    );

    Ok((closed, room))
}

/// Moves a tenant between rooms: close the current assignment, open the
/// new one, both rooms retouched, all inside one transaction. Any failure
/// rolls back the whole move and is surfaced as a room-change error
/// wrapping the specific cause.
pub async fn change_room(
    pool: &PgPool,
    tenant_id: Uuid,
    input: &ChangeRoomInput,
    default_move_out: NaiveDate,
) -> AppResult<(Assignment, Assignment)> {
    validate_dates(input.move_in_date, input.lease_end_date).map_err(wrap_change)?;
    let new_room_number = canonical_room_number(&input.new_room_number);

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let tenant = tenants::get_for_update(&mut tx, tenant_id).await?;
    if !tenant.is_active {
        return Err(wrap_change(AppError::BadRequest(
            "Cannot move an inactive tenant.".to_string(),
        )));
    }
    let active = assignments::active_for_tenant(&mut *tx, tenant_id)
        .await?
        .ok_or(DomainError::NoActiveAssignment)
        .map_err(|e| wrap_change(e.into()))?;

    let old_room = rooms::get_by_id(&mut *tx, active.room_id).await?;
    if old_room.room_number == new_room_number {
        return Err(wrap_change(AppError::BadRequest(
            "Tenant is already in this room.".to_string(),
        )));
    }

    let move_out_date = input.move_out_date.unwrap_or(default_move_out);
    if move_out_date < active.move_in_date {
        return Err(wrap_change(AppError::BadRequest(
            "Move out date must be on or after move in date.".to_string(),
        )));
    }

    let new_room = rooms::get_by_number_for_update(&mut tx, &new_room_number).await?;
    if new_room.status == RoomStatus::Maintenance {
        return Err(wrap_change(
            DomainError::RoomUnavailable(new_room.room_number).into(),
        ));
    }
    if assignments::active_for_room(&mut *tx, new_room.id)
        .await?
        .is_some()
    {
        return Err(wrap_change(
            DomainError::RoomOccupied(new_room.room_number).into(),
        ));
    }

    let closed = assignments::close(&mut tx, active.id, move_out_date).await?;
    rooms::set_status(&mut tx, old_room.id, RoomStatus::Available).await?;

    let monthly_rent = input.monthly_rent.unwrap_or(new_room.price);
    let opened = assignments::insert_active(
        &mut tx,
        tenant_id,
        new_room.id,
        &new_room.room_number,
        input.move_in_date,
        input.lease_end_date,
        monthly_rent,
    )
    .await
    .map_err(wrap_change)?;
    rooms::set_status(&mut tx, new_room.id, RoomStatus::Occupied).await?;

    tx.commit().await.map_err(map_db_error)?;

    tracing::info!(
        tenant_id = %tenant_id,
        from = %old_room.room_number,
        to = %new_room.room_number,
        "Room changed"
    );

    Ok((closed, opened))
}

/// Soft delete. History rows are retained; the profile is deactivated.
pub async fn delete_tenant(pool: &PgPool, tenant_id: Uuid) -> AppResult<Tenant> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let tenant = tenants::get_for_update(&mut tx, tenant_id).await?;
    if assignments::active_for_tenant(&mut *tx, tenant_id)
        .await?
        .is_some()
    {
        return Err(DomainError::TenantHasAssignment.into());
    }
    tenants::deactivate(&mut tx, tenant_id).await?;

    tx.commit().await.map_err(map_db_error)?;

    tracing::info!(tenant_id = %tenant_id, "Tenant deactivated");

    Ok(Tenant {
        is_active: false,
        ..tenant
    })
}

pub async fn delete_room(pool: &PgPool, room_number: &str) -> AppResult<Room> {
    let room_number = canonical_room_number(room_number);
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let room = rooms::get_by_number_for_update(&mut tx, &room_number).await?;
    // Closed (historical) assignments do not block deletion; an active one
    // does.
    if assignments::active_for_room(&mut *tx, room.id)
        .await?
        .is_some()
    {
        return Err(DomainError::RoomOccupiedDelete(room.room_number).into());
    }
    rooms::delete(&mut *tx, room.id).await?;

    tx.commit().await.map_err(map_db_error)?;

    tracing::info!(room_number = %room.room_number, "Room deleted");

    Ok(room)
}

fn wrap_change(error: AppError) -> AppError {
    match error {
        AppError::Domain(domain) => DomainError::RoomChange(Box::new(domain)).into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn canonicalizes_room_numbers() {
        assert_eq!(canonical_room_number(" a101 "), "A101");
        assert_eq!(canonical_room_number("B205"), "B205");
    }

    #[test]
    fn lease_end_before_move_in_is_rejected() {
        assert!(validate_dates(date(2025, 3, 1), Some(date(2025, 2, 1))).is_err());
        assert!(validate_dates(date(2025, 3, 1), Some(date(2025, 3, 1))).is_ok());
        assert!(validate_dates(date(2025, 3, 1), None).is_ok());
    }

    #[test]
    fn change_wrap_preserves_non_domain_errors() {
        let wrapped = wrap_change(AppError::BadRequest("nope".to_string()));
        assert!(matches!(wrapped, AppError::BadRequest(_)));

        let wrapped = wrap_change(DomainError::RoomOccupied("C3".to_string()).into());
        match wrapped {
            AppError::Domain(domain) => {
                assert_eq!(domain.kind(), "room_change");
                assert_eq!(domain.cause_kind(), "room_occupied");
            }
            other => panic!("expected domain error, got {other:?}"),
        }
    }
}
