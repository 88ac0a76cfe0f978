use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::{Room, RoomStatus};
use crate::schemas::{RoomsQuery, UpdateRoomInput};

const ROOM_COLUMNS: &str = "id, room_number, room_type, floor, capacity, price, status, \
     facilities, description, created_at, updated_at";

pub async fn list(pool: impl PgExecutor<'_>, query: &RoomsQuery, limit: i64) -> AppResult<Vec<Room>> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE 1=1"));
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(room_type) = query.room_type {
        builder.push(" AND room_type = ").push_bind(room_type);
    }
    if let Some(floor) = query.floor {
        builder.push(" AND floor = ").push_bind(floor);
    }
    if let Some(min_price) = query.min_price {
        builder.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = query.max_price {
        builder.push(" AND price <= ").push_bind(max_price);
    }
    builder.push(" ORDER BY room_number ASC LIMIT ").push_bind(limit);

    builder
        .build_query_as::<Room>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get_by_id(executor: impl PgExecutor<'_>, room_id: Uuid) -> AppResult<Room> {
    sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
        .bind(room_id)
        .fetch_optional(executor)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))
}

pub async fn get_by_number(pool: impl PgExecutor<'_>, room_number: &str) -> AppResult<Room> {
    sqlx::query_as::<_, Room>(&format!(
        "SELECT {ROOM_COLUMNS} FROM rooms WHERE room_number = $1"
    ))
    .bind(room_number)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound(format!("Room {room_number} not found.")))
}

/// Row-locked fetch used inside assignment transactions so two concurrent
/// assigns cannot both pass the occupancy check.
pub async fn get_by_number_for_update(
    conn: &mut PgConnection,
    room_number: &str,
) -> AppResult<Room> {
    sqlx::query_as::<_, Room>(&format!(
        "SELECT {ROOM_COLUMNS} FROM rooms WHERE room_number = $1 FOR UPDATE"
    ))
    .bind(room_number)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound(format!("Room {room_number} not found.")))
}

pub async fn create(
    pool: impl PgExecutor<'_>,
    room_number: &str,
    room_type: crate::models::RoomType,
    floor: i32,
    capacity: i32,
    price: Decimal,
    facilities: &str,
    description: &str,
) -> AppResult<Room> {
    sqlx::query_as::<_, Room>(&format!(
        "INSERT INTO rooms (room_number, room_type, floor, capacity, price, facilities, description)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {ROOM_COLUMNS}"
    ))
    .bind(room_number)
    .bind(room_type)
    .bind(floor)
    .bind(capacity)
    .bind(price)
    .bind(facilities)
    .bind(description)
    .fetch_one(pool)
    .await
    .map_err(|error| {
        if crate::error::is_unique_violation(&error, "rooms_room_number_key") {
            AppError::BadRequest(format!("Room {room_number} already exists."))
        } else {
            map_db_error(error)
        }
    })
}

pub async fn update(
    pool: impl PgExecutor<'_>,
    room_id: Uuid,
    input: &UpdateRoomInput,
) -> AppResult<Room> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE rooms SET updated_at = now()");
    if let Some(room_type) = input.room_type {
        builder.push(", room_type = ").push_bind(room_type);
    }
    if let Some(floor) = input.floor {
        builder.push(", floor = ").push_bind(floor);
    }
    if let Some(capacity) = input.capacity {
        builder.push(", capacity = ").push_bind(capacity);
    }
    if let Some(price) = input.price {
        builder.push(", price = ").push_bind(price);
    }
    if let Some(status) = input.status {
        builder.push(", status = ").push_bind(status);
    }
    if let Some(facilities) = &input.facilities {
        builder.push(", facilities = ").push_bind(facilities);
    }
    if let Some(description) = &input.description {
        builder.push(", description = ").push_bind(description);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(room_id)
        .push(format!(" RETURNING {ROOM_COLUMNS}"));

    builder
        .build_query_as::<Room>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))
}

pub async fn set_status(
    conn: &mut PgConnection,
    room_id: Uuid,
    status: RoomStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE rooms SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status)
        .bind(room_id)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

pub async fn delete(pool: impl PgExecutor<'_>, room_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM rooms WHERE id = $1")
        .bind(room_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;
    Ok(())
}
