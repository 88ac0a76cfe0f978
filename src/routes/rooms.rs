use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::{require_admin, require_user},
    error::{AppError, AppResult},
    models::{RoomStatus, RoomType},
    repository::{assignments, rooms},
    schemas::{
        clamp_limit_in_range, validate_input, CreateRoomInput, RoomNumberPath, RoomsQuery,
        UpdateRoomInput,
    },
    services::assignments::{canonical_room_number, delete_room},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/rooms", axum::routing::get(list_rooms).post(create_room))
        .route("/rooms/available", axum::routing::get(list_available_rooms))
        .route(
            "/rooms/{room_number}",
            axum::routing::get(get_room)
                .patch(update_room)
                .delete(remove_room),
        )
}

async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    let rows = rooms::list(pool, &query, limit).await?;

    Ok(Json(json!({ "count": rows.len(), "rooms": rows })))
}

async fn list_available_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let query = RoomsQuery {
        status: Some(RoomStatus::Available),
        room_type: None,
        floor: None,
        min_price: None,
        max_price: None,
        limit: 1000,
    };
    let rows = rooms::list(pool, &query, 1000).await?;

    Ok(Json(json!({ "count": rows.len(), "rooms": rows })))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    validate_input(&payload)?;
    validate_capacity(payload.room_type, payload.capacity)?;
    let pool = state.db_pool()?;

    let room_number = canonical_room_number(&payload.room_number);
    let room = rooms::create(
        pool,
        &room_number,
        payload.room_type,
        payload.floor,
        payload.capacity,
        payload.price,
        &payload.facilities,
        &payload.description,
    )
    .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "message": format!("Room {} created successfully", room.room_number),
            "room": room,
        })),
    ))
}

async fn get_room(
    State(state): State<AppState>,
    Path(path): Path<RoomNumberPath>,
    headers: HeaderMap,
) -> AppResult<Json<crate::models::Room>> {
    require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let room = rooms::get_by_number(pool, &canonical_room_number(&path.room_number)).await?;
    Ok(Json(room))
}

async fn update_room(
    State(state): State<AppState>,
    Path(path): Path<RoomNumberPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRoomInput>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let room = rooms::get_by_number(pool, &canonical_room_number(&path.room_number)).await?;

    if let Some(status) = payload.status {
        // Occupancy is owned by the assignment ledger; clients may only
        // toggle between available and maintenance.
        if status == RoomStatus::Occupied {
            return Err(AppError::BadRequest(
                "Room status 'occupied' is derived from assignments and cannot be set directly."
                    .to_string(),
            ));
        }
        if assignments::active_for_room(pool, room.id).await?.is_some() {
            return Err(AppError::BadRequest(
                "Room status cannot be changed while the room has an active assignment."
                    .to_string(),
            ));
        }
    }

    let room_type = payload.room_type.unwrap_or(room.room_type);
    let capacity = payload.capacity.unwrap_or(room.capacity);
    validate_capacity(room_type, capacity)?;

    let updated = rooms::update(pool, room.id, &payload).await?;
    Ok(Json(json!({
        "message": "Room updated successfully",
        "room": updated,
    })))
}

async fn remove_room(
    State(state): State<AppState>,
    Path(path): Path<RoomNumberPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let room = delete_room(pool, &path.room_number).await?;
    Ok(Json(json!({
        "message": format!("Room {} deleted successfully", room.room_number),
    })))
}

fn validate_capacity(room_type: RoomType, capacity: i32) -> AppResult<()> {
    if capacity < 1 || capacity > room_type.max_capacity() {
        return Err(AppError::UnprocessableEntity(format!(
            "Capacity {capacity} is not valid for a {room_type:?} room (max {}).",
            room_type.max_capacity()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_room_type() {
        assert!(validate_capacity(RoomType::Single, 1).is_ok());
        assert!(validate_capacity(RoomType::Single, 2).is_err());
        assert!(validate_capacity(RoomType::Double, 2).is_ok());
        assert!(validate_capacity(RoomType::Double, 3).is_err());
        assert!(validate_capacity(RoomType::Shared, 10).is_ok());
        assert!(validate_capacity(RoomType::Shared, 0).is_err());
    }
}
