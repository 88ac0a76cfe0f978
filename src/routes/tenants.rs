use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::{require_admin, require_user},
    error::{AppError, AppResult},
    models::Tenant,
    repository::{assignments, rooms, tenants},
    schemas::{
        clamp_limit_in_range, validate_input, AssignRoomInput, ChangeRoomInput, CreateTenantInput,
        RoomNumberPath, TenantPath, TenantsQuery, UnassignInput, UpdateTenantInput,
    },
    services::{self, assignments::canonical_room_number, history, local_today},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/tenants", axum::routing::get(list_tenants).post(create_tenant))
        .route("/tenants/me", axum::routing::get(get_my_profile))
        .route(
            "/tenants/by-room/{room_number}",
            axum::routing::get(get_tenant_by_room),
        )
        .route(
            "/tenants/{tenant_id}",
            axum::routing::get(get_tenant)
                .patch(update_tenant)
                .delete(delete_tenant),
        )
        .route(
            "/tenants/{tenant_id}/assign",
            axum::routing::post(assign_room),
        )
        .route(
            "/tenants/{tenant_id}/unassign",
            axum::routing::post(unassign_room),
        )
        .route(
            "/tenants/{tenant_id}/change-room",
            axum::routing::post(change_room),
        )
}

async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<TenantsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    let rows = tenants::list(pool, query.is_active, limit).await?;

    let tenant_ids = rows.iter().map(|t| t.id).collect::<Vec<_>>();
    let active = assignments::active_for_tenants(pool, &tenant_ids).await?;
    let active_by_tenant: HashMap<Uuid, _> =
        active.into_iter().map(|a| (a.tenant_id, a)).collect();

    let rows = match query.has_assignment {
        Some(true) => rows
            .into_iter()
            .filter(|t| active_by_tenant.contains_key(&t.id))
            .collect::<Vec<_>>(),
        Some(false) => rows
            .into_iter()
            .filter(|t| !active_by_tenant.contains_key(&t.id))
            .collect(),
        None => rows,
    };

    let data = rows
        .iter()
        .map(|tenant| {
            json!({
                "tenant": tenant,
                "current_assignment": active_by_tenant.get(&tenant.id),
            })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({ "count": data.len(), "tenants": data })))
}

async fn create_tenant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTenantInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    validate_input(&payload)?;
    let pool = state.db_pool()?;

    let tenant = tenants::create(pool, &payload).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "message": "Tenant profile created successfully",
            "tenant": tenant,
        })),
    ))
}

async fn get_my_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let tenant = match user.tenant_id {
        Some(tenant_id) => tenants::get(pool, tenant_id).await?,
        None => tenants::get_by_user(pool, user.user_id).await?,
    };
    tenant_profile_response(&state, tenant).await
}

async fn get_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    if !user.can_access_tenant(path.tenant_id) {
        return Err(AppError::Forbidden(
            "You can only view your own profile.".to_string(),
        ));
    }
    let pool = state.db_pool()?;

    let tenant = tenants::get(pool, path.tenant_id).await?;
    tenant_profile_response(&state, tenant).await
}

/// Profile plus the full assignment ledger for the tenant.
async fn tenant_profile_response(state: &AppState, tenant: Tenant) -> AppResult<Json<Value>> {
    let pool = state.db_pool()?;

    let history = assignments::history_for_tenant(pool, tenant.id).await?;
    let (current, past): (Vec<_>, Vec<_>) = history.into_iter().partition(|a| a.is_current());

    let current_room = match current.first() {
        Some(assignment) => {
            let room = rooms::get_by_id(pool, assignment.room_id).await?;
            Some(json!({ "assignment": assignment, "room": room }))
        }
        None => None,
    };

    Ok(Json(json!({
        "tenant": tenant,
        "current_assignment": current_room,
        "assignment_history": past,
    })))
}

async fn update_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateTenantInput>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    if !user.can_access_tenant(path.tenant_id) {
        return Err(AppError::Forbidden(
            "You can only update your own profile.".to_string(),
        ));
    }
    // Tenants may maintain their contact details; the name stays
    // admin-managed.
    if !user.is_admin() && payload.full_name.is_some() {
        return Err(AppError::Forbidden(
            "Only admins can change the tenant name.".to_string(),
        ));
    }
    let pool = state.db_pool()?;

    let tenant = tenants::update(pool, path.tenant_id, &payload).await?;
    Ok(Json(json!({
        "message": "Tenant updated successfully",
        "tenant": tenant,
    })))
}

async fn delete_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let tenant = services::assignments::delete_tenant(pool, path.tenant_id).await?;
    history::invalidate(&state, path.tenant_id).await;

    Ok(Json(json!({
        "message": "Tenant deactivated successfully. Assignment history is retained.",
        "tenant": tenant,
    })))
}

async fn assign_room(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
    Json(payload): Json<AssignRoomInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let (assignment, room) = services::assignments::assign(pool, path.tenant_id, &payload).await?;
    history::invalidate(&state, path.tenant_id).await;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "message": format!("Room {} assigned successfully", room.room_number),
            "assignment": assignment,
            "room": room,
        })),
    ))
}

async fn unassign_room(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
    payload: Option<Json<UnassignInput>>,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let input = payload.map(|Json(input)| input).unwrap_or_default();
    let move_out_date = input
        .move_out_date
        .unwrap_or_else(|| local_today(&state.config));

    let (assignment, room) =
        services::assignments::unassign(pool, path.tenant_id, move_out_date).await?;
    history::invalidate(&state, path.tenant_id).await;

    Ok(Json(json!({
        "message": format!("Assignment ended. Room {} is available again.", room.room_number),
        "assignment": assignment,
        "room": room,
    })))
}

async fn change_room(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    headers: HeaderMap,
    Json(payload): Json<ChangeRoomInput>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let pool = state.db_pool()?;

    let default_move_out = local_today(&state.config);
    let (closed, opened) =
        services::assignments::change_room(pool, path.tenant_id, &payload, default_move_out)
            .await?;
    history::invalidate(&state, path.tenant_id).await;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "message": "Room changed successfully",
            "old_assignment": closed,
            "new_assignment": opened,
        })),
    ))
}

async fn get_tenant_by_room(
    State(state): State<AppState>,
    Path(path): Path<RoomNumberPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db_pool()?;

    let room = rooms::get_by_number(pool, &canonical_room_number(&path.room_number)).await?;
    let Some(assignment) = assignments::active_for_room(pool, room.id).await? else {
        return Ok(Json(json!({
            "message": format!("Room {} is currently unoccupied", room.room_number),
            "room": room,
            "tenant": Value::Null,
            "assignment": Value::Null,
        })));
    };

    if !user.can_access_tenant(assignment.tenant_id) {
        return Err(AppError::Forbidden(
            "You can only view your own room.".to_string(),
        ));
    }

    let tenant = tenants::get(pool, assignment.tenant_id).await?;
    Ok(Json(json!({
        "room": room,
        "tenant": tenant,
        "assignment": assignment,
    })))
}
