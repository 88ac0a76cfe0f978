use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::Value;

use crate::{
    auth::require_user,
    error::{AppError, AppResult},
    schemas::{HistoryQuery, TenantPath},
    services::history,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/tenants/{tenant_id}/history",
        axum::routing::get(get_tenant_history),
    )
}

/// Trailing 12-month rollup of payments and complaints for a tenant
/// profile page. Admins can read anyone; tenants only themselves.
async fn get_tenant_history(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    if !user.can_access_tenant(path.tenant_id) {
        return Err(AppError::Forbidden(
            "You can only view your own history.".to_string(),
        ));
    }

    let window_months = query.window_months.clamp(1, 36);
    let response = history::get_history(&state, path.tenant_id, window_months).await?;
    Ok(Json(response))
}
