use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness probe. Reports degraded instead of hanging when the database
/// is slow to answer.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = match &state.db_pool {
        Some(pool) => {
            let ping = sqlx::query("SELECT 1").fetch_one(pool);
            match tokio::time::timeout(Duration::from_secs(3), ping).await {
                Ok(Ok(_)) => true,
                Ok(Err(error)) => {
                    tracing::error!(error = %error, "Health check DB query failed");
                    false
                }
                Err(_) => {
                    tracing::error!("Health check DB query timed out (3s)");
                    false
                }
            }
        }
        // No database configured; the process itself is healthy.
        None => true,
    };

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "now": Utc::now().to_rfc3339(),
        "db": db_ok,
    }))
}
