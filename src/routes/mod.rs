use axum::{routing::get, Router};

use crate::state::AppState;

pub mod health;
pub mod history;
pub mod payments;
pub mod rooms;
pub mod tenants;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(rooms::router())
        .merge(tenants::router())
        .merge(payments::router())
        .merge(history::router())
}
