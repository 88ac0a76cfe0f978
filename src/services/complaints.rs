//! Client for the external complaint subsystem. This backend never writes
//! complaints; the history aggregator only reads them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ComplaintRecord {
    pub category: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ComplaintsResponse {
    data: Vec<ComplaintRecord>,
}

/// Complaints for a tenant in a date range. An unconfigured complaints
/// service yields an empty history rather than a failure; the rest of the
/// profile still renders.
pub async fn complaints_for_tenant(
    state: &AppState,
    tenant_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<ComplaintRecord>> {
    let Some(base_url) = state.config.complaints_api_url.as_deref() else {
        tracing::debug!("COMPLAINTS_API_URL not set; returning empty complaint history");
        return Ok(Vec::new());
    };

    let url = format!("{}/complaints", base_url.trim_end_matches('/'));
    let response = state
        .http_client
        .get(&url)
        .query(&[
            ("tenant_id", tenant_id.to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ])
        .send()
        .await
        .map_err(|error| AppError::Dependency(format!("Complaints request failed: {error}")))?;

    if !response.status().is_success() {
        return Err(AppError::Dependency(format!(
            "Complaints service returned {}",
            response.status()
        )));
    }

    let body: ComplaintsResponse = response
        .json()
        .await
        .map_err(|error| AppError::Dependency(format!("Complaints response invalid: {error}")))?;

    Ok(body.data)
}
