use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Principal supplied by the external identity provider. The token is
/// issued elsewhere; this backend only verifies and trusts it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    /// Linked tenant record, present for tenant-role principals.
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Tenant,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when the principal may read records belonging to `tenant_id`.
    pub fn can_access_tenant(&self, tenant_id: Uuid) -> bool {
        self.is_admin() || self.tenant_id == Some(tenant_id)
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    #[serde(default)]
    tenant_id: Option<String>,
}

pub async fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<AuthUser> {
    if let Some(user) = dev_override_user(state, headers)? {
        return Ok(user);
    }

    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token.".to_string()))?;

    let secret = state.config.auth_jwt_secret.as_deref().ok_or_else(|| {
        AppError::Dependency("Auth is not configured. Set AUTH_JWT_SECRET.".to_string())
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|error| AppError::Unauthorized(format!("Invalid token: {error}")))?;

    auth_user_from_parts(
        &data.claims.sub,
        &data.claims.role,
        data.claims.tenant_id.as_deref(),
    )
}

pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<AuthUser> {
    let user = require_user(state, headers).await?;
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Permission denied. Admin access required.".to_string(),
        ));
    }
    Ok(user)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Dev-only header overrides, disabled in production. Mirrors the local
/// workflow where the frontend runs without an identity provider.
fn dev_override_user(state: &AppState, headers: &HeaderMap) -> AppResult<Option<AuthUser>> {
    if !state.config.auth_dev_overrides_enabled() {
        return Ok(None);
    }
    let Some(user_id) = headers.get("x-user-id").and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("admin");
    let tenant_id = headers.get("x-tenant-id").and_then(|v| v.to_str().ok());

    auth_user_from_parts(user_id, role, tenant_id).map(Some)
}

fn auth_user_from_parts(
    user_id: &str,
    role: &str,
    tenant_id: Option<&str>,
) -> AppResult<AuthUser> {
    let user_id = Uuid::parse_str(user_id.trim())
        .map_err(|_| AppError::Unauthorized("Invalid principal id.".to_string()))?;

    let role = match role.trim().to_ascii_lowercase().as_str() {
        "admin" => Role::Admin,
        "tenant" | "user" => Role::Tenant,
        other => {
            return Err(AppError::Unauthorized(format!(
                "Unknown principal role '{other}'."
            )))
        }
    };

    let tenant_id = match tenant_id.map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| AppError::Unauthorized("Invalid tenant id claim.".to_string()))?,
        ),
        None => None,
    };

    Ok(AuthUser {
        user_id,
        role,
        tenant_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_principal() {
        let id = Uuid::new_v4();
        let user = auth_user_from_parts(&id.to_string(), "admin", None).unwrap();
        assert!(user.is_admin());
        assert!(user.can_access_tenant(Uuid::new_v4()));
    }

    #[test]
    fn tenant_principal_only_reaches_own_records() {
        let tenant_id = Uuid::new_v4();
        let user = auth_user_from_parts(
            &Uuid::new_v4().to_string(),
            "tenant",
            Some(&tenant_id.to_string()),
        )
        .unwrap();
        assert!(!user.is_admin());
        assert!(user.can_access_tenant(tenant_id));
        assert!(!user.can_access_tenant(Uuid::new_v4()));
    }

    #[test]
    fn rejects_unknown_roles() {
        assert!(auth_user_from_parts(&Uuid::new_v4().to_string(), "root", None).is_err());
    }
}
