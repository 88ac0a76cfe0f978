use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Business-rule violations. Each variant has a stable `kind` string that
/// the web client matches on, and a message naming the violated invariant.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Room {0} is already occupied")]
    RoomOccupied(String),
    #[error("Room {0} is under maintenance and cannot be assigned")]
    RoomUnavailable(String),
    #[error("Tenant already has an active assignment in room {0}")]
    TenantAlreadyAssigned(String),
    #[error("Tenant does not have an active room assignment")]
    NoActiveAssignment,
    #[error("Cannot delete room {0} while it is occupied. End the assignment first.")]
    RoomOccupiedDelete(String),
    #[error("Cannot delete tenant with an active room assignment. End the assignment first.")]
    TenantHasAssignment,
    #[error("A payment for period {month}/{year} already exists for this tenant")]
    DuplicatePeriod { month: u32, year: i32 },
    #[error("Paid payments cannot be deleted. Cancel them instead.")]
    CannotDeletePaid,
    #[error("Invalid proof of payment file: {0}")]
    InvalidFile(String),
    #[error("Room change failed: {0}")]
    RoomChange(#[source] Box<DomainError>),
}

impl DomainError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomOccupied(_) => "room_occupied",
            Self::RoomUnavailable(_) => "room_unavailable",
            Self::TenantAlreadyAssigned(_) => "tenant_already_assigned",
            Self::NoActiveAssignment => "no_active_assignment",
            Self::RoomOccupiedDelete(_) => "room_occupied_delete",
            Self::TenantHasAssignment => "tenant_has_assignment",
            Self::DuplicatePeriod { .. } => "duplicate_period",
            Self::CannotDeletePaid => "cannot_delete_paid",
            Self::InvalidFile(_) => "invalid_file",
            Self::RoomChange(_) => "room_change",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidFile(_) => StatusCode::BAD_REQUEST,
            Self::RoomChange(cause) => cause.status_code(),
            _ => StatusCode::CONFLICT,
        }
    }

    /// The innermost cause kind, for wrapped room-change failures.
    pub fn cause_kind(&self) -> &'static str {
        match self {
            Self::RoomChange(cause) => cause.cause_kind(),
            other => other.kind(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Domain(domain) => domain.status_code(),
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::UnprocessableEntity(_) => "validation_failed",
            Self::Domain(domain) => domain.kind(),
            Self::Dependency(_) => "dependency",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        // Infrastructure failures are surfaced generically; the detail
        // stays in the logs.
        let message = match &self {
            Self::Dependency(_) => "A backing service is unavailable. Try again later.".to_string(),
            Self::Internal(_) => "Internal server error.".to_string(),
            other => other.to_string(),
        };

        let body = match &self {
            Self::Domain(domain @ DomainError::RoomChange(_)) => json!({
                "error": {
                    "kind": domain.kind(),
                    "cause": domain.cause_kind(),
                    "message": message,
                }
            }),
            _ => json!({
                "error": {
                    "kind": self.kind(),
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// True when `error` is a unique-constraint violation on the named
/// constraint. The callers translate these into the matching domain error;
/// the constraints are the race-safe backstop behind the service-level
/// precondition checks.
pub fn is_unique_violation(error: &sqlx::Error, constraint: &str) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.constraint() == Some(constraint),
        _ => false,
    }
}

/// Maps low-level sqlx failures onto an infrastructure error. The detail
/// is kept for the logs; clients see a generic dependency failure.
pub fn map_db_error(error: sqlx::Error) -> AppError {
    AppError::Dependency(format!("Database request failed: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_kinds_are_stable() {
        assert_eq!(DomainError::RoomOccupied("A101".into()).kind(), "room_occupied");
        assert_eq!(DomainError::NoActiveAssignment.kind(), "no_active_assignment");
        assert_eq!(
            DomainError::DuplicatePeriod { month: 11, year: 2025 }.kind(),
            "duplicate_period"
        );
        assert_eq!(DomainError::CannotDeletePaid.kind(), "cannot_delete_paid");
    }

    #[test]
    fn room_change_wraps_cause() {
        let err = DomainError::RoomChange(Box::new(DomainError::RoomOccupied("B202".into())));
        assert_eq!(err.kind(), "room_change");
        assert_eq!(err.cause_kind(), "room_occupied");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn domain_errors_map_to_conflict() {
        assert_eq!(
            DomainError::TenantHasAssignment.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DomainError::InvalidFile("too large".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn messages_name_the_violated_invariant() {
        let message = DomainError::RoomOccupied("A101".into()).to_string();
        assert!(message.contains("A101"));
        assert!(message.contains("occupied"));
    }
}
