use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::Tenant;
use crate::schemas::{CreateTenantInput, UpdateTenantInput};

const TENANT_COLUMNS: &str = "id, user_id, full_name, email, phone, id_number, \
     emergency_contact_name, emergency_contact_phone, occupation, is_active, \
     created_at, updated_at";

pub async fn list(pool: impl PgExecutor<'_>, is_active: Option<bool>, limit: i64) -> AppResult<Vec<Tenant>> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE 1=1"));
    if let Some(is_active) = is_active {
        builder.push(" AND is_active = ").push_bind(is_active);
    }
    builder.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

    builder
        .build_query_as::<Tenant>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: impl PgExecutor<'_>, tenant_id: Uuid) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

/// Row-locked fetch used inside assignment transactions.
pub async fn get_for_update(conn: &mut PgConnection, tenant_id: Uuid) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1 FOR UPDATE"
    ))
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

pub async fn create(pool: impl PgExecutor<'_>, input: &CreateTenantInput) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "INSERT INTO tenants (user_id, full_name, email, phone, id_number,
             emergency_contact_name, emergency_contact_phone, occupation)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {TENANT_COLUMNS}"
    ))
    .bind(input.user_id)
    .bind(&input.full_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(&input.id_number)
    .bind(&input.emergency_contact_name)
    .bind(&input.emergency_contact_phone)
    .bind(&input.occupation)
    .fetch_one(pool)
    .await
    .map_err(|error| {
        if crate::error::is_unique_violation(&error, "tenants_user_id_key") {
            AppError::BadRequest("A tenant profile already exists for this user.".to_string())
        } else {
            map_db_error(error)
        }
    })
}

pub async fn update(
    pool: impl PgExecutor<'_>,
    tenant_id: Uuid,
    input: &UpdateTenantInput,
) -> AppResult<Tenant> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE tenants SET updated_at = now()");
    if let Some(full_name) = &input.full_name {
        builder.push(", full_name = ").push_bind(full_name);
    }
    if let Some(phone) = &input.phone {
        builder.push(", phone = ").push_bind(phone);
    }
    if let Some(id_number) = &input.id_number {
        builder.push(", id_number = ").push_bind(id_number);
    }
    if let Some(name) = &input.emergency_contact_name {
        builder.push(", emergency_contact_name = ").push_bind(name);
    }
    if let Some(phone) = &input.emergency_contact_phone {
        builder.push(", emergency_contact_phone = ").push_bind(phone);
    }
    if let Some(occupation) = &input.occupation {
        builder.push(", occupation = ").push_bind(occupation);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(tenant_id)
        .push(format!(" RETURNING {TENANT_COLUMNS}"));

    builder
        .build_query_as::<Tenant>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

/// Soft delete: the profile is deactivated, assignment history stays.
pub async fn deactivate(conn: &mut PgConnection, tenant_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE tenants SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(tenant_id)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

pub async fn get_by_user(pool: impl PgExecutor<'_>, user_id: Uuid) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("No tenant profile for this user.".to_string()))
}
