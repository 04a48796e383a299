/// Role model and database operations
///
/// Roles bundle permissions; users receive permissions only through roles.
/// The `admin` role is special: it implicitly grants every permission, it
/// cannot be renamed or deleted, and at least one user must always hold it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE roles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     description TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE role_permissions (
///     role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
///     permission_id UUID NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
///     PRIMARY KEY (role_id, permission_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::ModelError;

/// Name of the role that bypasses permission checks
pub const ADMIN_ROLE: &str = "admin";

/// Role model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role row for the index page
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permission_count: i64,
    pub user_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a role
#[derive(Debug, Clone)]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
    pub permission_ids: Vec<Uuid>,
}

/// Input for updating a role; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub permission_ids: Option<Vec<Uuid>>,
}

impl Role {
    /// Whether this is the protected admin role
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_ROLE
    }

    /// Creates a role and attaches its permissions in one transaction
    pub async fn create(pool: &PgPool, data: CreateRole) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(data.name.trim().to_lowercase())
        .bind(data.description)
        .fetch_one(&mut *tx)
        .await?;

        sync_permissions(&mut tx, role.id, &data.permission_ids).await?;
        tx.commit().await?;

        tracing::info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    /// Finds a role by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a role by name
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Lists all roles with permission and user counts
    pub async fn list_with_counts(pool: &PgPool) -> Result<Vec<RoleSummary>, sqlx::Error> {
        sqlx::query_as::<_, RoleSummary>(
            r#"
            SELECT r.id, r.name, r.description, r.created_at,
                   (SELECT COUNT(*) FROM role_permissions rp WHERE rp.role_id = r.id) AS permission_count,
                   (SELECT COUNT(*) FROM user_roles ur WHERE ur.role_id = r.id) AS user_count
            FROM roles r
            ORDER BY r.name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Role names held by a user
    pub async fn names_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Counts how many of the given IDs exist
    pub async fn count_existing(pool: &PgPool, ids: &[Uuid]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await
    }

    /// Updates a role
    ///
    /// # Errors
    ///
    /// - `NotFound` if the role does not exist
    /// - `Conflict` when renaming the admin role
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateRole) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ModelError::NotFound("Role"))?;

        let name = data.name.map(|n| n.trim().to_lowercase());
        if existing.is_admin() && name.as_deref().is_some_and(|n| n != ADMIN_ROLE) {
            return Err(ModelError::Conflict("The admin role cannot be renamed".to_string()));
        }

        let description = match data.description {
            Some(description) => description,
            None => existing.description.clone(),
        };

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name.unwrap_or(existing.name))
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(permission_ids) = data.permission_ids {
            sync_permissions(&mut tx, id, &permission_ids).await?;
        }

        tx.commit().await?;
        Ok(role)
    }

    /// Deletes a role
    ///
    /// # Errors
    ///
    /// - `Conflict` for the admin role or while users still hold the role
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ModelError> {
        let role = Self::find_by_id(pool, id)
            .await?
            .ok_or(ModelError::NotFound("Role"))?;

        if role.is_admin() {
            return Err(ModelError::Conflict("The admin role cannot be deleted".to_string()));
        }

        let holders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

        if holders > 0 {
            return Err(ModelError::Conflict(format!(
                "Role is assigned to {} user(s); reassign them first",
                holders
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        tracing::info!(role_id = %id, name = %role.name, "Role deleted");
        Ok(())
    }
}

/// Replaces the permission set of a role
pub(crate) async fn sync_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role_id: Uuid,
    permission_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    if !permission_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(role("admin").is_admin());
        assert!(!role("manager").is_admin());
    }

    #[test]
    fn test_update_role_default_changes_nothing() {
        let update = UpdateRole::default();
        assert!(update.name.is_none());
        assert!(update.description.is_none());
        assert!(update.permission_ids.is_none());
    }
}
