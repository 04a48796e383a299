/// User model and database operations
///
/// Users sign in with email and password and receive permissions through
/// roles. Email uniqueness is case-insensitive (unique index on
/// `LOWER(email)`), so every lookup compares lowercased values.
///
/// Two rules protect the installation from locking itself out:
///
/// - nobody can delete their own account
/// - the last user holding the `admin` role can neither be deleted nor lose
///   the role
///
/// Both checks run inside the same transaction as the write, after taking a
/// row lock on the admin role so concurrent demotions serialize.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::role::ADMIN_ROLE;
use super::{like_pattern, ModelError};
use crate::pagination::{Page, PageParams};

const USER_COLUMNS: &str =
    "id, email, password_hash, name, is_active, created_at, updated_at, last_login_at";

/// User account
///
/// Passwords are stored as Argon2id hashes and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: String,

    /// Inactive users cannot sign in and fail every permission check
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// User row for listings, with role names attached
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id hash, not the plaintext password
    pub password_hash: String,

    pub name: String,
    pub is_active: bool,
}

/// Input for updating an existing user; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,

    /// Replaces the user's roles when present
    pub role_ids: Option<Vec<Uuid>>,
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Matches name or email
    pub search: Option<String>,

    /// Role name
    pub role: Option<String>,

    pub is_active: Option<bool>,
}

/// Refuses a change that would leave the system without an admin
///
/// `target_is_admin` is whether the user currently holds the admin role,
/// `keeps_admin` whether they still will after the change, and
/// `other_admins` how many other users hold it.
pub fn ensure_admin_remains(
    target_is_admin: bool,
    keeps_admin: bool,
    other_admins: i64,
) -> Result<(), ModelError> {
    if target_is_admin && !keeps_admin && other_admins == 0 {
        return Err(ModelError::Conflict(
            "At least one administrator must remain".to_string(),
        ));
    }
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE TRUE");

    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(role) = filter.role.as_deref().filter(|r| !r.is_empty()) {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM user_roles fr JOIN roles frr ON frr.id = fr.role_id \
                 WHERE fr.user_id = u.id AND frr.name = ",
            )
            .push_bind(role.to_string())
            .push(")");
    }

    if let Some(is_active) = filter.is_active {
        builder.push(" AND u.is_active = ").push_bind(is_active);
    }
}

impl User {
    /// Creates a user without roles
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, name, is_active) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(data.email.trim().to_lowercase())
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    /// Creates a user and assigns roles in one transaction
    pub async fn create_with_roles(
        pool: &PgPool,
        data: CreateUser,
        role_ids: &[Uuid],
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, name, is_active) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(data.email.trim().to_lowercase())
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.is_active)
        .fetch_one(&mut *tx)
        .await?;

        assign_roles(&mut tx, user.id, role_ids).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, roles = role_ids.len(), "User created");
        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(pool)
        .await
    }

    /// Checks whether an email is taken, optionally ignoring one user
    pub async fn email_exists(
        pool: &PgPool,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email.trim())
        .bind(except)
        .fetch_one(pool)
        .await
    }

    /// Lists users with their roles, filtered and paginated
    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        params: PageParams,
    ) -> Result<Page<UserSummary>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT u.id, u.email, u.name, u.is_active, u.created_at, u.last_login_at,
                   COALESCE(
                       (SELECT ARRAY_AGG(r.name::text ORDER BY r.name)
                        FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                        WHERE ur.user_id = u.id),
                       ARRAY[]::text[]
                   ) AS roles
            FROM users u
            "#,
        );
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY u.created_at DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<UserSummary>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    /// Counts all users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    /// Updates a user, enforcing the last-admin rule when roles change
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    /// - `Conflict` if the change would remove the last administrator
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateUser) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(ModelError::NotFound("User"));
        }

        let deactivating = data.is_active == Some(false);
        if let Some(role_ids) = &data.role_ids {
            let admin_id = lock_admin_role(&mut tx).await?;
            let keeps_admin = admin_id.is_some_and(|admin| role_ids.contains(&admin));
            check_last_admin(&mut tx, id, keeps_admin && !deactivating).await?;
        } else if deactivating {
            lock_admin_role(&mut tx).await?;
            check_last_admin(&mut tx, id, false).await?;
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
        if let Some(email) = data.email {
            builder.push(", email = ").push_bind(email.trim().to_lowercase());
        }
        if let Some(password_hash) = data.password_hash {
            builder.push(", password_hash = ").push_bind(password_hash);
        }
        if let Some(name) = data.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(is_active) = data.is_active {
            builder.push(", is_active = ").push_bind(is_active);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        let user = builder.build_query_as::<User>().fetch_one(&mut *tx).await?;

        if let Some(role_ids) = &data.role_ids {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            assign_roles(&mut tx, id, role_ids).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    /// Deletes a user
    ///
    /// # Errors
    ///
    /// - `Conflict` when deleting yourself or the last administrator
    pub async fn delete(pool: &PgPool, id: Uuid, acting_user: Uuid) -> Result<(), ModelError> {
        if id == acting_user {
            return Err(ModelError::Conflict("You cannot delete your own account".to_string()));
        }

        let mut tx = pool.begin().await?;
        lock_admin_role(&mut tx).await?;
        check_last_admin(&mut tx, id, false).await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ModelError::NotFound("User"));
        }

        tx.commit().await?;
        tracing::info!(user_id = %id, deleted_by = %acting_user, "User deleted");
        Ok(())
    }

    /// Records a successful sign-in
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

async fn assign_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    role_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    if role_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(role_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Locks the admin role row and returns its ID
async fn lock_admin_role(tx: &mut Transaction<'_, Postgres>) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE name = $1 FOR UPDATE")
        .bind(ADMIN_ROLE)
        .fetch_optional(&mut **tx)
        .await
}

async fn check_last_admin(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    keeps_admin: bool,
) -> Result<(), ModelError> {
    let (target_is_admin, other_admins): (bool, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(BOOL_OR(ur.user_id = $1), FALSE),
            COUNT(*) FILTER (WHERE ur.user_id <> $1 AND u.is_active)
        FROM user_roles ur
        JOIN roles r ON r.id = ur.role_id
        JOIN users u ON u.id = ur.user_id
        WHERE r.name = $2
        "#,
    )
    .bind(user_id)
    .bind(ADMIN_ROLE)
    .fetch_one(&mut **tx)
    .await?;

    ensure_admin_remains(target_is_admin, keeps_admin, other_admins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_admin_cannot_be_removed() {
        let err = ensure_admin_remains(true, false, 0).unwrap_err();
        assert!(matches!(err, ModelError::Conflict(_)));
    }

    #[test]
    fn test_admin_removal_allowed_with_other_admins() {
        assert!(ensure_admin_remains(true, false, 1).is_ok());
    }

    #[test]
    fn test_non_admin_changes_are_unaffected() {
        assert!(ensure_admin_remains(false, false, 0).is_ok());
        assert!(ensure_admin_remains(true, true, 0).is_ok());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: "Ops".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("ops@example.com"));
    }
}
