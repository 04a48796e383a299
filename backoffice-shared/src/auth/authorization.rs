/// Authorization helpers and permission checks
///
/// Backoffice uses plain role-based access control:
///
/// 1. **Active account**: deactivated users are refused everything
/// 2. **Admin role**: members of `admin` pass every check
/// 3. **Named permissions**: everyone else needs the exact permission name
///    (e.g. `"view invoices"`) through at least one of their roles
/// 4. **Ownership**: some resources (AI conversations) are only visible to
///    the user who created them, regardless of permissions
///
/// # Example
///
/// ```no_run
/// use backoffice_shared::auth::authorization::require_permission;
/// use backoffice_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
///
/// async fn list_invoices(pool: &PgPool, auth: &AuthContext) -> Result<(), Box<dyn std::error::Error>> {
///     require_permission(pool, auth, "view invoices").await?;
///     Ok(())
/// }
/// ```

use std::collections::BTreeSet;

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::role::ADMIN_ROLE;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User lacks the named permission
    #[error("Missing required permission: {0}")]
    MissingPermission(String),

    /// User lacks every one of the listed permissions
    #[error("Requires one of: {}", .0.join(", "))]
    MissingAnyPermission(Vec<String>),

    /// User doesn't own the resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,

    /// Account is deactivated or no longer exists
    #[error("Account is inactive")]
    InactiveAccount,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Everything a user is allowed to do, loaded once
///
/// Used by `/v1/auth/me` so the frontend can hide controls, and by
/// handlers that need to check several permissions in one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionSet {
    /// Member of the admin role
    pub is_admin: bool,

    /// Permission names granted through roles
    pub names: BTreeSet<String>,
}

impl PermissionSet {
    /// Whether the named permission is granted
    pub fn allows(&self, permission: &str) -> bool {
        self.is_admin || self.names.contains(permission)
    }

    /// Whether at least one of the named permissions is granted
    pub fn allows_any(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.allows(p))
    }

    /// Loads the permission set of an active user
    ///
    /// Inactive or unknown users get an empty set.
    pub async fn load(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT r.name, p.name
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE u.id = $1 AND u.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut set = PermissionSet::default();
        for (role, permission) in rows {
            if role == ADMIN_ROLE {
                set.is_admin = true;
            }
            if let Some(permission) = permission {
                set.names.insert(permission);
            }
        }

        Ok(set)
    }
}

/// Checks whether an active user holds a permission, directly or via admin
pub async fn has_permission(
    pool: &PgPool,
    user_id: Uuid,
    permission: &str,
) -> Result<bool, sqlx::Error> {
    has_any_permission(pool, user_id, &[permission]).await
}

/// Checks whether an active user holds at least one of the permissions
pub async fn has_any_permission(
    pool: &PgPool,
    user_id: Uuid,
    permissions: &[&str],
) -> Result<bool, sqlx::Error> {
    let names: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();

    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE u.id = $1
              AND u.is_active = TRUE
              AND (r.name = $2 OR p.name = ANY($3))
        )
        "#,
    )
    .bind(user_id)
    .bind(ADMIN_ROLE)
    .bind(&names)
    .fetch_one(pool)
    .await
}

/// Requires a named permission
///
/// # Errors
///
/// Returns `AuthzError::MissingPermission` if the user is inactive or lacks
/// the permission.
///
/// # Example
///
/// ```no_run
/// # use backoffice_shared::auth::authorization::require_permission;
/// # use backoffice_shared::auth::middleware::AuthContext;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, auth: AuthContext) -> Result<(), Box<dyn std::error::Error>> {
/// require_permission(&pool, &auth, "export guest inquiries").await?;
/// # Ok(())
/// # }
/// ```
pub async fn require_permission(
    pool: &PgPool,
    auth: &AuthContext,
    permission: &str,
) -> Result<(), AuthzError> {
    if !has_permission(pool, auth.user_id, permission).await? {
        tracing::debug!(user_id = %auth.user_id, permission, "Permission denied");
        return Err(AuthzError::MissingPermission(permission.to_string()));
    }

    Ok(())
}

/// Requires at least one of several permissions
pub async fn require_any_permission(
    pool: &PgPool,
    auth: &AuthContext,
    permissions: &[&str],
) -> Result<(), AuthzError> {
    if !has_any_permission(pool, auth.user_id, permissions).await? {
        return Err(AuthzError::MissingAnyPermission(
            permissions.iter().map(|p| p.to_string()).collect(),
        ));
    }

    Ok(())
}

/// Requires the caller's account to exist and be active
///
/// For endpoints gated by identity alone rather than a named permission.
pub async fn require_active(pool: &PgPool, auth: &AuthContext) -> Result<(), AuthzError> {
    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(pool)
        .await?;

    if active != Some(true) {
        tracing::debug!(user_id = %auth.user_id, "Inactive account refused");
        return Err(AuthzError::InactiveAccount);
    }

    Ok(())
}

/// Checks if user owns a resource
pub fn require_ownership(auth: &AuthContext, resource_owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id != resource_owner_id {
        return Err(AuthzError::NotAuthorized);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(is_admin: bool, names: &[&str]) -> PermissionSet {
        PermissionSet {
            is_admin,
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_permission_set_exact_match() {
        let perms = set(false, &["view invoices", "create invoices"]);

        assert!(perms.allows("view invoices"));
        assert!(!perms.allows("delete invoices"));
        assert!(!perms.allows("view invoice"));
    }

    #[test]
    fn test_permission_set_admin_allows_everything() {
        let perms = set(true, &[]);

        assert!(perms.allows("delete users"));
        assert!(perms.allows("anything at all"));
    }

    #[test]
    fn test_permission_set_allows_any() {
        let perms = set(false, &["edit guest inquiries"]);

        assert!(perms.allows_any(&["view guest inquiries", "edit guest inquiries"]));
        assert!(!perms.allows_any(&["view users", "view roles"]));
        assert!(!perms.allows_any(&[]));
    }

    #[test]
    fn test_require_ownership() {
        let user_id = Uuid::new_v4();
        let auth = AuthContext::new(user_id);

        assert!(require_ownership(&auth, user_id).is_ok());
        assert!(require_ownership(&auth, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::MissingPermission("view invoices".to_string());
        assert!(err.to_string().contains("view invoices"));

        let err = AuthzError::MissingAnyPermission(vec!["a b".to_string(), "c d".to_string()]);
        assert_eq!(err.to_string(), "Requires one of: a b, c d");

        let err = AuthzError::NotAuthorized;
        assert!(err.to_string().contains("Not authorized"));

        assert_eq!(AuthzError::InactiveAccount.to_string(), "Account is inactive");
    }
}
