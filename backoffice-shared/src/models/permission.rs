/// Permission model and permission-name parsing
///
/// A permission is a plain string of the form `"<action> <resource>"`:
///
/// ```text
/// view guest inquiries
/// ^^^^ ^^^^^^^^^^^^^^^
/// action   resource
/// ```
///
/// The resource is mapped to the module it belongs to through a static
/// lookup table, which is how the role editor groups checkboxes under
/// "Finance", "CRM" and so on.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE permissions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(150) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Module name used for resources missing from the lookup table
pub const GENERAL_MODULE: &str = "General";

/// Resource → module lookup table
const RESOURCE_MODULES: &[(&str, &str)] = &[
    ("dashboard", "System"),
    ("integrations", "System"),
    ("users", "Administration"),
    ("roles", "Administration"),
    ("permissions", "Administration"),
    ("guest inquiries", "CRM"),
    ("accounts", "Finance"),
    ("transactions", "Finance"),
    ("invoices", "Finance"),
    ("expenses", "Finance"),
    ("reconciliations", "Finance"),
    ("projects", "Projects"),
    ("tasks", "Projects"),
    ("menus", "CMS"),
    ("ai models", "AI"),
    ("ai services", "AI"),
    ("prompt templates", "AI"),
    ("ai conversations", "AI"),
];

/// Permissions seeded by the administration migration
pub const CATALOGUE: &[&str] = &[
    "view dashboard",
    "view users", "create users", "edit users", "delete users",
    "view roles", "create roles", "edit roles", "delete roles",
    "view permissions", "create permissions", "delete permissions",
    "view guest inquiries", "edit guest inquiries", "delete guest inquiries", "export guest inquiries",
    "view accounts", "create accounts", "edit accounts", "delete accounts",
    "view transactions", "create transactions", "delete transactions",
    "view invoices", "create invoices", "edit invoices", "delete invoices", "export invoices",
    "view expenses", "create expenses", "edit expenses", "delete expenses", "approve expenses",
    "view reconciliations", "create reconciliations", "edit reconciliations", "delete reconciliations",
    "view projects", "create projects", "edit projects", "delete projects",
    "view tasks", "create tasks", "edit tasks", "delete tasks",
    "view menus", "create menus", "edit menus", "delete menus",
    "view ai models", "create ai models", "edit ai models", "delete ai models",
    "view ai services", "create ai services", "edit ai services", "delete ai services",
    "view prompt templates", "create prompt templates", "edit prompt templates", "delete prompt templates",
    "view ai conversations", "create ai conversations", "delete ai conversations",
    "view integrations",
];

/// Returns the module a resource belongs to
///
/// Matching is case-insensitive; unknown resources fall into [`GENERAL_MODULE`].
pub fn module_for_resource(resource: &str) -> &'static str {
    let resource = resource.trim().to_lowercase();

    RESOURCE_MODULES
        .iter()
        .find(|(name, _)| *name == resource)
        .map(|(_, module)| *module)
        .unwrap_or(GENERAL_MODULE)
}

/// A permission name split into its action and resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionName {
    /// First word, e.g. `view`
    pub action: String,

    /// Remaining words, e.g. `guest inquiries`
    pub resource: String,
}

impl PermissionName {
    /// Parses `"<action> <resource>"`
    ///
    /// Whitespace runs are collapsed and the result is lowercased. Returns
    /// `None` when there is no resource part.
    ///
    /// ```
    /// use backoffice_shared::models::permission::PermissionName;
    ///
    /// let parsed = PermissionName::parse("Export  Guest Inquiries").unwrap();
    /// assert_eq!(parsed.action, "export");
    /// assert_eq!(parsed.resource, "guest inquiries");
    /// assert!(PermissionName::parse("view").is_none());
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        let mut words = lowered.split_whitespace();
        let action = words.next()?;
        let resource = words.collect::<Vec<_>>().join(" ");

        if resource.is_empty() {
            return None;
        }

        Some(Self {
            action: action.to_string(),
            resource,
        })
    }

    /// Module this permission belongs to
    pub fn module(&self) -> &'static str {
        module_for_resource(&self.resource)
    }

    /// Canonical string form
    pub fn as_string(&self) -> String {
        format!("{} {}", self.action, self.resource)
    }
}

/// Permission model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    /// Unique permission ID
    pub id: Uuid,

    /// `"<action> <resource>"`
    pub name: String,

    /// When the permission was created
    pub created_at: DateTime<Utc>,
}

/// A permission as shown inside a module group
#[derive(Debug, Clone, Serialize)]
pub struct GroupedPermission {
    pub id: Uuid,
    pub name: String,
    pub action: String,
    pub resource: String,
}

/// Groups permissions by module, keeping each group sorted by resource then action
///
/// Names that do not parse land in [`GENERAL_MODULE`] with an empty resource.
pub fn group_by_module(permissions: &[Permission]) -> BTreeMap<String, Vec<GroupedPermission>> {
    let mut groups: BTreeMap<String, Vec<GroupedPermission>> = BTreeMap::new();

    for permission in permissions {
        let (module, action, resource) = match PermissionName::parse(&permission.name) {
            Some(parsed) => (parsed.module(), parsed.action, parsed.resource),
            None => (GENERAL_MODULE, permission.name.clone(), String::new()),
        };

        groups
            .entry(module.to_string())
            .or_default()
            .push(GroupedPermission {
                id: permission.id,
                name: permission.name.clone(),
                action,
                resource,
            });
    }

    for entries in groups.values_mut() {
        entries.sort_by(|a, b| a.resource.cmp(&b.resource).then(a.action.cmp(&b.action)));
    }

    groups
}

impl Permission {
    /// Creates a permission; the name is stored in canonical form
    ///
    /// Callers are expected to have checked that the name parses.
    pub async fn create(pool: &PgPool, name: &PermissionName) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(name.as_string())
        .fetch_one(pool)
        .await
    }

    /// Lists every permission ordered by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, created_at FROM permissions ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }

    /// Finds a permission by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, created_at FROM permissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists the permissions attached to a role
    pub async fn list_by_role(pool: &PgPool, role_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.created_at
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(pool)
        .await
    }

    /// Flattened, de-duplicated permission names granted to a user through their roles
    pub async fn names_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.name
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Counts how many of the given IDs exist
    pub async fn count_existing(pool: &PgPool, ids: &[Uuid]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM permissions WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await
    }

    /// Deletes a permission (role assignments cascade)
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(name: &str) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_single_word_resource() {
        let parsed = PermissionName::parse("view invoices").unwrap();
        assert_eq!(parsed.action, "view");
        assert_eq!(parsed.resource, "invoices");
        assert_eq!(parsed.module(), "Finance");
    }

    #[test]
    fn test_parse_multi_word_resource() {
        let parsed = PermissionName::parse("  delete   prompt templates ").unwrap();
        assert_eq!(parsed.action, "delete");
        assert_eq!(parsed.resource, "prompt templates");
        assert_eq!(parsed.as_string(), "delete prompt templates");
        assert_eq!(parsed.module(), "AI");
    }

    #[test]
    fn test_parse_rejects_incomplete_names() {
        assert!(PermissionName::parse("").is_none());
        assert!(PermissionName::parse("   ").is_none());
        assert!(PermissionName::parse("manage").is_none());
    }

    #[test]
    fn test_module_lookup() {
        assert_eq!(module_for_resource("guest inquiries"), "CRM");
        assert_eq!(module_for_resource("Users"), "Administration");
        assert_eq!(module_for_resource("menus"), "CMS");
        assert_eq!(module_for_resource("tasks"), "Projects");
        assert_eq!(module_for_resource("integrations"), "System");
        assert_eq!(module_for_resource("spaceships"), GENERAL_MODULE);
    }

    #[test]
    fn test_catalogue_is_seeded_and_mapped() {
        let sql = include_str!("../../../migrations/20260101000001_administration.sql");

        for name in CATALOGUE {
            assert!(sql.contains(&format!("('{}')", name)), "{} is not seeded", name);

            let parsed = PermissionName::parse(name).unwrap();
            assert_eq!(parsed.as_string(), *name);
            assert_ne!(parsed.module(), GENERAL_MODULE, "{} has no module", name);
        }
    }

    #[test]
    fn test_group_by_module() {
        let permissions = vec![
            permission("view invoices"),
            permission("create invoices"),
            permission("view accounts"),
            permission("view users"),
            permission("launch"),
        ];

        let groups = group_by_module(&permissions);

        let finance = &groups["Finance"];
        assert_eq!(finance.len(), 3);
        assert_eq!(finance[0].resource, "accounts");
        assert_eq!(finance[1].action, "create");
        assert_eq!(finance[2].action, "view");

        assert_eq!(groups["Administration"].len(), 1);
        assert_eq!(groups[GENERAL_MODULE][0].name, "launch");
    }
}
