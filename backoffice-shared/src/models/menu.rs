/// CMS navigation menus
///
/// A menu is attached to a unique `location` (e.g. `header`, `footer`) and
/// holds a tree of items linked through `parent_id`. Trees are stored flat
/// and assembled in memory; an item's parent must live in the same menu and
/// the parent chain must never loop back to the item.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::ModelError;
use crate::pagination::{Page, PageParams};

const MENU_COLUMNS: &str = "id, name, location, is_active, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, menu_id, parent_id, label, url, position, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Menu {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MenuSummary {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub is_active: bool,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuItem {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub label: String,
    pub url: String,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A menu item with its children, ordered by position
#[derive(Debug, Clone, Serialize)]
pub struct MenuItemNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub label: String,
    pub url: String,
    pub position: i32,
    pub is_active: bool,
    pub children: Vec<MenuItemNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuTree {
    #[serde(flatten)]
    pub menu: Menu,
    pub items: Vec<MenuItemNode>,
}

#[derive(Debug, Clone)]
pub struct CreateMenu {
    pub name: String,
    pub location: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMenu {
    pub name: Option<String>,
    pub location: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateMenuItem {
    pub parent_id: Option<Uuid>,
    pub label: String,
    pub url: String,

    /// Appended after the last sibling when `None`
    pub position: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMenuItem {
    pub parent_id: Option<Option<Uuid>>,
    pub label: Option<String>,
    pub url: Option<String>,
    pub position: Option<i32>,
    pub is_active: Option<bool>,
}

/// One entry of a drag-and-drop reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub position: i32,
}

/// Assembles flat items into a tree
///
/// Items whose parent is not in the slice are dropped along with their
/// subtree, so filtering out an inactive parent hides its children too.
pub fn build_tree(items: &[MenuItem]) -> Vec<MenuItemNode> {
    let mut by_parent: HashMap<Option<Uuid>, Vec<&MenuItem>> = HashMap::new();
    for item in items {
        by_parent.entry(item.parent_id).or_default().push(item);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| a.position.cmp(&b.position).then(a.label.cmp(&b.label)));
    }

    fn attach(
        parent: Option<Uuid>,
        by_parent: &HashMap<Option<Uuid>, Vec<&MenuItem>>,
        visited: &mut HashSet<Uuid>,
    ) -> Vec<MenuItemNode> {
        let Some(children) = by_parent.get(&parent) else {
            return Vec::new();
        };

        let mut nodes = Vec::with_capacity(children.len());
        for item in children {
            if !visited.insert(item.id) {
                continue;
            }
            nodes.push(MenuItemNode {
                id: item.id,
                parent_id: item.parent_id,
                label: item.label.clone(),
                url: item.url.clone(),
                position: item.position,
                is_active: item.is_active,
                children: attach(Some(item.id), by_parent, visited),
            });
        }
        nodes
    }

    let mut visited = HashSet::new();
    attach(None, &by_parent, &mut visited)
}

/// Whether giving `item` the parent `new_parent` would create a loop
///
/// `parents` maps every item of the menu to its current parent.
pub fn creates_cycle(parents: &HashMap<Uuid, Option<Uuid>>, item: Uuid, new_parent: Uuid) -> bool {
    let mut current = Some(new_parent);
    let mut steps = 0;

    while let Some(id) = current {
        if id == item || steps > parents.len() {
            return true;
        }
        current = parents.get(&id).copied().flatten();
        steps += 1;
    }

    false
}

/// Checks a full reorder request against the current items of a menu
///
/// Every entry must reference an item of this menu, every parent must be an
/// item of this menu, and the resulting parent links must be acyclic.
pub fn validate_reorder(items: &[MenuItem], entries: &[ReorderEntry]) -> Result<(), ModelError> {
    let mut parents: HashMap<Uuid, Option<Uuid>> =
        items.iter().map(|item| (item.id, item.parent_id)).collect();

    for entry in entries {
        if !parents.contains_key(&entry.id) {
            return Err(ModelError::invalid(
                "items",
                format!("Item {} does not belong to this menu", entry.id),
            ));
        }
        if let Some(parent) = entry.parent_id {
            if !parents.contains_key(&parent) {
                return Err(ModelError::invalid(
                    "items",
                    format!("Parent {} does not belong to this menu", parent),
                ));
            }
        }
    }

    for entry in entries {
        parents.insert(entry.id, entry.parent_id);
    }

    for entry in entries {
        if let Some(parent) = entry.parent_id {
            let mut without_self = parents.clone();
            without_self.insert(entry.id, None);
            if creates_cycle(&without_self, entry.id, parent) {
                return Err(ModelError::invalid(
                    "items",
                    format!("Item {} cannot be nested under its own descendant", entry.id),
                ));
            }
        }
    }

    Ok(())
}

impl Menu {
    pub async fn create(pool: &PgPool, data: CreateMenu) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Menu>(&format!(
            "INSERT INTO menus (name, location, is_active) VALUES ($1, $2, $3) RETURNING {}",
            MENU_COLUMNS
        ))
        .bind(data.name)
        .bind(data.location.trim().to_lowercase())
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Menu>(&format!("SELECT {} FROM menus WHERE id = $1", MENU_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, params: PageParams) -> Result<Page<MenuSummary>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM menus")
            .fetch_one(pool)
            .await?;

        let rows = sqlx::query_as::<_, MenuSummary>(
            r#"
            SELECT m.id, m.name, m.location, m.is_active, m.created_at,
                   (SELECT COUNT(*) FROM menu_items mi WHERE mi.menu_id = m.id) AS item_count
            FROM menus m
            ORDER BY m.name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(rows, total, params))
    }

    /// Menu with every item, active or not
    pub async fn tree(pool: &PgPool, id: Uuid) -> Result<Option<MenuTree>, sqlx::Error> {
        let Some(menu) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let items = MenuItem::list_for_menu(pool, id).await?;
        Ok(Some(MenuTree {
            menu,
            items: build_tree(&items),
        }))
    }

    /// Active menu at a location with its active items only
    pub async fn active_tree_by_location(
        pool: &PgPool,
        location: &str,
    ) -> Result<Option<MenuTree>, sqlx::Error> {
        let menu = sqlx::query_as::<_, Menu>(&format!(
            "SELECT {} FROM menus WHERE location = $1 AND is_active = TRUE",
            MENU_COLUMNS
        ))
        .bind(location.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

        let Some(menu) = menu else {
            return Ok(None);
        };

        let items: Vec<MenuItem> = MenuItem::list_for_menu(pool, menu.id)
            .await?
            .into_iter()
            .filter(|item| item.is_active)
            .collect();

        Ok(Some(MenuTree {
            menu,
            items: build_tree(&items),
        }))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateMenu) -> Result<Self, ModelError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(ModelError::NotFound("Menu"))?;

        let menu = sqlx::query_as::<_, Menu>(&format!(
            "UPDATE menus SET name = $2, location = $3, is_active = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            MENU_COLUMNS
        ))
        .bind(id)
        .bind(data.name.unwrap_or(existing.name))
        .bind(
            data.location
                .map(|l| l.trim().to_lowercase())
                .unwrap_or(existing.location),
        )
        .bind(data.is_active.unwrap_or(existing.is_active))
        .fetch_one(pool)
        .await?;

        Ok(menu)
    }

    /// Deletes a menu and all its items
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies a reorder in one transaction after validating every entry
    pub async fn reorder(
        pool: &PgPool,
        menu_id: Uuid,
        entries: &[ReorderEntry],
    ) -> Result<Vec<MenuItemNode>, ModelError> {
        let mut tx = pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM menus WHERE id = $1 FOR UPDATE")
            .bind(menu_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(ModelError::NotFound("Menu"));
        }

        let items = items_in_tx(&mut tx, menu_id).await?;
        validate_reorder(&items, entries)?;

        for entry in entries {
            sqlx::query(
                "UPDATE menu_items SET parent_id = $2, position = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(entry.id)
            .bind(entry.parent_id)
            .bind(entry.position)
            .execute(&mut *tx)
            .await?;
        }

        let items = items_in_tx(&mut tx, menu_id).await?;
        tx.commit().await?;

        tracing::info!(menu_id = %menu_id, entries = entries.len(), "Menu reordered");
        Ok(build_tree(&items))
    }
}

impl MenuItem {
    pub async fn list_for_menu(pool: &PgPool, menu_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {} FROM menu_items WHERE menu_id = $1 ORDER BY position",
            ITEM_COLUMNS
        ))
        .bind(menu_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {} FROM menu_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Adds an item to a menu
    pub async fn create(
        pool: &PgPool,
        menu_id: Uuid,
        data: CreateMenuItem,
    ) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;

        let menu: Option<Uuid> = sqlx::query_scalar("SELECT id FROM menus WHERE id = $1 FOR UPDATE")
            .bind(menu_id)
            .fetch_optional(&mut *tx)
            .await?;
        if menu.is_none() {
            return Err(ModelError::NotFound("Menu"));
        }

        if let Some(parent_id) = data.parent_id {
            ensure_parent_in_menu(&mut tx, menu_id, parent_id).await?;
        }

        let position = match data.position {
            Some(position) => position,
            None => sqlx::query_scalar::<_, i32>(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM menu_items \
                 WHERE menu_id = $1 AND parent_id IS NOT DISTINCT FROM $2",
            )
            .bind(menu_id)
            .bind(data.parent_id)
            .fetch_one(&mut *tx)
            .await?,
        };

        let item = sqlx::query_as::<_, MenuItem>(&format!(
            "INSERT INTO menu_items (menu_id, parent_id, label, url, position, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(menu_id)
        .bind(data.parent_id)
        .bind(data.label)
        .bind(data.url)
        .bind(position)
        .bind(data.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Updates an item; a new parent must be in the same menu and not a descendant
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateMenuItem) -> Result<Self, ModelError> {
        let mut tx = pool.begin().await?;

        let menu_id: Uuid = sqlx::query_scalar("SELECT menu_id FROM menu_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ModelError::NotFound("Menu item"))?;

        // Same lock order as reorder: menu first, then the item
        sqlx::query("SELECT id FROM menus WHERE id = $1 FOR UPDATE")
            .bind(menu_id)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {} FROM menu_items WHERE id = $1 FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ModelError::NotFound("Menu item"))?;

        let parent_id = data.parent_id.unwrap_or(existing.parent_id);
        if let Some(parent) = parent_id {
            ensure_parent_in_menu(&mut tx, existing.menu_id, parent).await?;

            let items = items_in_tx(&mut tx, existing.menu_id).await?;
            let parents: HashMap<Uuid, Option<Uuid>> =
                items.iter().map(|item| (item.id, item.parent_id)).collect();
            if creates_cycle(&parents, id, parent) {
                return Err(ModelError::invalid(
                    "parent_id",
                    "An item cannot be nested under itself or one of its descendants",
                ));
            }
        }

        let item = sqlx::query_as::<_, MenuItem>(&format!(
            "UPDATE menu_items SET parent_id = $2, label = $3, url = $4, position = $5, \
             is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(id)
        .bind(parent_id)
        .bind(data.label.unwrap_or(existing.label))
        .bind(data.url.unwrap_or(existing.url))
        .bind(data.position.unwrap_or(existing.position))
        .bind(data.is_active.unwrap_or(existing.is_active))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Deletes an item and, by cascade, its children
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn items_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    menu_id: Uuid,
) -> Result<Vec<MenuItem>, sqlx::Error> {
    sqlx::query_as::<_, MenuItem>(&format!(
        "SELECT {} FROM menu_items WHERE menu_id = $1 ORDER BY position",
        ITEM_COLUMNS
    ))
    .bind(menu_id)
    .fetch_all(&mut **tx)
    .await
}

async fn ensure_parent_in_menu(
    tx: &mut Transaction<'_, Postgres>,
    menu_id: Uuid,
    parent_id: Uuid,
) -> Result<(), ModelError> {
    let same_menu: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM menu_items WHERE id = $1 AND menu_id = $2)",
    )
    .bind(parent_id)
    .bind(menu_id)
    .fetch_one(&mut **tx)
    .await?;

    if !same_menu {
        return Err(ModelError::invalid("parent_id", "Parent item must belong to the same menu"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, parent_id: Option<Uuid>, label: &str, position: i32) -> MenuItem {
        MenuItem {
            id,
            menu_id: Uuid::nil(),
            parent_id,
            label: label.to_string(),
            url: format!("/{}", label.to_lowercase()),
            position,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_tree_nests_and_orders() {
        let (home, about, team, careers) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let items = vec![
            item(careers, Some(about), "Careers", 2),
            item(about, None, "About", 1),
            item(team, Some(about), "Team", 1),
            item(home, None, "Home", 0),
        ];

        let tree = build_tree(&items);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].label, "Home");
        assert_eq!(tree[1].label, "About");
        assert_eq!(tree[1].children.len(), 2);
        assert_eq!(tree[1].children[0].label, "Team");
        assert_eq!(tree[1].children[1].label, "Careers");
    }

    #[test]
    fn test_build_tree_drops_orphans() {
        let missing_parent = Uuid::new_v4();
        let items = vec![
            item(Uuid::new_v4(), None, "Home", 0),
            item(Uuid::new_v4(), Some(missing_parent), "Hidden", 0),
        ];

        let tree = build_tree(&items);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_build_tree_skips_looping_items() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![
            item(a, Some(b), "A", 0),
            item(b, Some(a), "B", 0),
            item(Uuid::new_v4(), None, "Home", 0),
        ];

        let tree = build_tree(&items);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].label, "Home");
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_creates_cycle() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // a <- b <- c, d is a root
        let parents: HashMap<Uuid, Option<Uuid>> =
            [(a, None), (b, Some(a)), (c, Some(b)), (d, None)].into_iter().collect();

        assert!(creates_cycle(&parents, a, a));
        assert!(creates_cycle(&parents, a, c));
        assert!(creates_cycle(&parents, b, c));
        assert!(!creates_cycle(&parents, c, a));
        assert!(!creates_cycle(&parents, a, d));
    }

    #[test]
    fn test_validate_reorder() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(a, None, "A", 0), item(b, Some(a), "B", 0), item(c, None, "C", 1)];

        // move c under b and a to the end
        let ok = [
            ReorderEntry { id: c, parent_id: Some(b), position: 0 },
            ReorderEntry { id: a, parent_id: None, position: 5 },
        ];
        assert!(validate_reorder(&items, &ok).is_ok());

        // a under b while b stays under a
        let cycle = [ReorderEntry { id: a, parent_id: Some(b), position: 0 }];
        assert!(validate_reorder(&items, &cycle).is_err());

        // swapping parent and child in one request is fine
        let swap = [
            ReorderEntry { id: b, parent_id: None, position: 0 },
            ReorderEntry { id: a, parent_id: Some(b), position: 0 },
        ];
        assert!(validate_reorder(&items, &swap).is_ok());

        let foreign = [ReorderEntry { id: Uuid::new_v4(), parent_id: None, position: 0 }];
        assert!(validate_reorder(&items, &foreign).is_err());

        let foreign_parent = [ReorderEntry { id: a, parent_id: Some(Uuid::new_v4()), position: 0 }];
        assert!(validate_reorder(&items, &foreign_parent).is_err());
    }
}
