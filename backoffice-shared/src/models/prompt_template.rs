/// Prompt templates
///
/// Template content uses `{{name}}` placeholders. Whitespace inside the
/// braces is ignored, so `{{ name }}` and `{{name}}` are the same variable.
/// Names are letters, digits, `_`, `-` and `.`; anything else between double
/// braces is left as literal text.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, ModelError};
use crate::pagination::{Page, PageParams};

const TEMPLATE_COLUMNS: &str =
    "id, name, description, content, category, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Template plus the variables its content references
#[derive(Debug, Clone, Serialize)]
pub struct PromptTemplateDetail {
    #[serde(flatten)]
    pub template: PromptTemplate,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPrompt {
    pub content: String,

    /// Placeholders with no value supplied, left as written
    pub missing: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePromptTemplate {
    pub name: String,
    pub description: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePromptTemplate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub content: Option<String>,
    pub category: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptTemplateFilter {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl PromptTemplateFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
            builder.push(" AND category = ").push_bind(category.trim().to_string());
        }
        if let Some(is_active) = self.is_active {
            builder.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

/// A placeholder occurrence: byte range of the whole `{{ ... }}` and the name
struct Placeholder<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn placeholders(content: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(open) = content[cursor..].find("{{") {
        let start = cursor + open;
        let inner_start = start + 2;

        let Some(close) = content[inner_start..].find("}}") else {
            break;
        };
        let inner_end = inner_start + close;
        let name = content[inner_start..inner_end].trim();

        if !name.is_empty() && name.chars().all(is_name_char) {
            found.push(Placeholder {
                start,
                end: inner_end + 2,
                name,
            });
            cursor = inner_end + 2;
        } else {
            cursor = inner_start;
        }
    }

    found
}

/// Distinct placeholder names in order of first appearance
pub fn extract_variables(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for placeholder in placeholders(content) {
        if !names.iter().any(|n| n == placeholder.name) {
            names.push(placeholder.name.to_string());
        }
    }
    names
}

/// Substitutes known variables and reports the ones without a value
pub fn render(content: &str, variables: &HashMap<String, String>) -> RenderedPrompt {
    let mut output = String::with_capacity(content.len());
    let mut missing: Vec<String> = Vec::new();
    let mut last = 0;

    for placeholder in placeholders(content) {
        output.push_str(&content[last..placeholder.start]);
        match variables.get(placeholder.name) {
            Some(value) => output.push_str(value),
            None => {
                output.push_str(&content[placeholder.start..placeholder.end]);
                if !missing.iter().any(|m| m == placeholder.name) {
                    missing.push(placeholder.name.to_string());
                }
            }
        }
        last = placeholder.end;
    }
    output.push_str(&content[last..]);

    RenderedPrompt {
        content: output,
        missing,
    }
}

impl PromptTemplate {
    pub fn variables(&self) -> Vec<String> {
        extract_variables(&self.content)
    }

    pub fn render(&self, variables: &HashMap<String, String>) -> RenderedPrompt {
        render(&self.content, variables)
    }

    pub fn into_detail(self) -> PromptTemplateDetail {
        let variables = self.variables();
        PromptTemplateDetail {
            template: self,
            variables,
        }
    }

    pub async fn create(pool: &PgPool, data: CreatePromptTemplate) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PromptTemplate>(&format!(
            "INSERT INTO prompt_templates (name, description, content, category, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TEMPLATE_COLUMNS
        ))
        .bind(data.name.trim().to_string())
        .bind(data.description)
        .bind(data.content)
        .bind(data.category)
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PromptTemplate>(&format!(
            "SELECT {} FROM prompt_templates WHERE id = $1",
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &PromptTemplateFilter,
        params: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM prompt_templates");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM prompt_templates",
            TEMPLATE_COLUMNS
        ));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = query.build_query_as::<PromptTemplate>().fetch_all(pool).await?;
        Ok(Page::new(rows, total, params))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdatePromptTemplate,
    ) -> Result<Self, ModelError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(ModelError::NotFound("Prompt template"))?;

        let template = sqlx::query_as::<_, PromptTemplate>(&format!(
            "UPDATE prompt_templates SET name = $2, description = $3, content = $4, category = $5, \
             is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .bind(data.name.map(|n| n.trim().to_string()).unwrap_or(existing.name))
        .bind(data.description.unwrap_or(existing.description))
        .bind(data.content.unwrap_or(existing.content))
        .bind(data.category.unwrap_or(existing.category))
        .bind(data.is_active.unwrap_or(existing.is_active))
        .fetch_one(pool)
        .await?;

        Ok(template)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prompt_templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_variables_in_first_appearance_order() {
        let content = "Hi {{ name }}, your order {{order_id}} ships to {{name}} at {{ address.city }}.";
        assert_eq!(extract_variables(content), vec!["name", "order_id", "address.city"]);
    }

    #[test]
    fn test_extract_ignores_non_placeholders() {
        assert!(extract_variables("no placeholders").is_empty());
        assert!(extract_variables("{{}} and {{ two words }} and {{unclosed").is_empty());
    }

    #[test]
    fn test_render_substitutes_and_reports_missing() {
        let rendered = render(
            "Dear {{ name }}, {{greeting}} from {{ company }}. Bye {{name}}.",
            &vars(&[("name", "Ada"), ("company", "Acme")]),
        );

        assert_eq!(rendered.content, "Dear Ada, {{greeting}} from Acme. Bye Ada.");
        assert_eq!(rendered.missing, vec!["greeting"]);
    }

    #[test]
    fn test_render_does_not_rescan_substituted_values() {
        let rendered = render("{{a}}", &vars(&[("a", "{{b}}")]));
        assert_eq!(rendered.content, "{{b}}");
        assert!(rendered.missing.is_empty());
    }

    #[test]
    fn test_render_plain_text_unchanged() {
        let rendered = render("Summarize: {not a var} }}", &HashMap::new());
        assert_eq!(rendered.content, "Summarize: {not a var} }}");
        assert!(rendered.missing.is_empty());
    }
}
