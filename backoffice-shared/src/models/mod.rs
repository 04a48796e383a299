/// Database models for Backoffice
///
/// Each model owns its SQL. Handlers never build queries themselves; they
/// call the associated functions here and map [`ModelError`] to HTTP.
///
/// # Models
///
/// - Administration: `user`, `role`, `permission`
/// - CRM / Support: `guest_inquiry`
/// - Finance: `account`, `transaction`, `invoice`, `expense`, `reconciliation`
/// - Projects: `project`, `task`
/// - CMS: `menu`
/// - AI: `ai_model`, `ai_service`, `prompt_template`, `conversation`
/// - System: `dashboard`
///
/// # Example
///
/// ```no_run
/// use backoffice_shared::models::user::{CreateUser, User};
/// use backoffice_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "ops@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: "Ops".to_string(),
///     is_active: true,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod ai_model;
pub mod ai_service;
pub mod conversation;
pub mod dashboard;
pub mod expense;
pub mod guest_inquiry;
pub mod invoice;
pub mod menu;
pub mod permission;
pub mod project;
pub mod prompt_template;
pub mod reconciliation;
pub mod role;
pub mod task;
pub mod transaction;
pub mod user;

/// Error type for model operations that enforce business rules
///
/// Plain lookups return `sqlx::Error`; operations that can be refused for
/// domain reasons (last admin, invoice already sent, unbalanced
/// reconciliation, ...) return this instead.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Referenced record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Operation conflicts with the current state of the data
    #[error("{0}")]
    Conflict(String),

    /// Input is well-formed but violates a business rule for one field
    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ModelError {
    /// Shorthand for a field-level rule violation
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ModelError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Escapes `%`, `_` and `\` so user input can be embedded in an ILIKE pattern
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("  50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_model_error_display() {
        assert_eq!(ModelError::NotFound("Invoice").to_string(), "Invoice not found");
        assert_eq!(
            ModelError::invalid("amount", "must be positive").to_string(),
            "amount: must be positive"
        );
    }
}
