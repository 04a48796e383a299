/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: Access/refresh token generation and validation
/// - [`middleware`]: Bearer token extraction and the axum auth layer
/// - [`authorization`]: Role and named-permission checks
///
/// # Example
///
/// ```no_run
/// use backoffice_shared::auth::password::{hash_password, verify_password};
/// use backoffice_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Adm1n!secret")?;
/// assert!(verify_password("Adm1n!secret", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), TokenType::Access);
/// let token = create_token(&claims, "a-secret-of-at-least-thirty-two-bytes!")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
