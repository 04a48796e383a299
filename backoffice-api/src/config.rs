/// Configuration management for the API server
///
/// Configuration is read once from environment variables (and a `.env` file
/// when present) into a typed [`Config`].
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_PRODUCTION`: Enables HSTS and strict headers (default: false)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing, at least 32 chars (required)
/// - `REDIS_URL`: Cache and rate limiter backend (default: redis://127.0.0.1:6379)
/// - `STORAGE_PATH`: Local file storage root (default: ./storage)
/// - `QUEUE_CONNECTION`: `sync` or `redis` (default: sync)
/// - `BROADCAST_APP_KEY` / `BROADCAST_APP_SECRET`: Channel auth credentials
///   (secret defaults to the JWT secret)
/// - `INQUIRY_RATE_LIMIT`: Public inquiry submissions per minute per client (default: 5)
/// - `BOOTSTRAP_ADMIN_EMAIL` / `BOOTSTRAP_ADMIN_PASSWORD`: Creates the first
///   admin at startup when no user exists
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for human-readable
///
/// # Example
///
/// ```no_run
/// use backoffice_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub broadcast: BroadcastConfig,
    pub rate_limit: RateLimitConfig,

    /// First admin account, created only on an empty users table
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode turns on HSTS
    pub production: bool,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// `sync` or `redis`
    pub connection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    pub app_key: String,
    pub app_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Public inquiry submissions allowed per minute per client
    pub inquiries_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A numeric variable does not parse
    /// - Only one of the bootstrap admin variables is set
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let port = var_or("API_PORT", "8080").parse::<u16>()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let inquiries_per_minute = var_or("INQUIRY_RATE_LIMIT", "5").parse::<u32>()?;

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            env::var("BOOTSTRAP_ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => anyhow::bail!(
                "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port,
                production: parse_bool(&var_or("API_PRODUCTION", "false")),
                cors_origins: parse_origins(&var_or("CORS_ORIGINS", "*")),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            redis: RedisConfig {
                url: var_or("REDIS_URL", "redis://127.0.0.1:6379"),
            },
            storage: StorageConfig {
                path: PathBuf::from(var_or("STORAGE_PATH", "./storage")),
            },
            queue: QueueConfig {
                connection: var_or("QUEUE_CONNECTION", "sync").to_ascii_lowercase(),
            },
            broadcast: BroadcastConfig {
                app_key: var_or("BROADCAST_APP_KEY", "backoffice"),
                app_secret: var_or("BROADCAST_APP_SECRET", &jwt_secret),
            },
            rate_limit: RateLimitConfig {
                inquiries_per_minute,
            },
            jwt: JwtConfig { secret: jwt_secret },
            bootstrap_admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin is allowed
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.is_empty() || self.api.cors_origins.iter().any(|o| o == "*")
    }

    /// Configuration with local defaults, for tests
    pub fn for_tests(database_url: &str) -> Self {
        let secret = "test-secret-key-at-least-32-bytes-long".to_string();
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                production: false,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
            },
            redis: RedisConfig {
                url: "redis://127.0.0.1:6379".to_string(),
            },
            storage: StorageConfig {
                path: std::env::temp_dir().join("backoffice-storage"),
            },
            queue: QueueConfig {
                connection: "sync".to_string(),
            },
            broadcast: BroadcastConfig {
                app_key: "backoffice".to_string(),
                app_secret: secret.clone(),
            },
            rate_limit: RateLimitConfig {
                inquiries_per_minute: 5,
            },
            jwt: JwtConfig { secret },
            bootstrap_admin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = Config::for_tests("postgresql://localhost/test");
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example ,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_cors_permissive() {
        let mut config = Config::for_tests("postgresql://localhost/test");
        assert!(config.cors_permissive());

        config.api.cors_origins = vec!["https://admin.example".to_string()];
        assert!(!config.cors_permissive());
    }
}
