/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use backoffice_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let redis = redis::Client::open(config.redis.url.as_str())?;
/// let state = AppState::new(pool, redis, config);
/// let app = backoffice_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use backoffice_shared::auth::middleware::authenticate;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Redis client; connections are opened per use
    pub redis: redis::Client,

    /// Outbound HTTP client for AI service checks
    pub http: reqwest::Client,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, redis: redis::Client, config: Config) -> Self {
        Self {
            db,
            redis,
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /v1/
///     ├── /auth/login, /auth/refresh   # public
///     ├── /public/inquiries            # public, rate limited
///     ├── /public/menus/:location      # public
///     └── everything else              # JWT required, permission checked per handler
///         ├── /auth/me, /dashboard
///         ├── /users, /roles, /permissions
///         ├── /guest-inquiries
///         ├── /finance/{accounts,transactions,invoices,expenses,reconciliations}
///         ├── /projects, /tasks
///         ├── /menus, /menu-items
///         ├── /ai/{models,services,prompt-templates,conversations}
///         ├── /broadcasting/auth
///         └── /system/integrations
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication / rate limiting (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{self, ai, finance};

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route(
            "/public/inquiries",
            post(routes::guest_inquiries::submit).layer(middleware::from_fn_with_state(
                state.clone(),
                crate::middleware::rate_limit::inquiry_rate_limit,
            )),
        )
        .route("/public/menus/:location", get(routes::menus::public_show));

    let admin_routes = Router::new()
        .route("/users", get(routes::users::index).post(routes::users::store))
        .route(
            "/users/:id",
            get(routes::users::show)
                .put(routes::users::update)
                .patch(routes::users::update)
                .delete(routes::users::destroy),
        )
        .route("/roles", get(routes::roles::index).post(routes::roles::store))
        .route(
            "/roles/:id",
            get(routes::roles::show)
                .put(routes::roles::update)
                .patch(routes::roles::update)
                .delete(routes::roles::destroy),
        )
        .route(
            "/permissions",
            get(routes::permissions::index).post(routes::permissions::store),
        )
        .route("/permissions/:id", axum::routing::delete(routes::permissions::destroy));

    let inquiry_routes = Router::new()
        .route("/", get(routes::guest_inquiries::index))
        .route("/export", get(routes::guest_inquiries::export))
        .route("/bulk-status", post(routes::guest_inquiries::bulk_status))
        .route(
            "/:id",
            get(routes::guest_inquiries::show)
                .put(routes::guest_inquiries::update)
                .patch(routes::guest_inquiries::update)
                .delete(routes::guest_inquiries::destroy),
        );

    let finance_routes = Router::new()
        .route("/accounts", get(finance::accounts::index).post(finance::accounts::store))
        .route(
            "/accounts/:id",
            get(finance::accounts::show)
                .put(finance::accounts::update)
                .patch(finance::accounts::update)
                .delete(finance::accounts::destroy),
        )
        .route(
            "/transactions",
            get(finance::transactions::index).post(finance::transactions::store),
        )
        .route(
            "/transactions/:id",
            get(finance::transactions::show).delete(finance::transactions::destroy),
        )
        .route("/invoices", get(finance::invoices::index).post(finance::invoices::store))
        .route("/invoices/export", get(finance::invoices::export))
        .route(
            "/invoices/:id",
            get(finance::invoices::show)
                .put(finance::invoices::update)
                .patch(finance::invoices::update)
                .delete(finance::invoices::destroy),
        )
        .route("/invoices/:id/status", post(finance::invoices::transition))
        .route("/expenses", get(finance::expenses::index).post(finance::expenses::store))
        .route(
            "/expenses/:id",
            get(finance::expenses::show)
                .put(finance::expenses::update)
                .patch(finance::expenses::update)
                .delete(finance::expenses::destroy),
        )
        .route("/expenses/:id/approve", post(finance::expenses::approve))
        .route("/expenses/:id/reject", post(finance::expenses::reject))
        .route(
            "/reconciliations",
            get(finance::reconciliations::index).post(finance::reconciliations::store),
        )
        .route(
            "/reconciliations/:id",
            get(finance::reconciliations::show).delete(finance::reconciliations::destroy),
        )
        .route("/reconciliations/:id/match", post(finance::reconciliations::match_transactions))
        .route(
            "/reconciliations/:id/unmatch",
            post(finance::reconciliations::unmatch_transactions),
        )
        .route("/reconciliations/:id/complete", post(finance::reconciliations::complete));

    let project_routes = Router::new()
        .route("/projects", get(routes::projects::index).post(routes::projects::store))
        .route(
            "/projects/:id",
            get(routes::projects::show)
                .put(routes::projects::update)
                .patch(routes::projects::update)
                .delete(routes::projects::destroy),
        )
        .route(
            "/projects/:id/tasks",
            get(routes::tasks::index).post(routes::tasks::store),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::show)
                .put(routes::tasks::update)
                .patch(routes::tasks::update)
                .delete(routes::tasks::destroy),
        )
        .route("/tasks/:id/status", post(routes::tasks::set_status));

    let menu_routes = Router::new()
        .route("/menus", get(routes::menus::index).post(routes::menus::store))
        .route(
            "/menus/:id",
            get(routes::menus::show)
                .put(routes::menus::update)
                .patch(routes::menus::update)
                .delete(routes::menus::destroy),
        )
        .route("/menus/:id/items", post(routes::menus::store_item))
        .route("/menus/:id/reorder", post(routes::menus::reorder))
        .route(
            "/menu-items/:id",
            axum::routing::put(routes::menus::update_item)
                .patch(routes::menus::update_item)
                .delete(routes::menus::destroy_item),
        );

    let ai_routes = Router::new()
        .route("/models", get(ai::models::index).post(ai::models::store))
        .route(
            "/models/:id",
            get(ai::models::show)
                .put(ai::models::update)
                .patch(ai::models::update)
                .delete(ai::models::destroy),
        )
        .route("/services", get(ai::services::index).post(ai::services::store))
        .route(
            "/services/:id",
            get(ai::services::show)
                .put(ai::services::update)
                .patch(ai::services::update)
                .delete(ai::services::destroy),
        )
        .route("/services/:id/test", post(ai::services::test_connection))
        .route(
            "/prompt-templates",
            get(ai::prompt_templates::index).post(ai::prompt_templates::store),
        )
        .route(
            "/prompt-templates/:id",
            get(ai::prompt_templates::show)
                .put(ai::prompt_templates::update)
                .patch(ai::prompt_templates::update)
                .delete(ai::prompt_templates::destroy),
        )
        .route("/prompt-templates/:id/render", post(ai::prompt_templates::render))
        .route(
            "/conversations",
            get(ai::conversations::index).post(ai::conversations::store),
        )
        .route(
            "/conversations/:id",
            get(ai::conversations::show).delete(ai::conversations::destroy),
        )
        .route("/conversations/:id/messages", post(ai::conversations::add_message));

    let authenticated_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route("/dashboard", get(routes::dashboard::show))
        .route("/broadcasting/auth", post(routes::broadcasting::authorize))
        .route("/system/integrations", get(routes::integrations::index))
        .merge(admin_routes)
        .nest("/guest-inquiries", inquiry_routes)
        .nest("/finance", finance_routes)
        .merge(project_routes)
        .merge(menu_routes)
        .nest("/ai", ai_routes)
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new().merge(public_routes).merge(authenticated_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// CORS: permissive for `*`, otherwise only the configured origins
fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_DISPOSITION])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects [`AuthContext`] into request
/// extensions. Permission checks happen in the handlers.
///
/// [`AuthContext`]: backoffice_shared::auth::middleware::AuthContext
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
