//! # Backoffice API Server
//!
//! Admin back office for a small business: support inbox, finance, projects,
//! CMS menus, AI tooling and user administration behind one JSON API.
//!
//! ## Startup
//!
//! 1. Load `.env` and configuration
//! 2. Connect to PostgreSQL and apply migrations
//! 3. Create the first administrator when the users table is empty
//! 4. Serve until SIGINT/SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p backoffice-api
//! ```

use backoffice_api::{
    app::{build_router, AppState},
    config::{BootstrapAdmin, Config},
};
use backoffice_shared::{
    auth::password::{hash_password, validate_password_strength},
    db::{
        migrations::run_migrations,
        pool::{self, create_pool},
    },
    models::{
        role::{Role, ADMIN_ROLE},
        user::{CreateUser, User},
    },
};
use sqlx::PgPool;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!(
        "Backoffice API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let db = create_pool(pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    tracing::info!("Database pool ready");

    run_migrations(&db).await?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&db, admin).await?;
    }

    let redis = redis::Client::open(config.redis.url.as_str())?;

    let addr = config.bind_address();
    let state = AppState::new(db.clone(), redis, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool::close_pool(db).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Text logs by default, JSON lines with `LOG_FORMAT=json`
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "backoffice_api=debug,backoffice_shared=info,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Creates the first administrator on an empty database
///
/// Does nothing once any user exists.
async fn bootstrap_admin(db: &PgPool, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    if User::count(db).await? > 0 {
        return Ok(());
    }

    validate_password_strength(&admin.password)
        .map_err(|e| anyhow::anyhow!("BOOTSTRAP_ADMIN_PASSWORD rejected: {}", e))?;

    let role = Role::find_by_name(db, ADMIN_ROLE)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Role '{}' missing; migrations incomplete", ADMIN_ROLE))?;

    let user = User::create_with_roles(
        db,
        CreateUser {
            email: admin.email.trim().to_lowercase(),
            password_hash: hash_password(&admin.password)?,
            name: "Administrator".to_string(),
            is_active: true,
        },
        &[role.id],
    )
    .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap administrator created");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
