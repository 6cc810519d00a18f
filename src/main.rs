use magicauth::{
    build_router,
    clock::SystemClock,
    config::{validate_production_config, AuthConfig, SessionCookieConfig},
    db,
    repositories::{SqliteSessionStore, SqliteTokenStore, SqliteUserRepository},
    services::{create_email_service, AuthService, EmailService},
    AppState,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "magicauth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AuthConfig::from_env()?;
    validate_production_config(&config)?;
    tracing::info!(?config, "loaded configuration");

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    // Initialize repositories
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let token_store = Arc::new(SqliteTokenStore::new(pool.clone()));
    let session_store = Arc::new(SqliteSessionStore::new(pool.clone()));

    // Initialize services
    let email_service: Arc<dyn EmailService> = Arc::from(create_email_service(&config.app_name));
    let auth_service = Arc::new(AuthService::new(
        &config,
        token_store,
        user_repository,
        session_store,
        email_service,
        Arc::new(SystemClock),
    ));

    match auth_service.purge_used_tokens().await {
        Ok(removed) => tracing::info!(removed, "purged stale used-token records"),
        Err(e) => tracing::warn!("Failed to purge used tokens: {}", e),
    }

    let app_state = AppState {
        auth_service,
        session_cookie: SessionCookieConfig::from_auth_config(&config),
        expose_magic_links: config.expose_magic_links,
    };

    let app = build_router(app_state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
