use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use travel_crm::{
    api::{self, AppState},
    config::{self, database},
    core::auth,
    errors::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;

    // 4. Connect and create missing tables
    let db = database::create_connection(&app_config.database.url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Bootstrap the first admin
    if let Some(seed) = &app_config.admin
        && auth::seed_admin(&db, seed).await?
    {
        info!("Created bootstrap admin {}", seed.email);
    }

    // 6. Serve the API until Ctrl-C
    let listener = TcpListener::bind(&app_config.server.bind)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {e}", app_config.server.bind))?;
    info!("Listening on {}", listener.local_addr()?);

    let app = api::router(AppState::new(db, app_config.pagination));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}
