//! World API server: serves every table in the `world` catalog as a CRUD resource.
//!
//! Run from repo root: `cargo run -p world-server`

use tokio::net::TcpListener;
use world_api::{
    app_router, ensure_database_exists, ensure_sys_tables, initialize, load_exchange_contracts, CmsConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("world_api=info,world_server=info")),
        )
        .init();

    let mut config = CmsConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    ensure_sys_tables(&pool, &config).await?;
    config.exchanges = load_exchange_contracts(&pool, &config).await?;
    let bind_addr = config.bind_addr.clone();
    let state = initialize(pool, config).await?;

    let app = app_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("world server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
