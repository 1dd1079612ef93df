//! # Enterprise API Main Entry Point

use std::sync::Arc;

use enterprise_api::{
    catalog::CourseCatalogApiClient, config::ConfigLoader, db, server::run_server,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config = Arc::new(ConfigLoader::new().load()?);
    init_tracing(&config)?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::info!(profile = %config.profile, config = %redacted_json, "configuration loaded");
    }

    let db = db::init_pool(&config).await?;
    db::run_migrations(&db).await?;

    let catalog_api = Arc::new(CourseCatalogApiClient::new(config.clone())?);

    run_server(config, db, catalog_api).await
}
