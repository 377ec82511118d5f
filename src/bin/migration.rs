use tracing::{error, info};
use wishlist_api::{config, db};

/// Applies pending migrations against the configured database.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    info!("Starting database migration");

    let pool = db::establish_connection_from_app_config(&app_config).await?;

    if let Err(e) = db::run_migrations(&pool).await {
        error!("Migration failed: {}", e);
        return Err(e.into());
    }

    info!("Migration completed successfully");
    Ok(())
}
