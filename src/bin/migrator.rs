use dotenvy::dotenv;
use invoice_aging::{
    infrastructure::{config::Config, db},
    telemetry,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;
    telemetry::init(&config.telemetry);

    if config.store.provider != "postgres" {
        anyhow::bail!(
            "migrator requires the postgres store, got {:?}",
            config.store.provider
        );
    }

    let pool = db::connect(&config.database).await?;
    db::run_migrations(&pool).await?;

    info!("invoice migrations completed");

    Ok(())
}
