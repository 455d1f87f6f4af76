use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    /// Connects and applies pending migrations. Every caller needs both,
    /// so there is no separate migration step.
    pub async fn connect(database_url: &str, pool_size: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!("Applying database migrations...");
        sqlx::migrate!("./src/migrations").run(&pool).await?;
        info!("Database ready");

        Ok(Database { pool })
    }
}
