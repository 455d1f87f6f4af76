pub mod booking;
pub mod config;
pub mod controllers;
pub mod database;
pub mod middleware;
pub mod models;
pub mod services;
pub mod validation;

use std::sync::Arc;

use services::mailer::Mailer;
use services::square::SquareClient;
use services::stripe::StripeClient;

// Shared state for the whole application.
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub square: SquareClient,
    pub stripe: StripeClient,
    pub mailer: Mailer,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db =
            database::Database::connect(&config.database.url, config.database.pool_size).await?;

        let square = SquareClient::from_config(&config.square, &config.circuit_breaker);
        let stripe = StripeClient::from_config(&config.stripe, &config.circuit_breaker);
        let mailer = Mailer::from_config(&config.email, &config.circuit_breaker, db.pool.clone());

        Ok(Arc::new(Self {
            db,
            config,
            square,
            stripe,
            mailer,
        }))
    }
}
