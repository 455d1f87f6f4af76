use std::env;

// Top-level configuration container, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub square: SquareConfig,
    pub stripe: StripeConfig,
    pub email: EmailConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Square scheduling API settings.
#[derive(Debug, Clone)]
pub struct SquareConfig {
    pub base_url: String,
    pub access_token: String,
    pub location_id: String,
    pub team_member_id: String,
    pub service_variation_id: String,
}

// Stripe checkout settings.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
}

// Transactional email (Resend-style API).
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub base_url: String,
    pub api_key: String,
    pub from_address: String,
    pub admin_address: String,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "studio_booking=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            square: SquareConfig {
                base_url: env::var("SQUARE_BASE_URL")
                    .unwrap_or_else(|_| "https://connect.squareup.com".to_string()),
                access_token: env::var("SQUARE_ACCESS_TOKEN")
                    .expect("SQUARE_ACCESS_TOKEN must be set"),
                location_id: env::var("SQUARE_LOCATION_ID").expect("SQUARE_LOCATION_ID must be set"),
                team_member_id: env::var("SQUARE_TEAM_MEMBER_ID")
                    .expect("SQUARE_TEAM_MEMBER_ID must be set"),
                service_variation_id: env::var("SQUARE_SERVICE_VARIATION_ID")
                    .expect("SQUARE_SERVICE_VARIATION_ID must be set"),
            },
            stripe: StripeConfig {
                base_url: env::var("STRIPE_BASE_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
                secret_key: env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set"),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                    .expect("STRIPE_WEBHOOK_SECRET must be set"),
                success_url: env::var("CHECKOUT_SUCCESS_URL").unwrap_or_else(|_| {
                    "http://localhost:5173/booking/success?session_id={CHECKOUT_SESSION_ID}"
                        .to_string()
                }),
                cancel_url: env::var("CHECKOUT_CANCEL_URL")
                    .unwrap_or_else(|_| "http://localhost:5173/booking/cancelled".to_string()),
            },
            email: EmailConfig {
                base_url: env::var("EMAIL_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com".to_string()),
                api_key: env::var("EMAIL_API_KEY").expect("EMAIL_API_KEY must be set"),
                from_address: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "bookings@studio.example".to_string()),
                admin_address: env::var("EMAIL_ADMIN").expect("EMAIL_ADMIN must be set"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
        }
    }
}
