use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Shared secret for webhook HMAC verification. Startup fails without it:
    /// the receiver must never run with unverifiable authentication.
    pub webhook_secret: String,

    /// Optional bearer token protecting the admin API. Empty = auth disabled.
    pub api_token: Option<String>,

    // Processing
    pub confirmation_threshold: u32,
    pub event_queue_capacity: usize,

    // Retry / backoff
    pub max_retry_attempts: u32,
    pub retry_initial_delay: Duration,
    pub retry_max_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            webhook_secret: env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow::anyhow!("WEBHOOK_SECRET must be set and non-empty"))?,

            api_token: env::var("API_TOKEN").ok().filter(|s| !s.is_empty()),

            confirmation_threshold: env::var("CONFIRMATION_THRESHOLD")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .unwrap_or(3),
            event_queue_capacity: env::var("EVENT_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".into())
                .parse()
                .unwrap_or(1024),

            max_retry_attempts: env::var("MAX_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .unwrap_or(5),
            retry_initial_delay: Duration::from_secs(
                env::var("RETRY_INITIAL_DELAY_SECS")
                    .unwrap_or_else(|_| "2".into())
                    .parse()
                    .unwrap_or(2),
            ),
            retry_max_delay: Duration::from_secs(
                env::var("RETRY_MAX_DELAY_SECS")
                    .unwrap_or_else(|_| "10".into())
                    .parse()
                    .unwrap_or(10),
            ),
        })
    }
}
