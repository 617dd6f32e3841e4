use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub resource_service_url: String,
    pub internal_service_key: String,
    pub resource_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            resource_service_url: env::var("RESOURCE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".to_string()),
            internal_service_key: env::var("INTERNAL_SERVICE_KEY")
                .unwrap_or_else(|_| "changeme".to_string()),
            resource_timeout_ms: env::var("RESOURCE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        }
    }
}
