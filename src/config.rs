use std::env;

/// Built-in signing secret used when `KEYLOCK_SECRET` is not set. Every
/// deployment should override it; issuer, validator and registry server
/// must all agree on the value, and rotating it invalidates every
/// outstanding key.
pub const DEFAULT_SECRET: &str = "keylock_default_secret_change_me_v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// HMAC secret shared by issuer, validator and registry server.
    pub secret: String,
    /// Remote authority endpoint; `None` disables remote validation.
    pub server_url: Option<String>,
    /// Timeout for remote authority round-trips.
    pub timeout_secs: u64,
    pub license_file: String,
    pub lock_file: String,
    pub registry_file: String,
    /// Server-side activation registry file.
    pub server_registry_file: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        let server_url = env::var("KEYLOCK_SERVER_URL")
            .ok()
            .filter(|v| !v.is_empty() && v != "None");

        let timeout_secs: u64 = env::var("KEYLOCK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            host,
            port,
            secret: env::var("KEYLOCK_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.to_string()),
            server_url,
            timeout_secs,
            license_file: env::var("KEYLOCK_LICENSE_FILE")
                .unwrap_or_else(|_| "license.key".to_string()),
            lock_file: env::var("KEYLOCK_LOCK_FILE")
                .unwrap_or_else(|_| "license.lock".to_string()),
            registry_file: env::var("KEYLOCK_REGISTRY_FILE")
                .unwrap_or_else(|_| "license.registry".to_string()),
            server_registry_file: env::var("KEYLOCK_SERVER_REGISTRY_FILE")
                .unwrap_or_else(|_| "license_registry.json".to_string()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
