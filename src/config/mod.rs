use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub snapshot_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub otp_ttl_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CreditsConfig {
    pub signup_bonus: i64,
    pub chat_cost: i64,
    pub daily_limit: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    pub webhook_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub credits: CreditsConfig,
    pub rate_limit: RateLimitSettings,
    pub notify: NotifyConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default values
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("store.snapshot_path", "data/mapchat.json")?
            .set_default("auth.jwt_secret", "development_secret")?
            .set_default("auth.token_expiry_hours", 24)?
            .set_default("auth.otp_ttl_minutes", 10)?
            .set_default("credits.signup_bonus", 100)?
            .set_default("credits.chat_cost", 1)?
            .set_default("credits.daily_limit", 50)?
            .set_default("rate_limit.max_requests", 10)?
            .set_default("rate_limit.window_seconds", 60)?
            .set_default("notify.webhook_url", "http://127.0.0.1:8025/otp")?
            .set_default("notify.timeout_seconds", 10)?

            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))

            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        s.try_deserialize()
    }

    /// Fixed defaults only, so tests stay deterministic no matter what
    /// is in the process environment.
    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "test")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("store.snapshot_path", "data/test.json")?
            .set_default("auth.jwt_secret", "test_secret")?
            .set_default("auth.token_expiry_hours", 1)?
            .set_default("auth.otp_ttl_minutes", 10)?
            .set_default("credits.signup_bonus", 100)?
            .set_default("credits.chat_cost", 1)?
            .set_default("credits.daily_limit", 50)?
            .set_default("rate_limit.max_requests", 10)?
            .set_default("rate_limit.window_seconds", 60)?
            .set_default("notify.webhook_url", "http://127.0.0.1:8025/otp")?
            .set_default("notify.timeout_seconds", 1)?
            .build()?
            .try_deserialize()
    }
}
