use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use chrono::Duration;
use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub database_path: PathBuf,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    pub session_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self, String> {
        let session_ttl = session_ttl(try_load("SESSION_TTL_SECS", "86400")?)?;

        Ok(Self {
            port: try_load("PORT", "3000")?,
            bind_address: try_load("BIND_ADDRESS", "0.0.0.0")?,
            database_path: try_load("DATABASE_PATH", "chat_app.db")?,
            templates_dir: try_load("TEMPLATES_DIR", "templates")?,
            static_dir: try_load("STATIC_DIR", "public")?,
            session_ttl,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn session_ttl(secs: u64) -> Result<Duration, String> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            warn!("Invalid SESSION_TTL_SECS value: {secs} is out of range");
            format!("environment misconfigured: SESSION_TTL_SECS: {secs} is out of range")
        })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, String>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            format!("environment misconfigured: {key}: {e}")
        })
}
