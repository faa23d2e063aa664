use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub db_connect_max_attempts: u32,
    pub kafka_broker_url: Option<String>,
    pub gateway_dispatch_url: Option<String>,
    pub dispatch_max_attempts: u32,
    pub publish_max_attempts: u32,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_secs: u64,
    pub breaker_call_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    /// `LOG_FORMAT=json` switches log output to JSON lines.
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: parse_or("SERVER_PORT", 8090)?,
            database_url: env::var("DATABASE_URL")?,
            db_connect_max_attempts: parse_or("DB_CONNECT_MAX_ATTEMPTS", 5)?,
            kafka_broker_url: non_empty("KAFKA_BROKER_URL"),
            gateway_dispatch_url: non_empty("GATEWAY_DISPATCH_URL"),
            dispatch_max_attempts: parse_or("DISPATCH_MAX_ATTEMPTS", 5)?,
            publish_max_attempts: parse_or("PUBLISH_MAX_ATTEMPTS", 5)?,
            breaker_failure_threshold: parse_or("BREAKER_FAILURE_THRESHOLD", 5)?,
            breaker_reset_secs: parse_or("BREAKER_RESET_SECS", 5)?,
            breaker_call_timeout_secs: parse_or("BREAKER_CALL_TIMEOUT_SECS", 3)?,
            publish_timeout_secs: parse_or("PUBLISH_TIMEOUT_SECS", 5)?,
            log_json: non_empty("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    pub fn db_connect_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.db_connect_max_attempts)
    }

    pub fn dispatch_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.dispatch_max_attempts)
    }

    pub fn publish_retry(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.publish_max_attempts)
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            reset_interval: Duration::from_secs(self.breaker_reset_secs),
            call_timeout: Duration::from_secs(self.breaker_call_timeout_secs),
        }
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}
