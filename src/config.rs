use std::env;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Bound on waiting for an order aggregate lock before returning Busy.
    pub lock_wait_ms: u64,
    /// Commission rate (percent) used when the tenant directory has no
    /// answer for a tenant.
    pub default_commission_rate: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            lock_wait_ms: parse_or_default("LOCK_WAIT_MS", 2000)?,
            default_commission_rate: parse_or_default("DEFAULT_COMMISSION_RATE", dec!(20))?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
