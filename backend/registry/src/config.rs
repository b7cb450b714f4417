//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::errors::{RegistryError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub api_port: u16,
    /// Optional JSON file replacing the embedded mock dataset
    pub dataset_path: Option<String>,
    /// Step timings for both workflows
    pub timing: Timing,
    /// Estimated market price of one credit, in rupees
    pub credit_price: u64,
    /// Fixed RNG seed for reproducible fabricated results
    pub metrics_seed: Option<u64>,
}

/// Delay applied after every progress step, per workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub upload_step: Duration,
    pub processing_step: Duration,
    pub calculation_step: Duration,
    pub minting_step: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            upload_step: Duration::from_millis(100),
            processing_step: Duration::from_millis(200),
            calculation_step: Duration::from_millis(300),
            minting_step: Duration::from_millis(600),
        }
    }
}

pub const DEFAULT_CREDIT_PRICE: u64 = 2100;

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Timing::default();
        Ok(Config {
            api_port: parse_or("API_PORT", 3001)?,
            dataset_path: env_var("DATASET_PATH").ok(),
            timing: Timing {
                upload_step: millis_or("UPLOAD_STEP_MS", defaults.upload_step)?,
                processing_step: millis_or("PROCESSING_STEP_MS", defaults.processing_step)?,
                calculation_step: millis_or("CALCULATION_STEP_MS", defaults.calculation_step)?,
                minting_step: millis_or("MINTING_STEP_MS", defaults.minting_step)?,
            },
            credit_price: parse_or("CREDIT_PRICE", DEFAULT_CREDIT_PRICE)?,
            metrics_seed: match env_var("METRICS_SEED") {
                Ok(raw) => Some(parse_value("METRICS_SEED", &raw)?),
                Err(_) => None,
            },
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| RegistryError::Config(format!("Missing env var: {key}")))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn millis_or(key: &str, default: Duration) -> Result<Duration> {
    let ms: u64 = parse_or(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| RegistryError::Config(format!("Invalid {key}: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_dashboard_pacing() {
        let t = Timing::default();
        assert_eq!(t.upload_step, Duration::from_millis(100));
        assert_eq!(t.processing_step, Duration::from_millis(200));
        assert_eq!(t.calculation_step, Duration::from_millis(300));
        assert_eq!(t.minting_step, Duration::from_millis(600));
    }

    #[test]
    fn parse_value_trims_input() {
        let port: u16 = parse_value("API_PORT", " 8080 ").unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_value_rejects_garbage() {
        let err = parse_value::<u16>("API_PORT", "eighty").unwrap_err();
        assert!(matches!(err, RegistryError::Config(msg) if msg.contains("API_PORT")));
    }
}
