use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;

/// HTTP listener settings for the callback and admin endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            // Gateway callbacks spend most of their time waiting on MySQL
            workers: num_cpus::get() * 2,
        }
    }

    /// Reads `SERVER_HOST`, `SERVER_PORT` and the optional `SERVER_WORKERS`
    pub fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("SERVER_PORT", "8080")?;

        let mut config = Self::new(host, port);
        if env::var("SERVER_WORKERS").is_ok() {
            config.workers = parse_var("SERVER_WORKERS", "0")?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::Configuration(
                "SERVER_WORKERS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", name)))
}
