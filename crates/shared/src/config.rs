//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Financing configuration.
    pub finance: FinanceConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Financing configuration.
///
/// These values are passed into the financing call sites explicitly rather
/// than read from ambient global state.
#[derive(Debug, Clone, Deserialize)]
pub struct FinanceConfig {
    /// Default annual interest rate in percent, applied when a vehicle
    /// carries no rate override.
    #[serde(default = "default_annual_rate")]
    pub default_annual_rate: Decimal,
    /// Ceiling for the annual interest rate in percent. Requested rates
    /// above this are clamped at the API boundary.
    #[serde(default = "default_max_annual_rate")]
    pub max_annual_rate: Decimal,
    /// Minimum down payment for a financed purchase, as a percent of the
    /// vehicle price.
    #[serde(default = "default_min_down_payment_percent")]
    pub min_down_payment_percent: Decimal,
}

fn default_annual_rate() -> Decimal {
    Decimal::new(850, 2) // 8.50%
}

fn default_max_annual_rate() -> Decimal {
    Decimal::new(3000, 2) // 30.00%
}

fn default_min_down_payment_percent() -> Decimal {
    Decimal::new(1000, 2) // 10.00%
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            default_annual_rate: default_annual_rate(),
            max_annual_rate: default_max_annual_rate(),
            min_down_payment_percent: default_min_down_payment_percent(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("VANTRA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_finance_defaults() {
        let finance = FinanceConfig::default();
        assert_eq!(finance.default_annual_rate, dec!(8.50));
        assert_eq!(finance.max_annual_rate, dec!(30.00));
        assert_eq!(finance.min_down_payment_percent, dec!(10.00));
    }

    #[test]
    fn test_server_defaults() {
        assert_eq!(default_host(), "0.0.0.0");
        assert_eq!(default_port(), 8080);
        assert_eq!(default_max_connections(), 10);
        assert_eq!(default_min_connections(), 1);
    }
}
