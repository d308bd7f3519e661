use std::env;
use std::path::PathBuf;

/// Gateway configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// License file applied to the device on connect, when present
    pub license_file: PathBuf,
    /// Output frequency initially programmed into the simulated backend
    pub sim_start_freq: f32,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env::var("GAZELINK_PORT")
                .unwrap_or_else(|_| "3003".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: env::var("GAZELINK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            license_file: env::var("GAZELINK_LICENSE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./TobiiLicense")),
            sim_start_freq: env::var("GAZELINK_SIM_START_FREQ")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("GAZELINK_SIM_START_FREQ must be a number".to_string())
                })?,
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
