use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::engine::EngineSettings;
use crate::reputation::TierTable;
use crate::types::{Principal, parse_principal};

/// Configuration for the lending service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Engine roles and event buffering
    pub engine: EngineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Enable API authentication
    pub enable_auth: bool,
    /// Accepted API keys (orchestrator and bot backends)
    pub api_keys: Vec<String>,
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pool, registry and asset admin
    pub admin: Principal,
    /// Loan system identity; seeded as the reputation controller
    pub loan_system: Principal,
    /// Live subscriber buffer of the event stream
    pub event_capacity: usize,
    /// Advisory credit tiers
    pub tiers: TierTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Enable log sanitization to prevent sensitive data exposure
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
    /// Log span open/close events
    pub span_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: Principal::ZERO,       // MUST be configured
            loan_system: Principal::ZERO, // MUST be configured
            event_capacity: 1024,
            tiers: TierTable::default(),
        }
    }
}

impl EngineConfig {
    /// Convert to EngineSettings for use by LendingEngine
    pub fn to_settings(&self) -> EngineSettings {
        EngineSettings {
            admin: self.admin,
            loan_system: self.loan_system,
            event_capacity: self.event_capacity,
            tiers: self.tiers.clone(),
        }
    }
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8780,
            },
            security: SecurityConfig {
                enable_auth: true,
                api_keys: Vec::new(), // MUST be configured when auth is enabled
                rate_limit_per_minute: 120,
                max_request_size: 64 * 1024,
            },
            engine: EngineConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
                span_events: false,
            },
        }
    }
}

impl LendingConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("FTC_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = env::var("FTC_PORT") {
            config.server.port = port.parse().context("Invalid FTC_PORT value")?;
        }

        // Security configuration
        if let Ok(enable_auth) = env::var("FTC_ENABLE_AUTH") {
            config.security.enable_auth = enable_auth
                .parse()
                .context("Invalid FTC_ENABLE_AUTH value")?;
        }

        if let Ok(keys) = env::var("FTC_API_KEYS") {
            config.security.api_keys = keys
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        } else if config.security.enable_auth {
            return Err(anyhow::anyhow!(
                "FTC_API_KEYS environment variable is required when authentication is enabled"
            ));
        }

        if let Ok(rate_limit) = env::var("FTC_RATE_LIMIT_PER_MINUTE") {
            config.security.rate_limit_per_minute = rate_limit
                .parse()
                .context("Invalid FTC_RATE_LIMIT_PER_MINUTE value")?;
        }

        if let Ok(size) = env::var("FTC_MAX_REQUEST_SIZE") {
            config.security.max_request_size = size
                .parse()
                .context("Invalid FTC_MAX_REQUEST_SIZE value")?;
        }

        // Engine roles
        let admin = env::var("FTC_ADMIN_ADDRESS")
            .context("FTC_ADMIN_ADDRESS environment variable is required")?;
        config.engine.admin = parse_principal(&admin)
            .map_err(anyhow::Error::msg)
            .context("Invalid FTC_ADMIN_ADDRESS value")?;

        let loan_system = env::var("FTC_LOAN_SYSTEM_ADDRESS")
            .context("FTC_LOAN_SYSTEM_ADDRESS environment variable is required")?;
        config.engine.loan_system = parse_principal(&loan_system)
            .map_err(anyhow::Error::msg)
            .context("Invalid FTC_LOAN_SYSTEM_ADDRESS value")?;

        if let Ok(capacity) = env::var("FTC_EVENT_CAPACITY") {
            config.engine.event_capacity = capacity
                .parse()
                .context("Invalid FTC_EVENT_CAPACITY value")?;
        }

        // Logging configuration
        if let Ok(log_level) = env::var("FTC_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(sanitize_logs) = env::var("FTC_SANITIZE_LOGS") {
            config.logging.sanitize_logs = sanitize_logs
                .parse()
                .context("Invalid FTC_SANITIZE_LOGS value")?;
        }

        if let Ok(log_requests) = env::var("FTC_LOG_REQUESTS") {
            config.logging.log_requests = log_requests
                .parse()
                .context("Invalid FTC_LOG_REQUESTS value")?;
        }

        if let Ok(span_events) = env::var("FTC_LOG_SPAN_EVENTS") {
            config.logging.span_events = span_events
                .parse()
                .context("Invalid FTC_LOG_SPAN_EVENTS value")?;
        }

        if !config.security.enable_auth {
            warn!("API authentication is DISABLED (FTC_ENABLE_AUTH=false)");
        }

        config.validate()?;

        info!(
            admin = %config.engine.admin,
            loan_system = %config.engine.loan_system,
            api_keys = config.security.api_keys.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.engine.admin.is_zero() {
            return Err(anyhow::anyhow!("Admin address cannot be the null address"));
        }

        if self.engine.loan_system.is_zero() {
            return Err(anyhow::anyhow!(
                "Loan system address cannot be the null address"
            ));
        }

        if self.engine.admin == self.engine.loan_system {
            return Err(anyhow::anyhow!(
                "Admin and loan system addresses must differ"
            ));
        }

        if self.engine.event_capacity == 0 {
            return Err(anyhow::anyhow!("Event capacity must be non-zero"));
        }

        if self.engine.tiers.tiers.is_empty() {
            return Err(anyhow::anyhow!("At least one credit tier must be configured"));
        }

        if self.security.enable_auth {
            if self.security.api_keys.is_empty() {
                return Err(anyhow::anyhow!(
                    "Authentication is enabled but no API keys are configured"
                ));
            }

            for key in &self.security.api_keys {
                if key.len() < 32 {
                    return Err(anyhow::anyhow!(
                        "API key {} is too short (minimum 32 characters for security)",
                        sanitize_for_logging(key)
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive_patterns = [
        "auth",
        "key",
        "token",
        "password",
        "secret",
        "credential",
        "api_key",
        "apikey",
        "bearer",
    ];

    let data_lower = data.to_lowercase();
    let looks_secret = data.len() >= 32 && data.chars().all(|c| c.is_ascii_alphanumeric());

    if looks_secret || sensitive_patterns.iter().any(|p| data_lower.contains(p)) {
        if data.len() > 20 {
            return format!("{}***{}", &data[..6], &data[data.len().saturating_sub(6)..]);
        } else {
            return format!(
                "{}***{}",
                &data[..data.len().min(2)],
                &data[data.len().saturating_sub(2)..]
            );
        }
    }

    data.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn valid_config() -> LendingConfig {
        let mut config = LendingConfig::default();
        config.engine.admin = Address::repeat_byte(0xAA);
        config.engine.loan_system = Address::repeat_byte(0x5E);
        config.security.api_keys = vec!["testApiKey1234567890abcdefghijklm".to_string()];
        config
    }

    #[test]
    fn test_sanitize_for_logging() {
        // For strings <= 20 chars with sensitive pattern, show first 2 and last 2
        assert_eq!(sanitize_for_logging("api_key_secret"), "ap***et");
        assert_eq!(sanitize_for_logging("normal_data"), "normal_data");
        assert_eq!(
            sanitize_for_logging("testApiKey1234567890abcdefghijklm"),
            "testAp***hijklm"
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(valid_config().validate().is_ok());
        assert!(LendingConfig::default().validate().is_err());
    }

    #[test]
    fn test_roles_must_differ() {
        let mut config = valid_config();
        config.engine.loan_system = config.engine.admin;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_api_key_rejected() {
        let mut config = valid_config();
        config.security.api_keys = vec!["short".to_string()];
        assert!(config.validate().is_err());

        config.security.enable_auth = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_settings() {
        let config = valid_config();
        let settings = config.engine.to_settings();
        assert_eq!(settings.admin, config.engine.admin);
        assert_eq!(settings.event_capacity, 1024);
        assert_eq!(config.bind_address(), "127.0.0.1:8780");
    }
}
