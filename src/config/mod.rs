// Configuration module entry point
// Loads configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{Config, HealthConfig};

impl Config {
    /// Load configuration from specified file path (without extension).
    /// A missing file is not an error; defaults and `PORTAL_*` environment
    /// variables still apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("PORTAL").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("portal.entry_path", "/portal")?
            .set_default("portal.command_field", "command")?
            .set_default("portal.max_body_size", 1_048_576)? // 1MB
            .set_default("portal.ambiguity", "reject")?
            .set_default("portal.expose_commands", true)?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let portal = &self.portal;
        if !portal.entry_path.starts_with('/') || portal.entry_path.trim_matches('/').is_empty() {
            return Err(config::ConfigError::Message(format!(
                "portal.entry_path must be a non-root absolute path, got '{}'",
                portal.entry_path
            )));
        }
        if portal.command_field.is_empty() {
            return Err(config::ConfigError::Message(
                "portal.command_field must not be empty".to_string(),
            ));
        }
        if portal.max_body_size == 0 {
            return Err(config::ConfigError::Message(
                "portal.max_body_size must be greater than zero".to_string(),
            ));
        }
        if self.server.workers == Some(0) {
            return Err(config::ConfigError::Message(
                "server.workers must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::portal::AmbiguityPolicy;

    /// Defaults only; no file, no environment
    pub fn default_config() -> Config {
        let mut cfg = Config::load_from("does-not-exist/portal-test-config").unwrap();
        cfg.logging.access_log = false;
        cfg
    }

    #[test]
    fn test_defaults() {
        let cfg = default_config();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.portal.entry_path, "/portal");
        assert_eq!(cfg.portal.command_field, "command");
        assert_eq!(cfg.portal.max_body_size, 1_048_576);
        assert_eq!(cfg.portal.ambiguity, AmbiguityPolicy::Reject);
        assert_eq!(cfg.portal.commands_path(), "/portal/commands");
        assert!(cfg.health.enabled);
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_validate_rejects_bad_entry_path() {
        let mut cfg = default_config();
        cfg.portal.entry_path = "portal".to_string();
        assert!(cfg.validate().is_err());
        cfg.portal.entry_path = "/".to_string();
        assert!(cfg.validate().is_err());
        cfg.portal.entry_path = "/gw/portal".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut cfg = default_config();
        cfg.portal.max_body_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = default_config();
        cfg.server.workers = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_invalid_address() {
        let mut cfg = default_config();
        cfg.server.host = "not an ip".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
