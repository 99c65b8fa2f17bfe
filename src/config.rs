use std::net::{IpAddr, Ipv4Addr};

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind the WebTransport and metrics servers to
    pub bind_address: IpAddr,
    /// WebTransport (UDP) port
    pub port: u16,
    /// Metrics HTTP port
    pub metrics_port: u16,
    /// Maximum concurrent sessions
    pub max_sessions: usize,
    /// Outbound frames buffered per session before frames are dropped
    pub session_queue_depth: usize,
    /// Path to TLS certificate file
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file
    pub tls_key_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            metrics_port: 9090,
            max_sessions: 256,
            session_queue_depth: 8,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Bad values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(port) = parse_port(&lookup, "PORT") {
            config.port = port;
        }
        if let Some(port) = parse_port(&lookup, "METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Some(value) = lookup("MAX_SESSIONS") {
            match value.parse::<usize>() {
                Ok(parsed) if parsed > 0 && parsed <= 10_000 => config.max_sessions = parsed,
                Ok(_) => tracing::warn!("MAX_SESSIONS must be 1-10000, using default"),
                Err(_) => tracing::warn!("Invalid MAX_SESSIONS '{}', using default", value),
            }
        }

        if let Some(value) = lookup("SESSION_QUEUE_DEPTH") {
            match value.parse::<usize>() {
                Ok(parsed) if parsed > 0 && parsed <= 1024 => config.session_queue_depth = parsed,
                Ok(_) => tracing::warn!("SESSION_QUEUE_DEPTH must be 1-1024, using default"),
                Err(_) => tracing::warn!("Invalid SESSION_QUEUE_DEPTH '{}', using default", value),
            }
        }

        config.tls_cert_path = lookup("TLS_CERT_PATH");
        config.tls_key_path = lookup("TLS_KEY_PATH");

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 || self.metrics_port == 0 {
            return Err("Ports cannot be 0".to_string());
        }
        if self.port == self.metrics_port {
            return Err("PORT and METRICS_PORT must differ".to_string());
        }
        if self.max_sessions == 0 {
            return Err("max_sessions must be at least 1".to_string());
        }
        if self.session_queue_depth == 0 {
            return Err("session_queue_depth must be at least 1".to_string());
        }
        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string());
        }
        Ok(())
    }
}

fn parse_port<F>(lookup: &F, key: &str) -> Option<u16>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match value.parse::<u16>() {
        Ok(parsed) if parsed > 0 => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be > 0, using default", key);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4433);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.max_sessions, 256);
        assert_eq!(config.session_queue_depth, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("BIND_ADDRESS", "127.0.0.1"),
            ("PORT", "5000"),
            ("METRICS_PORT", "9100"),
            ("MAX_SESSIONS", "16"),
            ("SESSION_QUEUE_DEPTH", "32"),
        ]);
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 5000);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.max_sessions, 16);
        assert_eq!(config.session_queue_depth, 32);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = from_pairs(&[
            ("BIND_ADDRESS", "not-an-ip"),
            ("PORT", "0"),
            ("METRICS_PORT", "99999"),
            ("MAX_SESSIONS", "0"),
            ("SESSION_QUEUE_DEPTH", "lots"),
        ]);
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_validate_rejects_half_tls() {
        let config = from_pairs(&[("TLS_CERT_PATH", "cert.pem")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_port_clash() {
        let config = from_pairs(&[("PORT", "9090")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = ServerConfig::load_or_default();
        assert!(config.port > 0);
    }
}
