use scorecard_parser::ValidationConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub validation: ValidationConfig,
}

impl ServiceConfig {
    /// Reads `SCORECARD_ADDR`, `SCORECARD_DATA_DIR` and the optional
    /// `SCORECARD_MAX_NATIONAL_ID` ceiling.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("SCORECARD_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let addr = raw_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "SCORECARD_ADDR",
            value: raw_addr.clone(),
        })?;

        let data_dir = lookup("SCORECARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let mut validation = ValidationConfig::default();
        if let Some(raw) = lookup("SCORECARD_MAX_NATIONAL_ID") {
            let ceiling = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "SCORECARD_MAX_NATIONAL_ID",
                value: raw.clone(),
            })?;
            validation.max_national_id = Some(ceiling);
        }

        Ok(Self {
            addr,
            data_dir,
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.validation.max_national_id, None);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SCORECARD_ADDR", "0.0.0.0:9000"),
            ("SCORECARD_MAX_NATIONAL_ID", "500000"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.validation.max_national_id, Some(500000));

        let err = ServiceConfig::from_lookup(lookup(&[("SCORECARD_ADDR", "nowhere")])).unwrap_err();
        assert!(err.to_string().contains("SCORECARD_ADDR"));
    }
}
