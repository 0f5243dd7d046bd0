use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_GEOCODING_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub geocoding: GeocodingConfig,
    pub proximity: ProximityConfig,
    pub node_id: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityConfig {
    pub default_radius_km: f64,
    pub co_location_radius_m: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://geosocial.db".to_string(),
                max_connections: 5,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            geocoding: GeocodingConfig {
                base_url: DEFAULT_GEOCODING_URL.to_string(),
                api_key: None,
            },
            proximity: ProximityConfig {
                default_radius_km: 10.0,
                co_location_radius_m: 50.0,
            },
            node_id: 0,
        }
    }
}

/// Parsed env var, or `default` when unset; unparsable values are logged and ignored
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let mut node_id = env_or("NODE_ID", defaults.node_id);
        if node_id > 1023 {
            warn!("NODE_ID {} exceeds 1023, using 0", node_id);
            node_id = 0;
        }

        let positive = |key: &str, default: f64| {
            let value = env_or(key, default);
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                warn!("{} must be a non-negative number, using {}", key, default);
                default
            }
        };

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                ),
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env_or("SERVER_PORT", defaults.server.port),
            },
            geocoding: GeocodingConfig {
                base_url: env::var("GEOCODING_BASE_URL").unwrap_or(defaults.geocoding.base_url),
                api_key: env::var("GOOGLE_API_KEY").ok().filter(|key| !key.is_empty()),
            },
            proximity: ProximityConfig {
                default_radius_km: positive("DEFAULT_RADIUS_KM", defaults.proximity.default_radius_km),
                co_location_radius_m: positive(
                    "CO_LOCATION_RADIUS_M",
                    defaults.proximity.co_location_radius_m,
                ),
            },
            node_id,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_address(), "0.0.0.0:3000");
        assert_eq!(config.proximity.default_radius_km, 10.0);
        assert_eq!(config.proximity.co_location_radius_m, 50.0);
        assert!(config.geocoding.api_key.is_none());
    }

    #[test]
    fn test_env_or_falls_back() {
        env::set_var("GEOSOCIAL_TEST_PORT", "not-a-port");
        assert_eq!(env_or("GEOSOCIAL_TEST_PORT", 3000u16), 3000);
        env::set_var("GEOSOCIAL_TEST_PORT", " 8080 ");
        assert_eq!(env_or("GEOSOCIAL_TEST_PORT", 3000u16), 8080);
        env::remove_var("GEOSOCIAL_TEST_PORT");
        assert_eq!(env_or("GEOSOCIAL_TEST_PORT", 3000u16), 3000);
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = Config::default();
        config.geocoding.api_key = Some("secret".to_string());
        let value = serde_json::to_value(&config).unwrap();
        assert!(value["geocoding"].get("api_key").is_none());
    }
}
