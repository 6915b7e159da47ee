use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IANA timezone the bus network operates in (default: Europe/Berlin).
    /// All schedule arithmetic works on local minute-of-day in this zone.
    #[serde(default = "Config::default_timezone")]
    pub timezone: String,
    /// Allowed CORS origins. Required unless cors_permissive is set.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only, default: false)
    #[serde(default)]
    pub cors_permissive: bool,
    /// Schedule engine tunables
    #[serde(default)]
    pub engine: EngineConfig,
    /// Background trip generation sweep
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Optional external routing service for stop offsets
    #[serde(default)]
    pub external_geometry: ExternalGeometryConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse the configured timezone, falling back to UTC with a warning.
    pub fn parsed_timezone(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                timezone = %self.timezone,
                "Unknown timezone in config, falling back to UTC"
            );
            chrono_tz::UTC
        })
    }

    fn default_timezone() -> String {
        "Europe/Berlin".to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: Self::default_timezone(),
            cors_origins: Vec::new(),
            cors_permissive: false,
            engine: EngineConfig::default(),
            generation: GenerationConfig::default(),
            external_geometry: ExternalGeometryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Assumed average bus speed for the local travel-time estimate, km/h
    /// (default: 22)
    #[serde(default = "EngineConfig::default_average_speed_kmh")]
    pub average_speed_kmh: f64,
    /// Fixed boarding/alighting dwell added per stop, seconds (default: 15)
    #[serde(default = "EngineConfig::default_stop_dwell_seconds")]
    pub stop_dwell_seconds: f64,
    /// Forward horizon for trip generation, minutes (default: 360)
    #[serde(default = "EngineConfig::default_horizon_minutes")]
    pub default_horizon_minutes: u32,
    /// How long a computed stop-offset table stays cached, seconds
    /// (default: 900, floor: 30)
    #[serde(default = "EngineConfig::default_offset_cache_ttl_seconds")]
    pub offset_cache_ttl_seconds: u64,
    /// Fare amount used when a route's fare text carries no digits
    /// (default: 50000)
    #[serde(default = "EngineConfig::default_fare_amount")]
    pub default_fare_amount: f64,
}

impl EngineConfig {
    fn default_average_speed_kmh() -> f64 {
        22.0
    }

    fn default_stop_dwell_seconds() -> f64 {
        15.0
    }

    fn default_horizon_minutes() -> u32 {
        360
    }

    fn default_offset_cache_ttl_seconds() -> u64 {
        900
    }

    fn default_fare_amount() -> f64 {
        50_000.0
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: Self::default_average_speed_kmh(),
            stop_dwell_seconds: Self::default_stop_dwell_seconds(),
            default_horizon_minutes: Self::default_horizon_minutes(),
            offset_cache_ttl_seconds: Self::default_offset_cache_ttl_seconds(),
            default_fare_amount: Self::default_fare_amount(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Whether the background sweep runs at all (default: true)
    #[serde(default = "GenerationConfig::default_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps over all routes (default: 300)
    #[serde(default = "GenerationConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Routes generated concurrently within one sweep (default: 4)
    #[serde(default = "GenerationConfig::default_max_concurrent_routes")]
    pub max_concurrent_routes: usize,
}

impl GenerationConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_interval_secs() -> u64 {
        300
    }

    fn default_max_concurrent_routes() -> usize {
        4
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            interval_secs: Self::default_interval_secs(),
            max_concurrent_routes: Self::default_max_concurrent_routes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalGeometryConfig {
    /// Whether to query the external routing service at all (default: false).
    /// The local estimate always remains available as the fallback.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the OSRM-compatible service
    /// (default: https://router.project-osrm.org)
    #[serde(default = "ExternalGeometryConfig::default_base_url")]
    pub base_url: String,
    /// Routing profile segment in the request path (default: driving)
    #[serde(default = "ExternalGeometryConfig::default_profile")]
    pub profile: String,
    /// Request timeout in seconds (default: 8)
    #[serde(default = "ExternalGeometryConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directions with more geo-located stops than this skip the external
    /// service (default: 70)
    #[serde(default = "ExternalGeometryConfig::default_max_coordinates")]
    pub max_coordinates: usize,
    /// Multiplier applied to car driving durations to approximate a bus
    /// (default: 1.25)
    #[serde(default = "ExternalGeometryConfig::default_duration_factor")]
    pub duration_factor: f64,
}

impl ExternalGeometryConfig {
    fn default_base_url() -> String {
        "https://router.project-osrm.org".to_string()
    }

    fn default_profile() -> String {
        "driving".to_string()
    }

    fn default_timeout_secs() -> u64 {
        8
    }

    fn default_max_coordinates() -> usize {
        70
    }

    fn default_duration_factor() -> f64 {
        1.25
    }
}

impl Default for ExternalGeometryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: Self::default_base_url(),
            profile: Self::default_profile(),
            timeout_secs: Self::default_timeout_secs(),
            max_coordinates: Self::default_max_coordinates(),
            duration_factor: Self::default_duration_factor(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.timezone, "Europe/Berlin");
        assert!(!config.cors_permissive);
        assert_eq!(config.engine.average_speed_kmh, 22.0);
        assert_eq!(config.engine.default_horizon_minutes, 360);
        assert!(!config.external_geometry.enabled);
        assert_eq!(
            config.external_geometry.base_url,
            "https://router.project-osrm.org"
        );
        assert!(config.generation.enabled);
    }

    #[test]
    fn partial_section_keeps_remaining_defaults() {
        let yaml = r#"
engine:
  average_speed_kmh: 18.5
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.engine.average_speed_kmh, 18.5);
        assert_eq!(config.engine.stop_dwell_seconds, 15.0);
        assert_eq!(config.engine.offset_cache_ttl_seconds, 900);
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let config = Config {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert_eq!(config.parsed_timezone(), chrono_tz::UTC);
    }
}
