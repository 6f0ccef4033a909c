//! Compile-time registry of geocoding service configurations.
//!
//! Each geocoding provider is defined in a TOML file under `services/`.
//! The registry embeds these at compile time and exposes them via
//! [`all_services`] and [`enabled_services`].

use serde::Deserialize;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"kakao"`, `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service is tried at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Execution order, lower values run first.
    pub priority: u32,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Kakao Local address search.
    Kakao {
        /// Endpoint URL.
        base_url: String,
        /// Environment variable holding the REST API key.
        api_key_env: String,
    },
    /// Nominatim / `OpenStreetMap` free-form search.
    Nominatim {
        /// Endpoint URL.
        base_url: String,
        /// ISO country code used to restrict results.
        country_code: String,
        /// Minimum delay between requests in milliseconds.
        rate_limit_ms: u64,
    },
}

const fn default_true() -> bool {
    true
}

impl GeocodingService {
    /// Returns the provider's base URL regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Kakao { base_url, .. } | ProviderConfig::Nominatim { base_url, .. } => {
                base_url
            }
        }
    }
}

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("kakao", include_str!("../services/kakao.toml")),
    ("nominatim", include_str!("../services/nominatim.toml")),
];

/// Returns all geocoding service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any embedded TOML config is malformed.
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}
