#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address geocoding for new places.
//!
//! Turns a free-text (Korean) address into a display name and a
//! coordinate using a multi-provider strategy configured via TOML files
//! in `services/`:
//!
//! 1. **Kakao Local** (priority 1), needs `KAKAO_REST_API_KEY`.
//! 2. **Nominatim / OpenStreetMap** (priority 2), free, limited to
//!    Korea and 1 req/sec.
//!
//! [`FallbackGeocoder`] tries the enabled providers in priority order
//! and returns the first match.

pub mod kakao;
pub mod nominatim;
pub mod service_registry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::kakao::KakaoGeocoder;
use crate::nominatim::NominatimGeocoder;
use crate::service_registry::ProviderConfig;

/// Shown to the user when an address cannot be resolved.
pub const FAILURE_MESSAGE: &str = "좌표를 불러오는 데 실패했습니다.";

const USER_AGENT: &str = concat!("mozzi-map/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    /// Building name when known, else the full address.
    pub name: String,
    /// Full address as matched by the provider.
    pub address: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Which provider resolved this address.
    pub provider: GeocodingProvider,
}

/// Which geocoding provider resolved an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodingProvider {
    /// Kakao Local API.
    Kakao,
    /// Nominatim / `OpenStreetMap`.
    Nominatim,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// No provider could be configured.
    #[error("No geocoding provider is available")]
    NoProviders,
}

/// Resolves a free-text address.
#[async_trait]
pub trait GeocodeService: Send + Sync {
    /// Returns the best match for `address`, or `None` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the provider could not be queried.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedPlace>, GeocodeError>;
}

/// Tries several providers in order.
pub struct FallbackGeocoder {
    providers: Vec<(String, Box<dyn GeocodeService>)>,
}

impl FallbackGeocoder {
    /// Creates a geocoder from explicit providers, tried in the given order.
    #[must_use]
    pub fn new(providers: Vec<(String, Box<dyn GeocodeService>)>) -> Self {
        Self { providers }
    }

    /// Builds the provider chain from the embedded service registry.
    ///
    /// `key_for` is asked for API keys by environment variable name.
    /// Providers whose key is missing are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the HTTP client cannot be built or no
    /// provider is usable.
    pub fn from_registry(key_for: impl Fn(&str) -> Option<String>) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut providers: Vec<(String, Box<dyn GeocodeService>)> = Vec::new();
        for svc in service_registry::enabled_services() {
            let provider: Box<dyn GeocodeService> = match svc.provider {
                ProviderConfig::Kakao {
                    base_url,
                    api_key_env,
                } => {
                    let Some(key) = key_for(&api_key_env).filter(|k| !k.is_empty()) else {
                        log::info!("Skipping {}: {api_key_env} is not set", svc.name);
                        continue;
                    };
                    Box::new(KakaoGeocoder::new(client.clone(), base_url, key))
                }
                ProviderConfig::Nominatim {
                    base_url,
                    country_code,
                    rate_limit_ms,
                } => Box::new(NominatimGeocoder::new(
                    client.clone(),
                    base_url,
                    country_code,
                    Duration::from_millis(rate_limit_ms),
                )),
            };
            log::debug!("Geocoding provider {} (priority {})", svc.id, svc.priority);
            providers.push((svc.id, provider));
        }

        if providers.is_empty() {
            return Err(GeocodeError::NoProviders);
        }
        Ok(Self { providers })
    }

    /// Ids of the configured providers, in the order they are tried.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(id, _)| id.as_str())
    }
}

#[async_trait]
impl GeocodeService for FallbackGeocoder {
    /// Returns the first provider's match. A provider error moves on to
    /// the next provider; the last error is returned only if no provider
    /// answered at all.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let mut answered = false;
        let mut last_err = None;

        for (id, provider) in &self.providers {
            match provider.geocode(address).await {
                Ok(Some(place)) => {
                    log::debug!("{id} resolved '{address}'");
                    return Ok(Some(place));
                }
                Ok(None) => {
                    log::debug!("{id} found no match for '{address}'");
                    answered = true;
                }
                Err(e) => {
                    log::warn!("{id} failed for '{address}': {e}");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if !answered => Err(e),
            _ if self.providers.is_empty() => Err(GeocodeError::NoProviders),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Stub {
        Hit(&'static str),
        Miss,
        Fail,
    }

    #[async_trait]
    impl GeocodeService for Stub {
        async fn geocode(&self, address: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
            match self {
                Self::Hit(name) => Ok(Some(GeocodedPlace {
                    name: (*name).to_string(),
                    address: address.to_string(),
                    latitude: 33.0,
                    longitude: 126.0,
                    provider: GeocodingProvider::Kakao,
                })),
                Self::Miss => Ok(None),
                Self::Fail => Err(GeocodeError::RateLimited),
            }
        }
    }

    fn chain(stubs: Vec<Stub>) -> FallbackGeocoder {
        FallbackGeocoder::new(
            stubs
                .into_iter()
                .enumerate()
                .map(|(i, s)| (format!("stub{i}"), Box::new(s) as Box<dyn GeocodeService>))
                .collect(),
        )
    }

    #[tokio::test]
    async fn first_match_wins() {
        let geo = chain(vec![Stub::Fail, Stub::Miss, Stub::Hit("a"), Stub::Hit("b")]);
        let place = geo.geocode("제주").await.unwrap().unwrap();
        assert_eq!(place.name, "a");
    }

    #[tokio::test]
    async fn all_failing_returns_error() {
        let geo = chain(vec![Stub::Fail, Stub::Fail]);
        assert!(geo.geocode("제주").await.is_err());
    }

    #[tokio::test]
    async fn miss_plus_failure_is_no_match() {
        let geo = chain(vec![Stub::Fail, Stub::Miss]);
        assert!(geo.geocode("제주").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_chain_has_no_providers() {
        let geo = chain(vec![]);
        assert!(matches!(
            geo.geocode("제주").await,
            Err(GeocodeError::NoProviders)
        ));
    }

    #[test]
    fn registry_skips_kakao_without_key() {
        let geo = FallbackGeocoder::from_registry(|_| None).unwrap();
        assert_eq!(geo.provider_ids().collect::<Vec<_>>(), vec!["nominatim"]);

        let geo = FallbackGeocoder::from_registry(|var| {
            (var == "KAKAO_REST_API_KEY").then(|| "key".to_string())
        })
        .unwrap();
        assert_eq!(
            geo.provider_ids().collect::<Vec<_>>(),
            vec!["kakao", "nominatim"]
        );
    }
}
