//! Nominatim / OpenStreetMap geocoder client.
//!
//! Used as a fallback when Kakao has no key or no match. The public
//! instance allows **1 request per second**; [`NominatimGeocoder`] waits
//! out the configured gap itself.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{GeocodeError, GeocodeService, GeocodedPlace, GeocodingProvider};

/// Free-form Nominatim search restricted to one country.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    country_code: String,
    rate_limit: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    /// Creates a client for `base_url`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        country_code: impl Into<String>,
        rate_limit: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            country_code: country_code.into(),
            rate_limit,
            last_request: Mutex::new(None),
        }
    }

    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.rate_limit).await;
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl GeocodeService for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        self.wait_turn().await;

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", address),
                ("countrycodes", self.country_code.as_str()),
                ("format", "jsonv2"),
                ("addressdetails", "0"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_response(&body, address)
    }
}

/// Parses a Nominatim `jsonv2` response.
fn parse_response(
    body: &serde_json::Value,
    query: &str,
) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let address = first["display_name"]
        .as_str()
        .map_or_else(|| query.to_string(), String::from);
    let name = first["name"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map_or_else(|| address.clone(), String::from);

    Ok(Some(GeocodedPlace {
        name,
        address,
        latitude: lat,
        longitude: lon,
        provider: GeocodingProvider::Nominatim,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "33.4586",
            "lon": "126.9427",
            "name": "성산일출봉",
            "display_name": "성산일출봉, 서귀포시, 제주특별자치도, 대한민국"
        }]);
        let result = parse_response(&body, "성산일출봉").unwrap().unwrap();
        assert!((result.latitude - 33.4586).abs() < 1e-4);
        assert!((result.longitude - 126.9427).abs() < 1e-4);
        assert_eq!(result.name, "성산일출봉");
        assert_eq!(result.provider, GeocodingProvider::Nominatim);
    }

    #[test]
    fn unnamed_result_uses_display_name() {
        let body = serde_json::json!([{
            "lat": "33.1",
            "lon": "126.1",
            "name": "",
            "display_name": "애월읍, 제주시"
        }]);
        let result = parse_response(&body, "애월").unwrap().unwrap();
        assert_eq!(result.name, "애월읍, 제주시");
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body, "x").unwrap().is_none());
    }

    #[test]
    fn rejects_non_array() {
        let body = serde_json::json!({ "error": "bad" });
        assert!(parse_response(&body, "x").is_err());
    }
}
