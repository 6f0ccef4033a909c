//! Kakao Local address search client.
//!
//! Requires a REST API key sent as `Authorization: KakaoAK {key}`.
//! Coordinates come back as strings (`x` = longitude, `y` = latitude).
//!
//! See <https://developers.kakao.com/docs/latest/ko/local/dev-guide#address-coord>

use async_trait::async_trait;

use crate::{GeocodeError, GeocodeService, GeocodedPlace, GeocodingProvider};

/// Address search against the Kakao Local API.
pub struct KakaoGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl KakaoGeocoder {
    /// Creates a client for `base_url` using `api_key`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl GeocodeService for KakaoGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("KakaoAK {}", self.api_key),
            )
            .query(&[("query", address), ("size", "1")])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_response(&body)
    }
}

/// Parses a Kakao address search response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let documents = body["documents"]
        .as_array()
        .ok_or_else(|| GeocodeError::Parse {
            message: "Kakao response has no documents array".to_string(),
        })?;

    let Some(first) = documents.first() else {
        return Ok(None);
    };

    let coord = |key: &str| {
        first[key]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("Missing {key} in Kakao response"),
            })
    };
    let longitude = coord("x")?;
    let latitude = coord("y")?;

    let address = first["address_name"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let name = first["road_address"]["building_name"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| address.clone(), String::from);

    Ok(Some(GeocodedPlace {
        name,
        address,
        latitude,
        longitude,
        provider: GeocodingProvider::Kakao,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_building_name() {
        let body = serde_json::json!({
            "documents": [{
                "address_name": "제주특별자치도 제주시 애월읍 애월리 2487",
                "x": "126.3094",
                "y": "33.4628",
                "road_address": {
                    "address_name": "제주특별자치도 제주시 애월읍 애월해안로 272",
                    "building_name": "애월 해변 카페"
                }
            }],
            "meta": { "total_count": 1 }
        });
        let place = parse_response(&body).unwrap().unwrap();
        assert_eq!(place.name, "애월 해변 카페");
        assert!((place.latitude - 33.4628).abs() < 1e-4);
        assert!((place.longitude - 126.3094).abs() < 1e-4);
        assert_eq!(place.provider, GeocodingProvider::Kakao);
    }

    #[test]
    fn falls_back_to_address_without_building() {
        let body = serde_json::json!({
            "documents": [{
                "address_name": "제주특별자치도 서귀포시 성산읍 성산리 1",
                "x": "126.9427",
                "y": "33.4586",
                "road_address": null
            }]
        });
        let place = parse_response(&body).unwrap().unwrap();
        assert_eq!(place.name, "제주특별자치도 서귀포시 성산읍 성산리 1");
        assert_eq!(place.address, place.name);
    }

    #[test]
    fn no_documents_is_no_match() {
        let body = serde_json::json!({ "documents": [], "meta": { "total_count": 0 } });
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn bad_coordinates_fail() {
        let body = serde_json::json!({
            "documents": [{ "address_name": "x", "x": "east", "y": "33.1" }]
        });
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }
}
