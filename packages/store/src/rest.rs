//! `PostgREST` adapter for the hosted store.
//!
//! Every request carries the project's anon key in the `apikey` header.
//! The `Authorization` bearer is the signed-in user's access token when
//! an [`AccessToken`] source is attached and has a token, otherwise the
//! anon key itself (anonymous reads).
//!
//! See <https://postgrest.org/en/stable/references/api/tables_views.html>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mozzi_location_models::{
    Accumulator, Dimension, Level, Location, LocationId, NewLocation, NewReport,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;

use crate::{Store, StoreError, Table};

/// Per-request timeout for store calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the store-side function used for atomic increments.
pub const INCREMENT_RPC: &str = "increment_location_score";

/// Supplies the current user's access token, if anyone is signed in.
pub trait AccessToken: Send + Sync {
    /// Returns the bearer token to send, or `None` for anonymous access.
    fn access_token(&self) -> Option<String>;
}

/// Error body returned by `PostgREST` on a failed request.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// HTTP client for the `locations` and `reports` tables.
pub struct RestStore {
    client: reqwest::Client,
    rest_url: String,
    anon_key: String,
    token: Option<Arc<dyn AccessToken>>,
}

impl RestStore {
    /// Creates a store client for a project.
    ///
    /// `project_url` is the project root (e.g. `https://abc.supabase.co`);
    /// the REST path is appended here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the HTTP client cannot be built.
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
            token: None,
        })
    }

    /// Attaches a source for the signed-in user's access token.
    #[must_use]
    pub fn with_access_token(mut self, token: Arc<dyn AccessToken>) -> Self {
        self.token = Some(token);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .token
            .as_ref()
            .and_then(|t| t.access_token())
            .unwrap_or_else(|| self.anon_key.clone());

        self.client
            .request(method, format!("{}/{path}", self.rest_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Returns the exact number of rows in `reports`.
    ///
    /// Issues a `HEAD` request with `Prefer: count=exact` and reads the
    /// total from the `Content-Range` header.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the request fails or the header is
    /// missing or malformed.
    pub async fn count_reports(&self) -> Result<u64, StoreError> {
        let resp = self
            .request(Method::HEAD, "reports")
            .query(&[("select", "location_id")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let resp = check(resp).await?;

        resp.headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total)
            .ok_or(StoreError::MissingRow {
                table: Table::Reports,
            })
    }
}

#[async_trait]
impl Store for RestStore {
    async fn fetch_locations(&self) -> Result<Vec<Location>, StoreError> {
        let resp = self
            .request(Method::GET, "locations")
            .query(&[("select", "*")])
            .send()
            .await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError> {
        let resp = self
            .request(Method::POST, "reports")
            .header("Prefer", "return=minimal")
            .json(report)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn set_accumulator(
        &self,
        id: &LocationId,
        dimension: Dimension,
        acc: Accumulator,
    ) -> Result<(), StoreError> {
        let resp = self
            .request(Method::PATCH, "locations")
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&accumulator_patch(dimension, acc))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn increment_accumulator(
        &self,
        id: &LocationId,
        dimension: Dimension,
        level: Level,
    ) -> Result<(), StoreError> {
        let resp = self
            .request(Method::POST, &format!("rpc/{INCREMENT_RPC}"))
            .json(&serde_json::json!({
                "p_location_id": id,
                "p_dimension": dimension,
                "p_score": level.value(),
            }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn insert_location(&self, location: &NewLocation) -> Result<Location, StoreError> {
        let resp = self
            .request(Method::POST, "locations")
            .header("Prefer", "return=representation")
            .json(location)
            .send()
            .await?;
        let resp = check(resp).await?;

        let rows: Vec<Location> = resp.json().await?;
        rows.into_iter().next().ok_or(StoreError::MissingRow {
            table: Table::Locations,
        })
    }
}

/// Turns a non-2xx response into [`StoreError::Rejected`].
async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(rejection(status.as_u16(), &body))
}

fn rejection(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => StoreError::Rejected {
            status,
            message: err.message.unwrap_or_else(|| body.to_string()),
            details: err.details,
            hint: err.hint,
        },
        Err(_) => StoreError::Rejected {
            status,
            message: body.to_string(),
            details: None,
            hint: None,
        },
    }
}

/// Builds the `PATCH` body for one dimension's accumulator.
fn accumulator_patch(dimension: Dimension, acc: Accumulator) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(dimension.sum_column().to_string(), acc.sum.into());
    body.insert(dimension.count_column().to_string(), acc.count.into());
    serde_json::Value::Object(body)
}

/// Parses the total out of a `Content-Range` header (`0-24/25`, `*/0`).
fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
