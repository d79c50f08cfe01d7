use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_RANGE, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StoreError, WaitlistStore, UNIQUE_VIOLATION};
use crate::domain::{NewWaitlistEntry, WaitlistEntry};

/// The waitlist table behind a Supabase project's REST (PostgREST) endpoint.
pub struct SupabaseWaitlistStore {
    base_url: String,
    http_client: reqwest::Client,
    api_key: Secret<String>,
    table: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct InsertRowBody<'a> {
    id: Uuid,
    email: &'a str,
    niche: &'a str,
    source: &'a str,
    ip_address: Option<&'a str>,
    country: Option<&'a str>,
    country_code: Option<&'a str>,
    city: Option<&'a str>,
    timezone: Option<&'a str>,
    user_agent: Option<&'a str>,
}

#[derive(Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl<'a> From<&'a NewWaitlistEntry> for InsertRowBody<'a> {
    fn from(entry: &'a NewWaitlistEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: entry.email.as_ref(),
            niche: &entry.niche,
            source: &entry.source,
            ip_address: entry.location.ip.as_deref(),
            country: entry.location.country.as_deref(),
            country_code: entry.location.country_code.as_deref(),
            city: entry.location.city.as_deref(),
            timezone: entry.location.timezone.as_deref(),
            user_agent: entry.user_agent.as_deref(),
        }
    }
}

impl SupabaseWaitlistStore {
    pub fn new(base_url: String, api_key: Secret<String>, table: String, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            api_key,
            table,
            timeout,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, self.table_url())
            .timeout(self.timeout)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
    }
}

#[async_trait]
impl WaitlistStore for SupabaseWaitlistStore {
    #[tracing::instrument(
        name = "Persisting waitlist entry to Supabase",
        skip(self, entry),
        fields(email = %entry.email)
    )]
    async fn insert(&self, entry: &NewWaitlistEntry) -> Result<WaitlistEntry, StoreError> {
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=representation")
            .json(&InsertRowBody::from(entry))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            let mut rows: Vec<WaitlistEntry> = response.json().await.map_err(transport_error)?;
            return rows.pop().ok_or_else(|| {
                StoreError::Unavailable(anyhow::anyhow!("Insert returned no representation"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        let error: Option<PostgrestErrorBody> = serde_json::from_str(&body).ok();
        let code = error.as_ref().and_then(|e| e.code.as_deref());

        if code == Some(UNIQUE_VIOLATION) || (code.is_none() && status == StatusCode::CONFLICT) {
            return Err(StoreError::DuplicateEmail);
        }

        let message = error
            .and_then(|e| e.message)
            .unwrap_or_else(|| status.to_string());
        tracing::error!(%status, "Supabase rejected the insert: {}", message);
        Err(StoreError::Unavailable(anyhow::anyhow!(
            "Supabase insert failed with {status}: {message}"
        )))
    }

    #[tracing::instrument(name = "Counting visible waitlist entries in Supabase", skip(self))]
    async fn count_visible(&self) -> Result<u64, StoreError> {
        let response = self
            .request(reqwest::Method::HEAD)
            .query(&[("select", "id"), ("blocked", "eq.false")])
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(|e| StoreError::Unavailable(e.into()))?;

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                StoreError::Unavailable(anyhow::anyhow!(
                    "Count response carried no usable Content-Range header"
                ))
            })
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    tracing::error!("Failed to reach Supabase: {:?}", e);
    if e.is_connect() || e.is_timeout() {
        StoreError::Unreachable(e.into())
    } else {
        StoreError::Unavailable(e.into())
    }
}

/// Extracts the total from `0-24/1247` or `*/1247`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}
