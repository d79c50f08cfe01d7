use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::Location;

/// Best-effort IP to location resolution against an ipapi.co style provider.
#[derive(Clone)]
pub struct GeoLocationClient {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
    enabled: bool,
}

#[derive(Deserialize)]
struct LookupResponseBody {
    ip: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    city: Option<String>,
    timezone: Option<String>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

#[derive(thiserror::Error, Debug)]
enum LookupError {
    #[error("geolocation request failed")]
    Transport(#[from] reqwest::Error),
    #[error("geolocation provider rejected the lookup: {0}")]
    Rejected(String),
}

impl GeoLocationClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            timeout,
            enabled: true,
        }
    }

    /// A client that never touches the network.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(String::new(), Duration::ZERO)
        }
    }

    /// Never fails: any problem with the provider yields an all-absent [`Location`].
    #[tracing::instrument(name = "Looking up caller location", skip(self, ip))]
    pub async fn lookup(&self, ip: Option<IpAddr>) -> Location {
        if !self.enabled {
            return Location::default();
        }

        match self.try_lookup(ip).await {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(error = %e, "Location enrichment skipped");
                Location::default()
            }
        }
    }

    async fn try_lookup(&self, ip: Option<IpAddr>) -> Result<Location, LookupError> {
        let url = match ip {
            Some(ip) => format!("{}/{}/json/", self.base_url, ip),
            None => format!("{}/json/", self.base_url),
        };

        let body: LookupResponseBody = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.error {
            return Err(LookupError::Rejected(
                body.reason.unwrap_or_else(|| "unknown reason".into()),
            ));
        }

        Ok(Location {
            ip: non_empty(body.ip),
            country: non_empty(body.country_name),
            country_code: non_empty(body.country_code),
            city: non_empty(body.city),
            timezone: non_empty(body.timezone),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
