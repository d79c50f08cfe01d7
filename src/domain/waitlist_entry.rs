use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Location, WaitlistEmail};

pub const DEFAULT_NICHE: &str = "client_management";
pub const DEFAULT_SOURCE: &str = "landing_page";

/// A signup that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewWaitlistEntry {
    pub email: WaitlistEmail,
    pub niche: String,
    pub source: String,
    pub location: Location,
    pub user_agent: Option<String>,
}

/// A stored signup record, as returned by the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub email: String,
    pub niche: String,
    pub source: String,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Materializes a record the way the table would on insert.
    pub fn from_new(entry: &NewWaitlistEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: entry.email.as_ref().to_owned(),
            niche: entry.niche.clone(),
            source: entry.source.clone(),
            ip_address: entry.location.ip.clone(),
            country: entry.location.country.clone(),
            country_code: entry.location.country_code.clone(),
            city: entry.location.city.clone(),
            timezone: entry.location.timezone.clone(),
            user_agent: entry.user_agent.clone(),
            blocked: false,
            created_at: Utc::now(),
        }
    }
}
