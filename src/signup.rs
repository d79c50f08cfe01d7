use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::configuration::{PrivacySettings, WaitlistSettings};
use crate::domain::{LocationSummary, NewWaitlistEntry, WaitlistEmail, WaitlistEntry};
use crate::geolocation::GeoLocationClient;
use crate::store::{StoreError, WaitlistStore};
use crate::utils::error_chain_fmt;

pub const DEFAULT_FALLBACK_COUNT: u64 = 1247;

const NO_KNOWN_COUNT: u64 = u64::MAX;

/// What we know about the caller, beyond the submitted email.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub email: String,
    pub niche: String,
    pub source: String,
    pub client: ClientContext,
}

#[derive(Debug, Clone)]
pub struct Joined {
    pub entry: WaitlistEntry,
    pub waitlist_count: u64,
    pub count_is_fallback: bool,
    pub location: Option<LocationSummary>,
}

impl Joined {
    pub fn message(&self) -> String {
        let message = "Successfully joined the waitlist!";
        match &self.location {
            Some(location) => format!("{message} {}", location.greeting()),
            None => message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistCount {
    pub count: u64,
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinErrorKind {
    InvalidEmail,
    DuplicateEmail,
    StoreUnavailable,
    NetworkError,
    SubmissionInProgress,
}

#[derive(thiserror::Error)]
pub enum JoinError {
    #[error("{0}")]
    InvalidEmail(String),
    #[error("This email is already on the waitlist")]
    DuplicateEmail,
    #[error("A signup for this email is already being processed")]
    SubmissionInProgress,
    #[error("Failed to store the waitlist entry")]
    StoreUnavailable(#[source] StoreError),
    #[error("Failed to reach the waitlist store")]
    NetworkError(#[source] StoreError),
}

impl std::fmt::Debug for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl JoinError {
    pub fn kind(&self) -> JoinErrorKind {
        match self {
            JoinError::InvalidEmail(_) => JoinErrorKind::InvalidEmail,
            JoinError::DuplicateEmail => JoinErrorKind::DuplicateEmail,
            JoinError::SubmissionInProgress => JoinErrorKind::SubmissionInProgress,
            JoinError::StoreUnavailable(_) => JoinErrorKind::StoreUnavailable,
            JoinError::NetworkError(_) => JoinErrorKind::NetworkError,
        }
    }

    /// Text that is safe to show to the person signing up.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            JoinErrorKind::InvalidEmail => "Please enter a valid email address",
            JoinErrorKind::DuplicateEmail => "This email is already on our waitlist!",
            JoinErrorKind::StoreUnavailable => "Failed to join waitlist. Please try again.",
            JoinErrorKind::NetworkError => {
                "Network error. Please check your connection and try again."
            }
            JoinErrorKind::SubmissionInProgress => "Your signup is already being processed.",
        }
    }
}

#[derive(Debug, Clone, Copy, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum SignupStage {
    Validating,
    Enriching,
    Inserting,
    Succeeded,
    DuplicateRejected,
    StoreFailed,
    CountRefreshing,
    Done,
}

fn enter(stage: SignupStage) {
    tracing::debug!(stage = %stage, "Signup stage");
}

/// Emails with a signup currently being processed.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<String>>);

#[derive(Debug)]
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    key: String,
}

impl InFlight {
    fn claim(&self, key: &str) -> Option<InFlightGuard<'_>> {
        let mut keys = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if keys.insert(key.to_owned()) {
            Some(InFlightGuard {
                in_flight: self,
                key: key.to_owned(),
            })
        } else {
            None
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct WaitlistService {
    store: Arc<dyn WaitlistStore>,
    geolocation: GeoLocationClient,
    settings: WaitlistSettings,
    privacy: PrivacySettings,
    in_flight: InFlight,
    last_known_count: AtomicU64,
}

impl WaitlistService {
    pub fn new(
        store: Arc<dyn WaitlistStore>,
        geolocation: GeoLocationClient,
        settings: WaitlistSettings,
        privacy: PrivacySettings,
    ) -> Self {
        Self {
            store,
            geolocation,
            settings,
            privacy,
            in_flight: InFlight::default(),
            last_known_count: AtomicU64::new(NO_KNOWN_COUNT),
        }
    }

    /// A request tagged with the configured campaign niche and source.
    pub fn request(&self, email: String, client: ClientContext) -> JoinRequest {
        JoinRequest {
            email,
            niche: self.settings.niche.clone(),
            source: self.settings.source.clone(),
            client,
        }
    }

    #[tracing::instrument(
        name = "Joining the waitlist",
        skip(self, request),
        fields(
            email = %request.email,
            niche = %request.niche,
            source = %request.source,
        )
    )]
    pub async fn join(&self, request: JoinRequest) -> Result<Joined, JoinError> {
        let JoinRequest {
            email,
            niche,
            source,
            client,
        } = request;

        enter(SignupStage::Validating);
        let email = WaitlistEmail::parse(&email).map_err(JoinError::InvalidEmail)?;
        let _in_flight = self
            .in_flight
            .claim(email.as_ref())
            .ok_or(JoinError::SubmissionInProgress)?;

        enter(SignupStage::Enriching);
        let mut location = self.geolocation.lookup(client.ip).await;
        let summary = location.summary();
        if !self.privacy.retain_ip_address {
            location.ip = None;
        }
        let user_agent = client
            .user_agent
            .filter(|ua| self.privacy.retain_user_agent && !ua.trim().is_empty());

        enter(SignupStage::Inserting);
        let entry = NewWaitlistEntry {
            email,
            niche,
            source,
            location,
            user_agent,
        };
        let stored = match self.store.insert(&entry).await {
            Ok(stored) => {
                enter(SignupStage::Succeeded);
                stored
            }
            Err(StoreError::DuplicateEmail) => {
                enter(SignupStage::DuplicateRejected);
                tracing::info!("Email is already on the waitlist");
                return Err(JoinError::DuplicateEmail);
            }
            Err(e @ StoreError::Unreachable(_)) => {
                enter(SignupStage::StoreFailed);
                return Err(JoinError::NetworkError(e));
            }
            Err(e) => {
                enter(SignupStage::StoreFailed);
                return Err(JoinError::StoreUnavailable(e));
            }
        };

        enter(SignupStage::CountRefreshing);
        let count = self.waitlist_count().await;

        enter(SignupStage::Done);
        Ok(Joined {
            entry: stored,
            waitlist_count: count.count,
            count_is_fallback: count.is_fallback,
            location: summary,
        })
    }

    /// Never fails: falls back to the last observed or configured count.
    #[tracing::instrument(name = "Counting the waitlist", skip(self))]
    pub async fn waitlist_count(&self) -> WaitlistCount {
        match self.store.count_visible().await {
            Ok(count) => {
                self.last_known_count.store(count, Ordering::Relaxed);
                WaitlistCount {
                    count,
                    is_fallback: false,
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, "Falling back to the last known waitlist count");
                WaitlistCount {
                    count: self.reported_count(),
                    is_fallback: true,
                }
            }
        }
    }

    /// The count to show without asking the store.
    pub fn reported_count(&self) -> u64 {
        match self.last_known_count.load(Ordering::Relaxed) {
            NO_KNOWN_COUNT => self.settings.fallback_count,
            count => count,
        }
    }
}
