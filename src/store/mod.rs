use async_trait::async_trait;

use crate::domain::{NewWaitlistEntry, WaitlistEntry};
use crate::utils::error_chain_fmt;

mod memory;
mod postgres;
mod supabase;

pub use memory::InMemoryWaitlistStore;
pub use postgres::PostgresWaitlistStore;
pub use supabase::SupabaseWaitlistStore;

/// SQLSTATE reported by Postgres (and PostgREST) for unique constraint violations.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// The single table of signups.
///
/// Uniqueness of normalized emails is the backend's responsibility; callers
/// rely on [`StoreError::DuplicateEmail`] rather than checking beforehand.
#[async_trait]
pub trait WaitlistStore: Send + Sync {
    async fn insert(&self, entry: &NewWaitlistEntry) -> Result<WaitlistEntry, StoreError>;

    /// Number of entries that are not blocked.
    async fn count_visible(&self) -> Result<u64, StoreError>;
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("An entry with this email already exists")]
    DuplicateEmail,
    #[error("The waitlist store failed to process the request")]
    Unavailable(#[source] anyhow::Error),
    /// The backend could not be reached at all.
    #[error("The waitlist store could not be reached")]
    Unreachable(#[source] anyhow::Error),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
