use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{StoreError, WaitlistStore};
use crate::domain::{NewWaitlistEntry, WaitlistEntry};

/// Process-local table, for local runs and tests.
///
/// Failures can be switched on to exercise the degraded paths of callers.
#[derive(Default)]
pub struct InMemoryWaitlistStore {
    entries: Mutex<Vec<WaitlistEntry>>,
    failing_inserts: AtomicBool,
    failing_counts: AtomicBool,
    unreachable: AtomicBool,
}

impl InMemoryWaitlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.failing_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_counts(&self, fail: bool) {
        self.failing_counts.store(fail, Ordering::SeqCst);
    }

    /// Every operation fails as if the backend could not be contacted.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<WaitlistEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stands in for out-of-band moderation. Returns whether the email was found.
    pub fn block(&self, email: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries
            .iter_mut()
            .find(|entry| entry.email.eq_ignore_ascii_case(email))
        {
            Some(entry) => {
                entry.blocked = true;
                true
            }
            None => false,
        }
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(StoreError::Unreachable(anyhow::anyhow!(
                "In-memory store marked unreachable"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WaitlistStore for InMemoryWaitlistStore {
    async fn insert(&self, entry: &NewWaitlistEntry) -> Result<WaitlistEntry, StoreError> {
        self.check_reachable()?;
        if self.failing_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "In-memory store rejected the insert"
            )));
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(entry.email.as_ref()))
        {
            return Err(StoreError::DuplicateEmail);
        }

        let stored = WaitlistEntry::from_new(entry);
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn count_visible(&self) -> Result<u64, StoreError> {
        self.check_reachable()?;
        if self.failing_counts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "In-memory store rejected the count"
            )));
        }

        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.iter().filter(|entry| !entry.blocked).count() as u64)
    }
}
