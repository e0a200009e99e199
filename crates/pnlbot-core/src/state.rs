//! Last-seen timestamps keyed by email subject.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use pnlbot_store::{LogStore, StoreError};

use crate::{UtcDateTime, ValidationError};

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored timestamp is unreadable: {0}")]
    Corrupt(#[from] ValidationError),
}

pub trait StateStore: Send + Sync {
    fn last_seen(&self, subject: &str) -> Result<Option<UtcDateTime>, StateError>;

    /// Upsert: a later call for the same subject replaces the timestamp.
    fn mark_seen(&self, subject: &str, at: UtcDateTime) -> Result<(), StateError>;
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    seen: Mutex<HashMap<String, UtcDateTime>>,
}

impl StateStore for MemoryStateStore {
    fn last_seen(&self, subject: &str) -> Result<Option<UtcDateTime>, StateError> {
        Ok(self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .copied())
    }

    fn mark_seen(&self, subject: &str, at: UtcDateTime) -> Result<(), StateError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.to_string(), at);
        Ok(())
    }
}

impl StateStore for LogStore {
    fn last_seen(&self, subject: &str) -> Result<Option<UtcDateTime>, StateError> {
        match self.email_state(subject)? {
            Some(raw) => Ok(Some(UtcDateTime::parse(&raw)?)),
            None => Ok(None),
        }
    }

    fn mark_seen(&self, subject: &str, at: UtcDateTime) -> Result<(), StateError> {
        self.upsert_email_state(subject, &at.format_rfc3339())?;
        Ok(())
    }
}
