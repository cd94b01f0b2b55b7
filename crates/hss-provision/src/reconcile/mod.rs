//! Batch reconciliation of an expanded range against the store.
//!
//! [`BatchReconciler::reconcile`] runs one batched existence query, keeps the
//! identifiers that are free, builds one record per free identifier from the
//! template and writes them with a single bulk insert.
//!
//! ## Existing identifiers
//!
//! Identifiers that already exist are skipped: the batch path never
//! overwrites a stored subscriber (and so never replaces its key material).
//! `updated_count` is therefore always zero here; single records are changed
//! through the update path of [`SubscriberService`](crate::SubscriberService).
//! Re-submitting a range is idempotent.
//!
//! ## Failure
//!
//! The existence query is only a pre-filter. Records that lose a race with a
//! concurrent writer are rejected by the store's unique index and counted as
//! skipped. A store failure or a timeout fails the whole batch and no partial
//! result is returned; a bulk insert that times out leaves nothing behind.

use crate::error::Result;
use crate::model::{NewSubscriber, Subscriber, SubscriberTemplate};
use crate::range::ImsiRange;
use crate::store::{SubscriberStore, deadline};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;


/// Default deadline for each store round-trip of a batch.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one batch, returned once and never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total_processed: usize,
    pub created_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub subscribers: Vec<Subscriber>,
}

/// Applies a template to every free identifier of a range.
#[derive(Clone)]
pub struct BatchReconciler {
    store: Arc<dyn SubscriberStore>,
    store_timeout: Duration,
}

impl BatchReconciler {
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Creates a subscriber for every identifier of `range` not already
    /// stored, copying `template` into each.
    ///
    /// # Errors
    ///
    /// - [`Error::Persistence`](crate::Error::Persistence) when the store fails.
    /// - [`Error::Timeout`](crate::Error::Timeout) when a store call exceeds the configured deadline.
    #[tracing::instrument(
        skip_all,
        fields(start = %range.start(), total = range.total())
    )]
    pub async fn reconcile(
        &self,
        range: &ImsiRange,
        template: &SubscriberTemplate,
    ) -> Result<BatchResult> {
        let imsis = range.imsis();
        let existing = deadline(self.store_timeout, self.store.find_existing(&imsis)).await?;

        let template = template.clone().normalized();
        let to_create: Vec<NewSubscriber> = range
            .restart()
            .filter(|entry| !existing.contains(&entry.imsi))
            .map(|entry| NewSubscriber::new(entry.imsi, entry.msisdn, template.clone()))
            .collect();

        tracing::debug!(
            existing = existing.len(),
            to_create = to_create.len(),
            "partitioned range"
        );

        let outcome = if to_create.is_empty() {
            Default::default()
        } else {
            self.store
                .insert_many_within(to_create, self.store_timeout)
                .await?
        };

        if !outcome.conflicts.is_empty() {
            tracing::warn!(
                conflicts = outcome.conflicts.len(),
                first = %outcome.conflicts[0],
                "identifiers created concurrently were skipped"
            );
        }

        let mut subscribers = outcome.inserted;
        subscribers.sort_by_key(|s| s.imsi);

        let created_count = subscribers.len();
        let updated_count = 0;
        let result = BatchResult {
            total_processed: created_count + updated_count,
            created_count,
            updated_count,
            skipped_count: existing.len() + outcome.conflicts.len(),
            subscribers,
        };

        tracing::info!(
            created = result.created_count,
            skipped = result.skipped_count,
            "batch reconciled"
        );
        Ok(result)
    }
}
