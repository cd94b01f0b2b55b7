//! Subscriber provisioning operations.
//!
//! [`SubscriberService`] is the single entry point transports call into. It
//! owns an injected store handle and a [`BatchReconciler`] over the same
//! store, validates payloads and applies a deadline to every store call.
//!
//! Single records are addressed by [`SubscriberKey`]: a surrogate id, or an
//! IMSI when the key is 15 digits.

use crate::error::{Error, Result};
use crate::identity::{Imsi, Msisdn, SubscriberKey};
use crate::model::{NewSubscriber, Subscriber, SubscriberPatch, SubscriberTemplate};
use crate::range::{RangePreview, RangeRequest};
use crate::reconcile::{BatchReconciler, BatchResult, DEFAULT_STORE_TIMEOUT};
use crate::store::{StoreHealth, SubscriberStore, deadline};
use crate::validate;
use chrono::Utc;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;


/// Largest page [`SubscriberService::list`] returns.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Body of a single create: identifiers plus the profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub imsi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msisdn: Option<String>,
    #[serde(flatten)]
    pub template: SubscriberTemplate,
}

/// Body of a batch create: range parameters plus the shared template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(flatten)]
    pub range: RangeRequest,
    #[serde(flatten)]
    pub template: SubscriberTemplate,
}

/// One page of subscribers ordered by IMSI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriberPage {
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
    pub subscribers: Vec<Subscriber>,
}

#[derive(Clone)]
pub struct SubscriberService {
    store: Arc<dyn SubscriberStore>,
    reconciler: BatchReconciler,
    store_timeout: Duration,
}

impl SubscriberService {
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self {
            reconciler: BatchReconciler::new(Arc::clone(&store)),
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Sets the deadline applied to every store round-trip, batch calls
    /// included.
    #[must_use]
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.reconciler = self.reconciler.with_store_timeout(store_timeout);
        self.store_timeout = store_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn SubscriberStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &BatchReconciler {
        &self.reconciler
    }

    pub async fn health(&self) -> Result<StoreHealth> {
        deadline(self.store_timeout, self.store.health_check()).await
    }

    /// Creates one subscriber.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] when the template is malformed.
    /// - [`Error::Conflict`] when the IMSI is already provisioned.
    #[tracing::instrument(skip_all, fields(%imsi))]
    pub async fn create(
        &self,
        imsi: Imsi,
        msisdn: Option<Msisdn>,
        template: SubscriberTemplate,
    ) -> Result<Subscriber> {
        validate::template(&template)?;
        let record = NewSubscriber::new(imsi, msisdn, template.normalized());
        let created = deadline(self.store_timeout, self.store.insert_one(record)).await?;
        tracing::info!(id = %created.id, "subscriber created");
        Ok(created)
    }

    /// Parses a raw create body and creates the subscriber.
    pub async fn create_from(&self, request: CreateRequest) -> Result<Subscriber> {
        let imsi = Imsi::parse_as("imsi", &request.imsi)?;
        let msisdn = request
            .msisdn
            .as_deref()
            .map(|raw| Msisdn::parse_as("msisdn", raw))
            .transpose()?;
        self.create(imsi, msisdn, request.template).await
    }

    pub async fn get(&self, key: &SubscriberKey) -> Result<Subscriber> {
        deadline(self.store_timeout, self.store.find(key))
            .await?
            .ok_or_else(|| not_found(key))
    }

    /// Applies `patch` to the subscriber behind `key` and refreshes
    /// `updated_at`.
    ///
    /// Read and write are separate round-trips, so of two concurrent updates
    /// to the same record the last write wins.
    #[tracing::instrument(skip_all, fields(%key))]
    pub async fn update(&self, key: &SubscriberKey, patch: SubscriberPatch) -> Result<Subscriber> {
        validate::patch(&patch)?;
        let mut subscriber = self.get(key).await?;
        patch.apply(&mut subscriber);
        subscriber.updated_at = Utc::now();
        let updated = deadline(self.store_timeout, self.store.replace(subscriber)).await?;
        tracing::info!(id = %updated.id, "subscriber updated");
        Ok(updated)
    }

    #[tracing::instrument(skip_all, fields(%key))]
    pub async fn delete(&self, key: &SubscriberKey) -> Result<Subscriber> {
        let removed = deadline(self.store_timeout, self.store.delete(key))
            .await?
            .ok_or_else(|| not_found(key))?;
        tracing::info!(id = %removed.id, imsi = %removed.imsi, "subscriber deleted");
        Ok(removed)
    }

    /// Records that the subscriber was just seen on the network. Last write
    /// wins against a concurrent [`update`](Self::update).
    pub async fn touch(&self, key: &SubscriberKey) -> Result<Subscriber> {
        let mut subscriber = self.get(key).await?;
        subscriber.last_seen = Some(Utc::now());
        deadline(self.store_timeout, self.store.replace(subscriber)).await
    }

    /// Lists subscribers in IMSI order. `limit` is clamped to
    /// [`MAX_PAGE_SIZE`].
    pub async fn list(&self, offset: usize, limit: usize) -> Result<SubscriberPage> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let total = deadline(self.store_timeout, self.store.count()).await?;
        let subscribers = deadline(self.store_timeout, self.store.list(offset, limit)).await?;
        Ok(SubscriberPage {
            offset,
            limit,
            total,
            subscribers,
        })
    }

    /// Expands a range without touching the store.
    pub fn preview_batch(&self, request: &RangeRequest) -> Result<RangePreview> {
        Ok(request.expand()?.preview())
    }

    /// Expands the range of `request` and creates every free identifier.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] when the template or the range is invalid.
    /// - [`Error::Persistence`] or [`Error::Timeout`] when the store fails;
    ///   nothing is reported as created in that case.
    #[tracing::instrument(skip_all, fields(imsi_start = %request.range.imsi_start))]
    pub async fn create_batch(&self, request: BatchRequest) -> Result<BatchResult> {
        validate::template(&request.template)?;
        let range = request.range.expand()?;
        self.reconciler.reconcile(&range, &request.template).await
    }
}

fn not_found(key: &SubscriberKey) -> Error {
    Error::NotFound {
        key: key.to_string(),
    }
}
