//! Subscriber persistence.
//!
//! [`SubscriberStore`] is the contract the reconciler and the service talk to.
//! A store is an explicitly constructed handle: the process builds one, calls
//! [`connect`](SubscriberStore::connect), and passes it (usually as
//! `Arc<dyn SubscriberStore>`) to whoever needs it.
//!
//! ## Backends
//!
//! - [`MemoryStore`] - process-local maps behind a `parking_lot::RwLock`.
//! - [`SqliteStore`] - a SQLite file (or `:memory:`) with a unique index on
//!   `imsi`. Requires the `sqlite` feature.
//!
//! Uniqueness of the IMSI is enforced here, not by callers: a batched
//! existence check is only a pre-filter, and [`insert_many`] reports the
//! records that lost a race instead of failing the whole batch.
//!
//! [`insert_many`]: SubscriberStore::insert_many

mod memory;
mod object_id;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(test)]
mod tests;

pub use memory::MemoryStore;
pub use object_id::next_object_id;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::error::{Error, Result};
use crate::identity::{Imsi, SubscriberKey};
use crate::model::{NewSubscriber, Subscriber};
use async_trait::async_trait;
use core::future::Future;
use core::time::Duration;
use serde::Serialize;
use std::collections::HashSet;

/// Per-record result of a bulk insert.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsertOutcome {
    /// Records written, in the order they were submitted.
    pub inserted: Vec<Subscriber>,
    /// IMSIs rejected because a record with the same IMSI already existed.
    pub conflicts: Vec<Imsi>,
}

/// Snapshot reported by [`SubscriberStore::health_check`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub connected: bool,
    pub subscribers: usize,
}

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Opens the underlying connection. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Releases the underlying connection. Later calls fail until the store
    /// is connected again.
    async fn close(&self) -> Result<()>;

    async fn health_check(&self) -> Result<StoreHealth>;

    /// Returns the subset of `imsis` already present, in one round-trip.
    async fn find_existing(&self, imsis: &[Imsi]) -> Result<HashSet<Imsi>>;

    /// Writes every record whose IMSI is free and assigns it an id. Records
    /// that collide are reported in [`InsertOutcome::conflicts`]; the rest of
    /// the batch is kept.
    async fn insert_many(&self, records: Vec<NewSubscriber>) -> Result<InsertOutcome>;

    /// [`insert_many`](Self::insert_many) bounded by `after`. When this
    /// returns [`Error::Timeout`] nothing of the batch is stored.
    ///
    /// The default cancels the insert future, which is enough for stores that
    /// do all their work while polled. Stores that hand the write to another
    /// thread override it.
    async fn insert_many_within(
        &self,
        records: Vec<NewSubscriber>,
        after: Duration,
    ) -> Result<InsertOutcome> {
        deadline(after, self.insert_many(records)).await
    }

    /// Writes one record, failing with `Error::Conflict` when the IMSI exists.
    async fn insert_one(&self, record: NewSubscriber) -> Result<Subscriber>;

    async fn find(&self, key: &SubscriberKey) -> Result<Option<Subscriber>>;

    /// Overwrites the stored record with the same id. Fails with
    /// `Error::NotFound` when no such record exists.
    async fn replace(&self, subscriber: Subscriber) -> Result<Subscriber>;

    /// Removes and returns the matching record.
    async fn delete(&self, key: &SubscriberKey) -> Result<Option<Subscriber>>;

    /// Subscribers ordered by IMSI.
    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Subscriber>>;

    async fn count(&self) -> Result<usize>;
}

/// Runs one store round-trip, failing with [`Error::Timeout`] once `after`
/// elapses.
pub(crate) async fn deadline<T>(after: Duration, op: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(after, op)
        .await
        .map_err(|_| Error::Timeout { after })?
}
