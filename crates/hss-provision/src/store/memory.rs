use super::{InsertOutcome, StoreHealth, SubscriberStore, next_object_id};
use crate::error::{Error, Result};
use crate::identity::{Imsi, SubscriberId, SubscriberKey};
use crate::model::{NewSubscriber, Subscriber};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Tables {
    by_imsi: BTreeMap<Imsi, Subscriber>,
    ids: HashMap<SubscriberId, Imsi>,
}

impl Tables {
    fn imsi_for(&self, key: &SubscriberKey) -> Option<Imsi> {
        match key {
            SubscriberKey::Imsi(imsi) => self.by_imsi.contains_key(imsi).then_some(*imsi),
            SubscriberKey::Id(id) => self.ids.get(id).copied(),
        }
    }

    fn insert(&mut self, record: NewSubscriber) -> core::result::Result<Subscriber, Imsi> {
        if self.by_imsi.contains_key(&record.imsi) {
            return Err(record.imsi);
        }
        let subscriber = record.into_subscriber(next_object_id());
        self.ids.insert(subscriber.id.clone(), subscriber.imsi);
        self.by_imsi.insert(subscriber.imsi, subscriber.clone());
        Ok(subscriber)
    }
}

/// Process-local subscriber store.
///
/// All records live in one `BTreeMap` keyed by IMSI, so listing is naturally
/// ordered and a bulk insert runs under a single write lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    connected: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::persistence("memory store is not connected"))
        }
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn health_check(&self) -> Result<StoreHealth> {
        Ok(StoreHealth {
            backend: self.backend(),
            connected: self.connected.load(Ordering::Acquire),
            subscribers: self.tables.read().by_imsi.len(),
        })
    }

    async fn find_existing(&self, imsis: &[Imsi]) -> Result<HashSet<Imsi>> {
        self.ensure_connected()?;
        let tables = self.tables.read();
        Ok(imsis
            .iter()
            .filter(|imsi| tables.by_imsi.contains_key(*imsi))
            .copied()
            .collect())
    }

    async fn insert_many(&self, records: Vec<NewSubscriber>) -> Result<InsertOutcome> {
        self.ensure_connected()?;
        let mut tables = self.tables.write();
        let mut outcome = InsertOutcome {
            inserted: Vec::with_capacity(records.len()),
            conflicts: Vec::new(),
        };
        for record in records {
            match tables.insert(record) {
                Ok(subscriber) => outcome.inserted.push(subscriber),
                Err(imsi) => outcome.conflicts.push(imsi),
            }
        }
        Ok(outcome)
    }

    async fn insert_one(&self, record: NewSubscriber) -> Result<Subscriber> {
        self.ensure_connected()?;
        self.tables
            .write()
            .insert(record)
            .map_err(|imsi| Error::Conflict { imsi })
    }

    async fn find(&self, key: &SubscriberKey) -> Result<Option<Subscriber>> {
        self.ensure_connected()?;
        let tables = self.tables.read();
        Ok(tables
            .imsi_for(key)
            .and_then(|imsi| tables.by_imsi.get(&imsi).cloned()))
    }

    async fn replace(&self, subscriber: Subscriber) -> Result<Subscriber> {
        self.ensure_connected()?;
        let mut tables = self.tables.write();
        match tables.ids.get(&subscriber.id).copied() {
            Some(imsi) if imsi == subscriber.imsi => {
                tables.by_imsi.insert(subscriber.imsi, subscriber.clone());
                Ok(subscriber)
            }
            Some(imsi) => Err(Error::validation(
                "imsi",
                format!("IMSI of {} is {imsi} and cannot be changed", subscriber.id),
            )),
            None => Err(Error::NotFound {
                key: subscriber.id.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &SubscriberKey) -> Result<Option<Subscriber>> {
        self.ensure_connected()?;
        let mut tables = self.tables.write();
        let Some(imsi) = tables.imsi_for(key) else {
            return Ok(None);
        };
        let removed = tables.by_imsi.remove(&imsi);
        if let Some(subscriber) = &removed {
            tables.ids.remove(&subscriber.id);
        }
        Ok(removed)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Subscriber>> {
        self.ensure_connected()?;
        Ok(self
            .tables
            .read()
            .by_imsi
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.ensure_connected()?;
        Ok(self.tables.read().by_imsi.len())
    }
}
