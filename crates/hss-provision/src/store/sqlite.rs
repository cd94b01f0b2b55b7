use super::{InsertOutcome, StoreHealth, SubscriberStore, next_object_id};
use crate::error::{Error, Result};
use crate::identity::{Imsi, SubscriberKey};
use crate::model::{NewSubscriber, Subscriber};
use async_trait::async_trait;
use core::time::Duration;
use parking_lot::Mutex;
use rusqlite::{Connection, InterruptHandle, OptionalExtension, params, params_from_iter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS subscribers (
    id       TEXT PRIMARY KEY NOT NULL,
    imsi     TEXT NOT NULL,
    document TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS subscribers_imsi ON subscribers (imsi);
";

// Stay well below SQLITE_MAX_VARIABLE_NUMBER on older builds.
const LOOKUP_CHUNK: usize = 500;

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence(format!("sqlite: {err}"))
    }
}

/// SQLite-backed subscriber store.
///
/// Each subscriber is one row holding its id, its IMSI (unique index, fixed
/// width so text order is numeric order) and the full record as JSON. Calls
/// run on the blocking pool; a bulk insert is one transaction.
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// A store over a fresh in-memory database.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut guard = conn.lock();
            let conn = guard
                .as_mut()
                .ok_or_else(|| Error::persistence("sqlite store is not connected"))?;
            f(conn)
        })
        .await
        .map_err(|e| Error::persistence(format!("sqlite worker failed: {e}")))?
    }

    /// Runs `f` on the blocking pool, giving up after `after`.
    ///
    /// `f` must call [`Watch::commit`] right before committing. Once the
    /// deadline passes a queued call never starts, a running one is
    /// interrupted and cannot commit, and a call already committing is
    /// awaited so its real outcome is reported.
    async fn with_conn_within<F, T>(&self, after: Duration, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &Watch) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let watch = Arc::new(Watch::new(after));
        let conn = Arc::clone(&self.conn);
        let worker = Arc::clone(&watch);
        let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
            let mut guard = conn.lock();
            let conn = guard
                .as_mut()
                .ok_or_else(|| Error::persistence("sqlite store is not connected"))?;
            worker.start(conn)?;
            let result = f(conn, worker.as_ref());
            worker.finish();
            result
        });

        let joined = match tokio::time::timeout(after, &mut task).await {
            Ok(joined) => joined,
            Err(_) if watch.abandon() => {
                tracing::warn!(?after, "sqlite write abandoned");
                return Err(Error::Timeout { after });
            }
            Err(_) => task.await,
        };
        joined.map_err(|e| Error::persistence(format!("sqlite worker failed: {e}")))?
    }
}

enum Phase {
    Queued,
    Running(InterruptHandle),
    Committing,
    Finished,
    Abandoned,
}

/// Shared between a bounded write and the caller awaiting it. Decides, under
/// one lock, whether the write may still commit or the caller times out.
struct Watch {
    after: Duration,
    phase: Mutex<Phase>,
}

impl Watch {
    fn new(after: Duration) -> Self {
        Self {
            after,
            phase: Mutex::new(Phase::Queued),
        }
    }

    fn timeout(&self) -> Error {
        Error::Timeout { after: self.after }
    }

    fn start(&self, conn: &Connection) -> Result<()> {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Abandoned => Err(self.timeout()),
            _ => {
                *phase = Phase::Running(conn.get_interrupt_handle());
                Ok(())
            }
        }
    }

    /// Claims the right to commit. Fails once the caller has given up.
    fn commit(&self) -> Result<()> {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Abandoned => Err(self.timeout()),
            _ => {
                *phase = Phase::Committing;
                Ok(())
            }
        }
    }

    fn finish(&self) {
        let mut phase = self.phase.lock();
        if !matches!(*phase, Phase::Abandoned) {
            *phase = Phase::Finished;
        }
    }

    /// Gives up on the write. Returns `false` when it is already committing
    /// or done, in which case its outcome stands.
    fn abandon(&self) -> bool {
        let mut phase = self.phase.lock();
        match &*phase {
            Phase::Committing | Phase::Finished => false,
            Phase::Running(handle) => {
                handle.interrupt();
                *phase = Phase::Abandoned;
                true
            }
            Phase::Queued | Phase::Abandoned => {
                *phase = Phase::Abandoned;
                true
            }
        }
    }
}

fn decode(document: &str) -> Result<Subscriber> {
    Ok(serde_json::from_str(document)?)
}

fn find_row(conn: &Connection, key: &SubscriberKey) -> Result<Option<Subscriber>> {
    let document: Option<String> = match key {
        SubscriberKey::Id(id) => conn
            .query_row(
                "SELECT document FROM subscribers WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?,
        SubscriberKey::Imsi(imsi) => conn
            .query_row(
                "SELECT document FROM subscribers WHERE imsi = ?1",
                params![imsi.to_string()],
                |row| row.get(0),
            )
            .optional()?,
    };
    document.as_deref().map(decode).transpose()
}

/// Inserts `record` unless its IMSI is taken. Returns `None` on collision.
fn insert_row(conn: &Connection, record: NewSubscriber) -> Result<Option<Subscriber>> {
    let subscriber = record.into_subscriber(next_object_id());
    let document = serde_json::to_string(&subscriber)?;
    let changed = conn.execute(
        "INSERT INTO subscribers (id, imsi, document) VALUES (?1, ?2, ?3)
         ON CONFLICT(imsi) DO NOTHING",
        params![subscriber.id.as_str(), subscriber.imsi.to_string(), document],
    )?;
    Ok((changed == 1).then_some(subscriber))
}

fn insert_rows(conn: &Connection, records: Vec<NewSubscriber>) -> Result<InsertOutcome> {
    let mut outcome = InsertOutcome {
        inserted: Vec::with_capacity(records.len()),
        conflicts: Vec::new(),
    };
    for record in records {
        let imsi = record.imsi;
        match insert_row(conn, record)? {
            Some(subscriber) => outcome.inserted.push(subscriber),
            None => outcome.conflicts.push(imsi),
        }
    }
    Ok(outcome)
}

#[async_trait]
impl SubscriberStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<()> {
        let path = self.path.clone();
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = conn.lock();
            if guard.is_some() {
                return Ok(());
            }
            let connection = if path.as_os_str() == IN_MEMORY {
                Connection::open_in_memory()?
            } else {
                Connection::open(&path)?
            };
            connection.execute_batch(SCHEMA)?;
            tracing::debug!(path = %path.display(), "sqlite store connected");
            *guard = Some(connection);
            Ok(())
        })
        .await
        .map_err(|e| Error::persistence(format!("sqlite worker failed: {e}")))?
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(connection) = conn.lock().take() {
                connection.close().map_err(|(_, e)| Error::from(e))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::persistence(format!("sqlite worker failed: {e}")))?
    }

    async fn health_check(&self) -> Result<StoreHealth> {
        let count = self.count().await;
        Ok(StoreHealth {
            backend: self.backend(),
            connected: count.is_ok(),
            subscribers: count.unwrap_or(0),
        })
    }

    async fn find_existing(&self, imsis: &[Imsi]) -> Result<HashSet<Imsi>> {
        let keys: Vec<String> = imsis.iter().map(Imsi::to_string).collect();
        self.with_conn(move |conn| {
            let mut found = HashSet::new();
            for chunk in keys.chunks(LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql = format!("SELECT imsi FROM subscribers WHERE imsi IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, String>(0)
                })?;
                for raw in rows {
                    found.insert(raw?.parse::<Imsi>()?);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn insert_many(&self, records: Vec<NewSubscriber>) -> Result<InsertOutcome> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let outcome = insert_rows(&tx, records)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn insert_many_within(
        &self,
        records: Vec<NewSubscriber>,
        after: Duration,
    ) -> Result<InsertOutcome> {
        self.with_conn_within(after, move |conn, watch| {
            let tx = conn.transaction()?;
            let outcome = insert_rows(&tx, records)?;
            // Dropping `tx` on refusal rolls the batch back.
            watch.commit()?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn insert_one(&self, record: NewSubscriber) -> Result<Subscriber> {
        self.with_conn(move |conn| {
            let imsi = record.imsi;
            insert_row(conn, record)?.ok_or(Error::Conflict { imsi })
        })
        .await
    }

    async fn find(&self, key: &SubscriberKey) -> Result<Option<Subscriber>> {
        let key = key.clone();
        self.with_conn(move |conn| find_row(conn, &key)).await
    }

    async fn replace(&self, subscriber: Subscriber) -> Result<Subscriber> {
        self.with_conn(move |conn| {
            let stored: Option<String> = conn
                .query_row(
                    "SELECT imsi FROM subscribers WHERE id = ?1",
                    params![subscriber.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match stored {
                None => {
                    return Err(Error::NotFound {
                        key: subscriber.id.to_string(),
                    });
                }
                Some(imsi) if imsi != subscriber.imsi.to_string() => {
                    return Err(Error::validation(
                        "imsi",
                        format!("IMSI of {} is {imsi} and cannot be changed", subscriber.id),
                    ));
                }
                Some(_) => {}
            }
            let document = serde_json::to_string(&subscriber)?;
            conn.execute(
                "UPDATE subscribers SET document = ?2 WHERE id = ?1",
                params![subscriber.id.as_str(), document],
            )?;
            Ok(subscriber)
        })
        .await
    }

    async fn delete(&self, key: &SubscriberKey) -> Result<Option<Subscriber>> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let found = find_row(&tx, &key)?;
            if let Some(subscriber) = &found {
                tx.execute(
                    "DELETE FROM subscribers WHERE id = ?1",
                    params![subscriber.id.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(found)
        })
        .await
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Subscriber>> {
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT document FROM subscribers ORDER BY imsi LIMIT ?1 OFFSET ?2")?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let offset = i64::try_from(offset).unwrap_or(i64::MAX);
            let rows = stmt.query_map(params![limit, offset], |row| {
                row.get::<_, String>(0)
            })?;
            let subscribers = rows
                .map(|document| decode(&document?))
                .collect::<Result<Vec<_>>>()?;
            Ok(subscribers)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::template;

    fn records(count: u64) -> Vec<NewSubscriber> {
        (1..=count)
            .map(|n| {
                let imsi = format!("0010100000{n:05}").parse().unwrap();
                NewSubscriber::new(imsi, None, template())
            })
            .collect()
    }

    #[tokio::test]
    async fn queued_write_never_starts_after_deadline() {
        let store = SqliteStore::in_memory();
        store.connect().await.unwrap();

        let busy = store.conn.lock();
        let result = store
            .insert_many_within(records(5), Duration::from_millis(20))
            .await;
        drop(busy);

        assert!(matches!(result, Err(Error::Timeout { .. })), "{result:?}");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn abandoned_watch_refuses_commit() {
        let conn = Connection::open_in_memory().unwrap();
        let watch = Watch::new(Duration::from_millis(1));
        watch.start(&conn).unwrap();

        assert!(watch.abandon());
        assert!(matches!(watch.commit(), Err(Error::Timeout { .. })));
        watch.finish();
        assert!(matches!(*watch.phase.lock(), Phase::Abandoned));
    }

    #[test]
    fn committing_watch_cannot_be_abandoned() {
        let conn = Connection::open_in_memory().unwrap();
        let watch = Watch::new(Duration::from_millis(1));
        watch.start(&conn).unwrap();
        watch.commit().unwrap();

        assert!(!watch.abandon());
        watch.finish();
        assert!(!watch.abandon());
    }

    #[test]
    fn abandoned_before_start_never_runs() {
        let conn = Connection::open_in_memory().unwrap();
        let watch = Watch::new(Duration::from_millis(1));
        assert!(watch.abandon());
        assert!(matches!(watch.start(&conn), Err(Error::Timeout { .. })));
    }
}
