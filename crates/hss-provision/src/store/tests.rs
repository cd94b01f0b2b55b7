use super::*;
use crate::error::Error;
use crate::identity::{Msisdn, SubscriberId};
use crate::model::fixtures::template;
use crate::model::SubscriberStatus;

fn imsi(raw: &str) -> Imsi {
    raw.parse().unwrap()
}

fn record(raw: &str) -> NewSubscriber {
    NewSubscriber::new(imsi(raw), None, template().normalized())
}

async fn connected<S: SubscriberStore>(store: S) -> S {
    store.connect().await.unwrap();
    store
}

async fn run_rejects_calls_before_connect<S: SubscriberStore>(store: S) {
    let err = store.count().await.unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }), "{err:?}");
    store.connect().await.unwrap();
    store.connect().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    store.close().await.unwrap();
    assert!(store.find_existing(&[imsi("001010000000001")]).await.is_err());
}

async fn run_insert_many_reports_conflicts<S: SubscriberStore>(store: S) {
    store.insert_one(record("001010000000002")).await.unwrap();

    let outcome = store
        .insert_many(vec![
            record("001010000000001"),
            record("001010000000002"),
            record("001010000000003"),
        ])
        .await
        .unwrap();

    let inserted: Vec<Imsi> = outcome.inserted.iter().map(|s| s.imsi).collect();
    assert_eq!(inserted, [imsi("001010000000001"), imsi("001010000000003")]);
    assert_eq!(outcome.conflicts, [imsi("001010000000002")]);
    assert_eq!(store.count().await.unwrap(), 3);
    assert_ne!(outcome.inserted[0].id, outcome.inserted[1].id);
}

async fn run_find_existing_is_a_subset<S: SubscriberStore>(store: S) {
    store
        .insert_many(vec![record("001010000000005"), record("001010000000006")])
        .await
        .unwrap();

    let probe: Vec<Imsi> = (1..=10)
        .map(|i| imsi(&format!("0010100000000{i:02}")))
        .collect();
    let found = store.find_existing(&probe).await.unwrap();

    assert_eq!(
        found,
        HashSet::from([imsi("001010000000005"), imsi("001010000000006")])
    );
    assert!(store.find_existing(&[]).await.unwrap().is_empty());
}

async fn run_insert_one_conflicts<S: SubscriberStore>(store: S) {
    store.insert_one(record("001010000000001")).await.unwrap();
    let err = store.insert_one(record("001010000000001")).await.unwrap_err();
    assert!(
        matches!(err, Error::Conflict { imsi: i } if i == imsi("001010000000001")),
        "{err:?}"
    );
}

async fn run_find_by_id_or_imsi<S: SubscriberStore>(store: S) {
    let mut new = record("001010000000007");
    new.msisdn = Some("4917000007".parse::<Msisdn>().unwrap());
    let created = store.insert_one(new).await.unwrap();

    let by_id = store.find(&created.id.clone().into()).await.unwrap();
    let by_imsi = store.find(&created.imsi.into()).await.unwrap();
    assert_eq!(by_id.as_ref(), Some(&created));
    assert_eq!(by_imsi.as_ref(), Some(&created));

    let missing = SubscriberKey::Id(SubscriberId::new("000000000000000000000000"));
    assert!(store.find(&missing).await.unwrap().is_none());
}

async fn run_replace_and_delete<S: SubscriberStore>(store: S) {
    let mut sub = store.insert_one(record("001010000000008")).await.unwrap();
    sub.profile.status = SubscriberStatus::Suspended;
    store.replace(sub.clone()).await.unwrap();
    let stored = store.find(&sub.imsi.into()).await.unwrap().unwrap();
    assert_eq!(stored.profile.status, SubscriberStatus::Suspended);

    let mut moved = sub.clone();
    moved.imsi = imsi("001010000000009");
    assert_eq!(store.replace(moved).await.unwrap_err().field(), Some("imsi"));

    let mut ghost = sub.clone();
    ghost.id = SubscriberId::new("ffffffffffffffffffffffff");
    assert!(matches!(
        store.replace(ghost).await.unwrap_err(),
        Error::NotFound { .. }
    ));

    let removed = store.delete(&sub.imsi.into()).await.unwrap();
    assert_eq!(removed.map(|s| s.id), Some(sub.id.clone()));
    assert!(store.delete(&sub.id.into()).await.unwrap().is_none());
    assert_eq!(store.count().await.unwrap(), 0);
}

async fn run_list_is_ordered_and_paged<S: SubscriberStore>(store: S) {
    store
        .insert_many(vec![
            record("310150000000003"),
            record("001010000000001"),
            record("208930000000002"),
        ])
        .await
        .unwrap();

    let all: Vec<String> = store
        .list(0, 10)
        .await
        .unwrap()
        .iter()
        .map(|s| s.imsi.to_string())
        .collect();
    assert_eq!(all, ["001010000000001", "208930000000002", "310150000000003"]);

    let page = store.list(1, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].imsi, imsi("208930000000002"));
    assert!(store.list(3, 10).await.unwrap().is_empty());
    assert!(store.list(usize::MAX, 10).await.unwrap().is_empty());
    assert_eq!(store.list(0, usize::MAX).await.unwrap().len(), 3);
}

async fn run_bounded_insert_within_deadline<S: SubscriberStore>(store: S) {
    store.insert_one(record("001010000000002")).await.unwrap();

    let outcome = store
        .insert_many_within(
            vec![record("001010000000001"), record("001010000000002")],
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    assert_eq!(outcome.inserted.len(), 1);
    assert_eq!(outcome.conflicts, [imsi("001010000000002")]);
    assert_eq!(store.count().await.unwrap(), 2);
}

async fn run_health_check<S: SubscriberStore>(store: S) {
    let health = store.health_check().await.unwrap();
    assert!(health.connected);
    assert_eq!(health.subscribers, 0);
    assert_eq!(health.backend, store.backend());
}

macro_rules! store_suite {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[tokio::test]
            async fn rejects_calls_before_connect() {
                run_rejects_calls_before_connect($make).await;
            }

            #[tokio::test]
            async fn insert_many_reports_conflicts() {
                run_insert_many_reports_conflicts(connected($make).await).await;
            }

            #[tokio::test]
            async fn find_existing_is_a_subset() {
                run_find_existing_is_a_subset(connected($make).await).await;
            }

            #[tokio::test]
            async fn insert_one_conflicts() {
                run_insert_one_conflicts(connected($make).await).await;
            }

            #[tokio::test]
            async fn find_by_id_or_imsi() {
                run_find_by_id_or_imsi(connected($make).await).await;
            }

            #[tokio::test]
            async fn replace_and_delete() {
                run_replace_and_delete(connected($make).await).await;
            }

            #[tokio::test]
            async fn list_is_ordered_and_paged() {
                run_list_is_ordered_and_paged(connected($make).await).await;
            }

            #[tokio::test]
            async fn bounded_insert_within_deadline() {
                run_bounded_insert_within_deadline(connected($make).await).await;
            }

            #[tokio::test]
            async fn health_check() {
                run_health_check(connected($make).await).await;
            }
        }
    };
}

store_suite!(memory, MemoryStore::new());

#[cfg(feature = "sqlite")]
store_suite!(sqlite, SqliteStore::in_memory());

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_persists_across_reconnect() {
    let path = std::env::temp_dir().join(format!("hss-provision-{}.db", next_object_id()));
    {
        let store = connected(SqliteStore::new(&path)).await;
        store.insert_one(record("001010000000001")).await.unwrap();
        store.close().await.unwrap();
    }
    let store = connected(SqliteStore::new(&path)).await;
    let found = store.find(&imsi("001010000000001").into()).await.unwrap();
    assert_eq!(found.unwrap().profile.amf, "8000");
    store.close().await.unwrap();
    let _ = std::fs::remove_file(&path);
}
