use bytes::Bytes;
use docstore_client::DurabilityLevel;
use docstore_client::Error;
use serde_json::json;
use serde_json::Value;

use crate::common::client_over;
use crate::common::embedded_client;
use crate::common::ConflictInjector;
use crate::enable_logger;

const MAX_ATTEMPTS: u32 = 4;

fn bump(doc: &docstore_client::Document) -> docstore_client::Result<Bytes> {
    let mut value: Value = doc.content_as()?;
    value["n"] = json!(value["n"].as_i64().unwrap_or(0) + 1);
    Ok(Bytes::from(serde_json::to_vec(&value)?))
}

#[tokio::test]
async fn test_succeeds_with_max_minus_one_conflicts() {
    enable_logger();
    let (store, seed) = embedded_client();
    seed.upsert_json("k", &json!({ "n": 0 }), DurabilityLevel::None)
        .await
        .unwrap();
    let client = client_over(ConflictInjector::new(store.clone(), MAX_ATTEMPTS - 1));

    client
        .cas()
        .perform_with_retry("k", MAX_ATTEMPTS, DurabilityLevel::None, bump)
        .await
        .unwrap();

    // each injected writer stored the bumped content it raced with
    let (value, _): (Value, _) = seed.get_json("k").await.unwrap();
    assert_eq!(value, json!({ "n": MAX_ATTEMPTS }));
}

#[tokio::test]
async fn test_exhausts_with_max_conflicts() {
    let (store, seed) = embedded_client();
    seed.upsert_json("k", &json!({ "n": 0 }), DurabilityLevel::None)
        .await
        .unwrap();
    let client = client_over(ConflictInjector::new(store.clone(), MAX_ATTEMPTS));

    let err = client
        .cas()
        .perform_with_retry("k", MAX_ATTEMPTS, DurabilityLevel::None, bump)
        .await
        .unwrap_err();

    match err {
        Error::RetriesExhausted {
            key,
            attempts,
            last_cas,
        } => {
            assert_eq!(key, "k");
            assert_eq!(attempts, MAX_ATTEMPTS);
            assert!(last_cas.is_some());
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_document_aborts_immediately() {
    let (_, client) = embedded_client();

    let err = client
        .cas()
        .perform_with_retry("nope", MAX_ATTEMPTS, DurabilityLevel::None, bump)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_json_updates_are_not_lost() {
    let (_, client) = embedded_client();
    client
        .upsert_json("shared", &json!({ "n": 0 }), DurabilityLevel::None)
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .cas()
                    .perform_json_with_retry("shared", 50, DurabilityLevel::None, |mut doc: Value| {
                        doc["n"] = json!(doc["n"].as_i64().unwrap_or(0) + 1);
                        Ok(doc)
                    })
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let (value, _): (Value, _) = client.get_json("shared").await.unwrap();
    assert_eq!(value["n"], json!(8));
}
