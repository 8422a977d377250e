use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use docstore_client::DurabilityLevel;
use docstore_client::Error;
use docstore_client::OperationKind;
use docstore_client::OperationRequest;
use serde::Deserialize;
use serde::Serialize;

use crate::common::client_over;
use crate::common::embedded_client;
use crate::common::CutAfterSend;
use crate::common::FlakyConnect;
use crate::enable_logger;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    visits: u32,
}

#[tokio::test]
async fn test_upsert_then_get_round_trips_content() {
    enable_logger();
    let (_, client) = embedded_client();
    // large enough to be compressed on the wire
    let payload = format!(r#"{{"body":"{}"}}"#, "x".repeat(4096));

    let written = client
        .upsert("doc", payload.clone(), DurabilityLevel::None)
        .await
        .unwrap();
    let doc = client.get("doc").await.unwrap();

    assert_eq!(doc.content, payload.as_bytes());
    assert_eq!(doc.cas, written.cas);
}

#[tokio::test]
async fn test_typed_json_helpers() {
    let (_, client) = embedded_client();
    let profile = Profile {
        name: "ada".into(),
        visits: 3,
    };

    let written = client
        .upsert_json("profile:ada", &profile, DurabilityLevel::None)
        .await
        .unwrap();
    let (read, cas): (Profile, _) = client.get_json("profile:ada").await.unwrap();

    assert_eq!(read, profile);
    assert_eq!(cas, written.cas);
}

#[tokio::test]
async fn test_second_replace_with_stale_cas_fails() {
    let (_, client) = embedded_client();
    client.upsert("k", "v0", DurabilityLevel::None).await.unwrap();
    let read = client.get("k").await.unwrap();

    client
        .replace("k", "v1", Some(read.cas), DurabilityLevel::None)
        .await
        .unwrap();
    let err = client
        .replace("k", "v2", Some(read.cas), DurabilityLevel::None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CasMismatch { attempted, .. } if attempted == read.cas));
    assert_eq!(client.get("k").await.unwrap().content, "v1".as_bytes());
}

#[tokio::test]
async fn test_insert_exists_remove_lifecycle() {
    let (store, client) = embedded_client();

    client.insert("k", "1", DurabilityLevel::None).await.unwrap();
    assert!(matches!(
        client.insert("k", "2", DurabilityLevel::None).await,
        Err(Error::KeyExists { .. })
    ));
    assert!(client.exists("k").await.unwrap().is_some());

    client.remove("k", None).await.unwrap();

    assert_eq!(client.exists("k").await.unwrap(), None);
    assert!(matches!(client.get("k").await, Err(Error::NotFound { .. })));
    assert!(matches!(client.remove("k", None).await, Err(Error::NotFound { .. })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_touch_sets_expiry() {
    let (_, client) = embedded_client();
    client.upsert("k", "v", DurabilityLevel::None).await.unwrap();

    client.touch("k", Some(Duration::from_secs(60))).await.unwrap();

    let expiry = client.get("k").await.unwrap().expiry.unwrap();
    assert!(expiry <= Duration::from_secs(60) && expiry > Duration::from_secs(50));
}

#[tokio::test]
async fn test_refused_connections_are_retried() {
    enable_logger();
    let (store, _) = embedded_client();
    let transport = Arc::new(FlakyConnect::new(store.clone(), 2));
    let client = docstore_client::Client::builder(transport.clone())
        .set_config(crate::common::test_config())
        .build()
        .unwrap();

    client.upsert("k", "v", DurabilityLevel::None).await.unwrap();

    assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    assert!(store.document("k").is_some());
}

#[tokio::test]
async fn test_write_cut_after_send_is_ambiguous_but_may_be_applied() {
    enable_logger();
    let (store, _) = embedded_client();
    let client = client_over(CutAfterSend::new(store.clone(), 1));

    let err = client
        .upsert("k", "v", DurabilityLevel::None)
        .await
        .unwrap_err();

    match &err {
        Error::AmbiguousOutcome { key, op, .. } => {
            assert_eq!(key, "k");
            assert_eq!(*op, OperationKind::Upsert);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // the store did apply it; only the caller can tell whether that is fine
    assert!(store.document("k").is_some());
}

#[tokio::test]
async fn test_store_temporary_failures_are_retried() {
    let (store, client) = embedded_client();
    store.inject_temporary_failures(2);

    client.upsert("k", "v", DurabilityLevel::None).await.unwrap();
    assert!(store.document("k").is_some());
}

#[tokio::test]
async fn test_out_of_range_durations_are_handled() {
    let (_, client) = embedded_client();
    client.upsert("k", "v", DurabilityLevel::None).await.unwrap();

    let err = client.touch("k", Some(Duration::MAX)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(client.get("k").await.unwrap().expiry, None);

    client
        .execute(OperationRequest::get("k").with_timeout(Duration::MAX))
        .await
        .unwrap();
}
