use std::sync::Arc;
use std::time::Duration;

use docstore_client::embedded::EmbeddedStore;
use docstore_client::embedded::EmbeddedTransport;
use docstore_client::embedded::StoreOptions;
use docstore_client::DurabilityLevel;
use docstore_client::Error;
use docstore_client::OperationRequest;

use crate::common::client_over;
use crate::common::embedded_client;
use crate::enable_logger;

#[tokio::test]
async fn test_every_level_is_reached_on_a_healthy_cluster() {
    enable_logger();
    let (_, client) = embedded_client();

    for level in [
        DurabilityLevel::None,
        DurabilityLevel::MajorityReplicated,
        DurabilityLevel::PersistedToMajority,
        DurabilityLevel::PersistedToAll,
    ] {
        let written = client.upsert("k", "v", level).await.unwrap();
        let satisfied = client
            .durability()
            .await_durability("k", written.cas, written.token, level, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(satisfied.level, level);
    }
}

#[tokio::test]
async fn test_majority_survives_one_offline_replica() {
    let (store, client) = embedded_client();
    store.set_node_online(2, false);

    client
        .upsert("k", "v", DurabilityLevel::PersistedToMajority)
        .await
        .unwrap();

    let err = client
        .upsert("k", "v", DurabilityLevel::PersistedToAll)
        .await
        .unwrap_err();
    match err {
        Error::DurabilityImpossible {
            level,
            required,
            available,
            ..
        } => {
            assert_eq!(level, DurabilityLevel::PersistedToAll);
            assert_eq!(required, 3);
            assert_eq!(available, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_single_node_cluster_supports_every_level() {
    let store = Arc::new(EmbeddedStore::new(StoreOptions {
        partition_count: 4,
        replicas: 0,
    }));
    let client = client_over(EmbeddedTransport::new(store));

    client
        .upsert("k", "v", DurabilityLevel::PersistedToAll)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stalled_persistence_times_out_without_rollback() {
    enable_logger();
    let (store, client) = embedded_client();
    store.set_persistence_stalled(1, true);

    let err = client
        .execute(
            OperationRequest::upsert("k", "durable")
                .with_durability(DurabilityLevel::PersistedToAll)
                .with_timeout(Duration::from_millis(300)),
        )
        .await
        .unwrap_err();

    match err {
        Error::DurabilityTimeout {
            key,
            level,
            replicated,
            persisted,
            ..
        } => {
            assert_eq!(key, "k");
            assert_eq!(level, DurabilityLevel::PersistedToAll);
            assert_eq!(replicated, 3);
            assert_eq!(persisted, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // the write itself stays in place
    assert_eq!(store.document("k").unwrap().content, "durable".as_bytes());
}

#[tokio::test]
async fn test_failover_before_confirmation_is_ambiguous() {
    let (store, client) = embedded_client();
    let written = client.upsert("k", "v", DurabilityLevel::None).await.unwrap();
    store.failover(written.token.partition_id).unwrap();

    let err = client
        .durability()
        .await_durability(
            "k",
            written.cas,
            written.token,
            DurabilityLevel::MajorityReplicated,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

    assert!(err.is_ambiguous());
}
