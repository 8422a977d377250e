use docstore_client::DurabilityLevel;
use docstore_client::LookupSpec;
use docstore_client::MutateInOptions;
use docstore_client::MutateSpec;
use futures::future::join_all;
use serde_json::json;
use serde_json::Value;

use crate::common::embedded_client;
use crate::enable_logger;

#[tokio::test]
async fn test_counter_document_walkthrough() {
    enable_logger();
    let (_, client) = embedded_client();
    client
        .upsert_json("counter-doc", &json!({ "count": 0 }), DurabilityLevel::None)
        .await
        .unwrap();

    let increments = (0..5).map(|_| {
        client.counter_increment("counter-doc", "count", 1, DurabilityLevel::MajorityReplicated)
    });
    let mut seen: Vec<i64> = join_all(increments)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);

    client
        .cas()
        .perform_json_with_retry("counter-doc", 5, DurabilityLevel::None, |mut doc: Value| {
            doc["history"] = json!([doc["count"].clone()]);
            Ok(doc)
        })
        .await
        .unwrap();

    let result = client
        .lookup_in(
            "counter-doc",
            vec![LookupSpec::get("count"), LookupSpec::count("history")],
        )
        .await
        .unwrap();
    assert_eq!(result.content_as::<i64>(0).unwrap(), 5);
    assert_eq!(result.content_as::<usize>(1).unwrap(), 1);
}

#[tokio::test]
async fn test_counter_creates_missing_document_and_path() {
    let (_, client) = embedded_client();

    assert_eq!(
        client
            .counter_increment("fresh", "stats.hits", 3, DurabilityLevel::None)
            .await
            .unwrap(),
        3
    );

    let (value, _): (Value, _) = client.get_json("fresh").await.unwrap();
    assert_eq!(value, json!({ "stats": { "hits": 3 } }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_sum_up() {
    let (_, client) = embedded_client();
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .mutate_in(
                        "hits",
                        vec![MutateSpec::counter("n", 2).create_path()],
                        MutateInOptions::default().semantics(docstore_client::StoreSemantics::Upsert),
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let (value, _): (Value, _) = client.get_json("hits").await.unwrap();
    assert_eq!(value["n"], json!(32));
}
