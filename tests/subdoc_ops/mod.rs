use docstore_client::DurabilityLevel;
use docstore_client::Error;
use docstore_client::LookupSpec;
use docstore_client::MutateInOptions;
use docstore_client::MutateSpec;
use docstore_client::StoreSemantics;
use serde_json::json;
use serde_json::Value;

use crate::common::embedded_client;

#[tokio::test]
async fn test_missing_intermediate_needs_create_path() {
    let (_, client) = embedded_client();
    client
        .upsert_json("k", &json!({ "a": {} }), DurabilityLevel::None)
        .await
        .unwrap();

    let err = client
        .mutate_in(
            "k",
            vec![MutateSpec::upsert("a.b.c", &1).unwrap()],
            MutateInOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PathNotFound { path, .. } if path == "a.b.c"));

    client
        .mutate_in(
            "k",
            vec![MutateSpec::upsert("a.b.c", &1).unwrap().create_path()],
            MutateInOptions::default(),
        )
        .await
        .unwrap();

    let (value, _): (Value, _) = client.get_json("k").await.unwrap();
    assert_eq!(value, json!({ "a": { "b": { "c": 1 } } }));
}

#[tokio::test]
async fn test_failed_spec_leaves_document_untouched() {
    let (_, client) = embedded_client();
    let written = client
        .upsert_json("k", &json!({ "tags": ["x"] }), DurabilityLevel::None)
        .await
        .unwrap();

    let err = client
        .mutate_in(
            "k",
            vec![
                MutateSpec::array_append("tags", &["y"]).unwrap(),
                MutateSpec::array_add_unique("tags", "x").unwrap(),
            ],
            MutateInOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PathExists { path, .. } if path == "tags"));
    let doc = client.get("k").await.unwrap();
    assert_eq!(doc.cas, written.cas);
    assert_eq!(doc.content_as::<Value>().unwrap(), json!({ "tags": ["x"] }));
}

#[tokio::test]
async fn test_mutate_in_with_cas_and_semantics() {
    let (_, client) = embedded_client();

    let created = client
        .mutate_in(
            "k",
            vec![MutateSpec::insert("name", "ada").unwrap()],
            MutateInOptions::default().semantics(StoreSemantics::Insert),
        )
        .await
        .unwrap();

    let err = client
        .mutate_in(
            "k",
            vec![MutateSpec::insert("name", "bob").unwrap()],
            MutateInOptions::default().semantics(StoreSemantics::Insert),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::KeyExists { .. }));

    client
        .mutate_in(
            "k",
            vec![MutateSpec::upsert("age", &36).unwrap()],
            MutateInOptions::default()
                .cas(created.cas)
                .durability(DurabilityLevel::MajorityReplicated),
        )
        .await
        .unwrap();

    let err = client
        .mutate_in(
            "k",
            vec![MutateSpec::remove("age")],
            MutateInOptions::default().cas(created.cas),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CasMismatch { .. }));
}

#[tokio::test]
async fn test_lookup_in_reads_fragments() {
    let (_, client) = embedded_client();
    client
        .upsert_json(
            "k",
            &json!({ "user": { "name": "ada", "langs": ["en", "fr", "de"] } }),
            DurabilityLevel::None,
        )
        .await
        .unwrap();

    let result = client
        .lookup_in(
            "k",
            vec![
                LookupSpec::get("user.langs[-1]"),
                LookupSpec::count("user.langs"),
                LookupSpec::exists("user.email"),
                LookupSpec::get("user.name.first"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(result.content_as::<String>(0).unwrap(), "de");
    assert_eq!(result.content_as::<usize>(1).unwrap(), 3);
    assert!(!result.exists(2).unwrap());
    assert!(matches!(result.content_as::<Value>(3), Err(Error::PathMismatch { .. })));
}

#[tokio::test]
async fn test_counter_overflow_is_rejected() {
    let (_, client) = embedded_client();
    client
        .upsert_json("k", &json!({ "n": i64::MAX }), DurabilityLevel::None)
        .await
        .unwrap();

    let err = client
        .counter_increment("k", "n", 1, DurabilityLevel::None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeltaRange { .. }));

    assert_eq!(
        client.counter_increment("k", "n", -5, DurabilityLevel::None).await.unwrap(),
        i64::MAX - 5
    );
}

#[tokio::test]
async fn test_cas_guarded_upsert_fails_once_document_is_removed() {
    let (_, client) = embedded_client();
    let written = client
        .upsert_json("k", &json!({ "a": 1 }), DurabilityLevel::None)
        .await
        .unwrap();
    client.remove("k", None).await.unwrap();

    let err = client
        .mutate_in(
            "k",
            vec![MutateSpec::upsert("b", &2).unwrap()],
            MutateInOptions::default()
                .semantics(StoreSemantics::Upsert)
                .cas(written.cas),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert!(matches!(client.get("k").await, Err(Error::NotFound { .. })));
}
