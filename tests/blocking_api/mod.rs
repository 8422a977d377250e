use bytes::Bytes;
use docstore_client::BlockingClient;
use docstore_client::DurabilityLevel;
use docstore_client::Error;
use docstore_client::LookupSpec;

use crate::common::embedded_client;

#[test]
fn test_blocking_client_runs_outside_a_runtime() {
    let (store, client) = embedded_client();
    let client = BlockingClient::new(client).unwrap();

    let written = client.insert("k", r#"{"n":1}"#, DurabilityLevel::MajorityReplicated).unwrap();
    assert_eq!(client.exists("k").unwrap(), Some(written.cas));

    client
        .perform_with_retry("k", 3, DurabilityLevel::None, |doc| {
            let mut value: serde_json::Value = doc.content_as()?;
            value["n"] = serde_json::json!(value["n"].as_i64().unwrap_or(0) * 10);
            Ok(Bytes::from(serde_json::to_vec(&value)?))
        })
        .unwrap();

    let result = client.lookup_in("k", vec![LookupSpec::get("n")]).unwrap();
    assert_eq!(result.content_as::<i64>(0).unwrap(), 10);

    let doc = client.get("k").unwrap();
    client.remove("k", Some(doc.cas)).unwrap();
    assert!(matches!(client.get("k"), Err(Error::NotFound { .. })));
    assert!(store.is_empty());
}
