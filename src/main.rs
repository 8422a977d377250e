use std::sync::Arc;

use docstore_client::embedded::EmbeddedStore;
use docstore_client::embedded::EmbeddedTransport;
use docstore_client::gather_metrics;
use docstore_client::Client;
use docstore_client::ClientConfig;
use docstore_client::DurabilityLevel;
use docstore_client::LookupSpec;
use docstore_client::Result;
use futures::future::join_all;
use serde_json::json;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

const COUNTER_KEY: &str = "counter-doc";
const INCREMENTS: usize = 5;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::new()?.validate()?;
    let store = Arc::new(EmbeddedStore::default());
    let client = Client::builder(Arc::new(EmbeddedTransport::new(store.clone())))
        .set_config(config)
        .build()?;
    info!("client {} connected to embedded store", client.client_id());

    client
        .upsert_json(COUNTER_KEY, &json!({ "count": 0 }), DurabilityLevel::None)
        .await?;

    let increments = (0..INCREMENTS).map(|_| {
        client.counter_increment(COUNTER_KEY, "count", 1, DurabilityLevel::MajorityReplicated)
    });
    for result in join_all(increments).await {
        result?;
    }

    client
        .cas()
        .perform_json_with_retry(COUNTER_KEY, 10, DurabilityLevel::None, |mut doc: Value| {
            doc["history"] = json!(["seeded", "incremented"]);
            Ok(doc)
        })
        .await?;

    let lookup = client
        .lookup_in(
            COUNTER_KEY,
            vec![LookupSpec::get("count"), LookupSpec::count("history")],
        )
        .await?;
    let count: i64 = lookup.content_as(0)?;
    let history: usize = lookup.content_as(1)?;

    println!("{COUNTER_KEY}: count={count} history_entries={history} cas={}", lookup.cas);
    println!("{}", gather_metrics());
    Ok(())
}
