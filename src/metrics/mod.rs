use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref OPERATION_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("operations_total", "Dispatched operations by kind and outcome"),
        &["op", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref TRANSPORT_RETRY_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("transport_retries_total", "Attempts resent after a transient transport failure"),
        &["op"]
    )
    .expect("metric can not be created");

    pub static ref CAS_CONFLICT_COUNTER: IntCounter = IntCounter::new(
        "cas_conflicts_total",
        "Replace attempts rejected with a cas mismatch inside the retry helper"
    )
    .expect("metric can not be created");

    pub static ref AMBIGUOUS_OUTCOME_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("ambiguous_outcomes_total", "Writes whose outcome could not be determined"),
        &["op"]
    )
    .expect("metric can not be created");

    pub static ref DURABILITY_WAIT_HISTOGRAM: HistogramVec = HistogramVec::new(
        HistogramOpts::new("durability_wait_seconds", "Time spent waiting for durability")
            .buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets")),
        &["level"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("docstore".to_string()), None)
            .expect("registry can be created");
        register_custom_metrics(&registry).expect("collectors can be registered");
        registry
    };
}

pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(OPERATION_COUNTER.clone()))?;
    registry.register(Box::new(TRANSPORT_RETRY_COUNTER.clone()))?;
    registry.register(Box::new(CAS_CONFLICT_COUNTER.clone()))?;
    registry.register(Box::new(AMBIGUOUS_OUTCOME_COUNTER.clone()))?;
    registry.register(Box::new(DURABILITY_WAIT_HISTOGRAM.clone()))?;
    Ok(())
}

/// Renders every client metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
