use super::*;

#[test]
fn test_custom_registry() {
    let registry = Registry::new_custom(Some("test".to_string()), None).unwrap();
    register_custom_metrics(&registry).unwrap();

    OPERATION_COUNTER.with_label_values(&["get", "ok"]).inc();
    let metrics = registry.gather();
    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"test_operations_total"),
        "Missing test_operations_total"
    );
}

#[test]
fn test_counter_increment() {
    TRANSPORT_RETRY_COUNTER.with_label_values(&["metrics_test"]).reset();

    TRANSPORT_RETRY_COUNTER.with_label_values(&["metrics_test"]).inc();
    TRANSPORT_RETRY_COUNTER.with_label_values(&["metrics_test"]).inc();

    let value = TRANSPORT_RETRY_COUNTER.with_label_values(&["metrics_test"]).get();
    assert_eq!(value, 2, "Counter should increment correctly");
}

#[test]
fn test_gather_metrics_renders_text_format() {
    AMBIGUOUS_OUTCOME_COUNTER.with_label_values(&["upsert"]).inc();
    let text = gather_metrics();
    assert!(text.contains("docstore_ambiguous_outcomes_total"));
}
