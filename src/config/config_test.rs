use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::DurabilityLevel;
use crate::Error;

fn cleanup_all_docstore_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DOCSTORE__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = ClientConfig::default();

    assert_eq!(config.timeouts.kv_timeout_ms, 2500);
    assert_eq!(config.timeouts.kv_durable_timeout_ms, 10_000);
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.cas.max_attempts, 10);
    assert!(config.compression.enabled);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_docstore_env_vars();
    with_vars(
        vec![
            ("DOCSTORE__RETRY__MAX_ATTEMPTS", Some("7")),
            ("DOCSTORE__COMPRESSION__ENABLED", Some("false")),
        ],
        || {
            let config = ClientConfig::new().unwrap();

            assert_eq!(config.retry.max_attempts, 7);
            assert!(!config.compression.enabled);
            // untouched sections keep their defaults
            assert_eq!(config.timeouts.kv_timeout_ms, 2500);
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_from_config_path() {
    cleanup_all_docstore_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("client.toml");
    std::fs::write(
        &config_path,
        r#"
        [timeouts]
        kv_timeout_ms = 1200

        [durability]
        poll_interval_ms = 4
        "#,
    )
    .unwrap();

    with_vars(
        vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))],
        || {
            let config = ClientConfig::new().unwrap().validate().unwrap();
            assert_eq!(config.timeouts.kv_timeout_ms, 1200);
            assert_eq!(config.durability.poll_interval_ms, 4);
            assert_eq!(config.durability.max_poll_interval_ms, 100);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_docstore_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        [cas]
        max_attempts = 3

        [retry]
        base_delay_ms = 20
        max_delay_ms = 40
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = ClientConfig::new().expect("success");
        let config = base_config.with_override_config(config_path.to_str().unwrap()).unwrap();

        assert_eq!(config.cas.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 20);
        assert_eq!(config.retry.max_delay_ms, 40);
        assert_eq!(config.retry.max_attempts, 4);
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_docstore_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(&config_path, "[cas]\nmax_attempts = 3\n").unwrap();

    with_vars(vec![("DOCSTORE__CAS__MAX_ATTEMPTS", Some("9"))], || {
        let config = ClientConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();
        assert_eq!(config.cas.max_attempts, 9);
    });
}

#[test]
fn validation_should_reject_zero_retry_attempts() {
    let mut config = ClientConfig::default();
    config.retry.max_attempts = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_durable_timeout_shorter_than_kv_timeout() {
    let mut config = ClientConfig::default();
    config.timeouts.kv_durable_timeout_ms = 100;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_inverted_poll_intervals() {
    let mut config = ClientConfig::default();
    config.durability.poll_interval_ms = 500;
    config.durability.max_poll_interval_ms = 100;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_compression_ratio_out_of_range() {
    let mut config = ClientConfig::default();
    config.compression.min_ratio = 1.5;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn backoff_delay_should_double_and_cap() {
    let policy = BackoffPolicy {
        max_attempts: 5,
        attempt_timeout_ms: 100,
        base_delay_ms: 10,
        max_delay_ms: 35,
        jitter: false,
    };
    assert_eq!(policy.delay_for(1), Duration::from_millis(10));
    assert_eq!(policy.delay_for(2), Duration::from_millis(20));
    assert_eq!(policy.delay_for(3), Duration::from_millis(35));
    assert_eq!(policy.delay_for(40), Duration::from_millis(35));
}

#[test]
fn backoff_jitter_should_stay_within_half_to_full_delay() {
    let policy = BackoffPolicy {
        base_delay_ms: 40,
        max_delay_ms: 40,
        jitter: true,
        ..BackoffPolicy::default()
    };
    for _ in 0..50 {
        let delay = policy.delay_for(1);
        assert!(delay >= Duration::from_millis(20) && delay <= Duration::from_millis(40));
    }
}

#[test]
fn timeouts_should_pick_durable_budget_for_durable_writes() {
    let timeouts = TimeoutConfig::default();
    assert_eq!(
        timeouts.for_durability(DurabilityLevel::None),
        Duration::from_millis(2500)
    );
    assert_eq!(
        timeouts.for_durability(DurabilityLevel::PersistedToAll),
        Duration::from_millis(10_000)
    );
}
