//! Scenario: keys no consumer reads are reported.
//!
//! GREEN when:
//! 1) `Warn` returns the report without erroring;
//! 2) `Fail` errors with CONFIG_UNUSED_KEYS;
//! 3) consumed prefixes cover their nested keys;
//! 4) the unused list is sorted.

use mr_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigConsumer, UnusedKeyPolicy,
};

const YAML_WITH_STRAYS: &str = r#"
calendar:
  timezone: "Asia/Kolkata"
generation:
  max_parallel_customers: 2
  retry_limit: 3
zeta:
  flag: true
alpha:
  flag: false
"#;

#[test]
fn warn_reports_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML_WITH_STRAYS]).unwrap();
    let report = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .expect("warn policy must not error");

    assert_eq!(report.consumer, "DAEMON");
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/alpha/flag".to_string(),
            "/generation/retry_limit".to_string(),
            "/zeta/flag".to_string(),
        ]
    );
}

#[test]
fn fail_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML_WITH_STRAYS]).unwrap();
    let err = report_unused_keys(
        ConfigConsumer::Cli,
        &loaded.config_json,
        UnusedKeyPolicy::Fail,
    )
    .unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "{msg}");
    assert!(msg.contains("consumer=CLI"), "{msg}");
}

#[test]
fn known_keys_are_clean_for_both_consumers() {
    let yaml = r#"
calendar:
  timezone: "UTC"
generation:
  max_parallel_customers: 16
wallet:
  negative_balance_tolerance: "10.00"
daemon:
  bind_addr: "0.0.0.0:8787"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    for consumer in [ConfigConsumer::Daemon, ConfigConsumer::Cli] {
        let report =
            report_unused_keys(consumer, &loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
        assert!(report.is_clean(), "{consumer:?}: {:?}", report.unused_leaf_pointers);
    }
}
