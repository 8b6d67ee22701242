//! Scenario: the config hash identifies the effective configuration.
//!
//! GREEN when:
//! - the same documents hash identically across calls;
//! - key order inside a document does not matter;
//! - a later layer overrides an earlier one and changes the hash.

use mr_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
calendar:
  timezone: "Asia/Kolkata"
generation:
  max_parallel_customers: 4
wallet:
  negative_balance_tolerance: "0"
"#;

const BASE_YAML_REORDERED: &str = r#"
wallet:
  negative_balance_tolerance: "0"
generation:
  max_parallel_customers: 4
calendar:
  timezone: "Asia/Kolkata"
"#;

const OVERLAY_YAML: &str = r#"
wallet:
  negative_balance_tolerance: "25.00"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "key order in YAML must not change the hash"
    );
}

#[test]
fn overlay_wins_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(
        merged
            .config_json
            .pointer("/wallet/negative_balance_tolerance")
            .and_then(|v| v.as_str()),
        Some("25.00")
    );
    // Untouched siblings survive the merge.
    assert_eq!(
        merged
            .config_json
            .pointer("/generation/max_parallel_customers")
            .and_then(|v| v.as_u64()),
        Some(4)
    );
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_document_is_same_as_no_document() {
    let none = mr_config::defaults().unwrap();
    let empty = load_layered_yaml_from_strings(&[""]).unwrap();
    let braces = load_layered_yaml_from_strings(&["{}"]).unwrap();
    assert_eq!(none.config_hash, empty.config_hash);
    assert_eq!(none.config_hash, braces.config_hash);
}
