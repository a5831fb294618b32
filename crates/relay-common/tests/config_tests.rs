use std::collections::HashMap;
use std::io::Write;

use relay_common::config::{RelayConfig, DEFAULT_MODEL};
use relay_common::RelayError;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_without_env() {
    let cfg = RelayConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.upstream_url, "http://localhost:8000");
    assert_eq!(cfg.model, DEFAULT_MODEL);
    assert!(cfg.dataset_path.is_none());
    assert_eq!(cfg.results_path.to_str(), Some("benchmark-results.json"));
}

#[test]
fn env_overrides_apply() {
    let cfg = RelayConfig::from_lookup(lookup(&[
        ("PORT", "4000"),
        ("RELAY_UPSTREAM_URL", "http://10.0.0.2:9000"),
        ("RELAY_MAX_PROMPTS", "25"),
        ("RELAY_DATASET", "/data/sharegpt.json"),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 4000);
    assert_eq!(cfg.upstream_url, "http://10.0.0.2:9000");
    assert_eq!(cfg.max_prompts, 25);
    assert_eq!(cfg.dataset_path.unwrap().to_str(), Some("/data/sharegpt.json"));
}

#[test]
fn relay_port_wins_over_port() {
    let cfg = RelayConfig::from_lookup(lookup(&[("PORT", "4000"), ("RELAY_PORT", "5000")])).unwrap();
    assert_eq!(cfg.port, 5000);
}

#[test]
fn bad_number_is_config_error() {
    let err = RelayConfig::from_lookup(lookup(&[("RELAY_MAX_PROMPTS", "lots")])).unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));
}

#[test]
fn yaml_file_fills_missing_fields_with_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "upstream_url: http://gpu-box:8000\nmax_requests_per_run: 50").unwrap();
    let cfg = RelayConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(cfg.upstream_url, "http://gpu-box:8000");
    assert_eq!(cfg.max_requests_per_run, 50);
    assert_eq!(cfg.port, 3000);
}
