use std::{env, fs};

use ordagg_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("ordagg.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[logging]
level = "debug"

[aggregator]
max_parallel_application_processors = 2
application_page_size = 50
global_registry_url = "https://registry.example.com"

[client]
timeout_secs = 5

[scheduler]
aggregation_interval_secs = 300

[metrics]
job_name = "ord-aggregator-test"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses; unset fields keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.aggregator.max_parallel_application_processors, 2);
    assert_eq!(cfg.aggregator.application_page_size, 50);
    assert_eq!(
        cfg.aggregator.global_registry_url.as_deref(),
        Some("https://registry.example.com")
    );
    assert_eq!(cfg.aggregator.max_parallel_spec_processors, 100);
    assert_eq!(cfg.client.max_parallel_documents_per_application, 4);
    assert_eq!(cfg.client.timeout_secs, 5);
    assert_eq!(
        cfg.client.well_known_path,
        "/.well-known/open-resource-discovery"
    );
    assert_eq!(cfg.scheduler.aggregation_interval_secs, 300);
    assert_eq!(cfg.scheduler.maintain_operations_interval(), None);
    assert_eq!(cfg.scheduler.parallel_operation_processors, 0);
    assert_eq!(cfg.scheduler.operation_processor_quiet_period_ms, 5000);
    assert_eq!(cfg.metrics.job_name, "ord-aggregator-test");
    assert!(cfg.metrics.enabled);

    // 2) Env override wins over the file
    unsafe {
        env::set_var("ORDAGG__AGGREGATOR__MAX_PARALLEL_APPLICATION_PROCESSORS", "8");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.aggregator.max_parallel_application_processors, 8);
    unsafe {
        env::remove_var("ORDAGG__AGGREGATOR__MAX_PARALLEL_APPLICATION_PROCESSORS");
    }

    // 3) Invalid values are rejected by validation
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[aggregator]
max_parallel_application_processors = 0
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("max_parallel_application_processors must be > 0"));

    // 4) A missing file falls back to defaults
    let missing = dir.path().join("missing.toml");
    let cfg = load_config(missing.to_str()).expect("defaults");
    assert_eq!(cfg.server.port, 8080);
}
