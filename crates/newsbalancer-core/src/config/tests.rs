use super::types::InvalidHandling;
use super::Config;
use crate::error::ConfigError;

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.composite.perspectives.len(), 3);
    assert_eq!(config.composite.min_models, 3);
    assert_eq!(config.composite.invalid_handling, InvalidHandling::Ignore);
    assert!((config.composite.lean_threshold - 0.1).abs() < f64::EPSILON);
    assert_eq!(config.composite.per_job_timeout_ms, 120_000);
    assert_eq!(config.llm.per_call_timeout_ms, 30_000);
    assert_eq!(config.collector.feed_max_bytes, 4 * 1024 * 1024);
    assert_eq!(config.collector.feed_timeout_ms, 20_000);
    assert_eq!(config.progress.retention_ms, 15 * 60 * 1000);
}

#[test]
fn toml_sections_override_defaults() {
    let config: Config = toml::from_str(
        r#"
        [server]
        port = 9100

        [llm]
        primary_api_key = "sk-or-test"
        per_call_timeout_ms = 5000

        [composite]
        min_models = 2
        invalid_handling = "fail"

        [[composite.perspectives]]
        name = "left"
        models = ["left-m1", "left-m2"]

        [[composite.perspectives]]
        name = "right"
        weight = 2.0
        models = ["right-m1"]
        "#,
    )
    .expect("parse config");

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.llm.primary_api_key, "sk-or-test");
    assert_eq!(config.llm.per_call_timeout_ms, 5000);
    assert_eq!(config.composite.min_models, 2);
    assert_eq!(config.composite.invalid_handling, InvalidHandling::Fail);
    assert_eq!(config.composite.perspectives.len(), 2);
    assert!((config.composite.perspectives[0].weight - 1.0).abs() < f64::EPSILON);
    assert!((config.composite.perspectives[1].weight - 2.0).abs() < f64::EPSILON);
}

#[test]
fn validation_rejects_empty_model_chain() {
    let config: Config = toml::from_str(
        r#"
        [[composite.perspectives]]
        name = "left"
        models = []
        "#,
    )
    .expect("parse config");

    let errors = config.validate().expect_err("empty chain must fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::MissingField { field } if field.contains("models")
    )));
}

#[test]
fn validation_rejects_duplicate_perspective_names() {
    let config: Config = toml::from_str(
        r#"
        [[composite.perspectives]]
        name = "left"
        models = ["m1"]

        [[composite.perspectives]]
        name = "left"
        models = ["m2"]
        "#,
    )
    .expect("parse config");

    let errors = config.validate().expect_err("duplicate names must fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidValue { field, .. } if field == "composite.perspectives"
    )));
}

#[test]
fn validation_collects_multiple_errors() {
    let config: Config = toml::from_str(
        r#"
        [composite]
        lean_threshold = 2.0
        per_job_timeout_ms = 0
        "#,
    )
    .expect("parse config");

    let errors = config.validate().expect_err("invalid config must fail");
    assert!(errors.len() >= 2);
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let err = Config::load(Some("/nonexistent/newsbalancer-config.toml"))
        .expect_err("missing explicit file");
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn load_reads_toml_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server]\nport = 9999\n").expect("write config");

    let config = Config::load(path.to_str()).expect("load config");
    assert_eq!(config.server.port, 9999);
}
