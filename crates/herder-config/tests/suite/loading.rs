use herder_config::{ConfigError, ConfigValidationError, ConfigWarning, HerderConfig};
use herder_memory::{AdmissionReason, Quotas};

#[test]
fn empty_config_uses_defaults() {
    let config = HerderConfig::load_from_str("").unwrap();
    assert_eq!(config, HerderConfig::default());
    assert_eq!(config.memory.quota, None);
    assert_eq!(config.memory.app_ratio, 0.8);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn builds_a_herder_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("herder.toml");
    std::fs::write(
        &path,
        r#"
[memory]
quota = 1000
app_ratio = 0.8
index_ratio = 0.5
query_ratio = 0.5

[logging]
level = "debug"
json = true
"#,
    )
    .unwrap();

    let config = HerderConfig::load_from_path(&path).unwrap();
    assert!(config.logging.json);

    let herder = config.build_herder().unwrap();
    assert_eq!(
        herder.quotas(),
        Quotas {
            memory: 1000,
            app: 800,
            index: 400,
            query: 400
        }
    );
    assert_eq!(
        herder.start_query(401).unwrap_err().reason(),
        AdmissionReason::Query
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HerderConfig::load_from_path(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "{err}");
    assert!(err.to_string().contains("missing.toml"), "{err}");
}

#[test]
fn invalid_ratios_fail_the_load() {
    let err = HerderConfig::load_from_str("[memory]\nquota = 1000\nindex_ratio = -1.0\n")
        .unwrap_err();
    match &err {
        ConfigError::Invalid(errors) => assert_eq!(
            errors,
            &vec![ConfigValidationError::InvalidRatio {
                toml_path: "memory.index_ratio".to_owned(),
                value: -1.0
            }]
        ),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "invalid config: memory.index_ratio must be a finite, non-negative number (got -1)"
    );
}

#[test]
fn diagnostics_report_unknown_keys_and_warnings() {
    let text = r#"
[memory]
quota = "1GiB"
query_ratio = 1.5
persister_threads = 4
"#;
    let (config, diagnostics) = HerderConfig::load_from_str_with_diagnostics(text).unwrap();
    assert_eq!(config.memory.query_ratio, 1.5);
    assert!(diagnostics.is_ok());
    assert_eq!(
        diagnostics.unknown_keys,
        vec!["memory.persister_threads".to_owned()]
    );
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::RatioAboveOne {
            toml_path: "memory.query_ratio".to_owned(),
            value: 1.5
        }]
    );

    // Warnings alone do not fail a load.
    assert!(HerderConfig::load_from_str(text).is_ok());
}

#[test]
fn omitted_quota_is_detected_from_the_host() {
    let config = HerderConfig::load_from_str("[memory]\napp_ratio = 0.5\n").unwrap();
    match config.memory.quotas() {
        Ok(quotas) => {
            assert!(quotas.memory > 0);
            assert_eq!(quotas.app, (quotas.memory as f64 * 0.5) as u64);
        }
        // Some sandboxes hide the host memory size.
        Err(err) => assert!(matches!(err, ConfigError::UnknownMemory)),
    }
}

#[test]
fn report_serializes_for_status_endpoints() {
    let herder = HerderConfig::load_from_str("[memory]\nquota = 1000\n")
        .unwrap()
        .build_herder()
        .unwrap();
    herder.start_query(100).unwrap();

    let json = serde_json::to_value(herder.report()).unwrap();
    assert_eq!(json["running_query_bytes"], 100);
    assert_eq!(json["quotas"]["app"], 800);
    assert_eq!(json["quotas"]["query"], 600);
    assert_eq!(json["headroom"]["query"], 500);
}
