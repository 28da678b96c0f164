use super::*;
use tempfile::tempdir;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.windows.len(), 4);
    assert_eq!(config.primary_window_name().as_deref(), Some("last_3_years"));
    assert_eq!(config.performance.workers, 8);
    assert_eq!(config.timeout(), Some(Duration::from_secs(300)));
    assert!(config.cache.enabled);
    assert_eq!(config.data_quality.unknown_email_placeholder, "unknown@unknown");
    config.validate().unwrap();
}

#[test]
fn test_parse_full_file() {
    let toml_content = r#"
project = "acme"
primary_window = "quarter"

[[windows]]
name = "month"
days = 30

[[windows]]
name = "quarter"
days = 90

[activity]
threshold_days = 180

[cache]
enabled = false

[performance]
workers = 4
timeout_secs = 0
max_history_days = 730

[leaderboards]
top_n = 5

[organizations]
collapse_subdomains = true
custom_mappings = { "corp.example" = "example.com" }
"#;
    let config = EngineConfig::from_toml_str(toml_content).unwrap();
    assert_eq!(config.project.as_deref(), Some("acme"));
    assert_eq!(
        config.windows,
        vec![WindowSpec::new("month", 30), WindowSpec::new("quarter", 90)]
    );
    assert_eq!(config.primary_window_name().as_deref(), Some("quarter"));
    assert_eq!(config.activity.threshold_days, 180);
    // Unset keys in a present table keep their defaults
    assert_eq!(config.activity.very_old_years, 3);
    assert_eq!(config.leaderboards.bottom_n, 10);
    assert_eq!(config.leaderboards.least_active_n, 10);
    assert!(!config.cache.enabled);
    assert_eq!(config.timeout(), None);
    assert_eq!(config.performance.max_history_days, Some(730));
    assert_eq!(config.organizations.organization_for("corp.example"), "example.com");
    config.validate().unwrap();
}

#[test]
fn test_rejects_bad_windows() {
    let config = EngineConfig::from_toml_str("[[windows]]\nname = \"never\"\ndays = 0\n").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NonPositiveWindow { .. })
    ));

    let config = EngineConfig {
        windows: Vec::new(),
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::NoWindows)));
}

#[test]
fn test_rejects_unknown_primary_window() {
    let config = EngineConfig {
        primary_window: Some("decade".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::UnknownPrimaryWindow(name)) if name == "decade"
    ));
}

#[test]
fn test_rejects_out_of_range_values() {
    let mut config = EngineConfig::default();
    config.performance.workers = 0;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.performance.workers = 65;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.activity.old_years = 5;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.activity.threshold_days = -1;
    assert!(config.validate().is_err());

    let mut config = EngineConfig::default();
    config.leaderboards.least_active_n = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_digest_tracks_values() {
    let a = EngineConfig::default();
    let mut b = EngineConfig::default();
    assert_eq!(a.digest(), b.digest());
    assert_eq!(a.digest().len(), 64);

    b.leaderboards.top_n = 3;
    assert_ne!(a.digest(), b.digest());
}

#[test]
fn test_load_from_root_and_explicit_path() {
    let dir = tempdir().unwrap();
    assert_eq!(
        load_engine_config(dir.path(), None).unwrap(),
        EngineConfig::default()
    );

    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "project = \"from-root\"\n").unwrap();
    let config = load_engine_config(dir.path(), None).unwrap();
    assert_eq!(config.project.as_deref(), Some("from-root"));

    let explicit = dir.path().join("other.toml");
    std::fs::write(&explicit, "project = \"explicit\"\n").unwrap();
    let config = load_engine_config(dir.path(), Some(&explicit)).unwrap();
    assert_eq!(config.project.as_deref(), Some("explicit"));
}

#[test]
fn test_broken_or_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "windows = 12\n").unwrap();
    assert!(matches!(
        load_engine_config(dir.path(), None),
        Err(ConfigError::Parse { .. })
    ));

    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        load_engine_config(dir.path(), Some(&missing)),
        Err(ConfigError::Io { .. })
    ));
}
