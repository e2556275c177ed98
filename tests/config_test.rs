use std::fs;
use tasker_events::config::{ConfigManager, ConfigurationError, EventsConfig};
use tempfile::TempDir;

fn write_config(dir: &TempDir, file: &str, contents: &str) {
    fs::write(dir.path().join(file), contents).expect("write config file");
}

#[test]
fn test_missing_directory_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap();
    let defaults = EventsConfig::default();
    assert_eq!(manager.config().retry_queue, defaults.retry_queue);
    assert_eq!(manager.config().database, defaults.database);
    assert!(manager.config().task_defs.is_empty());
    assert_eq!(manager.environment(), "test");
}

#[test]
fn test_environment_file_overrides_base() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "tasker-events.yaml",
        r#"
retry_queue:
  enabled: true
  thread_count: 4
  stack: staging
task_defs:
  - name: http_call
    concurrency_limit: 3
  - name: email
    rate_limit_per_frequency: 10
    rate_limit_frequency_in_seconds: 60
"#,
    );
    write_config(
        &dir,
        "production.yaml",
        r#"
retry_queue:
  thread_count: 16
"#,
    );

    let production =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "production")
            .unwrap();
    let config = production.config();
    assert!(config.retry_queue.enabled);
    assert_eq!(config.retry_queue.thread_count, 16);
    assert_eq!(
        config.retry_queue.qualified_queue_name(),
        "conductor_event_retry_staging"
    );
    assert_eq!(config.task_defs.len(), 2);
    assert_eq!(config.task_defs[0].effective_concurrency_limit(), Some(3));
    assert_eq!(config.task_defs[1].effective_rate_limit(), Some((10, 60)));

    let development =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "development")
            .unwrap();
    assert_eq!(development.config().retry_queue.thread_count, 4);
}

#[test]
fn test_environment_variables_win() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tasker-events.yaml", "expression:\n  cache_ttl_seconds: 10\n");

    std::env::set_var("TASKER_EVENTS__EXPRESSION__CACHE_TTL_SECONDS", "42");
    let result =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
    std::env::remove_var("TASKER_EVENTS__EXPRESSION__CACHE_TTL_SECONDS");

    assert_eq!(result.unwrap().config().expression.cache_ttl_seconds, 42);
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "tasker-events.yaml", "retry_queue:\n  thread_count: 0\n");
    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }), "{err}");
}

#[test]
fn test_duplicate_task_defs_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "tasker-events.yaml",
        "task_defs:\n  - name: http_call\n  - name: http_call\n",
    );
    assert!(
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .is_err()
    );
}

#[test]
fn test_debug_config_masks_connection_urls() {
    let mut config = EventsConfig::default();
    config.database.url = Some("postgresql://user:secret@db/tasker".to_string());
    let manager = ConfigManager::from_config(config, "test").unwrap();
    let rendered = manager.debug_config().to_string();
    assert!(!rendered.contains("secret@db"));
}
