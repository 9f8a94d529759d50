use mender_common::{AiProvider, CacheBackend, ExecutionStrategy};
use mender_config::MenderConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
ai:
  provider: gemini
  model: "gemini-1.5-flash"
  api_key: "${GEMINI_API_KEY}"
  timeout_secs: 10
cache:
  backend: file
  directory: "${MENDER_TEST_HOME}/cache"
  capacity: 200
strategy: dom_only
locator:
  strict_mode: true
"#;

#[test]
#[serial]
fn file_values_are_loaded_and_expanded() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "mender.yaml", FILE_YAML);

    let config = temp_env::with_vars(
        [
            ("GEMINI_API_KEY", Some("g-123")),
            ("MENDER_TEST_HOME", Some("/tmp/mender-home")),
        ],
        || MenderConfigLoader::new().with_file(&p).load(),
    )
    .expect("load config");

    assert_eq!(config.ai.provider, AiProvider::Gemini);
    assert_eq!(config.ai.api_key.as_deref(), Some("g-123"));
    assert_eq!(config.ai.timeout_secs, 10);
    assert_eq!(config.ai.max_retries, 2);
    assert_eq!(config.cache.backend, CacheBackend::File);
    assert_eq!(
        config.cache.directory,
        PathBuf::from("/tmp/mender-home/cache")
    );
    assert_eq!(config.cache.capacity, 200);
    assert_eq!(config.strategy, ExecutionStrategy::DomOnly);
    assert!(config.locator.strict_mode);
    assert!(config.locator.enable_caching);
    assert_eq!(config.webdriver.url, "http://localhost:9515");
}

#[test]
#[serial]
fn environment_overrides_the_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "mender.yaml", FILE_YAML);

    let config = temp_env::with_vars(
        [
            ("MENDER__STRATEGY", Some("visual_first")),
            ("MENDER__CACHE__CAPACITY", Some("5")),
            ("MENDER__WEBDRIVER__HEADLESS", Some("false")),
        ],
        || MenderConfigLoader::new().with_file(&p).load(),
    )
    .expect("load config");

    assert_eq!(config.strategy, ExecutionStrategy::VisualFirst);
    assert_eq!(config.cache.capacity, 5);
    assert!(!config.webdriver.headless);
    assert_eq!(config.ai.provider, AiProvider::Gemini);
}

#[test]
#[serial]
fn missing_optional_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = MenderConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults");

    assert_eq!(config.strategy, ExecutionStrategy::SmartSequential);
    assert_eq!(config.cache.backend, CacheBackend::Memory);
    assert_eq!(config.cache.capacity, 1000);
    assert_eq!(config.locator.timeout_ms, 5000);
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(MenderConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load()
        .is_err());
}

#[test]
#[serial]
fn unknown_strategy_is_rejected() {
    let err = MenderConfigLoader::new()
        .with_yaml_str("strategy: telepathy")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("telepathy"));
}
