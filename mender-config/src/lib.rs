//! Loader for Mender configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are added, with the environment
//! applied last so it always wins. Environment keys use the `MENDER__`
//! prefix and `__` between sections, e.g. `MENDER__CACHE__BACKEND=file` or
//! `MENDER__AI__MODEL=gpt-4o`. After merging, every string value gets
//! `${VAR}` / `$VAR` expansion (repeated, so a variable may reference
//! another) before the result is deserialized into [`MenderConfig`].
use config::{Config, ConfigError, Environment, File};
use mender_common::MenderConfig;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Name of the config file looked up by [`MenderConfigLoader::discover`].
pub const CONFIG_FILE_NAME: &str = "mender.yaml";

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Files checked by [`MenderConfigLoader::discover`], lowest precedence first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("mender").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Render the effective configuration, secrets masked, as YAML.
pub fn render_yaml(config: &MenderConfig) -> Result<String, ConfigError> {
    let mut shown = config.clone();
    if shown.ai.api_key.is_some() {
        shown.ai.api_key = Some("***".to_string());
    }
    serde_yaml::to_string(&shown).map_err(|e| ConfigError::Message(e.to_string()))
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct MenderConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for MenderConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MenderConfigLoader {
    /// Start with no files; only defaults and `MENDER__` overrides apply.
    ///
    /// ```
    /// use mender_common::ExecutionStrategy;
    /// use mender_config::MenderConfigLoader;
    ///
    /// let config = MenderConfigLoader::new()
    ///     .with_yaml_str("strategy: visual_first\ncache:\n  capacity: 50")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.strategy, ExecutionStrategy::VisualFirst);
    /// assert_eq!(config.cache.capacity, 50);
    /// assert_eq!(config.cache.ttl_secs, 86_400);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// The user config dir file, then `./mender.yaml`, both optional.
    pub fn discover() -> Self {
        default_config_paths()
            .into_iter()
            .fold(Self::new(), |loader, path| loader.with_optional_file(path))
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use mender_config::MenderConfigLoader;
    ///
    /// unsafe { std::env::set_var("MENDER_DOC_KEY", "sk-from-env"); }
    ///
    /// let config = MenderConfigLoader::new()
    ///     .with_yaml_str("ai:\n  provider: openai\n  api_key: \"${MENDER_DOC_KEY}\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.ai.api_key.as_deref(), Some("sk-from-env"));
    ///
    /// unsafe { std::env::remove_var("MENDER_DOC_KEY"); }
    /// ```
    pub fn load(self) -> Result<MenderConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("MENDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Convert to serde_json::Value first
        let mut v: Value = cfg.try_deserialize()?;
        // Recursively expand environment variables
        expand_env_in_value(&mut v);

        let typed: MenderConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
