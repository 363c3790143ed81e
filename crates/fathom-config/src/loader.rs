//! Layered configuration loading.
//!
//! Each layer is converted to a JSON tree and overlaid on the current
//! configuration, so a layer only has to mention the keys it changes.

use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, FathomConfig};

/// Builds a [`FathomConfig`] from presets, files and the environment.
///
/// Presets replace everything. Files and strings overlay key by key in call
/// order. `PREFIX__SECTION__KEY` variables are applied last, by
/// [`load`](Self::load).
///
/// # Example
///
/// ```no_run
/// use fathom_config::ConfigLoader;
///
/// # fn main() -> Result<(), fathom_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("fathom.toml")?
///     .with_dotenv()?
///     .with_env_prefix("FATHOM")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: FathomConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Starts from [`FathomConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: FathomConfig::default(),
            env_prefix: None,
        }
    }

    /// Replaces everything loaded so far with the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = FathomConfig::default();
        self
    }

    /// Replaces everything loaded so far with the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use fathom_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = FathomConfig::development();
        self
    }

    /// Replaces everything loaded so far with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = FathomConfig::production();
        self
    }

    /// Overlays a `.toml` or `.json` file, chosen by extension.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if format != "toml" && format != "json" {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.with_string(&content, &format)
    }

    /// Like [`with_file`](Self::with_file), skipping a file that does not exist.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Overlays configuration text in `format` (`"toml"` or `"json"`).
    ///
    /// # Example
    ///
    /// ```
    /// use fathom_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     port = 3000
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.port, 3000);
    /// assert_eq!(config.server.host, "0.0.0.0");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = if format.eq_ignore_ascii_case("toml") {
            serde_json::to_value(toml::from_str::<toml::Table>(content)?)?
        } else if format.eq_ignore_ascii_case("json") {
            serde_json::from_str(content)?
        } else {
            return Err(ConfigError::UnsupportedFormat(format.to_string()));
        };

        let mut tree = serde_json::to_value(&self.config)?;
        overlay(&mut tree, layer);
        self.config = serde_json::from_value(tree)?;
        Ok(self)
    }

    /// Enables overrides such as `FATHOM__SERVER__PORT=9000` for prefix `FATHOM`.
    ///
    /// The prefix is case-insensitive.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Exports `./.env` into the process environment, if the file exists.
    ///
    /// Variables that are already set win over the file.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(err) if err.not_found() => Ok(self),
            Err(err) => Err(err.into()),
        }
    }

    /// Exports a specific `.env` file into the process environment.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Applies environment overrides and validates the result.
    pub fn load(mut self) -> Result<FathomConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Returns the layers merged so far, skipping overrides and validation.
    #[must_use]
    pub fn load_unvalidated(self) -> FathomConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut overrides: Vec<(String, String)> = env::vars()
            .filter(|(name, _)| name.starts_with(&marker))
            .collect();
        overrides.sort();

        overrides
            .iter()
            .try_for_each(|(name, value)| self.apply_env_var(name, value, prefix))
    }

    // Keys are resolved against the serialized configuration; the existing
    // value's JSON type decides how the string is parsed.
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env(key, "missing prefix"))?;

        let mut tree = serde_json::to_value(&self.config)?;
        let mut slot = &mut tree;
        for part in path.split("__") {
            slot = slot
                .get_mut(part.to_lowercase())
                .ok_or_else(|| ConfigError::env(key, "unknown configuration key"))?;
        }

        *slot = match &*slot {
            Value::Bool(_) => Value::Bool(
                parse_bool(value).ok_or_else(|| ConfigError::env(key, "expected boolean"))?,
            ),
            Value::Number(_) => Value::from(
                value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::env(key, "expected integer"))?,
            ),
            Value::Null if value.is_empty() || value.eq_ignore_ascii_case("none") => Value::Null,
            Value::String(_) | Value::Null => Value::String(value.to_string()),
            Value::Object(_) | Value::Array(_) => {
                return Err(ConfigError::env(key, "names a section, not a key"))
            }
        };

        self.config = serde_json::from_value(tree)
            .map_err(|e| ConfigError::env(key, e.to_string()))?;
        Ok(())
    }
}

/// Objects merge key by key; any other value replaces what was there.
fn overlay(base: &mut Value, layer: Value) {
    let Value::Object(layer) = layer else {
        *base = layer;
        return;
    };
    match base {
        Value::Object(base) => overlay_object(base, layer),
        other => *other = Value::Object(layer),
    }
}

fn overlay_object(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        if let Some(slot) = base.get_mut(&key) {
            overlay(slot, value);
        } else {
            base.insert(key, value);
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
