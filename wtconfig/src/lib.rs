//! # WatchTracks Configuration Module
//!
//! This module provides configuration management for WatchTracks, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use wtconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let interval = config.get_check_interval()?;
//! let db_path = config.get_storage_path()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("watchtracks.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load WatchTracks configuration"));
}

const ENV_CONFIG_DIR: &str = "WATCHTRACKS_CONFIG";
const ENV_PREFIX: &str = "WATCHTRACKS_CONFIG__";

// Deployment-style environment variables honored before the YAML tree
const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
const ENV_DEFAULT_PLAYLIST: &str = "PLAYLIST_ID";

// Default values for configuration
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 120;
const DEFAULT_SEND_SPACING_MS: u64 = 500;
const DEFAULT_CYCLE_DEADLINE_SECS: u64 = 90;
const DEFAULT_ARTWORK_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORAGE_DIR: &str = "state";
const STORAGE_DB_FILE: &str = "watchtracks.db";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path)? {
                Value::Number(n) if n.is_u64() => Ok(n.as_u64().unwrap()),
                Value::Number(n) if n.is_i64() => Ok(n.as_i64().unwrap().max(0) as u64),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            let n = Number::from(value);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Configuration manager for WatchTracks
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// # Examples
///
/// ```no_run
/// use wtconfig::get_config;
///
/// let config = get_config();
/// let port = config.get_http_port();
/// println!("Health endpoint port: {}", port);
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".watchtracks").exists() {
            return ".watchtracks".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".watchtracks");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".watchtracks".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        // Create if doesn't exist
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        // Verify it's a directory
        if !path.is_dir() {
            return Err(anyhow!("Configured path is not a directory"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        // Test read permission
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `WATCHTRACKS_CONFIG` environment variable
    /// 3. `.watchtracks` in the current directory
    /// 4. `.watchtracks` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for
    /// read/write permissions.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created or validated
    pub fn config_dir(directory: &str) -> String {
        let dir_path = Self::find_config_dir(directory);
        let path = Path::new(&dir_path);

        Self::validate_config_dir(path).expect("Failed to validate the configuration directory");

        dir_path
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing the config.yaml file, or empty to use defaults
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the loaded `Config` or an error
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Merge the external file over the embedded defaults
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "http_port"]`)
    /// * `value` - The YAML value to set
    ///
    /// # Returns
    ///
    /// Returns a `Result` indicating success or failure
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value.clone())?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key.clone());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["tracker", "check_interval"]`)
    ///
    /// # Returns
    ///
    /// Returns a `Result` containing the YAML value or an error if the path doesn't exist
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        let new_key = Value::String(s.to_lowercase());
                        let new_val = Self::lower_keys_value(v);
                        new_map.insert(new_key, new_val);
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Resolves a relative or absolute path and creates the directory if needed
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<String> {
        let path = Path::new(dir_path);

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            // Relative paths are resolved against the config directory
            Path::new(&self.config_dir).join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory = %absolute_path.display(), "Created storage directory");
        }

        Ok(absolute_path.to_string_lossy().to_string())
    }

    /// Retrieves a directory managed by the configuration
    ///
    /// The directory may be absolute or relative to the configuration
    /// directory, and is created if it doesn't exist.
    ///
    /// # Arguments
    ///
    /// * `path` - Path in the configuration tree (e.g., `&["tracker", "storage", "directory"]`)
    /// * `default` - Default directory name when not configured
    ///
    /// # Returns
    ///
    /// The absolute path of the directory, created if it didn't exist
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    /// Defines a directory managed by the configuration
    ///
    /// # Arguments
    ///
    /// * `path` - Path in the configuration tree
    /// * `directory` - Directory path (absolute or relative to the config dir)
    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    // ===== Typed accessors =====

    /// Gets the Telegram bot token
    ///
    /// The `BOT_TOKEN` environment variable wins over the configuration
    /// tree, so deployments never have to write the secret to disk.
    ///
    /// # Returns
    ///
    /// The token, or an error when neither source provides one
    pub fn get_bot_token(&self) -> Result<String> {
        if let Ok(token) = env::var(ENV_BOT_TOKEN) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
        match self.get_value(&["telegram", "bot_token"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            _ => Err(anyhow!(
                "No bot token configured (set {} or telegram.bot_token)",
                ENV_BOT_TOKEN
            )),
        }
    }

    /// Gets the default playlist identifier watched for subscribers
    /// without a personal override
    ///
    /// The `PLAYLIST_ID` environment variable wins over the configuration
    /// tree.
    pub fn get_default_playlist(&self) -> Result<String> {
        if let Ok(id) = env::var(ENV_DEFAULT_PLAYLIST) {
            if !id.trim().is_empty() {
                return Ok(id);
            }
        }
        match self.get_value(&["tracker", "default_playlist"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            _ => Err(anyhow!(
                "No default playlist configured (set {} or tracker.default_playlist)",
                ENV_DEFAULT_PLAYLIST
            )),
        }
    }

    /// Sets the default playlist identifier
    pub fn set_default_playlist(&self, playlist_id: String) -> Result<()> {
        self.set_value(&["tracker", "default_playlist"], Value::String(playlist_id))
    }

    /// Gets the path of the SQLite state database
    ///
    /// The parent directory is taken from `tracker.storage.directory`
    /// (relative paths resolve against the config dir) and created on
    /// demand.
    pub fn get_storage_path(&self) -> Result<String> {
        let dir = self.get_managed_dir(&["tracker", "storage", "directory"], DEFAULT_STORAGE_DIR)?;
        Ok(Path::new(&dir)
            .join(STORAGE_DB_FILE)
            .to_string_lossy()
            .to_string())
    }

    /// Gets the optional browser-export JSON file used to authenticate
    /// against YouTube Music
    pub fn get_ytmusic_auth_file(&self) -> Option<String> {
        match self.get_value(&["ytmusic", "auth_file"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    /// Gets the HTTP port for the health endpoint
    ///
    /// Returns the configured port, or the default port (8080) if not
    /// configured or invalid.
    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) if n.is_i64() => match u16::try_from(n.as_i64().unwrap()) {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        "HTTP port {} out of range, using default {}",
                        n,
                        DEFAULT_HTTP_PORT
                    );
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(Value::String(s)) => match s.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        "Invalid HTTP port '{}', using default {}",
                        s,
                        DEFAULT_HTTP_PORT
                    );
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(_) => {
                tracing::warn!(
                    "HTTP port not a number or string, using default {}",
                    DEFAULT_HTTP_PORT
                );
                DEFAULT_HTTP_PORT
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to get HTTP port: {}, using default {}",
                    err,
                    DEFAULT_HTTP_PORT
                );
                DEFAULT_HTTP_PORT
            }
        }
    }

    /// Sets the HTTP port for the health endpoint
    pub fn set_http_port(&self, port: u16) -> Result<()> {
        let n = Number::from(port);
        self.set_value(&["host", "http_port"], Value::Number(n))
    }

    impl_u64_config!(
        get_check_interval,
        set_check_interval,
        &["tracker", "check_interval"],
        DEFAULT_CHECK_INTERVAL_SECS
    );

    impl_u64_config!(
        get_cycle_deadline,
        set_cycle_deadline,
        &["tracker", "cycle_deadline"],
        DEFAULT_CYCLE_DEADLINE_SECS
    );

    impl_u64_config!(
        get_artwork_timeout,
        set_artwork_timeout,
        &["tracker", "artwork_timeout"],
        DEFAULT_ARTWORK_TIMEOUT_SECS
    );

    impl_u64_config!(
        get_send_spacing_ms,
        set_send_spacing_ms,
        &["telegram", "send_spacing_ms"],
        DEFAULT_SEND_SPACING_MS
    );
}

/// Returns the global configuration instance
///
/// This function provides access to the singleton configuration instance,
/// which is lazily loaded on first access.
///
/// # Returns
///
/// An `Arc<Config>` pointing to the global configuration
///
/// # Examples
///
/// ```no_run
/// use wtconfig::get_config;
///
/// let config = get_config();
/// let interval = config.get_check_interval();
/// ```
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// This function recursively merges two YAML value trees:
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
///
/// # Arguments
///
/// * `default` - The default configuration to merge into (modified in place)
/// * `external` - The external configuration to merge from
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // Scalars and sequences are replaced wholesale
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(matches!(value, Value::Mapping(_)));
    }

    #[test]
    fn test_merge_yaml_overrides_scalars() {
        let mut default: Value = serde_yaml::from_str("tracker:\n  check_interval: 120\n").unwrap();
        let external: Value = serde_yaml::from_str("tracker:\n  check_interval: 60\n").unwrap();
        merge_yaml(&mut default, &external);

        let tracker = default.get("tracker").unwrap();
        assert_eq!(tracker.get("check_interval").unwrap().as_u64(), Some(60));
    }

    #[test]
    fn test_merge_yaml_keeps_missing_keys() {
        let mut default: Value =
            serde_yaml::from_str("telegram:\n  bot_token: \"\"\n  send_spacing_ms: 500\n").unwrap();
        let external: Value = serde_yaml::from_str("telegram:\n  bot_token: \"abc\"\n").unwrap();
        merge_yaml(&mut default, &external);

        let telegram = default.get("telegram").unwrap();
        assert_eq!(
            telegram.get("bot_token").unwrap().as_str(),
            Some("abc"),
            "external value should win"
        );
        assert_eq!(
            telegram.get("send_spacing_ms").unwrap().as_u64(),
            Some(500),
            "default value should survive the merge"
        );
    }

    #[test]
    fn test_lower_keys_value() {
        let value: Value = serde_yaml::from_str("Tracker:\n  Check_Interval: 60\n").unwrap();
        let lowered = Config::lower_keys_value(value);

        assert!(lowered.get("tracker").is_some());
        assert!(lowered.get("tracker").unwrap().get("check_interval").is_some());
    }

    #[test]
    fn test_convert_env_value() {
        assert_eq!(Config::convert_env_value("60").as_u64(), Some(60));
        assert_eq!(Config::convert_env_value("true").as_bool(), Some(true));
        assert_eq!(
            Config::convert_env_value("PLabcdef").as_str(),
            Some("PLabcdef")
        );
    }

    #[test]
    fn test_find_config_dir_prefers_parameter() {
        assert_eq!(Config::find_config_dir("/tmp/wt-test-config"), "/tmp/wt-test-config");
    }

    fn config_with(yaml: &str) -> Config {
        Config {
            config_dir: String::new(),
            path: String::new(),
            data: Mutex::new(serde_yaml::from_str(yaml).unwrap()),
        }
    }

    #[test]
    fn test_get_http_port() {
        let config = config_with("host:\n  http_port: 9090\n");
        assert_eq!(config.get_http_port(), 9090);
    }

    #[test]
    fn test_get_http_port_rejects_out_of_range() {
        let config = config_with("host:\n  http_port: 70000\n");
        assert_eq!(config.get_http_port(), DEFAULT_HTTP_PORT);

        let config = config_with("host:\n  http_port: -1\n");
        assert_eq!(config.get_http_port(), DEFAULT_HTTP_PORT);
    }

    #[test]
    fn test_set_and_get_value_internal() {
        let mut data: Value = serde_yaml::from_str("a:\n  b: 1\n").unwrap();
        Config::set_value_internal(&mut data, &["a", "c"], Value::Number(Number::from(2)))
            .unwrap();

        let got = Config::get_value_internal(&data, &["a", "c"]).unwrap();
        assert_eq!(got.as_u64(), Some(2));

        let missing = Config::get_value_internal(&data, &["a", "missing"]);
        assert!(missing.is_err());
    }
}
