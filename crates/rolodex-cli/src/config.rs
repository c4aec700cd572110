// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_POLL_INTERVAL: &str = "500ms";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            stream: Stream::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub collection: Option<String>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: None,
            collection: Some(rolodex_db::CLIENTS_COLLECTION.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    pub poll_interval: Option<String>,
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            poll_interval: Some(DEFAULT_POLL_INTERVAL.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ROLODEX_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ROLODEX_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(rolodex_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [storage], [stream], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            rolodex_db::validate_db_path(db_path)?;
        }

        if let Some(collection) = &self.storage.collection
            && collection.trim().is_empty()
        {
            bail!(
                "storage.collection in {} must not be empty",
                path.display()
            );
        }

        if let Some(interval) = &self.stream.poll_interval {
            let parsed = parse_duration(interval)?;
            if parsed.is_zero() {
                bail!(
                    "stream.poll_interval in {} must be positive, got {}",
                    path.display(),
                    interval
                );
            }
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            bail!(
                "log.level in {} must be one of {}, got {:?}",
                path.display(),
                LOG_LEVELS.join(", "),
                level
            );
        }

        if let Some(file) = &self.log.file
            && file.trim().is_empty()
        {
            bail!("log.file in {} must not be empty", path.display());
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => rolodex_db::default_db_path(),
        }
    }

    pub fn collection(&self) -> &str {
        self.storage
            .collection
            .as_deref()
            .unwrap_or(rolodex_db::CLIENTS_COLLECTION)
            .trim()
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration(
            self.stream
                .poll_interval
                .as_deref()
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        )
    }

    pub fn log_level(&self) -> String {
        self.log
            .level
            .as_deref()
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_ascii_lowercase()
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }

        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to a writable path")
        })?;
        let app_dir = data_root.join(rolodex_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create log directory {}", app_dir.display()))?;
        Ok(app_dir.join("rolodex.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# rolodex config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/rolodex/rolodex.db)\n# db_path = \"/absolute/path/to/rolodex.db\"\ncollection = \"{}\"\n\n[stream]\n# How often the store is checked for changes: <N>ms, <N>s or <N>m\npoll_interval = \"{}\"\n\n[log]\n# trace, debug, info, warn, error or off. RUST_LOG overrides this.\nlevel = \"{}\"\n# file = \"/absolute/path/to/rolodex.log\"\n",
            path.display(),
            rolodex_db::CLIENTS_COLLECTION,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid poll duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid poll duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid poll duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 2s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.collection(), "clients-data");
        assert_eq!(config.poll_interval()?, Duration::from_millis(500));
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[stream]\npoll_interval = \"1s\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[storage], [stream], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\ncollection = \"clients-archive\"\n[stream]\npoll_interval = \"2s\"\n[log]\nlevel = \"DEBUG\"\nfile = \"/tmp/rolodex-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.collection(), "clients-archive");
        assert_eq!(config.poll_interval()?, Duration::from_secs(2));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/rolodex-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROLODEX_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROLODEX_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ROLODEX_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("config.toml"));
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROLODEX_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROLODEX_DB_PATH");
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROLODEX_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROLODEX_DB_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\ndb_path = \"https://evil.example/rolodex.db\"\n",
        )?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        let message = error.to_string();
        assert!(
            message.contains("looks like a URI") || message.contains("filesystem path"),
            "unexpected message: {message}"
        );
        Ok(())
    }

    #[test]
    fn blank_collection_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[storage]\ncollection = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank collection should fail");
        assert!(error.to_string().contains("storage.collection"));
        Ok(())
    }

    #[test]
    fn poll_interval_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("250ms")?, Duration::from_millis(250));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn poll_interval_rejects_invalid_duration() {
        let error = parse_duration("soon").expect_err("invalid duration should fail");
        let message = error.to_string();
        assert!(
            message.contains("invalid duration") || message.contains("invalid poll duration"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn zero_poll_interval_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[stream]\npoll_interval = \"0ms\"\n")?;
        let error = Config::load(&path).expect_err("zero interval should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"chatty\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        let message = error.to_string();
        assert!(message.contains("log.level"));
        assert!(message.contains("chatty"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[storage]"));
        assert!(example.contains("[stream]"));
        assert!(example.contains("[log]"));

        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.collection(), "clients-data");
        assert_eq!(config.poll_interval()?, Duration::from_millis(500));
        Ok(())
    }
}
