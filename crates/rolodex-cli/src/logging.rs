// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Builds the file-backed subscriber. The terminal belongs to the TUI, so
/// nothing is ever written to stdout or stderr.
fn file_subscriber(
    level: &str,
    log_path: &Path,
) -> Result<impl tracing::Subscriber + Send + Sync + 'static> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .finish())
}

pub fn init(level: &str, log_path: &Path) -> Result<()> {
    let subscriber = file_subscriber(level, log_path)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;
    tracing::info!(path = %log_path.display(), level, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::file_subscriber;
    use anyhow::Result;

    #[test]
    fn events_land_in_the_log_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("rolodex.log");
        let subscriber = file_subscriber("info", &path)?;

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(collection = "clients-data", "error fetching clients");
        });

        let written = std::fs::read_to_string(&path)?;
        assert!(written.contains("error fetching clients"));
        assert!(written.contains("collection=\"clients-data\""));
        assert!(!written.contains('\u{1b}'), "log file must not contain ANSI escapes");
        Ok(())
    }

    #[test]
    fn log_file_is_appended_not_truncated() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("rolodex.log");
        std::fs::write(&path, "earlier run\n")?;

        let subscriber = file_subscriber("info", &path)?;
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("later run");
        });

        let written = std::fs::read_to_string(&path)?;
        assert!(written.starts_with("earlier run\n"));
        assert!(written.contains("later run"));
        Ok(())
    }
}
