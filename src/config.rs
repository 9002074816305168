use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    // How many of the newest story ids to resolve
    pub story_limit: usize,
    pub refresh_interval_secs: u64,
    // Upper bound on simultaneous item requests within one batch
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            story_limit: 100,
            refresh_interval_secs: 60,
            max_concurrent_requests: 16,
            request_timeout_secs: 30,
        }
    }
}

// Everything in the config file is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_base_url: Option<String>,
    story_limit: Option<usize>,
    refresh_interval_secs: Option<u64>,
    max_concurrent_requests: Option<usize>,
    request_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = file.story_limit {
            self.story_limit = v;
        }
        if let Some(v) = file.refresh_interval_secs {
            self.refresh_interval_secs = v;
        }
        if let Some(v) = file.max_concurrent_requests {
            self.max_concurrent_requests = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HN_READER_API_BASE") {
            if !v.trim().is_empty() {
                self.api_base_url = v.trim().to_string();
            }
        }
        if let Some(v) = parse_env(&lookup, "HN_READER_STORY_LIMIT") {
            self.story_limit = v;
        }
        if let Some(v) = parse_env(&lookup, "HN_READER_REFRESH_SECS") {
            self.refresh_interval_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "HN_READER_MAX_CONCURRENT") {
            self.max_concurrent_requests = v;
        }
        if let Some(v) = parse_env(&lookup, "HN_READER_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
    }

    // Zero would stall the semaphore or spin the refresh timer
    fn normalize(mut self) -> Self {
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        if self.max_concurrent_requests == 0 {
            tracing::warn!("max_concurrent_requests must be positive, using 1");
            self.max_concurrent_requests = 1;
        }
        if self.refresh_interval_secs == 0 {
            tracing::warn!("refresh_interval_secs must be positive, using 1");
            self.refresh_interval_secs = 1;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = Settings::default().request_timeout_secs;
        }
        self
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

pub fn get_app_data_dir() -> Result<PathBuf> {
    let home_dir = dirs_next::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    Ok(home_dir.join(".hn_reader"))
}

fn read_file_settings(path: &Path) -> Result<Option<FileSettings>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = toml::from_str::<FileSettings>(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(parsed))
}

/// Defaults, then `~/.hn_reader/config.toml`, then `HN_READER_*` variables.
pub fn load_settings() -> Settings {
    let path = match get_app_data_dir() {
        Ok(dir) => Some(dir.join("config.toml")),
        Err(e) => {
            tracing::warn!("no config directory available: {e:#}");
            None
        }
    };

    load_settings_from(path.as_deref(), |key| std::env::var(key).ok())
}

fn load_settings_from<F>(path: Option<&Path>, lookup: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::default();

    if let Some(path) = path {
        match read_file_settings(path) {
            Ok(Some(file)) => {
                tracing::info!(path = %path.display(), "loaded config file");
                settings.apply_file(file);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("using default settings: {e:#}"),
        }
    }

    settings.apply_env(lookup);
    settings.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hn_reader_config_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_without_file_or_env() {
        let settings = load_settings_from(None, env(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.refresh_interval(), Duration::from_secs(60));
        assert_eq!(settings.story_limit, 100);
    }

    #[test]
    fn env_overrides_file() {
        let path = temp_config("layering", "story_limit = 30\nmax_concurrent_requests = 4\n");
        let settings = load_settings_from(
            Some(path.as_path()),
            env(&[("HN_READER_STORY_LIMIT", "10"), ("HN_READER_API_BASE", "http://127.0.0.1:9/v0/")]),
        );

        assert_eq!(settings.story_limit, 10);
        assert_eq!(settings.max_concurrent_requests, 4);
        assert_eq!(settings.api_base_url, "http://127.0.0.1:9/v0");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_config("malformed", "story_limit = \"lots\"");
        let settings = load_settings_from(Some(path.as_path()), env(&[]));
        assert_eq!(settings.story_limit, 100);
    }

    #[test]
    fn bad_env_values_are_ignored_and_zeroes_clamped() {
        let settings = load_settings_from(
            None,
            env(&[
                ("HN_READER_REFRESH_SECS", "soon"),
                ("HN_READER_MAX_CONCURRENT", "0"),
            ]),
        );
        assert_eq!(settings.refresh_interval_secs, 60);
        assert_eq!(settings.max_concurrent_requests, 1);
    }
}
