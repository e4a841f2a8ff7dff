// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_AI_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_AI_MODEL: &str = "llama3.2";
const DEFAULT_AI_TIMEOUT: &str = "30s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub ai: Ai,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            ai: Ai::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub show_help_bar: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            show_help_bar: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ai {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            base_url: Some(DEFAULT_AI_BASE_URL.to_owned()),
            model: Some(DEFAULT_AI_MODEL.to_owned()),
            api_key: None,
            timeout: Some(DEFAULT_AI_TIMEOUT.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ONTRACK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ONTRACK_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(ontrack_db::APP_NAME);
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
                    "config file {} is missing `version`. Add `version = 1` and keep values under [storage], [ui], and [ai]",
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
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(db_path) = &self.storage.db_path {
            ontrack_db::validate_db_path(db_path)?;
        }

        if let Some(timeout) = &self.ai.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "ai.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => ontrack_db::default_db_path(),
        }
    }

    pub fn show_help_bar(&self) -> bool {
        self.ui.show_help_bar.unwrap_or(true)
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai.enabled.unwrap_or(true)
    }

    pub fn ai_base_url(&self) -> &str {
        self.ai
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_AI_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn ai_model(&self) -> &str {
        self.ai.model.as_deref().unwrap_or(DEFAULT_AI_MODEL)
    }

    /// `None` when unset or blank; local Ollama servers need no key.
    pub fn ai_api_key(&self) -> Option<&str> {
        self.ai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn ai_timeout(&self) -> Result<Duration> {
        parse_duration(self.ai.timeout.as_deref().unwrap_or(DEFAULT_AI_TIMEOUT))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# ontrack config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/ontrack/ontrack.db)\n# db_path = \"/absolute/path/to/ontrack.db\"\n\n[ui]\nshow_help_bar = true\n\n[ai]\nenabled = true\nbase_url = \"{}\"\nmodel = \"{}\"\n# api_key = \"sk-...\"\ntimeout = \"{}\"\n",
            path.display(),
            DEFAULT_AI_BASE_URL,
            DEFAULT_AI_MODEL,
            DEFAULT_AI_TIMEOUT,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}
