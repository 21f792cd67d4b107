// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use eventdesk_app::{DEFAULT_LOGIN_ROUTE, RouteGuard};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_LOG_LEVEL: &str = "warn";
const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            auth: Auth::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub token_path: Option<String>,
    pub login_route: Option<String>,
    pub expiry_skew_secs: Option<i64>,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            token_path: None,
            login_route: Some(DEFAULT_LOGIN_ROUTE.to_owned()),
            expiry_skew_secs: Some(DEFAULT_EXPIRY_SKEW_SECS),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("EVENTDESK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }
        Ok(app_config_dir()?.join("config.toml"))
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
                    "config file {} is not versioned. Add `version = 1` and put values under [storage], [auth], and [log]",
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
            eventdesk_db::validate_db_path(db_path)?;
        }

        if let Some(route) = &self.auth.login_route
            && !route.starts_with('/')
        {
            bail!(
                "auth.login_route in {} must start with '/', got {route:?}",
                path.display()
            );
        }

        if let Some(skew) = self.auth.expiry_skew_secs
            && skew < 0
        {
            bail!(
                "auth.expiry_skew_secs in {} must be non-negative, got {skew}",
                path.display()
            );
        }

        EnvFilter::try_new(self.log_level()).with_context(|| {
            format!(
                "log.level in {} is not a valid filter; use error, warn, info, debug or trace",
                path.display()
            )
        })?;

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => eventdesk_db::default_db_path(),
        }
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.auth.token_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(app_config_dir()?.join("token.json")),
        }
    }

    pub fn route_guard(&self) -> RouteGuard {
        let skew = self
            .auth
            .expiry_skew_secs
            .unwrap_or(DEFAULT_EXPIRY_SKEW_SECS);
        RouteGuard::new(
            self.auth
                .login_route
                .as_deref()
                .unwrap_or(DEFAULT_LOGIN_ROUTE),
            time::Duration::seconds(skew),
        )
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# eventdesk config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/eventdesk/eventdesk.db)\n# db_path = \"/absolute/path/to/eventdesk.db\"\n\n[auth]\n# Optional. Default is token.json next to this file\n# token_path = \"/absolute/path/to/token.json\"\nlogin_route = \"{}\"\nexpiry_skew_secs = {}\n\n[log]\n# RUST_LOG overrides this\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_LOGIN_ROUTE,
            DEFAULT_EXPIRY_SKEW_SECS,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn app_config_dir() -> Result<PathBuf> {
    let config_root = dirs::config_dir().ok_or_else(|| {
        anyhow!("cannot resolve config directory; set EVENTDESK_CONFIG_PATH to the config file")
    })?;
    let app_dir = config_root.join(eventdesk_db::APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create config directory {}", app_dir.display()))?;
    Ok(app_dir)
}
