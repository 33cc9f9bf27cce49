//! Settings resolution for the catalog client.
//!
//! Values are looked up by setting name (`access_key`, `locale`, ...) through a
//! [`ConfigProvider`]. The environment is consulted first, then an optional JSON
//! settings file, mirroring how operators usually override deployed settings.
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::error::{AmazonError, Result};
use crate::util::env::{env_opt, log_snapshot};

pub const ACCESS_KEY: &str = "access_key";
pub const ACCESS_SECRET: &str = "access_secret";
pub const ASSOCIATES_ID: &str = "associates_id";
pub const LOCALE: &str = "locale";
pub const ENDPOINT: &str = "endpoint";
pub const TIMEOUT_SECS: &str = "timeout_secs";
pub const MAX_OPS_PER_WINDOW: &str = "max_ops_per_window";
pub const WINDOW_SECS: &str = "window_secs";
pub const DATABASE_URL: &str = "database_url";

const ALL_KEYS: [&str; 9] = [
    ACCESS_KEY,
    ACCESS_SECRET,
    ASSOCIATES_ID,
    LOCALE,
    ENDPOINT,
    TIMEOUT_SECS,
    MAX_OPS_PER_WINDOW,
    WINDOW_SECS,
    DATABASE_URL,
];

/// Source of named settings.
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads `AMAZON_<KEY>` from the process environment (after loading `.env`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl EnvConfig {
    pub fn var_name(key: &str) -> String {
        format!("AMAZON_{}", key.to_ascii_uppercase())
    }
}

impl ConfigProvider for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        env_opt(&Self::var_name(key))
    }
}

/// Fixed key/value settings, e.g. from an embedding application or tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

impl ConfigProvider for StaticConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// JSON object of settings, e.g. `{"access_key": "...", "locale": "co.uk"}`.
#[derive(Debug, Clone, Default)]
pub struct SettingsFile {
    inner: StaticConfig,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AmazonError::Configuration(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AmazonError::Configuration(format!("invalid settings json: {e}")))?;
        let Some(obj) = value.as_object() else {
            return Err(AmazonError::Configuration(
                "settings file must contain a JSON object".into(),
            ));
        };

        let mut inner = StaticConfig::new();
        for (k, v) in obj {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            inner = inner.with(k, text);
        }
        Ok(Self { inner })
    }
}

impl ConfigProvider for SettingsFile {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }
}

/// First provider that yields a non-blank value wins.
#[derive(Default)]
pub struct LayeredConfig {
    layers: Vec<Box<dyn ConfigProvider>>,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.layers.push(Box::new(provider));
        self
    }

    /// Environment first, then the settings file if one is given.
    pub fn standard(settings: Option<SettingsFile>) -> Self {
        let mut cfg = Self::new().layer(EnvConfig);
        if let Some(file) = settings {
            cfg = cfg.layer(file);
        }
        cfg
    }

    pub fn log_snapshot(&self, title: &str) {
        let pairs: Vec<(&str, Option<String>)> =
            ALL_KEYS.iter().map(|k| (*k, self.get(k))).collect();
        log_snapshot(title, &pairs);
    }
}

impl ConfigProvider for LayeredConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }
}

/// Marketplace the requests are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    De,
    #[default]
    Com,
    CoUk,
    Ca,
    Fr,
    CoJp,
    It,
    Cn,
    Es,
    In,
}

impl Locale {
    pub fn tld(self) -> &'static str {
        match self {
            Locale::De => "de",
            Locale::Com => "com",
            Locale::CoUk => "co.uk",
            Locale::Ca => "ca",
            Locale::Fr => "fr",
            Locale::CoJp => "co.jp",
            Locale::It => "it",
            Locale::Cn => "cn",
            Locale::Es => "es",
            Locale::In => "in",
        }
    }

    pub fn endpoint(self) -> String {
        format!("https://webservices.amazon.{}/onca/xml", self.tld())
    }
}

impl FromStr for Locale {
    type Err = AmazonError;

    fn from_str(s: &str) -> Result<Self> {
        let locale = match s.trim().to_ascii_lowercase().as_str() {
            "de" => Locale::De,
            "com" | "us" => Locale::Com,
            "co.uk" | "uk" => Locale::CoUk,
            "ca" => Locale::Ca,
            "fr" => Locale::Fr,
            "co.jp" | "jp" => Locale::CoJp,
            "it" => Locale::It,
            "cn" => Locale::Cn,
            "es" => Locale::Es,
            "in" => Locale::In,
            other => {
                return Err(AmazonError::Configuration(format!(
                    "unsupported locale {other:?}"
                )))
            }
        };
        Ok(locale)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tld())
    }
}

/// Access key and secret used to sign requests.
#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub access_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("access_secret", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn from_config(config: &dyn ConfigProvider) -> Result<Self> {
        let access_key = config.get(ACCESS_KEY).ok_or_else(|| {
            AmazonError::Configuration(format!(
                "Amazon access key ({} or settings `{ACCESS_KEY}`)",
                EnvConfig::var_name(ACCESS_KEY)
            ))
        })?;
        let access_secret = config.get(ACCESS_SECRET).ok_or_else(|| {
            AmazonError::Configuration(format!(
                "Amazon access secret ({} or settings `{ACCESS_SECRET}`)",
                EnvConfig::var_name(ACCESS_SECRET)
            ))
        })?;
        Ok(Self {
            access_key: access_key.trim().to_string(),
            access_secret: access_secret.trim().to_string(),
        })
    }
}

/// Everything the request client needs, resolved up front.
#[derive(Debug, Clone)]
pub struct AmazonSettings {
    pub credentials: Credentials,
    pub associates_id: String,
    pub locale: Locale,
    /// Full request URL; defaults to the locale's endpoint.
    pub endpoint: String,
    pub timeout: Duration,
    pub max_ops_per_window: u32,
    pub window_secs: u64,
}

impl AmazonSettings {
    pub fn from_config(config: &dyn ConfigProvider) -> Result<Self> {
        let credentials = Credentials::from_config(config)?;
        let associates_id = config.get(ASSOCIATES_ID).ok_or_else(|| {
            AmazonError::Configuration(format!(
                "Amazon associates id ({} or settings `{ASSOCIATES_ID}`)",
                EnvConfig::var_name(ASSOCIATES_ID)
            ))
        })?;
        let locale = match config.get(LOCALE) {
            Some(raw) => raw.parse::<Locale>()?,
            None => Locale::default(),
        };
        let endpoint = config.get(ENDPOINT).unwrap_or_else(|| locale.endpoint());

        Ok(Self {
            credentials,
            associates_id: associates_id.trim().to_string(),
            locale,
            endpoint,
            timeout: Duration::from_secs(parse_or(config, TIMEOUT_SECS, 15)),
            max_ops_per_window: parse_or(config, MAX_OPS_PER_WINDOW, 1),
            window_secs: parse_or(config, WINDOW_SECS, 1),
        })
    }
}

fn parse_or<T: FromStr>(config: &dyn ConfigProvider, key: &str, default: T) -> T {
    match config.get(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable setting");
                default
            }
        },
        None => default,
    }
}
