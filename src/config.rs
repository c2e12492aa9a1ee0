//! Application configuration.
//!
//! Loaded once at startup from a TOML file (see `config/app.toml`) and never
//! mutated afterwards. Secrets are not stored in the file: each section names
//! the environment variable that holds its secret, and the value is resolved
//! through a lookup function so tests can supply their own environment.
//!
//! ```toml
//! [app]
//! name = "Tonka"
//! listen = "0.0.0.0:3000"
//!
//! [gateways]
//! web = ["authenticator", "prevent-route-tampering"]
//! api = ["tokenizer"]
//!
//! [jwt]
//! issuer = "tonka"
//! secret_env = "JWT_SECRET"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Gateway every browser-facing route belongs to by default.
pub const WEB: &str = "web";
/// Gateway every machine-facing route belongs to by default.
pub const API: &str = "api";

// ── Secret ────────────────────────────────────────────────────────────────────

/// A secret string that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub app: AppConfig,
    pub gateways: GatewayConfig,
    pub session: SessionConfig,
    pub jwt: JwtConfig,
    pub route_hash: RouteHashConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub timezone: String,
    pub locale: String,
    pub fallback_locale: String,
    pub listen: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Tonka".into(),
            version: "1.0.0".into(),
            timezone: "UTC".into(),
            locale: "en".into(),
            fallback_locale: "en".into(),
            listen: "0.0.0.0:3000".into(),
        }
    }
}

/// Ordered stage identifiers per gateway.
///
/// `web` and `api` always exist, empty unless configured. Any other key adds
/// a gateway.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct GatewayConfig(BTreeMap<String, Vec<String>>);

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stage list of `gateway`, replacing any previous one.
    pub fn gateway<I, S>(mut self, gateway: &str, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(gateway.to_owned(), stages.into_iter().map(Into::into).collect());
        self
    }

    /// Every gateway with its stage list, `web` and `api` included.
    pub fn gateways(&self) -> BTreeMap<String, Vec<String>> {
        let mut all = self.0.clone();
        for name in [WEB, API] {
            all.entry(name.to_owned()).or_default();
        }
        all
    }

    /// Rejects empty gateway names, blank stage identifiers, and a stage
    /// listed twice in the same gateway.
    pub fn validate(&self) -> Result<(), Error> {
        for (gateway, stages) in &self.0 {
            if gateway.trim().is_empty() {
                return Err(Error::Config("gateway name must not be empty".into()));
            }
            let mut seen = HashSet::new();
            for stage in stages {
                if stage.trim().is_empty() {
                    return Err(Error::Config(format!("gateway `{gateway}` lists a blank stage")));
                }
                if !seen.insert(stage.as_str()) {
                    return Err(Error::Config(format!(
                        "gateway `{gateway}` lists stage `{stage}` twice"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub cookie: String,
    pub lifetime_secs: u64,
    /// Where offline sessions are sent.
    pub login_path: String,
    /// Route file the authenticator pulls in at boot.
    pub routes: String,
}

impl SessionConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie: "session_id".into(),
            lifetime_secs: 2 * 60 * 60,
            login_path: "/login".into(),
            routes: "auth".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: Option<String>,
    pub leeway_secs: u64,
    pub secret_env: String,
    /// Route file the tokenizer pulls in at boot.
    pub routes: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "tonka".into(),
            audience: None,
            leeway_secs: 30,
            secret_env: "JWT_SECRET".into(),
            routes: "auth".into(),
        }
    }
}

impl JwtConfig {
    pub fn secret(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Secret, Error> {
        resolve_secret(&self.secret_env, lookup)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteHashConfig {
    /// Query parameter carrying the hash of a signed link.
    pub query_key: String,
    /// Header consulted when the query parameter is absent.
    pub header: String,
    /// Reject requests that carry no hash at all.
    pub enforce: bool,
    pub secret_env: String,
}

impl Default for RouteHashConfig {
    fn default() -> Self {
        Self {
            query_key: "hash".into(),
            header: "x-route-hash".into(),
            enforce: false,
            secret_env: "APP_KEY".into(),
        }
    }
}

impl RouteHashConfig {
    pub fn secret(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Secret, Error> {
        resolve_secret(&self.secret_env, lookup)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Config {
    pub fn from_toml(src: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(src).map_err(|e| Error::Config(e.to_string()))?;
        config.gateways.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&src)
    }
}

/// Reads secrets from the process environment.
pub fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn resolve_secret(var: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Secret, Error> {
    match lookup(var) {
        Some(v) if !v.is_empty() => Ok(Secret::new(v)),
        _ => Err(Error::Config(format!("environment variable `{var}` is not set"))),
    }
}
