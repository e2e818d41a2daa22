//! Runner settings derived from the process environment
//!
//! Loaded once at startup into an immutable [`RunnerConfig`] and passed
//! explicitly to whatever needs it. Parsing goes through a lookup
//! function so tests never touch the real environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::AuthMode;
use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerConfig {
    pub base_url: String,
    pub concurrency: usize,
    pub route_limit: Option<usize>,
    pub auth_mode: AuthMode,
    pub auth_cookie: Option<String>,
    pub magic_link_path: Option<String>,
    pub basic_auth_username: Option<String>,
    #[serde(skip_serializing)]
    pub basic_auth_password: Option<String>,
    #[serde(skip_serializing)]
    pub oauth_token: Option<String>,
    pub session_file: Option<PathBuf>,
    pub visual_mode: bool,
    pub slack_webhook: Option<String>,
    pub dev_start: Option<String>,
    pub project_root: PathBuf,
    /// Navigation timeout in milliseconds
    pub timeout_ms: u64,
    pub retries: u32,
    pub skip_auth_gated: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 4,
            route_limit: None,
            auth_mode: AuthMode::None,
            auth_cookie: None,
            magic_link_path: None,
            basic_auth_username: None,
            basic_auth_password: None,
            oauth_token: None,
            session_file: None,
            visual_mode: false,
            slack_webhook: None,
            dev_start: None,
            project_root: PathBuf::from("."),
            timeout_ms: 30_000,
            retries: 2,
            skip_auth_gated: false,
        }
    }
}

impl RunnerConfig {
    /// Read the process environment
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::from_lookup(|key| std::env::var(key).ok(), cwd)
    }

    /// Build from an arbitrary key lookup; `cwd` is the fallback project root.
    pub fn from_lookup<F>(lookup: F, cwd: PathBuf) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset, the way shells usually pass them
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let concurrency = match get("SMOKE_CONCURRENCY") {
            Some(raw) => parse_number::<usize>("SMOKE_CONCURRENCY", &raw)?,
            None => defaults.concurrency,
        };
        if concurrency == 0 {
            return Err(Error::InvalidConfig("SMOKE_CONCURRENCY must be at least 1".to_string()));
        }

        Ok(Self {
            base_url: get("BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            concurrency,
            route_limit: get("ROUTE_LIMIT")
                .map(|raw| parse_number("ROUTE_LIMIT", &raw))
                .transpose()?,
            auth_mode: match get("AUTH_MODE") {
                Some(raw) => raw.parse()?,
                None => AuthMode::None,
            },
            auth_cookie: get("AUTH_COOKIE"),
            magic_link_path: get("MAGIC_LINK_PATH"),
            basic_auth_username: get("BASIC_AUTH_USERNAME"),
            basic_auth_password: get("BASIC_AUTH_PASSWORD"),
            oauth_token: get("OAUTH_TOKEN"),
            session_file: get("SESSION_FILE").map(PathBuf::from),
            visual_mode: get("VISUAL").map(|v| is_truthy(&v)).unwrap_or(false),
            slack_webhook: get("SMOKE_SLACK_WEBHOOK"),
            dev_start: get("DEV_START"),
            project_root: get("PROJECT_ROOT").map(PathBuf::from).unwrap_or(cwd),
            timeout_ms: match get("TIMEOUT") {
                Some(raw) => parse_number("TIMEOUT", &raw)?,
                None => defaults.timeout_ms,
            },
            retries: match get("RETRIES") {
                Some(raw) => parse_number("RETRIES", &raw)?,
                None => defaults.retries,
            },
            skip_auth_gated: get("SKIP_AUTH_GATED").map(|v| is_truthy(&v)).unwrap_or(false),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Absolute URL for a route path
    pub fn url_for(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.project_root.join(".cache")
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.cache_dir().join("evidence")
    }

    /// Generated route list consumed by other tooling
    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir().join("routes").join("generated.json")
    }

    /// Stored browser session, defaulting to `.cache/auth/session.json`
    pub fn session_path(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| self.cache_dir().join("auth").join("session.json"))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<RunnerConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|key| env.get(key).cloned(), PathBuf::from("/work"))
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.route_limit, None);
        assert_eq!(config.auth_mode, AuthMode::None);
        assert_eq!(config.project_root, PathBuf::from("/work"));
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.retries, 2);
        assert!(!config.visual_mode);
    }

    #[test]
    fn test_reads_all_overrides() {
        let config = from_pairs(&[
            ("BASE_URL", "https://staging.example.com/"),
            ("SMOKE_CONCURRENCY", "8"),
            ("ROUTE_LIMIT", "3"),
            ("AUTH_MODE", "cookie"),
            ("AUTH_COOKIE", "sid=123"),
            ("PROJECT_ROOT", "/srv/app"),
            ("TIMEOUT", "5000"),
            ("RETRIES", "0"),
        ])
        .unwrap();

        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.route_limit, Some(3));
        assert_eq!(config.auth_mode, AuthMode::Cookie);
        assert_eq!(config.auth_cookie.as_deref(), Some("sid=123"));
        assert_eq!(config.project_root, PathBuf::from("/srv/app"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.retries, 0);
        assert_eq!(config.url_for("/items/42"), "https://staging.example.com/items/42");
    }

    #[test_case("1", true ; "one")]
    #[test_case("true", true ; "literal true")]
    #[test_case("yes", false ; "yes is not accepted")]
    #[test_case("0", false ; "zero")]
    fn test_visual_flag(raw: &str, expected: bool) {
        assert_eq!(from_pairs(&[("VISUAL", raw)]).unwrap().visual_mode, expected);
    }

    #[test_case("SMOKE_CONCURRENCY", "four" ; "non numeric concurrency")]
    #[test_case("SMOKE_CONCURRENCY", "0" ; "zero concurrency")]
    #[test_case("TIMEOUT", "-5" ; "negative timeout")]
    #[test_case("AUTH_MODE", "kerberos" ; "unknown auth mode")]
    fn test_malformed_values_rejected(key: &str, value: &str) {
        assert!(matches!(from_pairs(&[(key, value)]), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_session_path_defaults_under_cache() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.session_path(), PathBuf::from("/work/.cache/auth/session.json"));
        assert_eq!(config.evidence_dir(), PathBuf::from("/work/.cache/evidence"));
        assert_eq!(
            config.manifest_path(),
            PathBuf::from("/work/.cache/routes/generated.json")
        );
    }
}
