//! Project configuration file (`.smoke.yml`)
//!
//! The file is optional. When present it supplies route defaults,
//! per-route overrides, auth mode, accessibility rule suppressions, and
//! visual regression settings. It is parsed once into an immutable
//! [`SmokeConfig`] that both engines receive by reference.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{Error, Result};

/// Config file name, relative to the project root
pub const CONFIG_FILE_NAME: &str = ".smoke.yml";

/// Selector checked when a route does not configure `must_exist`
pub const DEFAULT_MUST_EXIST: &str = "main";

/// Per-route behavioural overrides.
///
/// Every field is optional so that [`RouteConfig::merged`] can tell an
/// unset key apart from an explicit value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Selectors that must be visible after navigation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_exist: Option<Vec<String>>,

    /// Fail the route on any console or page error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not_error: Option<bool>,

    /// Interaction steps run after the base checks
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub demo_flow: Option<Vec<DemoStep>>,

    /// Literal values for dynamic segments, keyed by placeholder name
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_sample_params"
    )]
    pub sample_params: Option<BTreeMap<String, String>>,
}

impl RouteConfig {
    /// Shallow merge: keys set on `route` win, unset keys fall back to `defaults`.
    pub fn merged(defaults: &RouteConfig, route: &RouteConfig) -> RouteConfig {
        RouteConfig {
            must_exist: route.must_exist.clone().or_else(|| defaults.must_exist.clone()),
            must_not_error: route.must_not_error.or(defaults.must_not_error),
            demo_flow: route.demo_flow.clone().or_else(|| defaults.demo_flow.clone()),
            sample_params: route
                .sample_params
                .clone()
                .or_else(|| defaults.sample_params.clone()),
        }
    }

    /// Selectors to check, with the implicit `main` when unset
    pub fn must_exist_or_default(&self) -> Vec<String> {
        self.must_exist
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_MUST_EXIST.to_string()])
    }

    /// Whether console/page errors fail the route (default true)
    pub fn must_not_error(&self) -> bool {
        self.must_not_error.unwrap_or(true)
    }

    pub fn demo_flow(&self) -> &[DemoStep] {
        self.demo_flow.as_deref().unwrap_or_default()
    }
}

/// One scripted interaction in a route's demo flow.
///
/// Written in YAML as a single-key mapping:
///
/// ```yaml
/// demo_flow:
///   - click: '[data-testid="new-item"]'
///   - type: { selector: 'input[name="title"]', text: 'Hello' }
///   - expect_text: 'Saved'
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoStep {
    Click(String),
    Type { selector: String, text: String },
    ExpectText(String),
}

/// Authentication modes understood by the browser collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    None,
    Cookie,
    MagicLink,
    Basic,
    OauthToken,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Cookie => "cookie",
            AuthMode::MagicLink => "magic_link",
            AuthMode::Basic => "basic",
            AuthMode::OauthToken => "oauth_token",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" => Ok(AuthMode::None),
            "cookie" => Ok(AuthMode::Cookie),
            "magic_link" => Ok(AuthMode::MagicLink),
            "basic" => Ok(AuthMode::Basic),
            "oauth_token" => Ok(AuthMode::OauthToken),
            other => Err(Error::InvalidConfig(format!("unknown auth mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub magic_link_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxeSection {
    /// Rule ids to disable during the accessibility audit
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSection {
    #[serde(default)]
    pub enabled: bool,

    /// Allowed differing pixels, in percent
    #[serde(default = "default_visual_threshold")]
    pub threshold: f64,
}

fn default_visual_threshold() -> f64 {
    0.2
}

impl Default for VisualSection {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_visual_threshold(),
        }
    }
}

/// Parsed `.smoke.yml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmokeConfig {
    #[serde(default)]
    pub defaults: RouteConfig,

    #[serde(default)]
    pub routes: RouteOverrides,

    #[serde(default)]
    pub auth: Option<AuthSection>,

    #[serde(default)]
    pub axe: AxeSection,

    #[serde(default)]
    pub visual: VisualSection,
}

impl SmokeConfig {
    /// Load `.smoke.yml` from `project_root`. A missing file yields the empty config.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path_in(project_root);
        if !path.exists() {
            debug!("No {} in {}, using empty config", CONFIG_FILE_NAME, project_root.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content, &path)
    }

    /// Parse config text; `origin` is only used in error messages.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let parsed: Option<Self> = serde_yaml::from_str(content).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        Ok(parsed.unwrap_or_default())
    }

    pub fn path_in(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE_NAME)
    }

    /// Resolved config for a route key: defaults merged under the route's own entry
    pub fn resolve(&self, route: &str) -> RouteConfig {
        match self.routes.get(route) {
            Some(specific) => RouteConfig::merged(&self.defaults, specific),
            None => RouteConfig::merged(&self.defaults, &RouteConfig::default()),
        }
    }
}

/// Per-route overrides in the order they are declared in the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOverrides(Vec<(String, RouteConfig)>);

impl RouteOverrides {
    pub fn get(&self, route: &str) -> Option<&RouteConfig> {
        self.0.iter().find(|(key, _)| key == route).map(|(_, config)| config)
    }

    /// Replace an existing entry in place, or append a new one
    pub fn insert(&mut self, route: String, config: RouteConfig) -> Option<RouteConfig> {
        match self.0.iter_mut().find(|(key, _)| *key == route) {
            Some((_, slot)) => Some(std::mem::replace(slot, config)),
            None => {
                self.0.push((route, config));
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, RouteConfig)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteOverrides {
    type Item = &'a (String, RouteConfig);
    type IntoIter = std::slice::Iter<'a, (String, RouteConfig)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for RouteOverrides {
    type Item = (String, RouteConfig);
    type IntoIter = std::vec::IntoIter<(String, RouteConfig)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, RouteConfig)> for RouteOverrides {
    fn from_iter<I: IntoIterator<Item = (String, RouteConfig)>>(iter: I) -> Self {
        let mut routes = RouteOverrides::default();
        for (route, config) in iter {
            routes.insert(route, config);
        }
        routes
    }
}

impl Serialize for RouteOverrides {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(route, config)| (route, config)))
    }
}

/// Read through `serde_yaml::Mapping`, which keeps file order. A key with
/// an empty body (`/about:`) means "declared, no overrides".
impl<'de> Deserialize<'de> for RouteOverrides {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        let raw: Option<serde_yaml::Mapping> = Option::deserialize(deserializer)?;
        let mut routes = RouteOverrides::default();
        for (key, body) in raw.unwrap_or_default() {
            let route = match key {
                serde_yaml::Value::String(route) => route,
                other => {
                    return Err(D::Error::custom(format!("route keys must be strings, got {:?}", other)))
                }
            };
            let config: Option<RouteConfig> = serde_yaml::from_value(body)
                .map_err(|e| D::Error::custom(format!("routes.{}: {}", route, e)))?;
            routes.insert(route, config.unwrap_or_default());
        }
        Ok(routes)
    }
}

/// Sample values may be written as bare numbers or booleans in YAML.
fn de_sample_params<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw: Option<BTreeMap<String, serde_yaml::Value>> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    let mut params = BTreeMap::new();
    for (name, value) in raw {
        let literal = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            other => {
                return Err(D::Error::custom(format!(
                    "sample_params.{} must be a scalar, got {:?}",
                    name, other
                )))
            }
        };
        params.insert(name, literal);
    }
    Ok(Some(params))
}
