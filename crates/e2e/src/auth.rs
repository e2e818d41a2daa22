//! Browser authentication setup
//!
//! Resolves the runner settings and the `.smoke.yml` `auth` section into a
//! single [`AuthSetup`] that the browser driver applies to every context.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use autosmoke_common::{AuthMode, AuthSection, RunnerConfig};

use crate::error::{E2eError, E2eResult};

/// Paths that mark a redirect to a login page
pub const AUTH_PATHS: [&str; 4] = ["/login", "/signin", "/auth", "/authenticate"];

/// A cookie in the shape Playwright's `addCookies` expects
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: String,
}

impl SessionCookie {
    /// Parse `name=value` for the host of `base_url`
    pub fn parse(raw: &str, base_url: &str) -> E2eResult<Self> {
        let (name, value) = raw
            .split_once('=')
            .map(|(n, v)| (n.trim(), v.trim()))
            .filter(|(n, v)| !n.is_empty() && !v.is_empty())
            .ok_or_else(|| E2eError::Auth("Invalid cookie format. Expected: name=value".to_string()))?;

        let url = reqwest::Url::parse(base_url)
            .map_err(|e| E2eError::Auth(format!("invalid base URL '{}': {}", base_url, e)))?;
        let domain = url
            .host_str()
            .ok_or_else(|| E2eError::Auth(format!("base URL '{}' has no host", base_url)))?;

        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            http_only: true,
            secure: url.scheme() == "https",
            same_site: "Lax".to_string(),
        })
    }
}

/// What the browser does before navigating to a route
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AuthSetup {
    #[default]
    None,
    Cookie {
        cookie: SessionCookie,
    },
    /// Visit the link once, then save the storage state
    MagicLink {
        url: String,
        save_session_to: PathBuf,
    },
    Basic {
        username: String,
        password: String,
    },
    OauthToken {
        token: String,
    },
}

impl AuthSetup {
    /// Resolve the effective setup. A non-`none` mode in `.smoke.yml` wins
    /// over `AUTH_MODE`; secrets always come from the environment first.
    pub fn resolve(settings: &RunnerConfig, section: Option<&AuthSection>) -> E2eResult<Self> {
        let mode = section
            .map(|s| s.mode)
            .filter(|m| *m != AuthMode::None)
            .unwrap_or(settings.auth_mode);

        let setup = match mode {
            AuthMode::None => AuthSetup::None,
            AuthMode::Cookie => {
                let raw = settings
                    .auth_cookie
                    .clone()
                    .or_else(|| section.and_then(|s| s.cookie.clone()));
                match raw {
                    Some(raw) => AuthSetup::Cookie {
                        cookie: SessionCookie::parse(&raw, &settings.base_url)?,
                    },
                    None => {
                        warn!("Cookie auth enabled but no AUTH_COOKIE provided");
                        AuthSetup::None
                    }
                }
            }
            AuthMode::MagicLink => {
                let path = settings
                    .magic_link_path
                    .clone()
                    .or_else(|| section.and_then(|s| s.magic_link_path.clone()))
                    .ok_or_else(|| {
                        E2eError::Auth("Magic link path required for magic_link auth mode".to_string())
                    })?;
                AuthSetup::MagicLink {
                    url: settings.url_for(&path),
                    save_session_to: settings.session_path(),
                }
            }
            AuthMode::Basic => match (&settings.basic_auth_username, &settings.basic_auth_password) {
                (Some(username), Some(password)) => AuthSetup::Basic {
                    username: username.clone(),
                    password: password.clone(),
                },
                _ => {
                    return Err(E2eError::Auth(
                        "Username and password required for basic auth mode".to_string(),
                    ))
                }
            },
            AuthMode::OauthToken => AuthSetup::OauthToken {
                token: settings.oauth_token.clone().ok_or_else(|| {
                    E2eError::Auth("OAuth token required for oauth_token auth mode".to_string())
                })?,
            },
        };

        info!(mode = setup.mode().as_str(), "Auth configured");
        Ok(setup)
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            AuthSetup::None => AuthMode::None,
            AuthSetup::Cookie { .. } => AuthMode::Cookie,
            AuthSetup::MagicLink { .. } => AuthMode::MagicLink,
            AuthSetup::Basic { .. } => AuthMode::Basic,
            AuthSetup::OauthToken { .. } => AuthMode::OauthToken,
        }
    }
}

/// Saved storage state to restore, if one exists on disk
pub fn stored_session(path: &Path) -> Option<PathBuf> {
    path.is_file().then(|| path.to_path_buf())
}

/// True when a response looks like it was stopped at a login wall
pub fn is_auth_gated(status: Option<u16>, requested_url: &str, final_url: &str) -> bool {
    if matches!(status, Some(401) | Some(403)) {
        return true;
    }
    AUTH_PATHS
        .iter()
        .any(|p| final_url.contains(p) && !requested_url.contains(p))
}
