//! Browser driver seam
//!
//! The runner only talks to a [`BrowserDriver`]. Production uses
//! [`crate::playwright::PlaywrightDriver`]; tests plug in an in-memory fake.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use autosmoke_common::DemoStep;

use crate::auth::AuthSetup;
use crate::error::E2eResult;

/// Impact levels that fail a route
pub const BLOCKING_IMPACTS: [&str; 2] = ["critical", "serious"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Everything needed to capture one route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub route: String,
    pub url: String,
    pub must_exist: Vec<String>,
    pub demo_flow: Vec<DemoStep>,
    pub axe_ignore: Vec<String>,
    pub screenshot_path: Option<PathBuf>,
    pub timeout_ms: u64,
    pub viewport: Viewport,
    pub auth: AuthSetup,
    /// Saved storage state to load into the context
    pub storage_state: Option<PathBuf>,
}

/// One accessibility rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Number of offending nodes
    #[serde(default)]
    pub nodes: usize,
}

impl Violation {
    pub fn is_blocking(&self) -> bool {
        self.impact
            .as_deref()
            .map(|i| BLOCKING_IMPACTS.contains(&i))
            .unwrap_or(false)
    }
}

/// What the browser observed on a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageCapture {
    /// HTTP status of the main document, if a response arrived
    pub status: Option<u16>,
    pub final_url: String,
    pub console_errors: Vec<String>,
    pub page_errors: Vec<String>,
    pub network_errors: Vec<String>,
    /// `must_exist` selectors that never became visible
    pub missing_selectors: Vec<String>,
    pub violations: Vec<Violation>,
    /// Demo flow failures; the flow stops at the first one
    pub flow_errors: Vec<String>,
    pub dom: String,
    pub screenshot_path: Option<String>,
    /// Non-fatal problems, such as the accessibility engine being unavailable
    pub warnings: Vec<String>,
    /// Set when the capture aborted before finishing
    pub fatal: Option<String>,
}

impl PageCapture {
    pub fn blocking_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Load the route once and report what happened
    async fn capture(&self, request: &CaptureRequest) -> E2eResult<PageCapture>;
}
