//! AutoSmoke browser smoke runner
//!
//! This crate drives a real browser over discovered routes:
//! - Captures each route through a pluggable [`BrowserDriver`] (Playwright by default)
//! - Judges the capture against the route's `.smoke.yml` rules
//! - Writes evidence for the proposer and optional visual baselines
//! - Renders a Markdown report, and runs the dev loop and Lighthouse audits
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SmokeRunner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run(routes) -> SuiteResult                                 │
//! │    ├── Semaphore(concurrency) + JoinSet, one task per route │
//! │    ├── BrowserDriver::capture(CaptureRequest) -> PageCapture│
//! │    │     └── PlaywrightDriver: node script, JSON on stdout  │
//! │    ├── judge(RouteConfig, PageCapture) -> failures          │
//! │    ├── write Evidence to .cache/evidence                    │
//! │    └── VisualComparer::compare(screenshot, baseline)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MarkdownReport / Slack      DevServer + RouteWatcher       │
//! │  LighthouseRunner            wait_for_app                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod browser;
pub mod error;
pub mod lighthouse;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod server;
pub mod visual;
pub mod watch;

pub use auth::{AuthSetup, SessionCookie};
pub use browser::{BrowserDriver, CaptureRequest, PageCapture, Violation, Viewport};
pub use error::{E2eError, E2eResult};
pub use lighthouse::{summarize, LighthouseResult, LighthouseRunner, LighthouseSummary};
pub use playwright::PlaywrightDriver;
pub use report::{send_to_slack, MarkdownReport, ReportData, DEFAULT_REPORT_PATH};
pub use runner::{judge, RouteResult, RouteStatus, SmokeRunner, SuiteResult};
pub use server::{wait_for_app, DevServer, APP_READY_TIMEOUT};
pub use visual::{screenshot_name, VisualComparer, VisualConfig, VisualDiff};
pub use watch::{is_watched_path, RouteWatcher};
