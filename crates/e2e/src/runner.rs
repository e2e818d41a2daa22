//! Smoke runner that fans route captures out to the browser driver
//!
//! Each route is captured once per attempt, judged against its merged
//! [`RouteConfig`], and leaves an [`Evidence`] file behind for the proposer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use autosmoke_common::{
    evidence_file_name, write_json, AuthMode, DiscoveredRoute, Evidence, RouteConfig, RunnerConfig, SmokeConfig,
};

use crate::auth::{is_auth_gated, stored_session, AuthSetup};
use crate::browser::{BrowserDriver, CaptureRequest, PageCapture, Viewport};
use crate::error::{E2eError, E2eResult};
use crate::visual::{screenshot_name, VisualComparer, VisualConfig, VisualDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Passed,
    Failed,
    Skipped,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Passed => "passed",
            RouteStatus::Failed => "failed",
            RouteStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of one route after retries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub route: String,
    pub status: RouteStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    /// Reasons from the last attempt
    pub failures: Vec<String>,
    pub evidence_path: Option<PathBuf>,
    pub visual: Option<VisualDiff>,
}

/// Outcome of a whole run, in route order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub results: Vec<RouteResult>,
    pub duration_ms: u64,
}

impl SuiteResult {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn count(&self, status: RouteStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(RouteStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(RouteStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(RouteStatus::Skipped)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Verdict of a single attempt
struct Attempt {
    status: RouteStatus,
    failures: Vec<String>,
    evidence_path: Option<PathBuf>,
    visual: Option<VisualDiff>,
}

struct RunnerInner {
    driver: Arc<dyn BrowserDriver>,
    settings: RunnerConfig,
    axe_ignore: Vec<String>,
    auth: AuthSetup,
    visual: Option<VisualComparer>,
    viewport: Viewport,
}

/// Runs routes concurrently against a [`BrowserDriver`]
#[derive(Clone)]
pub struct SmokeRunner {
    inner: Arc<RunnerInner>,
}

impl SmokeRunner {
    pub fn new(driver: Arc<dyn BrowserDriver>, settings: RunnerConfig, config: &SmokeConfig) -> E2eResult<Self> {
        let auth = AuthSetup::resolve(&settings, config.auth.as_ref())?;

        let visual = if settings.visual_mode || config.visual.enabled {
            Some(VisualComparer::new(VisualConfig::under(
                &settings.cache_dir(),
                config.visual.threshold,
            ))?)
        } else {
            None
        };

        Ok(Self {
            inner: Arc::new(RunnerInner {
                driver,
                settings,
                axe_ignore: config.axe.ignore.clone(),
                auth,
                visual,
                viewport: Viewport::default(),
            }),
        })
    }

    pub fn settings(&self) -> &RunnerConfig {
        &self.inner.settings
    }

    /// Run every route, honouring `route_limit`, and return results in route order
    pub async fn run(&self, routes: &[DiscoveredRoute]) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        let settings = &self.inner.settings;
        let limit = settings.route_limit.unwrap_or(routes.len());
        let selected: Vec<DiscoveredRoute> = routes.iter().take(limit).cloned().collect();

        info!(
            "Running {} route(s) with concurrency {}",
            selected.len(),
            settings.concurrency
        );
        tokio::fs::create_dir_all(settings.evidence_dir()).await?;

        let semaphore = Arc::new(Semaphore::new(settings.concurrency));
        let mut tasks = JoinSet::new();

        for (index, route) in selected.into_iter().enumerate() {
            let runner = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| E2eError::Task(e.to_string()))?;
                Ok::<_, E2eError>((index, runner.run_route(&route).await))
            });
        }

        let mut indexed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| E2eError::Task(e.to_string()))??;
            match result.status {
                RouteStatus::Passed => info!("✓ {} ({} ms)", result.route, result.duration_ms),
                RouteStatus::Skipped => info!("- {} skipped", result.route),
                RouteStatus::Failed => error!(
                    "✗ {} - {}",
                    result.route,
                    result.failures.first().map(String::as_str).unwrap_or("unknown error")
                ),
            }
            indexed.push((index, result));
        }
        indexed.sort_by_key(|(index, _)| *index);

        let suite = SuiteResult {
            results: indexed.into_iter().map(|(_, r)| r).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Smoke results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed(),
            suite.failed(),
            suite.skipped(),
            suite.duration_ms
        );
        Ok(suite)
    }

    /// Capture one route, retrying failed attempts up to `retries` times
    pub async fn run_route(&self, route: &DiscoveredRoute) -> RouteResult {
        let start = Instant::now();
        let request = self.capture_request(route);
        let max_attempts = self.inner.settings.retries + 1;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let attempt = self.attempt(route, &request).await;

            if attempt.status != RouteStatus::Failed || attempts >= max_attempts {
                return RouteResult {
                    route: route.path.clone(),
                    status: attempt.status,
                    attempts,
                    duration_ms: start.elapsed().as_millis() as u64,
                    failures: attempt.failures,
                    evidence_path: attempt.evidence_path,
                    visual: attempt.visual,
                };
            }

            warn!(
                route = %route.path,
                attempt = attempts,
                "Route failed, retrying: {}",
                attempt.failures.join("; ")
            );
        }
    }

    fn capture_request(&self, route: &DiscoveredRoute) -> CaptureRequest {
        let settings = &self.inner.settings;
        let screenshot_path = settings
            .cache_dir()
            .join("screenshots")
            .join(format!("{}.png", screenshot_name(&route.path)));

        CaptureRequest {
            route: route.path.clone(),
            url: settings.url_for(&route.path),
            must_exist: route.config.must_exist_or_default(),
            demo_flow: route.config.demo_flow().to_vec(),
            axe_ignore: self.inner.axe_ignore.clone(),
            screenshot_path: Some(screenshot_path),
            timeout_ms: settings.timeout_ms,
            viewport: self.inner.viewport,
            auth: self.inner.auth.clone(),
            storage_state: stored_session(&settings.session_path()),
        }
    }

    async fn attempt(&self, route: &DiscoveredRoute, request: &CaptureRequest) -> Attempt {
        let capture = match self.inner.driver.capture(request).await {
            Ok(capture) => capture,
            Err(e) => {
                return Attempt {
                    status: RouteStatus::Failed,
                    failures: vec![format!("Capture failed: {}", e)],
                    evidence_path: None,
                    visual: None,
                }
            }
        };

        let settings = &self.inner.settings;
        if settings.skip_auth_gated
            && settings.auth_mode != AuthMode::None
            && capture.fatal.is_none()
            && is_auth_gated(capture.status, &request.url, &capture.final_url)
        {
            info!("Skipping auth-gated route: {}", route.path);
            return Attempt {
                status: RouteStatus::Skipped,
                failures: vec![],
                evidence_path: None,
                visual: None,
            };
        }

        let mut failures = judge(&route.config, &capture);

        let evidence_path = match self.write_evidence(route, request, &capture) {
            Ok(path) => Some(path),
            Err(e) => {
                failures.push(format!("Could not write evidence: {}", e));
                None
            }
        };

        let visual = match (&self.inner.visual, capture.fatal.is_none()) {
            (Some(_), true) => match self.compare_visual(route, &capture).await {
                Ok(diff) => {
                    if !diff.matches {
                        failures.push(format!(
                            "Visual regression: {:.2}% pixels differ (threshold {:.2}%)",
                            diff.diff_percent,
                            self.inner.visual.as_ref().map(|v| v.threshold()).unwrap_or_default()
                        ));
                    }
                    Some(diff)
                }
                Err(e) => {
                    failures.push(format!("Visual comparison error: {}", e));
                    None
                }
            },
            _ => None,
        };

        Attempt {
            status: if failures.is_empty() {
                RouteStatus::Passed
            } else {
                RouteStatus::Failed
            },
            failures,
            evidence_path,
            visual,
        }
    }

    fn write_evidence(
        &self,
        route: &DiscoveredRoute,
        request: &CaptureRequest,
        capture: &PageCapture,
    ) -> E2eResult<PathBuf> {
        let evidence = Evidence {
            route: route.path.clone(),
            url: request.url.clone(),
            dom_snapshot: capture.dom.clone(),
            console_errors: capture.console_errors.clone(),
            page_errors: capture.page_errors.clone(),
            network_errors: capture.network_errors.clone(),
            screenshot_path: capture.screenshot_path.clone().unwrap_or_default(),
            diff_summary: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let path = self
            .inner
            .settings
            .evidence_dir()
            .join(evidence_file_name(&route.path));
        write_json(&path, &evidence)?;
        debug!("Evidence written to {}", path.display());
        Ok(path)
    }

    async fn compare_visual(&self, route: &DiscoveredRoute, capture: &PageCapture) -> E2eResult<VisualDiff> {
        let actual = capture
            .screenshot_path
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| E2eError::Visual(format!("no screenshot captured for {}", route.path)))?;
        let name = screenshot_name(&route.path);
        let runner = self.clone();

        tokio::task::spawn_blocking(move || match &runner.inner.visual {
            Some(visual) => visual.compare(&name, &actual),
            None => Err(E2eError::Visual("visual comparison is disabled".to_string())),
        })
        .await
        .map_err(|e| E2eError::Task(e.to_string()))?
    }
}

/// Everything wrong with a capture under the route's rules, empty when it passes
pub fn judge(config: &RouteConfig, capture: &PageCapture) -> Vec<String> {
    if let Some(fatal) = &capture.fatal {
        return vec![format!("Navigation failed: {}", fatal)];
    }

    let mut failures = Vec::new();

    match capture.status {
        Some(200) => {}
        Some(status) => failures.push(format!("Expected HTTP 200, got {}", status)),
        None => failures.push("Expected HTTP 200, got no response".to_string()),
    }

    for selector in &capture.missing_selectors {
        failures.push(format!("Required element not visible: {}", selector));
    }

    if config.must_not_error() {
        failures.extend(capture.console_errors.iter().map(|e| format!("Console error: {}", e)));
        failures.extend(capture.page_errors.iter().map(|e| format!("Page error: {}", e)));
    }

    for violation in capture.blocking_violations() {
        failures.push(format!(
            "Accessibility violation ({}): {} - {}",
            violation.impact.as_deref().unwrap_or("unknown"),
            violation.id,
            violation.description
        ));
    }

    failures.extend(capture.flow_errors.iter().map(|e| format!("Demo flow failed: {}", e)));
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Violation;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Replays queued captures per route; the last one repeats
    #[derive(Default)]
    struct FakeDriver {
        captures: Mutex<HashMap<String, Vec<PageCapture>>>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl FakeDriver {
        fn with(mut self, route: &str, captures: Vec<PageCapture>) -> Self {
            self.captures.get_mut().unwrap().insert(route.to_string(), captures);
            self
        }

        fn calls_for(&self, route: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|r| *r == route).count()
        }
    }

    #[async_trait]
    impl BrowserDriver for FakeDriver {
        async fn capture(&self, request: &CaptureRequest) -> E2eResult<PageCapture> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.route.clone());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let capture = {
                let mut map = self.captures.lock().unwrap();
                let queue = map.entry(request.route.clone()).or_default();
                match queue.len() {
                    0 => healthy(),
                    1 => queue[0].clone(),
                    _ => queue.remove(0),
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(capture)
        }
    }

    fn healthy() -> PageCapture {
        PageCapture {
            status: Some(200),
            final_url: "http://localhost:3000/".to_string(),
            dom: "<main>ok</main>".to_string(),
            ..Default::default()
        }
    }

    fn route(path: &str) -> DiscoveredRoute {
        DiscoveredRoute {
            path: path.to_string(),
            source_file: PathBuf::new(),
            config: RouteConfig::default(),
            is_dynamic: false,
        }
    }

    fn settings(tmp: &TempDir) -> RunnerConfig {
        RunnerConfig {
            project_root: tmp.path().to_path_buf(),
            retries: 0,
            ..RunnerConfig::default()
        }
    }

    fn runner(driver: FakeDriver, settings: RunnerConfig) -> (SmokeRunner, Arc<FakeDriver>) {
        let driver = Arc::new(driver);
        let runner = SmokeRunner::new(driver.clone(), settings, &SmokeConfig::default()).unwrap();
        (runner, driver)
    }

    #[test]
    fn test_judge_collects_every_problem() {
        let capture = PageCapture {
            status: Some(500),
            missing_selectors: vec!["main".to_string()],
            console_errors: vec!["boom".to_string()],
            page_errors: vec!["TypeError".to_string()],
            violations: vec![Violation {
                id: "image-alt".to_string(),
                impact: Some("critical".to_string()),
                description: "Images must have alt text".to_string(),
                nodes: 3,
            }],
            flow_errors: vec!["step 1: timeout".to_string()],
            ..Default::default()
        };

        let failures = judge(&RouteConfig::default(), &capture);
        assert_eq!(failures.len(), 6);
        assert_eq!(failures[0], "Expected HTTP 200, got 500");
    }

    #[test]
    fn test_judge_ignores_errors_when_allowed() {
        let config = RouteConfig {
            must_not_error: Some(false),
            ..RouteConfig::default()
        };
        let capture = PageCapture {
            console_errors: vec!["noise".to_string()],
            ..healthy()
        };
        assert!(judge(&config, &capture).is_empty());
        assert_eq!(judge(&RouteConfig::default(), &capture), vec!["Console error: noise"]);
    }

    #[test]
    fn test_judge_fatal_short_circuits() {
        let capture = PageCapture {
            fatal: Some("net::ERR_CONNECTION_REFUSED".to_string()),
            ..Default::default()
        };
        assert_eq!(
            judge(&RouteConfig::default(), &capture),
            vec!["Navigation failed: net::ERR_CONNECTION_REFUSED"]
        );
    }

    #[tokio::test]
    async fn test_results_keep_route_order_and_write_evidence() {
        let tmp = TempDir::new().unwrap();
        let driver = FakeDriver {
            delay: Duration::from_millis(10),
            ..Default::default()
        };
        let (runner, _) = runner(driver, settings(&tmp));

        let routes: Vec<_> = ["/", "/a", "/b", "/c", "/d"].iter().map(|p| route(p)).collect();
        let suite = runner.run(&routes).await.unwrap();

        let order: Vec<_> = suite.results.iter().map(|r| r.route.as_str()).collect();
        assert_eq!(order, vec!["/", "/a", "/b", "/c", "/d"]);
        assert_eq!(suite.passed(), 5);

        let evidence = Evidence::from_file(&tmp.path().join(".cache/evidence/_a.json")).unwrap();
        assert_eq!(evidence.route, "/a");
        assert_eq!(evidence.url, "http://localhost:3000/a");
        assert_eq!(evidence.dom_snapshot, "<main>ok</main>");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let driver = FakeDriver {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let mut config = settings(&tmp);
        config.concurrency = 2;
        let (runner, driver) = runner(driver, config);

        let routes: Vec<_> = (0..8).map(|i| route(&format!("/r{}", i))).collect();
        runner.run(&routes).await.unwrap();

        assert!(driver.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(driver.calls.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_route_limit_takes_prefix() {
        let tmp = TempDir::new().unwrap();
        let mut config = settings(&tmp);
        config.route_limit = Some(2);
        let (runner, driver) = runner(FakeDriver::default(), config);

        let routes: Vec<_> = ["/x", "/y", "/z"].iter().map(|p| route(p)).collect();
        let suite = runner.run(&routes).await.unwrap();

        assert_eq!(suite.total(), 2);
        assert_eq!(driver.calls_for("/z"), 0);
    }

    #[tokio::test]
    async fn test_failed_route_is_retried_until_it_passes() {
        let tmp = TempDir::new().unwrap();
        let broken = PageCapture {
            status: Some(502),
            ..healthy()
        };
        let driver = FakeDriver::default().with("/flaky", vec![broken, healthy()]);
        let mut config = settings(&tmp);
        config.retries = 2;
        let (runner, driver) = runner(driver, config);

        let result = runner.run_route(&route("/flaky")).await;
        assert_eq!(result.status, RouteStatus::Passed);
        assert_eq!(result.attempts, 2);
        assert_eq!(driver.calls_for("/flaky"), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_reports_last_failure() {
        let tmp = TempDir::new().unwrap();
        let broken = PageCapture {
            status: Some(404),
            ..healthy()
        };
        let driver = FakeDriver::default().with("/gone", vec![broken]);
        let mut config = settings(&tmp);
        config.retries = 1;
        let (runner, _) = runner(driver, config);

        let suite = runner.run(&[route("/gone")]).await.unwrap();
        assert!(suite.has_failures());
        assert_eq!(suite.results[0].attempts, 2);
        assert_eq!(suite.results[0].failures, vec!["Expected HTTP 200, got 404"]);
    }

    #[tokio::test]
    async fn test_auth_gated_route_skipped_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let gated = PageCapture {
            status: Some(200),
            final_url: "http://localhost:3000/login?next=/admin".to_string(),
            ..healthy()
        };
        let driver = FakeDriver::default().with("/admin", vec![gated]);
        let mut config = settings(&tmp);
        config.skip_auth_gated = true;
        config.auth_mode = AuthMode::OauthToken;
        config.oauth_token = Some("tok".to_string());
        let (runner, _) = runner(driver, config);

        let suite = runner.run(&[route("/admin")]).await.unwrap();
        assert_eq!(suite.skipped(), 1);
        assert!(!suite.has_failures());
    }

    #[tokio::test]
    async fn test_gated_route_not_skipped_without_auth() {
        let tmp = TempDir::new().unwrap();
        let forbidden = PageCapture {
            status: Some(403),
            ..healthy()
        };
        let driver = FakeDriver::default().with("/admin", vec![forbidden]);
        let mut config = settings(&tmp);
        config.skip_auth_gated = true;
        let (runner, _) = runner(driver, config);

        let suite = runner.run(&[route("/admin")]).await.unwrap();
        assert_eq!(suite.failed(), 1);
    }

    #[tokio::test]
    async fn test_capture_error_counts_as_failure() {
        struct Broken;

        #[async_trait]
        impl BrowserDriver for Broken {
            async fn capture(&self, _request: &CaptureRequest) -> E2eResult<PageCapture> {
                Err(E2eError::ToolNotFound("node".to_string()))
            }
        }

        let tmp = TempDir::new().unwrap();
        let runner = SmokeRunner::new(Arc::new(Broken), settings(&tmp), &SmokeConfig::default()).unwrap();
        let suite = runner.run(&[route("/")]).await.unwrap();

        assert_eq!(suite.failed(), 1);
        assert!(suite.results[0].failures[0].starts_with("Capture failed"));
        assert!(suite.results[0].evidence_path.is_none());
    }

    #[tokio::test]
    async fn test_request_uses_route_config() {
        let tmp = TempDir::new().unwrap();
        let (runner, _) = runner(FakeDriver::default(), settings(&tmp));
        let mut r = route("/settings");
        r.config.must_exist = Some(vec!["#settings".to_string()]);

        let request = runner.capture_request(&r);
        assert_eq!(request.must_exist, vec!["#settings"]);
        assert_eq!(request.url, "http://localhost:3000/settings");
        assert!(request
            .screenshot_path
            .unwrap()
            .ends_with(".cache/screenshots/_settings.png"));

        let default_request = runner.capture_request(&route("/"));
        assert_eq!(default_request.must_exist, vec!["main"]);
    }
}
