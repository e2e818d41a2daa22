//! Playwright browser automation
//!
//! Each capture renders a self-contained Node script with the request
//! embedded as JSON, runs it with `node`, and reads the [`PageCapture`]
//! printed on the last line of stdout.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::browser::{BrowserDriver, CaptureRequest, PageCapture};
use crate::error::{E2eError, E2eResult};

/// Extra time the script gets beyond the navigation timeout for launch,
/// accessibility audit, screenshot, and demo flow
const SCRIPT_GRACE: Duration = Duration::from_secs(60);

/// Script body; expects a `request` constant in scope
const CAPTURE_SCRIPT: &str = r#"
const { createRequire } = require('module');
const load = createRequire(process.cwd() + '/');

(async () => {
  const out = {
    status: null,
    finalUrl: '',
    consoleErrors: [],
    pageErrors: [],
    networkErrors: [],
    missingSelectors: [],
    violations: [],
    flowErrors: [],
    dom: '',
    screenshotPath: null,
    warnings: [],
    fatal: null,
  };
  let browser;
  try {
    const { chromium } = load('playwright');
    browser = await chromium.launch({ headless: true });

    const options = { viewport: request.viewport };
    if (request.storageState) options.storageState = request.storageState;
    const auth = request.auth;
    if (auth.mode === 'basic') {
      options.httpCredentials = { username: auth.username, password: auth.password };
    }
    if (auth.mode === 'oauth_token') {
      options.extraHTTPHeaders = { Authorization: `Bearer ${auth.token}` };
    }
    const context = await browser.newContext(options);
    if (auth.mode === 'cookie') {
      await context.addCookies([auth.cookie]);
    }
    if (auth.mode === 'magic_link') {
      const login = await context.newPage();
      try {
        await login.goto(auth.url, { waitUntil: 'networkidle', timeout: request.timeoutMs });
        await login.waitForTimeout(2000);
        await context.storageState({ path: auth.saveSessionTo });
      } finally {
        await login.close();
      }
    }

    const page = await context.newPage();
    page.on('console', (msg) => {
      if (msg.type() === 'error') out.consoleErrors.push(msg.text());
    });
    page.on('pageerror', (err) => out.pageErrors.push(err.message));
    page.on('requestfailed', (req) => {
      const failure = req.failure();
      out.networkErrors.push(`${req.method()} ${req.url()} ${failure ? failure.errorText : 'failed'}`);
    });
    page.on('response', (res) => {
      if (res.status() >= 400) {
        out.networkErrors.push(`${res.request().method()} ${res.url()} ${res.status()}`);
      }
    });

    const response = await page.goto(request.url, { waitUntil: 'networkidle', timeout: request.timeoutMs });
    out.status = response ? response.status() : null;
    out.finalUrl = page.url();

    for (const selector of request.mustExist) {
      try {
        await page.locator(selector).first().waitFor({ state: 'visible', timeout: 5000 });
      } catch (_) {
        out.missingSelectors.push(selector);
      }
    }

    let AxeBuilder = null;
    try {
      AxeBuilder = load('@axe-core/playwright').default;
    } catch (_) {
      out.warnings.push('@axe-core/playwright is not installed, accessibility audit skipped');
    }
    if (AxeBuilder) {
      const audit = await new AxeBuilder({ page })
        .withTags(['wcag2a', 'wcag2aa'])
        .disableRules(request.axeIgnore)
        .analyze();
      out.violations = audit.violations.map((v) => ({
        id: v.id,
        impact: v.impact || null,
        description: v.description,
        nodes: v.nodes.length,
      }));
    }

    out.dom = await page.content();
    if (request.screenshotPath) {
      await page.screenshot({ path: request.screenshotPath, fullPage: true, animations: 'disabled' });
      out.screenshotPath = request.screenshotPath;
    }

    for (const [index, step] of request.demoFlow.entries()) {
      try {
        if (step.click !== undefined) {
          await page.locator(step.click).first().click({ timeout: 5000 });
        } else if (step.type !== undefined) {
          await page.locator(step.type.selector).first().fill(step.type.text, { timeout: 5000 });
        } else if (step.expect_text !== undefined) {
          await page.getByText(step.expect_text).first().waitFor({ state: 'visible', timeout: 5000 });
        }
      } catch (err) {
        out.flowErrors.push(`step ${index + 1}: ${err.message}`);
        break;
      }
    }
  } catch (err) {
    out.fatal = err.message;
  } finally {
    if (browser) await browser.close().catch(() => {});
  }
  process.stdout.write(JSON.stringify(out) + '\n');
})();
"#;

/// Drives a real Chromium through Playwright's Node API
#[derive(Debug, Clone)]
pub struct PlaywrightDriver {
    /// Node executable
    node: PathBuf,

    /// Directory whose `node_modules` provides `playwright`
    project_root: PathBuf,
}

impl PlaywrightDriver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            node: PathBuf::from("node"),
            project_root: project_root.into(),
        }
    }

    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = node.into();
        self
    }

    /// Render the capture script for one request
    pub fn build_script(&self, request: &CaptureRequest) -> E2eResult<String> {
        let payload = serde_json::to_string(request)?;
        Ok(format!("const request = {};\n{}", payload, CAPTURE_SCRIPT))
    }

    async fn run_script(&self, script: &str, limit: Duration) -> E2eResult<String> {
        let mut file = tempfile::Builder::new()
            .prefix("autosmoke-capture-")
            .suffix(".cjs")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;

        debug!("Running capture script: {}", file.path().display());

        let child = Command::new(&self.node)
            .arg(file.path())
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => E2eError::ToolNotFound(self.node.display().to_string()),
                _ => E2eError::Io(e),
            })?;

        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| E2eError::Timeout(format!("capture script after {}s", limit.as_secs())))??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(E2eError::Playwright(format!(
                "Script exited with {}:\nstdout: {}\nstderr: {}",
                output.status, stdout, stderr
            )));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("Capture script stderr: {}", stderr.trim());
        }
        Ok(stdout)
    }
}

/// Parse the capture printed on the last non-empty stdout line
pub fn parse_capture(stdout: &str) -> E2eResult<PageCapture> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| E2eError::InvalidCapture("script printed nothing".to_string()))?;

    serde_json::from_str(line.trim()).map_err(|e| E2eError::InvalidCapture(format!("{}: {}", e, line)))
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn capture(&self, request: &CaptureRequest) -> E2eResult<PageCapture> {
        if let Some(dir) = request.screenshot_path.as_ref().and_then(|p| p.parent()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let script = self.build_script(request)?;
        let limit = Duration::from_millis(request.timeout_ms) + SCRIPT_GRACE;
        let stdout = self.run_script(&script, limit).await?;
        let capture = parse_capture(&stdout)?;

        for warning in &capture.warnings {
            warn!(route = %request.route, "{}", warning);
        }
        Ok(capture)
    }
}
