//! One-shot smoke run

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use autosmoke_common::RunnerConfig;
use autosmoke_discovery::write_manifest;
use autosmoke_e2e::{
    send_to_slack, BrowserDriver, MarkdownReport, PlaywrightDriver, ReportData, RouteResult, SmokeRunner,
    SuiteResult, DEFAULT_REPORT_PATH,
};

use crate::commands::routes::{discover, load_discovery};
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    /// Markdown report path, relative to the project root
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    pub report: PathBuf,
}

/// Route result display wrapper for serialization
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResultDisplay {
    pub route: String,
    pub status: String,
    pub attempts: u32,
    pub duration_ms: u64,
    pub failures: Vec<String>,
}

impl From<&RouteResult> for RouteResultDisplay {
    fn from(result: &RouteResult) -> Self {
        Self {
            route: result.route.clone(),
            status: result.status.as_str().to_string(),
            attempts: result.attempts,
            duration_ms: result.duration_ms,
            failures: result.failures.clone(),
        }
    }
}

impl TableDisplay for RouteResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Route", "Status", "Attempts", "Duration", "First Failure"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.route.clone(),
            self.status.clone(),
            self.attempts.to_string(),
            format!("{} ms", self.duration_ms),
            self.failures.first().cloned().unwrap_or_default(),
        ]
    }
}

/// Discover, run, and report once
pub async fn run_suite(
    driver: Arc<dyn BrowserDriver>,
    settings: &RunnerConfig,
    report_path: &Path,
) -> Result<SuiteResult> {
    let discovery = load_discovery(settings)?;
    let routes = discover(&discovery)?;

    let manifest = settings.manifest_path();
    write_manifest(&routes, &manifest).with_context(|| format!("Failed to write {}", manifest.display()))?;

    let runner = SmokeRunner::new(driver, settings.clone(), discovery.config())
        .context("Failed to set up smoke runner")?;
    info!("Testing {} routes against {}", routes.len(), settings.base_url);
    let suite = runner.run(&routes).await.context("Smoke run failed")?;

    let data = ReportData::from_suite(&suite, routes.len());
    let report = MarkdownReport::new(settings.project_root.join(report_path));
    report
        .save(&data)
        .with_context(|| format!("Failed to write {}", report.path().display()))?;

    if let Some(webhook) = &settings.slack_webhook {
        // Notification failures never fail the run
        if let Err(e) = send_to_slack(webhook, &data).await {
            warn!("Failed to send Slack notification: {}", e);
        }
    }

    info!(
        "{} passed, {} failed, {} skipped in {} ms",
        suite.passed(),
        suite.failed(),
        suite.skipped(),
        suite.duration_ms
    );
    Ok(suite)
}

pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    let display: Vec<RouteResultDisplay> = suite.results.iter().map(RouteResultDisplay::from).collect();
    print_list(&display, format);
}

pub async fn execute(args: RunArgs, settings: &RunnerConfig, format: OutputFormat) -> Result<()> {
    let driver = Arc::new(PlaywrightDriver::new(&settings.project_root));
    let suite = run_suite(driver, settings, &args.report).await?;
    print_suite(&suite, format);

    if suite.has_failures() {
        bail!("{} of {} routes failed", suite.failed(), suite.total());
    }
    Ok(())
}
