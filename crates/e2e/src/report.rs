//! Markdown run report and Slack notification

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use tracing::info;

use autosmoke_common::write_atomic;

use crate::error::E2eResult;
use crate::runner::{RouteStatus, SuiteResult};

pub const DEFAULT_REPORT_PATH: &str = "smoke-report.md";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub route: String,
    pub status: RouteStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

/// Everything a report renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub rows: Vec<ReportRow>,
    /// Routes discovered, before any route limit
    pub total_routes: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub timestamp: String,
}

impl ReportData {
    pub fn from_suite(suite: &SuiteResult, total_routes: usize) -> Self {
        Self {
            rows: suite
                .results
                .iter()
                .map(|r| ReportRow {
                    route: r.route.clone(),
                    status: r.status,
                    attempts: r.attempts,
                    duration_ms: r.duration_ms,
                    errors: r.failures.clone(),
                })
                .collect(),
            total_routes,
            passed: suite.passed(),
            failed: suite.failed(),
            skipped: suite.skipped(),
            duration_ms: suite.duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn tested(&self) -> usize {
        self.rows.len()
    }
}

fn status_label(status: RouteStatus) -> &'static str {
    match status {
        RouteStatus::Passed => "✅ passed",
        RouteStatus::Failed => "❌ failed",
        RouteStatus::Skipped => "⏭️ skipped",
    }
}

/// Table cells cannot hold raw pipes or newlines
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn seconds(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

pub struct MarkdownReport {
    path: PathBuf,
}

impl MarkdownReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self, data: &ReportData) -> String {
        let mut out = String::new();

        out.push_str("# Smoke Test Report\n\n");
        out.push_str(&format!("**Generated:** {}  \n", data.timestamp));
        out.push_str(&format!("**Duration:** {}\n\n", seconds(data.duration_ms)));

        out.push_str("## Summary\n\n");
        out.push_str("| Discovered | Tested | Passed | Failed | Skipped |\n");
        out.push_str("|---|---|---|---|---|\n");
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n\n",
            data.total_routes,
            data.tested(),
            data.passed,
            data.failed,
            data.skipped
        ));

        if data.rows.is_empty() {
            out.push_str("No routes were tested.\n");
            return out;
        }

        out.push_str("## Routes\n\n");
        out.push_str("| Route | Status | Attempts | Duration |\n");
        out.push_str("|---|---|---|---|\n");
        for row in &data.rows {
            out.push_str(&format!(
                "| `{}` | {} | {} | {} ms |\n",
                cell(&row.route),
                status_label(row.status),
                row.attempts,
                row.duration_ms
            ));
        }

        let failures: Vec<&ReportRow> = data
            .rows
            .iter()
            .filter(|r| r.status == RouteStatus::Failed)
            .collect();
        if !failures.is_empty() {
            out.push_str("\n## Failures\n");
            for row in failures {
                out.push_str(&format!("\n### `{}`\n\n", row.route));
                for error in &row.errors {
                    out.push_str(&format!("- {}\n", error.replace('\n', " ")));
                }
            }
        }

        out
    }

    pub fn save(&self, data: &ReportData) -> E2eResult<()> {
        write_atomic(&self.path, self.render(data).as_bytes())?;
        info!("Report written to {}", self.path.display());
        Ok(())
    }
}

/// One-message summary for chat
pub fn slack_text(data: &ReportData) -> String {
    let icon = if data.failed > 0 { "❌" } else { "✅" };
    let mut text = format!(
        "{} Smoke tests: {} passed, {} failed, {} skipped of {} routes ({})",
        icon,
        data.passed,
        data.failed,
        data.skipped,
        data.tested(),
        seconds(data.duration_ms)
    );
    for row in data.rows.iter().filter(|r| r.status == RouteStatus::Failed) {
        let first = row.errors.first().map(String::as_str).unwrap_or("failed");
        text.push_str(&format!("\n• {}: {}", row.route, first));
    }
    text
}

pub async fn send_to_slack(webhook: &str, data: &ReportData) -> E2eResult<()> {
    reqwest::Client::new()
        .post(webhook)
        .json(&json!({ "text": slack_text(data) }))
        .send()
        .await?
        .error_for_status()?;

    info!("Report sent to Slack");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RouteResult;

    fn suite() -> SuiteResult {
        let row = |route: &str, status: RouteStatus, failures: Vec<&str>| RouteResult {
            route: route.to_string(),
            status,
            attempts: if status == RouteStatus::Failed { 3 } else { 1 },
            duration_ms: 420,
            failures: failures.into_iter().map(String::from).collect(),
            evidence_path: None,
            visual: None,
        };
        SuiteResult {
            results: vec![
                row("/", RouteStatus::Passed, vec![]),
                row("/admin", RouteStatus::Skipped, vec![]),
                row("/broken", RouteStatus::Failed, vec!["Expected HTTP 200, got 500", "Console error: a|b"]),
            ],
            duration_ms: 12_345,
        }
    }

    #[test]
    fn test_counts_from_suite() {
        let data = ReportData::from_suite(&suite(), 7);
        assert_eq!((data.passed, data.failed, data.skipped), (1, 1, 1));
        assert_eq!(data.total_routes, 7);
    }

    #[test]
    fn test_render_lists_routes_and_failures() {
        let data = ReportData::from_suite(&suite(), 3);
        let md = MarkdownReport::new("smoke-report.md").render(&data);

        assert!(md.starts_with("# Smoke Test Report"));
        assert!(md.contains("**Duration:** 12.3s"));
        assert!(md.contains("| 3 | 3 | 1 | 1 | 1 |"));
        assert!(md.contains("| `/broken` | ❌ failed | 3 | 420 ms |"));
        assert!(md.contains("### `/broken`"));
        assert!(md.contains("- Expected HTTP 200, got 500"));
        assert!(!md.contains("### `/`\n"));
    }

    #[test]
    fn test_render_empty_run() {
        let data = ReportData::from_suite(&SuiteResult::default(), 0);
        let md = MarkdownReport::new("r.md").render(&data);
        assert!(md.contains("No routes were tested."));
        assert!(!md.contains("## Routes"));
    }

    #[test]
    fn test_save_writes_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let report = MarkdownReport::new(tmp.path().join("out/smoke-report.md"));
        report.save(&ReportData::from_suite(&suite(), 3)).unwrap();
        let written = std::fs::read_to_string(report.path()).unwrap();
        assert!(written.contains("## Failures"));
    }

    #[test]
    fn test_slack_text_mentions_failures() {
        let text = slack_text(&ReportData::from_suite(&suite(), 3));
        assert!(text.starts_with("❌ Smoke tests: 1 passed, 1 failed, 1 skipped of 3 routes"));
        assert!(text.contains("• /broken: Expected HTTP 200, got 500"));
    }
}
