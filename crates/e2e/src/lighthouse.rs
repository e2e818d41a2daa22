//! Lighthouse performance audits
//!
//! Shells out to the `lighthouse` CLI per URL, reduces each JSON report to
//! a handful of metrics, and summarizes a run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{error, info};

use autosmoke_common::{write_json, DiscoveredRoute, RunnerConfig};

use crate::error::{E2eError, E2eResult};

/// Routes audited when `ROUTE_LIMIT` is unset
pub const DEFAULT_AUDIT_LIMIT: usize = 5;

const WORST_PERFORMERS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseMetrics {
    pub performance: f64,
    pub accessibility: f64,
    pub best_practices: f64,
    pub seo: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwa: Option<f64>,
    pub first_contentful_paint: f64,
    pub largest_contentful_paint: f64,
    pub cumulative_layout_shift: f64,
    pub total_blocking_time: f64,
    pub speed_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseResult {
    pub url: String,
    pub route: String,
    pub metrics: LighthouseMetrics,
    pub report_path: PathBuf,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageScores {
    pub performance: f64,
    pub accessibility: f64,
    pub best_practices: f64,
    pub seo: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorstPerformer {
    pub route: String,
    /// Score in percent
    pub performance: i64,
    pub fcp: i64,
    pub lcp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseSummary {
    pub total_routes: usize,
    pub average_scores: AverageScores,
    pub worst_performers: Vec<WorstPerformer>,
    pub timestamp: String,
}

/// Reduce a raw Lighthouse report; absent scores and audits count as 0
pub fn parse_report(report: &Value) -> LighthouseMetrics {
    let score = |category: &str| report["categories"][category]["score"].as_f64();
    let audit = |id: &str| report["audits"][id]["numericValue"].as_f64().unwrap_or(0.0);

    LighthouseMetrics {
        performance: score("performance").unwrap_or(0.0),
        accessibility: score("accessibility").unwrap_or(0.0),
        best_practices: score("best-practices").unwrap_or(0.0),
        seo: score("seo").unwrap_or(0.0),
        pwa: score("pwa"),
        first_contentful_paint: audit("first-contentful-paint"),
        largest_contentful_paint: audit("largest-contentful-paint"),
        cumulative_layout_shift: audit("cumulative-layout-shift"),
        total_blocking_time: audit("total-blocking-time"),
        speed_index: audit("speed-index"),
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Averages plus the lowest-scoring routes
pub fn summarize(results: &[LighthouseResult]) -> LighthouseSummary {
    let mut ranked: Vec<&LighthouseResult> = results.iter().collect();
    ranked.sort_by(|a, b| a.metrics.performance.total_cmp(&b.metrics.performance));

    LighthouseSummary {
        total_routes: results.len(),
        average_scores: AverageScores {
            performance: average(results.iter().map(|r| r.metrics.performance)),
            accessibility: average(results.iter().map(|r| r.metrics.accessibility)),
            best_practices: average(results.iter().map(|r| r.metrics.best_practices)),
            seo: average(results.iter().map(|r| r.metrics.seo)),
        },
        worst_performers: ranked
            .into_iter()
            .take(WORST_PERFORMERS)
            .map(|r| WorstPerformer {
                route: r.route.clone(),
                performance: (r.metrics.performance * 100.0).round() as i64,
                fcp: r.metrics.first_contentful_paint.round() as i64,
                lcp: r.metrics.largest_contentful_paint.round() as i64,
            })
            .collect(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

pub struct LighthouseRunner {
    binary: PathBuf,
    output_dir: PathBuf,
}

impl LighthouseRunner {
    /// Reports land in `<project_root>/.cache/lighthouse`
    pub fn new(settings: &RunnerConfig) -> Self {
        Self {
            binary: PathBuf::from("lighthouse"),
            output_dir: settings.cache_dir().join("lighthouse"),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Audit the first `limit` routes; failures are logged and skipped
    pub async fn run_for_routes(
        &self,
        settings: &RunnerConfig,
        routes: &[DiscoveredRoute],
    ) -> E2eResult<Vec<LighthouseResult>> {
        let limit = settings.route_limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
        info!("Running Lighthouse on {} of {} routes", limit.min(routes.len()), routes.len());

        let mut results = Vec::new();
        for route in routes.iter().take(limit) {
            let url = settings.url_for(&route.path);
            info!("Analyzing {}", url);

            match self.run_for_url(&url, &route.path).await {
                Ok(result) => {
                    info!(
                        "{}: Performance {}%",
                        route.path,
                        (result.metrics.performance * 100.0).round()
                    );
                    results.push(result);
                }
                Err(e @ E2eError::ToolNotFound(_)) => return Err(e),
                Err(e) => error!("Failed to analyze {}: {}", route.path, e),
            }
        }
        Ok(results)
    }

    pub async fn run_for_url(&self, url: &str, route: &str) -> E2eResult<LighthouseResult> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let report_path = self
            .output_dir
            .join(format!("{}_lighthouse.json", route.replace('/', "_")));

        let output = Command::new(&self.binary)
            .arg(url)
            .arg("--output=json")
            .arg(format!("--output-path={}", report_path.display()))
            .arg("--preset=desktop")
            .arg("--quiet")
            .arg("--chrome-flags=--headless --no-sandbox --disable-gpu")
            .arg("--throttling-method=simulate")
            .arg("--throttling.rttMs=40")
            .arg("--throttling.throughputKbps=10240")
            .arg("--throttling.cpuSlowdownMultiplier=1")
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => E2eError::ToolNotFound(self.binary.display().to_string()),
                _ => E2eError::Io(e),
            })?;

        if !output.status.success() {
            return Err(E2eError::Lighthouse {
                url: url.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = tokio::fs::read_to_string(&report_path).await?;
        let report: Value = serde_json::from_str(&raw).map_err(|e| E2eError::Lighthouse {
            url: url.to_string(),
            reason: format!("unreadable report: {}", e),
        })?;

        Ok(LighthouseResult {
            url: url.to_string(),
            route: route.to_string(),
            metrics: parse_report(&report),
            report_path,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Write `summary.json` next to the reports
    pub fn write_summary(&self, summary: &LighthouseSummary) -> E2eResult<PathBuf> {
        let path = self.output_dir.join("summary.json");
        write_json(&path, summary)?;
        info!("Lighthouse summary saved to {}", path.display());
        Ok(path)
    }
}
