//! Lighthouse audits over discovered routes

use anyhow::{Context, Result};
use serde::Serialize;

use autosmoke_common::RunnerConfig;
use autosmoke_e2e::{summarize, LighthouseResult, LighthouseRunner};

use crate::commands::routes::{discover, load_discovery};
use crate::output::{print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseDisplay {
    pub route: String,
    pub performance: i64,
    pub accessibility: i64,
    pub best_practices: i64,
    pub seo: i64,
    pub fcp_ms: i64,
    pub lcp_ms: i64,
}

fn percent(score: f64) -> i64 {
    (score * 100.0).round() as i64
}

impl From<&LighthouseResult> for LighthouseDisplay {
    fn from(result: &LighthouseResult) -> Self {
        let m = &result.metrics;
        Self {
            route: result.route.clone(),
            performance: percent(m.performance),
            accessibility: percent(m.accessibility),
            best_practices: percent(m.best_practices),
            seo: percent(m.seo),
            fcp_ms: m.first_contentful_paint.round() as i64,
            lcp_ms: m.largest_contentful_paint.round() as i64,
        }
    }
}

impl TableDisplay for LighthouseDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Route", "Performance", "Accessibility", "Best Practices", "SEO", "FCP", "LCP"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.route.clone(),
            format!("{}%", self.performance),
            format!("{}%", self.accessibility),
            format!("{}%", self.best_practices),
            format!("{}%", self.seo),
            format!("{} ms", self.fcp_ms),
            format!("{} ms", self.lcp_ms),
        ]
    }
}

pub async fn execute(settings: &RunnerConfig, format: OutputFormat) -> Result<()> {
    let routes = discover(&load_discovery(settings)?)?;

    let runner = LighthouseRunner::new(settings);
    let results = runner
        .run_for_routes(settings, &routes)
        .await
        .context("Lighthouse run failed")?;

    if results.is_empty() {
        print_warning("No routes were analyzed");
        return Ok(());
    }

    let display: Vec<LighthouseDisplay> = results.iter().map(LighthouseDisplay::from).collect();
    print_list(&display, format);

    let summary = summarize(&results);
    let path = runner
        .write_summary(&summary)
        .with_context(|| format!("Failed to write summary in {}", runner.output_dir().display()))?;
    print_success(&format!("Lighthouse summary saved to {}", path.display()));
    Ok(())
}
