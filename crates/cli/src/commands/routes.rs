//! Route listing

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::warn;

use autosmoke_common::{DiscoveredRoute, RunnerConfig};
use autosmoke_discovery::{write_manifest, RouteDiscovery};

use crate::output::{print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RoutesArgs {
    /// Also write the route list to .cache/routes/generated.json
    #[arg(long)]
    pub write: bool,
}

/// Route display wrapper for serialization
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDisplay {
    pub path: String,
    pub source: String,
    pub must_exist: Vec<String>,
    pub demo_steps: usize,
}

impl From<&DiscoveredRoute> for RouteDisplay {
    fn from(route: &DiscoveredRoute) -> Self {
        Self {
            path: route.path.clone(),
            source: if route.is_config_only() {
                ".smoke.yml".to_string()
            } else {
                route.source_file.display().to_string()
            },
            must_exist: route.config.must_exist_or_default(),
            demo_steps: route.config.demo_flow().len(),
        }
    }
}

impl TableDisplay for RouteDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Route", "Source", "Must Exist", "Demo Steps"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.source.clone(),
            self.must_exist.join(", "),
            self.demo_steps.to_string(),
        ]
    }
}

/// Build a discovery engine for the configured project, loading `.smoke.yml`
pub fn load_discovery(settings: &RunnerConfig) -> Result<RouteDiscovery> {
    RouteDiscovery::new(&settings.project_root)
        .with_context(|| format!("Failed to load config in {}", settings.project_root.display()))
}

/// Discover routes, logging each dropped dynamic route
pub fn discover(discovery: &RouteDiscovery) -> Result<Vec<DiscoveredRoute>> {
    let found = discovery.discover().context("Route discovery failed")?;

    for skipped in &found.skipped {
        warn!(
            "Skipping {} ({}): no sample_params for {}",
            skipped.path,
            skipped.source_file.display(),
            skipped.unresolved.join(", ")
        );
    }
    Ok(found.routes)
}

pub fn execute(args: RoutesArgs, settings: &RunnerConfig, format: OutputFormat) -> Result<()> {
    let routes = discover(&load_discovery(settings)?)?;

    let display: Vec<RouteDisplay> = routes.iter().map(RouteDisplay::from).collect();
    print_list(&display, format);

    if args.write {
        let path = settings.manifest_path();
        write_manifest(&routes, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if matches!(format, OutputFormat::Table | OutputFormat::Plain) {
            print_success(&format!("Route list written to {}", path.display()));
        }
    }

    Ok(())
}
