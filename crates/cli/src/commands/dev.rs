//! Dev loop: start the app, run once, then re-run on route changes

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use autosmoke_common::RunnerConfig;
use autosmoke_e2e::{wait_for_app, BrowserDriver, DevServer, PlaywrightDriver, RouteWatcher, APP_READY_TIMEOUT};

use crate::commands::run::{print_suite, run_suite};
use crate::output::{print_info, OutputFormat};

#[derive(Args)]
pub struct DevArgs {
    /// Markdown report path, relative to the project root
    #[arg(long, default_value = autosmoke_e2e::DEFAULT_REPORT_PATH)]
    pub report: PathBuf,
}

/// One pass of the loop; a failed pass is reported and the loop goes on
async fn cycle(driver: Arc<dyn BrowserDriver>, settings: &RunnerConfig, args: &DevArgs, format: OutputFormat) {
    match run_suite(driver, settings, &args.report).await {
        Ok(suite) => print_suite(&suite, format),
        Err(e) => error!("Smoke run failed: {:#}", e),
    }
}

pub async fn execute(args: DevArgs, settings: &RunnerConfig, format: OutputFormat) -> Result<()> {
    let mut server = match &settings.dev_start {
        Some(command) => Some(DevServer::spawn(command, &settings.project_root)?),
        None => None,
    };

    wait_for_app(&settings.base_url, APP_READY_TIMEOUT)
        .await
        .context("App did not come up")?;

    let driver: Arc<dyn BrowserDriver> = Arc::new(PlaywrightDriver::new(&settings.project_root));
    let mut watcher = RouteWatcher::new(&settings.project_root).context("Failed to watch project")?;

    // Each pass is awaited before the next change is read, so runs never overlap
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = cycle(driver.clone(), settings, &args, format) => {}
        }
        print_info("Watching for route changes (Ctrl-C to stop)");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = watcher.next_change() => match change {
                Some(paths) => {
                    for path in &paths {
                        info!("Changed: {}", path.display());
                    }
                }
                None => break,
            },
        }
    }

    info!("Shutting down dev loop");
    if let Some(server) = server.as_mut() {
        server.stop().await?;
    }
    Ok(())
}
