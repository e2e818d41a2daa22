//! Dev server management - spawning the app and waiting for it to answer

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Default time `wait_for_app` allows the app to come up
pub const APP_READY_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Words in app output worth echoing
const READY_MARKERS: [&str; 3] = ["ready", "started", "listening"];

/// Handle to the app process started from `DEV_START`
pub struct DevServer {
    child: Child,
}

impl DevServer {
    /// Spawn `command` (split on whitespace) in `project_root`
    pub fn spawn(command: &str, project_root: &Path) -> E2eResult<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| E2eError::ServerStartup("DEV_START is empty".to_string()))?;

        info!("Starting app: {}", command);

        let mut child = Command::new(program)
            .args(parts)
            .current_dir(project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::ServerStartup(format!("Failed to spawn '{}': {}", command, e)))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(echo_lines(stdout, true));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(echo_lines(stderr, false));
        }

        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// SIGTERM first, then kill if the app does not exit in time
    pub async fn stop(&mut self) -> E2eResult<()> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        info!("Stopping app (pid: {})", pid);

        terminate(pid);
        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(status) => {
                debug!("App exited with {:?}", status?);
            }
            Err(_) => {
                warn!("App did not exit after SIGTERM, killing");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if let Some(pid) = self.child.id() {
            terminate(pid);
            let _ = self.child.start_kill();
        }
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

/// Echo stderr always and stdout only when it announces readiness
async fn echo_lines<R: AsyncRead + Unpin>(stream: R, only_ready: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !only_ready || mentions_ready(&line) {
            info!("App: {}", line.trim());
        }
    }
}

pub fn mentions_ready(line: &str) -> bool {
    READY_MARKERS.iter().any(|m| line.contains(m))
}

/// Poll `base_url` until any HTTP response arrives
pub async fn wait_for_app(base_url: &str, timeout: Duration) -> E2eResult<()> {
    info!("Waiting for app at {}", base_url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let start = Instant::now();

    loop {
        match client.get(base_url).send().await {
            Ok(resp) => {
                info!("App is ready ({})", resp.status());
                return Ok(());
            }
            Err(e) => {
                // Connection refused is expected while the app is starting
                if !e.is_connect() && !e.is_timeout() {
                    warn!("Readiness check error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout {
            return Err(E2eError::AppNotReady {
                url: base_url.to_string(),
                waited_secs: timeout.as_secs(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}
