//! A full smoke run against a scripted browser: evidence, visual baselines, report

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use tempfile::TempDir;

use autosmoke_common::{DiscoveredRoute, Evidence, RouteConfig, RunnerConfig, SmokeConfig};
use autosmoke_e2e::{
    BrowserDriver, CaptureRequest, E2eResult, MarkdownReport, PageCapture, ReportData, RouteStatus, SmokeRunner,
};

/// Serves a fixed capture per route and paints a screenshot of the given shade
struct ScriptedBrowser {
    pages: HashMap<String, (PageCapture, u8)>,
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn capture(&self, request: &CaptureRequest) -> E2eResult<PageCapture> {
        let (mut capture, shade) = self.pages.get(&request.route).cloned().unwrap_or_default();
        if let Some(path) = &request.screenshot_path {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            RgbaImage::from_pixel(8, 8, image::Rgba([shade, shade, shade, 255]))
                .save(path)
                .unwrap();
            capture.screenshot_path = Some(path.to_string_lossy().to_string());
        }
        Ok(capture)
    }
}

fn page(status: u16, dom: &str) -> PageCapture {
    PageCapture {
        status: Some(status),
        final_url: String::new(),
        dom: dom.to_string(),
        ..Default::default()
    }
}

fn route(path: &str) -> DiscoveredRoute {
    DiscoveredRoute {
        path: path.to_string(),
        source_file: PathBuf::from(format!("app{}/page.tsx", path)),
        config: RouteConfig::default(),
        is_dynamic: false,
    }
}

fn settings(root: &Path) -> RunnerConfig {
    RunnerConfig {
        project_root: root.to_path_buf(),
        retries: 0,
        visual_mode: true,
        ..RunnerConfig::default()
    }
}

fn browser(home_shade: u8) -> Arc<ScriptedBrowser> {
    let mut console_noise = page(200, "<main><table><tbody></tbody></table></main>");
    console_noise.console_errors = vec!["TypeError: x is undefined".to_string()];

    Arc::new(ScriptedBrowser {
        pages: HashMap::from([
            ("/".to_string(), (page(200, "<main>home</main>"), home_shade)),
            ("/projects".to_string(), (console_noise, 0)),
            ("/missing".to_string(), (page(404, "<main>not found</main>"), 0)),
        ]),
    })
}

#[tokio::test]
async fn smoke_run_writes_evidence_and_report() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let routes = vec![route("/"), route("/projects"), route("/missing")];

    let runner = SmokeRunner::new(browser(40), settings(root), &SmokeConfig::default()).unwrap();
    let suite = runner.run(&routes).await.unwrap();

    let statuses: Vec<_> = suite.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![RouteStatus::Passed, RouteStatus::Failed, RouteStatus::Failed]
    );
    assert_eq!(
        suite.results[1].failures,
        vec!["Console error: TypeError: x is undefined"]
    );

    // Evidence is written for every captured route, failing or not
    let evidence = Evidence::from_file(&root.join(".cache/evidence/_projects.json")).unwrap();
    assert_eq!(evidence.console_errors, vec!["TypeError: x is undefined"]);
    assert!(evidence.screenshot_path.ends_with("_projects.png"));
    assert!(root.join(".cache/evidence/_.json").exists());

    // First visual run creates baselines
    assert!(root.join(".cache/visual/baselines/home.png").exists());
    assert!(suite.results[0].visual.as_ref().unwrap().baseline_created);

    let report = MarkdownReport::new(root.join("smoke-report.md"));
    report.save(&ReportData::from_suite(&suite, routes.len())).unwrap();
    let markdown = std::fs::read_to_string(report.path()).unwrap();
    assert!(markdown.contains("### `/missing`"));
    assert!(markdown.contains("- Expected HTTP 200, got 404"));
}

#[tokio::test]
async fn changed_screenshot_fails_second_run() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let routes = vec![route("/")];

    let first = SmokeRunner::new(browser(40), settings(root), &SmokeConfig::default())
        .unwrap()
        .run(&routes)
        .await
        .unwrap();
    assert_eq!(first.passed(), 1);

    let second = SmokeRunner::new(browser(200), settings(root), &SmokeConfig::default())
        .unwrap()
        .run(&routes)
        .await
        .unwrap();

    let result = &second.results[0];
    assert_eq!(result.status, RouteStatus::Failed);
    assert!(result.failures[0].starts_with("Visual regression: 100.00% pixels differ"));
    assert!(root.join(".cache/visual/diffs/home-diff.png").exists());
}
