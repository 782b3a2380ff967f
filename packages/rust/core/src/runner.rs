//! Plan execution.
//!
//! The runner executes a step plan sequentially and halts on the first error.
//! CPU-bound steps run on the blocking pool; steps communicate only through
//! the file tree.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use sitekiln_amp::{FileValidation, ValidationResult};
use sitekiln_html::HtmlReport;
use sitekiln_server::{ChangeKind, DevServer, Reloader, ServerOptions, SourceWatcher};
use sitekiln_shared::{FileReport, ProjectLayout, Result, SiteConfig, SiteKilnError};
use sitekiln_styles::{StylesOptions, StylesReport};

use crate::tasks::{Step, Task, plan};
use crate::{clean, copy};

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a step starts.
    fn step_started(&self, step: Step);
    /// Called after a step succeeds.
    fn step_finished(&self, step: Step, outcome: &StepOutcome, elapsed: Duration);
    /// Called once per validated document.
    fn validated(&self, path: &Path, result: &ValidationResult);
    /// Called when the whole plan has completed.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn step_started(&self, _step: Step) {}
    fn step_finished(&self, _step: Step, _outcome: &StepOutcome, _elapsed: Duration) {}
    fn validated(&self, _path: &Path, _result: &ValidationResult) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// What a finished step produced.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Cleaned { removed: usize },
    Copied(Vec<FileReport>),
    Styles(StylesReport),
    Html(HtmlReport),
    Validated(Vec<FileValidation>),
    Served,
}

/// Result of running one task.
#[derive(Debug)]
pub struct RunSummary {
    pub task: Task,
    pub steps: Vec<(Step, StepOutcome)>,
    pub elapsed: Duration,
}

/// Executes task plans against one project.
#[derive(Debug, Clone)]
pub struct Runner {
    layout: ProjectLayout,
    config: SiteConfig,
}

impl Runner {
    pub fn new(root: &Path, config: SiteConfig) -> Self {
        Self {
            layout: ProjectLayout::resolve(root, &config),
            config,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Run `task` and its prerequisites.
    #[instrument(skip_all, fields(task = %task))]
    pub async fn run(&self, task: Task, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        let start = Instant::now();
        let steps = plan(&[task]);
        info!(steps = ?steps.iter().map(|s| s.label()).collect::<Vec<_>>(), "starting");

        let mut summary = RunSummary {
            task,
            steps: Vec::with_capacity(steps.len()),
            elapsed: Duration::ZERO,
        };

        for step in steps {
            progress.step_started(step);
            let step_start = Instant::now();

            let outcome = match self.run_step(step, progress).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(step = %step, error = %e, "step failed, halting");
                    return Err(e);
                }
            };

            let elapsed = step_start.elapsed();
            info!(step = %step, elapsed_ms = elapsed.as_millis() as u64, "step finished");
            progress.step_finished(step, &outcome, elapsed);
            summary.steps.push((step, outcome));
        }

        summary.elapsed = start.elapsed();
        progress.done(&summary);
        Ok(summary)
    }

    async fn run_step(&self, step: Step, progress: &dyn ProgressReporter) -> Result<StepOutcome> {
        match step {
            Step::Clean => clean::clean(&self.layout)
                .await
                .map(|removed| StepOutcome::Cleaned { removed }),
            Step::CopyStaging => copy::copy_to_staging(&self.layout)
                .await
                .map(StepOutcome::Copied),
            Step::CopyStatic => copy::copy_static(&self.layout, &self.config.static_files)
                .await
                .map(StepOutcome::Copied),
            Step::Styles => self.styles().await.map(StepOutcome::Styles),
            Step::Html => self.html().await.map(StepOutcome::Html),
            Step::Validate => self.validate(progress).await.map(StepOutcome::Validated),
            Step::Serve => {
                let server = DevServer::new(self.server_options());
                server.serve(sitekiln_server::ctrl_c()).await?;
                Ok(StepOutcome::Served)
            }
            Step::ServeAndWatch => {
                self.serve_and_watch().await?;
                Ok(StepOutcome::Served)
            }
        }
    }

    async fn styles(&self) -> Result<StylesReport> {
        let opts = StylesOptions::from_config(&self.layout, &self.config);
        blocking(move || sitekiln_styles::build_styles(&opts)).await
    }

    async fn html(&self) -> Result<HtmlReport> {
        let layout = self.layout.clone();
        blocking(move || sitekiln_html::assemble_html(&layout)).await
    }

    /// Validate every output document; fails if any document has an error.
    async fn validate(&self, progress: &dyn ProgressReporter) -> Result<Vec<FileValidation>> {
        let output = self.layout.output.clone();
        let results = blocking(move || sitekiln_amp::validate_tree(&output)).await?;

        for file in &results {
            progress.validated(&file.path, &file.result);
        }

        let failed = results.iter().filter(|r| !r.result.passed()).count();
        if failed > 0 {
            return Err(SiteKilnError::AmpInvalid { failed });
        }
        Ok(results)
    }

    fn server_options(&self) -> ServerOptions {
        ServerOptions {
            root: self.layout.output.clone(),
            port: self.config.server.port,
            reload_delay: Duration::from_millis(self.config.server.reload_delay_ms),
        }
    }

    /// Serve the output tree and rebuild on source changes until Ctrl-C.
    async fn serve_and_watch(&self) -> Result<()> {
        let server = DevServer::new(self.server_options());
        let reloader = server.reloader();
        let mut watcher = SourceWatcher::start(&self.layout.source)?;

        let mut serving = tokio::spawn(server.serve(sitekiln_server::ctrl_c()));

        loop {
            tokio::select! {
                joined = &mut serving => {
                    return joined.map_err(|e| SiteKilnError::Aborted(e.to_string()))?;
                }
                batch = watcher.next_batch() => {
                    let Some(kinds) = batch else {
                        warn!("watcher stopped");
                        break;
                    };
                    let _ = self.on_change(kinds.contains(&ChangeKind::Styles), &reloader).await;
                }
            }
        }

        serving
            .await
            .map_err(|e| SiteKilnError::Aborted(e.to_string()))?
    }

    /// Rebuild what a source change needs, then schedule a reload. Rebuild
    /// errors are logged and the server keeps running; no reload is sent.
    async fn on_change(
        &self,
        styles_changed: bool,
        reloader: &Reloader,
    ) -> Option<JoinHandle<usize>> {
        if styles_changed {
            info!("stylesheets changed, rebuilding");
            let rebuilt = match self.styles().await {
                Ok(_) => self.html().await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = rebuilt {
                error!(error = %e, "rebuild failed");
                return None;
            }
        }

        let reloader = reloader.clone();
        Some(tokio::spawn(async move { reloader.reload().await }))
    }
}

/// Run a synchronous step on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SiteKilnError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use sitekiln_shared::fs;

    const PAGE: &str = include_str!("../../../../fixtures/site/index.html");
    const SCSS: &str = include_str!("../../../../fixtures/site/main.scss");
    const PARTIAL: &str = include_str!("../../../../fixtures/site/_colors.scss");

    #[derive(Default)]
    struct Recorder {
        started: Mutex<Vec<Step>>,
        validated: Mutex<Vec<bool>>,
    }

    impl ProgressReporter for Recorder {
        fn step_started(&self, step: Step) {
            self.started.lock().unwrap().push(step);
        }
        fn step_finished(&self, _step: Step, _outcome: &StepOutcome, _elapsed: Duration) {}
        fn validated(&self, _path: &Path, result: &ValidationResult) {
            self.validated.lock().unwrap().push(result.passed());
        }
        fn done(&self, _summary: &RunSummary) {}
    }

    fn runner(root: &Path) -> Runner {
        Runner::new(root, SiteConfig::default())
    }

    fn write_site(layout: &ProjectLayout) {
        fs::write_file(&layout.source.join("index.html"), PAGE).unwrap();
        fs::write_file(&layout.source_css().join("main.scss"), SCSS).unwrap();
        fs::write_file(&layout.source_css().join("_colors.scss"), PARTIAL).unwrap();
        fs::write_file(&layout.source.join("robots.txt"), "User-agent: *\n").unwrap();
    }

    fn output_entries(layout: &ProjectLayout) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&layout.output)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn build_of_empty_source_leaves_only_static_files() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let layout = runner.layout().clone();

        fs::write_file(&layout.output.join("stale.html"), "old").unwrap();
        fs::write_file(&layout.output.join("css/old.css"), "old").unwrap();
        fs::write_file(&layout.staging.join("leftover.html"), "old").unwrap();
        fs::write_file(&layout.source.join("favicon.ico"), [0u8, 1, 2]).unwrap();
        fs::write_file(&layout.source.join("humans.txt"), "us").unwrap();

        runner.run(Task::Build, &SilentProgress).await.expect("build");

        assert_eq!(output_entries(&layout), vec!["favicon.ico", "humans.txt"]);
        assert!(!layout.staging.join("leftover.html").exists());
    }

    #[tokio::test]
    async fn build_produces_inlined_minified_pages() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let layout = runner.layout().clone();
        write_site(&layout);

        let summary = runner.run(Task::Build, &SilentProgress).await.expect("build");
        assert_eq!(summary.steps.len(), 5);

        let page = std::fs::read_to_string(layout.output.join("index.html")).unwrap();
        assert!(page.contains("<style amp-custom>"));
        assert!(page.contains(".hero"));
        assert!(!page.contains("never-rendered"));
        assert!(!page.contains("<!--"));

        assert!(layout.output_css().join("main.css").exists());
        assert!(!layout.output_css().join("_colors.css").exists());
        assert!(layout.staging_css().join("main.css").exists());
        assert!(layout.output.join("robots.txt").exists());
    }

    #[tokio::test]
    async fn amp_passes_for_a_valid_site() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        write_site(runner.layout());

        let progress = Recorder::default();
        let summary = runner.run(Task::Amp, &progress).await.expect("amp");

        assert_eq!(summary.steps.last().map(|(s, _)| *s), Some(Step::Validate));
        assert_eq!(*progress.validated.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn qa_fails_on_disallowed_script() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let layout = runner.layout().clone();
        write_site(&layout);
        let broken = PAGE.replace(
            "</body>",
            "<script>document.title = 'x'</script></body>",
        );
        fs::write_file(&layout.source.join("broken.html"), broken).unwrap();

        let progress = Recorder::default();
        let err = runner.run(Task::Qa, &progress).await.unwrap_err();

        assert!(matches!(err, SiteKilnError::AmpInvalid { failed: 1 }));
        assert_eq!(*progress.validated.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn failing_step_halts_the_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.styles.browsers = vec!["netscape >= 4".into()];
        let runner = Runner::new(dir.path(), config);

        let progress = Recorder::default();
        let err = runner.run(Task::Build, &progress).await.unwrap_err();

        assert!(matches!(err, SiteKilnError::Config { .. }));
        assert_eq!(
            *progress.started.lock().unwrap(),
            vec![Step::Clean, Step::CopyStaging, Step::Styles]
        );
    }

    #[tokio::test]
    async fn unreadable_static_file_halts_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let layout = runner.layout().clone();
        write_site(&layout);
        std::fs::create_dir_all(layout.source.join("favicon.ico")).unwrap();

        let progress = Recorder::default();
        let err = runner.run(Task::Build, &progress).await.unwrap_err();

        assert!(matches!(err, SiteKilnError::Io { .. }));
        assert_eq!(
            progress.started.lock().unwrap().last(),
            Some(&Step::CopyStatic)
        );
    }

    #[tokio::test]
    async fn style_change_rebuilds_pages_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let layout = runner.layout().clone();
        write_site(&layout);
        runner.run(Task::Build, &SilentProgress).await.expect("build");

        let scss = format!("{SCSS}\n.lead {{ letter-spacing: 3px; }}\n");
        fs::write_file(&layout.source_css().join("main.scss"), scss).unwrap();

        let reloader = Reloader::new(Duration::ZERO);
        let reload = runner.on_change(true, &reloader).await.expect("reload scheduled");
        assert_eq!(reload.await.unwrap(), 0);

        let page = std::fs::read_to_string(layout.output.join("index.html")).unwrap();
        assert!(page.contains("letter-spacing:3px"));
    }

    #[tokio::test]
    async fn html_change_only_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());

        let reloader = Reloader::new(Duration::ZERO);
        let reload = runner.on_change(false, &reloader).await.expect("reload scheduled");
        assert_eq!(reload.await.unwrap(), 0);
        assert!(!runner.layout().output.exists());
    }

    #[tokio::test]
    async fn failed_rebuild_skips_the_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.styles.browsers = vec!["netscape >= 4".into()];
        let runner = Runner::new(dir.path(), config);

        let reloader = Reloader::new(Duration::ZERO);
        assert!(runner.on_change(true, &reloader).await.is_none());
    }
}
