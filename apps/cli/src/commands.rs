//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sitekiln_core::{ProgressReporter, RunSummary, Runner, Step, StepOutcome, Task};
use sitekiln_amp::{ValidationResult, format_result};
use sitekiln_shared::{
    FileReport, SiteConfig, config_file_path, init_config, load_config, load_config_from,
    total_bytes,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SiteKiln: build, serve and validate an AMP static site.
#[derive(Parser)]
#[command(
    name = "sitekiln",
    version,
    about = "Static-site asset pipeline: Sass, CSS pruning, AMP HTML assembly, dev server, validation.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true, env = "SITEKILN_ROOT")]
    pub root: Option<PathBuf>,

    /// Config file (defaults to <root>/sitekiln.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Compile, prune, prefix and minify stylesheets.
    Styles,

    /// Assemble staged HTML with inlined CSS into the output tree.
    Html,

    /// Copy source HTML into the staging tree.
    #[command(name = "copy:tmp")]
    CopyTmp,

    /// Copy static files and images into the output tree.
    #[command(name = "copy:static")]
    CopyStatic,

    /// Remove the staging tree and the output tree's contents.
    Clean,

    /// Serve the output tree.
    Server {
        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Build, serve with live reload, and rebuild on changes.
    Dev {
        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Full production build.
    Build,

    /// Build, then validate every output page as AMP.
    Amp,

    /// Quality checks (build + AMP validation).
    Qa,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write sitekiln.toml with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitekiln=info",
        1 => "sitekiln=debug",
        _ => "sitekiln=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };

    let (task, port) = match cli.command {
        Command::Styles => (Task::Styles, None),
        Command::Html => (Task::Html, None),
        Command::CopyTmp => (Task::CopyStaging, None),
        Command::CopyStatic => (Task::CopyStatic, None),
        Command::Clean => (Task::Clean, None),
        Command::Server { port } => (Task::Server, port),
        Command::Dev { port } => (Task::Dev, port),
        Command::Build => (Task::Build, None),
        Command::Amp => (Task::Amp, None),
        Command::Qa => (Task::Qa, None),
        Command::Config { action } => {
            return match action {
                ConfigAction::Init => cmd_config_init(&root),
                ConfigAction::Show => cmd_config_show(&root, cli.config.as_deref()),
            };
        }
    };

    let mut config = resolve_config(&root, cli.config.as_deref())?;
    if let Some(port) = port {
        config.server.port = port;
    }

    cmd_task(&root, config, task).await
}

fn resolve_config(root: &Path, explicit: Option<&Path>) -> Result<SiteConfig> {
    let config = match explicit {
        Some(path) => load_config_from(path)?,
        None => load_config(root)?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_task(root: &Path, config: SiteConfig, task: Task) -> Result<()> {
    info!(task = %task, root = %root.display(), "running task");

    let runner = Runner::new(root, config);
    let reporter = CliProgress::new(root);

    let result = runner.run(task, &reporter).await;
    reporter.spinner.finish_and_clear();
    let summary = result?;

    println!();
    println!("  {} finished in {:.1}s", summary.task, summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_config_init(root: &Path) -> Result<()> {
    let path = init_config(root)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(root: &Path, explicit: Option<&Path>) -> Result<()> {
    let config = resolve_config(root, explicit)?;
    let source = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_file_path(root));
    println!("# {}", source.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    root: PathBuf,
}

impl CliProgress {
    fn new(root: &Path) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self {
            spinner,
            root: root.to_path_buf(),
        }
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

fn describe_files(files: &[FileReport]) -> String {
    format!("{} file(s), {}", files.len(), human_bytes(total_bytes(files)))
}

fn human_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

impl ProgressReporter for CliProgress {
    fn step_started(&self, step: Step) {
        let message = match step {
            Step::Serve | Step::ServeAndWatch => "Serving (Ctrl-C to stop)".to_string(),
            _ => format!("Running {step}"),
        };
        self.spinner.set_message(message);
    }

    fn step_finished(&self, step: Step, outcome: &StepOutcome, elapsed: Duration) {
        let detail = match outcome {
            StepOutcome::Cleaned { removed } => format!("{removed} removed"),
            StepOutcome::Copied(files) => describe_files(files),
            StepOutcome::Styles(report) => {
                let mut detail = format!(
                    "{}, {} unused selector(s) removed",
                    describe_files(&report.written),
                    report.removed_selectors
                );
                if !report.failed.is_empty() {
                    detail.push_str(&format!(", {} failed to compile", report.failed.len()));
                }
                detail
            }
            StepOutcome::Html(report) => describe_files(&report.written),
            StepOutcome::Validated(results) => format!("{} page(s) valid", results.len()),
            StepOutcome::Served => "stopped".to_string(),
        };
        self.spinner.println(format!(
            "  ✓ {step:<12} {detail} ({:.2}s)",
            elapsed.as_secs_f64()
        ));
    }

    fn validated(&self, path: &Path, result: &ValidationResult) {
        let shown = self.relative(path).display().to_string();
        self.spinner.println(format_result(&shown, result));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
