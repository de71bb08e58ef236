//! CLI command definitions, routing, and tracing setup.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pkgdoc_builders::{BuildObserver, BuilderKind, SystemRunner, ToolExit, ToolInvocation};
use pkgdoc_core::{
    BuildReport, CONFIG_FILE_NAME, PackageOutcome, ScanOptions, ScanProgress, build_package,
    default_config_text, scan_packages,
};
use pkgdoc_shared::{AppConfig, BuildOptions, init_config, load_config, validate_base_url};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pkgdoc: build package documentation from its manifest.
#[derive(Parser)]
#[command(
    name = "pkgdoc",
    version,
    about = "Build API and prose documentation for packages, cross-linked with their dependencies.",
    long_about = None,
)]
pub(crate) struct Cli {
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
    /// Build the documentation of one package.
    Build {
        /// Package directory or its package.xml.
        #[arg(short = 'p', long)]
        package_path: PathBuf,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Build every package below a directory, each in its own process.
    Scan {
        /// Directory searched for packages.
        #[arg(short = 'p', long)]
        package_path: PathBuf,

        #[command(flatten)]
        build: BuildArgs,

        /// Seconds before a package build is killed.
        #[arg(short = 't', long)]
        timeout: Option<u64>,

        /// Build at most this many packages.
        #[arg(short = 'm', long)]
        max_packages: Option<usize>,

        /// Package builds run at the same time.
        #[arg(short = 's', long)]
        subprocesses: Option<usize>,
    },

    /// Write the default pkgdoc.yaml into a package.
    DefaultConfig {
        /// Package directory or its package.xml.
        #[arg(short = 'p', long)]
        package_path: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags shared by `build` and `scan`; `scan` forwards them to each build.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct BuildArgs {
    /// Build directory of the package. Only checked for existence.
    #[arg(short = 'b', long)]
    pub build_directory: Option<PathBuf>,

    /// Install directory of the package. Deprecated and unused.
    #[arg(short = 'i', long)]
    pub install_directory: Option<PathBuf>,

    /// Cross-reference index root.
    #[arg(short = 'c', long)]
    pub cross_reference_directory: Option<PathBuf>,

    /// Base URL the documentation is published under.
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Output root; the package lands in <output>/<package>.
    #[arg(short = 'o', long)]
    pub output_directory: Option<PathBuf>,

    /// Scratch root for intermediate files.
    #[arg(short = 'd', long)]
    pub doc_build_directory: Option<PathBuf>,

    /// Show full error reports instead of a one-line message.
    #[arg(long)]
    pub debug: bool,
}

impl BuildArgs {
    /// Merge the flags over `config` for the package at `package_path`.
    fn options(&self, package_path: &Path, config: &AppConfig) -> Result<BuildOptions> {
        let mut options = BuildOptions::new(package_path, config);
        options.build_directory = self.build_directory.clone();
        options.install_directory = self.install_directory.clone();
        if let Some(dir) = &self.cross_reference_directory {
            options.cross_reference_directory = dir.clone();
        }
        if let Some(dir) = &self.output_directory {
            options.output_directory = dir.clone();
        }
        if let Some(dir) = &self.doc_build_directory {
            options.doc_build_directory = dir.clone();
        }
        let base_url = self.base_url.as_deref().unwrap_or(&config.defaults.base_url);
        options.base_url = validate_base_url(base_url)?;
        Ok(options)
    }

    /// The flags again, as arguments for a child `pkgdoc build`.
    fn forwarded(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        let mut push = |flag: &str, value: Option<OsString>| {
            if let Some(value) = value {
                args.push(OsString::from(flag));
                args.push(value);
            }
        };
        push("-b", self.build_directory.clone().map(Into::into));
        push("-i", self.install_directory.clone().map(Into::into));
        push("-c", self.cross_reference_directory.clone().map(Into::into));
        push("-u", self.base_url.clone().map(Into::into));
        push("-o", self.output_directory.clone().map(Into::into));
        push("-d", self.doc_build_directory.clone().map(Into::into));
        if self.debug {
            args.push("--debug".into());
        }
        args
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

const CRATES: &[&str] = &[
    "pkgdoc",
    "pkgdoc_core",
    "pkgdoc_builders",
    "pkgdoc_manifest",
    "pkgdoc_xref",
    "pkgdoc_shared",
];

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
    match cli.command {
        Command::Build {
            package_path,
            build,
        } => cmd_build(&package_path, &build).await,
        Command::Scan {
            package_path,
            build,
            timeout,
            max_packages,
            subprocesses,
        } => cmd_scan(&package_path, &build, timeout, max_packages, subprocesses).await,
        Command::DefaultConfig { package_path } => cmd_default_config(&package_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

async fn cmd_build(package_path: &Path, build: &BuildArgs) -> Result<()> {
    let config = load_config()?;
    let options = build.options(package_path, &config)?;
    info!(package = %package_path.display(), base_url = %options.base_url, "building package documentation");

    let observer = Arc::new(CliObserver::new());
    let task_observer: Arc<dyn BuildObserver> = observer.clone();
    let result = tokio::task::spawn_blocking(move || {
        build_package(&options, Arc::new(SystemRunner), task_observer)
    })
    .await?;
    observer.finish();

    match result {
        Ok(report) => {
            print_build_summary(&report);
            Ok(())
        }
        Err(e) if build.debug => Err(e.into()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_build_summary(report: &BuildReport) {
    println!();
    println!("  Documentation built for {}", report.package);
    for job in &report.jobs {
        let target = if job.output_dir.is_empty() {
            "."
        } else {
            job.output_dir.as_str()
        };
        println!("  {:<32} {:>5} files -> {target}", job.name, job.files);
    }
    println!("  Output: {}", report.output_directory.display());
    println!("  Time:   {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

async fn cmd_scan(
    root: &Path,
    build: &BuildArgs,
    timeout: Option<u64>,
    max_packages: Option<usize>,
    subprocesses: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    // Validates the shared flags once instead of once per package.
    let defaults = build.options(root, &config)?;

    if build.install_directory.is_some() {
        tracing::warn!("the install directory is not used by scan");
    }

    let subprocesses = subprocesses
        .or(config.scan.subprocesses)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, usize::from));
    let options = ScanOptions {
        root: root.to_path_buf(),
        command: vec![std::env::current_exe()?.into_os_string()],
        build_args: build.forwarded(),
        doc_build_directory: defaults.doc_build_directory,
        timeout: Duration::from_secs(timeout.unwrap_or(config.scan.timeout_secs)),
        max_packages: max_packages.unwrap_or(config.scan.max_packages),
        subprocesses,
    };
    info!(root = %root.display(), subprocesses, "scanning for packages");

    let progress = Arc::new(CliScanProgress::new());
    let report = scan_packages(&options, progress.clone()).await?;
    progress.finish();

    let failed: Vec<_> = report.failed().collect();
    println!();
    if failed.is_empty() {
        println!("  All {} packages succeeded", report.outcomes.len());
    } else {
        println!("  {} packages failed:", failed.len());
        for outcome in &failed {
            println!(
                "    {}: code {}: {} (log: {})",
                outcome.package,
                outcome.status.code(),
                outcome.message,
                outcome.log_file.display()
            );
        }
    }
    println!("  Time: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(eyre!(
            "{} of {} package builds failed",
            failed.len(),
            report.outcomes.len()
        ))
    }
}

// ---------------------------------------------------------------------------
// default-config
// ---------------------------------------------------------------------------

fn cmd_default_config(package_path: &Path) -> Result<()> {
    let package = pkgdoc_manifest::read_package(package_path)?;
    let path = package.directory().join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(eyre!(
            "'{}' already exists, remove it first to regenerate the default",
            path.display()
        ));
    }

    std::fs::write(&path, default_config_text(&package))?;
    println!("Default configuration written to: {}", path.display());
    println!("Reference it from package.xml so it is used by every build:");
    println!();
    println!("  <export>");
    println!("    <pkgdoc>{CONFIG_FILE_NAME}</pkgdoc>");
    println!("  </export>");
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Build observer drawing an indicatif spinner.
struct CliObserver {
    spinner: ProgressBar,
}

impl CliObserver {
    fn new() -> Self {
        Self { spinner: spinner() }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl BuildObserver for CliObserver {
    fn builder_started(&self, name: &str, kind: BuilderKind) {
        self.spinner.set_message(format!("{name} ({kind})"));
    }

    fn tool_started(&self, invocation: &ToolInvocation) {
        self.spinner.set_message(format!("Running {}", invocation.program));
    }

    fn tool_finished(&self, invocation: &ToolInvocation, exit: ToolExit) {
        if !exit.success() {
            self.spinner
                .println(format!("  {} finished with {exit}", invocation.program));
        }
    }

    fn builder_finished(&self, name: &str, _kind: BuilderKind, output: Option<&Path>) {
        match output {
            Some(_) => self.spinner.println(format!("  ✓ {name}")),
            None => self.spinner.println(format!("  - {name} (skipped)")),
        }
    }

    fn warning(&self, message: &str) {
        self.spinner.println(format!("  warning: {message}"));
    }
}

/// Scan progress as a bar over the package count.
struct CliScanProgress {
    bar: ProgressBar,
}

impl CliScanProgress {
    fn new() -> Self {
        Self { bar: spinner() }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ScanProgress for CliScanProgress {
    fn packages_found(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
    }

    fn package_started(&self, package: &str) {
        self.bar.set_message(package.to_string());
    }

    fn package_finished(&self, outcome: &PackageOutcome, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
        if outcome.status.code() != 0 {
            self.bar
                .println(format!("  ✗ {} ({})", outcome.package, outcome.message));
        }
    }
}
