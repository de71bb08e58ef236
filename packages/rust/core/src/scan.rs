//! Building every package below a directory, one child process per package.
//!
//! Each package is built by a separate `pkgdoc build` process so a crash or
//! hang in one package cannot take the others down. Children run
//! concurrently up to a limit, are killed when they exceed the timeout, and
//! write their output to `<doc_build>/<package>.txt`.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use pkgdoc_manifest::find_packages;
use pkgdoc_shared::util::{ensure_dir, millis};
use pkgdoc_shared::{Package, PkgDocError, Result};

/// Exit classification of one package build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Succeeded,
    /// The build process reported an error.
    Failed,
    /// Killed after exceeding the timeout.
    TimedOut,
    /// Could not be started or ended abnormally.
    Crashed,
}

impl ScanStatus {
    /// Numeric code shown in summaries.
    pub fn code(&self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Failed => 1,
            Self::TimedOut => 2,
            Self::Crashed => 3,
        }
    }
}

/// What happened to one package.
#[derive(Debug, Clone)]
pub struct PackageOutcome {
    pub package: String,
    pub path: PathBuf,
    pub status: ScanStatus,
    pub message: String,
    pub log_file: PathBuf,
    pub elapsed: Duration,
}

/// Options for [`scan_packages`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory searched for packages.
    pub root: PathBuf,
    /// Program and leading arguments of the single-package build command.
    pub command: Vec<OsString>,
    /// Appended after `build -p <package>`.
    pub build_args: Vec<OsString>,
    /// Where the per-package log files go.
    pub doc_build_directory: PathBuf,
    pub timeout: Duration,
    pub max_packages: usize,
    pub subprocesses: usize,
}

/// Aggregate result, sorted by package name.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub outcomes: Vec<PackageOutcome>,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn failed(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status != ScanStatus::Succeeded)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Progress callbacks for a scan.
pub trait ScanProgress: Send + Sync {
    /// Called once the package list is known.
    fn packages_found(&self, total: usize);
    fn package_started(&self, package: &str);
    /// `done` counts finished packages including this one.
    fn package_finished(&self, outcome: &PackageOutcome, done: usize, total: usize);
}

/// No-op progress for headless/test usage.
pub struct SilentScanProgress;

impl ScanProgress for SilentScanProgress {
    fn packages_found(&self, _total: usize) {}
    fn package_started(&self, _package: &str) {}
    fn package_finished(&self, _outcome: &PackageOutcome, _done: usize, _total: usize) {}
}

/// Build every package found below `options.root`.
#[instrument(skip_all, fields(root = %options.root.display()))]
pub async fn scan_packages(
    options: &ScanOptions,
    progress: Arc<dyn ScanProgress>,
) -> Result<ScanReport> {
    let start = Instant::now();
    if options.command.is_empty() {
        return Err(PkgDocError::validation("scan needs a build command to run"));
    }

    let mut packages = find_packages(&options.root)?;
    if packages.is_empty() {
        return Err(PkgDocError::validation(format!(
            "no packages found in subdirectories of '{}'",
            options.root.display()
        )));
    }
    if packages.len() > options.max_packages {
        warn!(
            found = packages.len(),
            max = options.max_packages,
            "limiting the number of packages built"
        );
        packages.truncate(options.max_packages);
    }
    ensure_dir(&options.doc_build_directory)?;

    let total = packages.len();
    info!(total, subprocesses = options.subprocesses, "building packages");
    progress.packages_found(total);

    let semaphore = Arc::new(Semaphore::new(options.subprocesses.max(1)));
    let options = Arc::new(options.clone());
    let mut tasks = JoinSet::new();
    for package in packages {
        let semaphore = semaphore.clone();
        let options = options.clone();
        let progress = progress.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            progress.package_started(&package.name);
            build_one(&package, &options).await
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => {
                progress.package_finished(&outcome, outcomes.len() + 1, total);
                outcomes.push(outcome);
            }
            Err(e) => error!(error = %e, "package build task ended unexpectedly"),
        }
    }
    outcomes.sort_by(|a, b| a.package.cmp(&b.package));

    let report = ScanReport {
        outcomes,
        elapsed: start.elapsed(),
    };
    info!(
        total,
        failed = report.failed().count(),
        elapsed_ms = millis(report.elapsed),
        "scan complete"
    );
    Ok(report)
}

async fn build_one(package: &Package, options: &ScanOptions) -> PackageOutcome {
    let start = Instant::now();
    let path = package.directory().to_path_buf();
    let log_file = options
        .doc_build_directory
        .join(format!("{}.txt", package.name));

    let (status, message) = match run_child(&path, &log_file, options).await {
        Ok(result) => result,
        Err(e) => (ScanStatus::Crashed, e.to_string()),
    };
    let elapsed = start.elapsed();

    let footer = match status {
        ScanStatus::Succeeded => format!(
            "Completed package build in {:.1} seconds\n",
            elapsed.as_secs_f64()
        ),
        _ => format!(
            "Package build failed after {:.1} seconds (code {}): {message}\n",
            elapsed.as_secs_f64(),
            status.code()
        ),
    };
    if let Err(e) = append_log(&log_file, &footer) {
        warn!(package = %package.name, error = %e, "could not finish log file");
    }

    match status {
        ScanStatus::Succeeded => info!(package = %package.name, "package built"),
        _ => warn!(package = %package.name, code = status.code(), %message, "package build failed"),
    }

    PackageOutcome {
        package: package.name.clone(),
        path,
        status,
        message,
        log_file,
        elapsed,
    }
}

async fn run_child(
    package_path: &Path,
    log_file: &Path,
    options: &ScanOptions,
) -> Result<(ScanStatus, String)> {
    let mut log = std::fs::File::create(log_file).map_err(|e| PkgDocError::io(log_file, e))?;
    writeln!(
        log,
        "{} Processing package build at {}",
        chrono::Utc::now().to_rfc3339(),
        package_path.display()
    )
    .map_err(|e| PkgDocError::io(log_file, e))?;
    let stderr = log.try_clone().map_err(|e| PkgDocError::io(log_file, e))?;

    let program = &options.command[0];
    let mut command = Command::new(program);
    command
        .args(&options.command[1..])
        .arg("build")
        .arg("-p")
        .arg(package_path)
        .args(&options.build_args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);

    let tool = program.to_string_lossy().into_owned();
    let mut child = command
        .spawn()
        .map_err(|source| PkgDocError::ToolSpawn { tool, source })?;

    match tokio::time::timeout(options.timeout, child.wait()).await {
        Ok(Ok(status)) if status.success() => Ok((ScanStatus::Succeeded, String::new())),
        Ok(Ok(status)) => match status.code() {
            Some(code) => Ok((ScanStatus::Failed, format!("build exited with code {code}"))),
            None => Ok((ScanStatus::Crashed, format!("build terminated abnormally ({status})"))),
        },
        Ok(Err(e)) => Ok((ScanStatus::Crashed, format!("waiting for the build failed: {e}"))),
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "could not kill timed out build");
            }
            Ok((
                ScanStatus::TimedOut,
                format!("build timed out after {} seconds", options.timeout.as_secs()),
            ))
        }
    }
}

fn append_log(log_file: &Path, text: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_file)
        .map_err(|e| PkgDocError::io(log_file, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| PkgDocError::io(log_file, e))
}
