//! Benchmark executor: the per-revision pipeline.
//!
//! The harness wires the walker, sampler, archive, and reporter together and
//! drives the whole run: resolve revisions oldest-first, report every
//! revision's metadata up front, then for each revision build it and run
//! every benchmark in order. Build and version-control failures are fatal;
//! a failure while running one revision's benchmarks is logged and only ends
//! that revision, so later revisions still get measured.
//!
//! Everything runs on one logical thread. Benchmarks never overlap each
//! other or the build, which keeps measurements free of self-inflicted
//! CPU/memory contention.

use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};

use crate::archive::OutputArchive;
use crate::command;
use crate::config::{BenchmarkSpec, Config};
use crate::error::{HarnessError, Result};
use crate::record::{MetricRecord, hostname};
use crate::repo::RevisionWalker;
use crate::report::Reporter;
use crate::sampler::Sampler;

/// Run options, usually taken from the CLI.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Branch to walk.
    pub branch: String,
    /// Label this run's results as the comparison baseline. Metadata and
    /// records carry the branch label `"reference"` instead of the branch.
    pub reference: bool,
    /// Skip repository preparation, version-control queries, and the build;
    /// measure the pinned `revision` from configuration instead.
    pub nobuild: bool,
    /// Ingestion endpoint override; `None` uses the default local service.
    pub endpoint: Option<String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            branch: "master".to_string(),
            reference: false,
            nobuild: false,
            endpoint: None,
        }
    }
}

/// Where the harness keeps its run artifacts.
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    /// Directory for per-benchmark stdout/stderr capture files.
    pub capture_dir: PathBuf,
    /// Directory for the content-addressed output archive.
    pub archive_dir: PathBuf,
}

impl Default for HarnessPaths {
    fn default() -> Self {
        Self {
            capture_dir: PathBuf::from("."),
            archive_dir: PathBuf::from("archive"),
        }
    }
}

/// The assembled pipeline.
pub struct Harness {
    config: Config,
    walker: RevisionWalker,
    sampler: Sampler,
    archive: OutputArchive,
    reporter: Reporter,
    environment: String,
    branch_label: String,
    capture_dir: PathBuf,
    skip_build: bool,
}

impl Harness {
    /// Wire up a harness from configuration and options.
    ///
    /// Validates the flag/configuration combination: `--nobuild` requires a
    /// pinned `revision` entry, and a normal run requires a build command.
    pub fn new(config: Config, options: HarnessOptions, paths: HarnessPaths) -> Result<Harness> {
        let branch_label = if options.reference {
            "reference".to_string()
        } else {
            options.branch.clone()
        };

        let walker = if options.nobuild {
            let pinned = config.revision.clone().ok_or_else(|| {
                HarnessError::Config(
                    "running without build requires a `revision` entry in the configuration"
                        .to_string(),
                )
            })?;
            RevisionWalker::pinned(
                config.folder.clone(),
                config.repo_name.clone(),
                branch_label.clone(),
                pinned.name,
                pinned.date,
            )
        } else {
            if config.build_argv.is_empty() {
                return Err(HarnessError::Config(
                    "no build command configured".to_string(),
                ));
            }
            RevisionWalker::history(
                config.folder.clone(),
                config.repo_name.clone(),
                branch_label.clone(),
                config.repo_url.clone(),
                options.branch.clone(),
            )
        };

        fs::create_dir_all(&paths.capture_dir)?;
        let archive = OutputArchive::new(&paths.archive_dir)?;
        let reporter = match &options.endpoint {
            Some(url) => Reporter::with_base_url(url.clone())?,
            None => Reporter::new()?,
        };

        Ok(Harness {
            config,
            walker,
            sampler: Sampler::new(),
            archive,
            reporter,
            environment: hostname(),
            branch_label,
            capture_dir: paths.capture_dir,
            skip_build: options.nobuild,
        })
    }

    /// Use a custom sampler (e.g. a different polling cadence).
    pub fn with_sampler(mut self, sampler: Sampler) -> Harness {
        self.sampler = sampler;
        self
    }

    /// Measure up to `count` revisions.
    ///
    /// Metadata for every resolved revision is reported before any build or
    /// benchmark starts. An empty revision list is the one degenerate input
    /// that is survivable: it is logged and the run becomes a no-op.
    pub fn run(&self, count: usize) -> Result<()> {
        self.walker.prepare()?;
        let revisions = self.walker.revisions(count)?;
        if revisions.is_empty() {
            warn!("no revisions found");
            return Ok(());
        }

        for revision in &revisions {
            let metadata = self.walker.details(revision)?;
            self.reporter.post_revision(&metadata);
        }

        for revision in &revisions {
            self.build(revision)?;
            if let Err(e) = self.run_benchmarks_for_revision(revision) {
                error!("benchmarks for revision {revision} failed: {e}");
            }
        }
        Ok(())
    }

    /// Check out and build one revision. Skipped entirely when the build was
    /// performed externally. Failures here are fatal to the whole run.
    fn build(&self, revision: &str) -> Result<()> {
        if self.skip_build {
            return Ok(());
        }
        info!("building {revision}");
        self.walker.checkout(revision)?;
        command::run(&self.config.build_argv, Some(self.walker.folder()))
    }

    /// Run every configured benchmark for one revision, posting each
    /// benchmark's metric batch as soon as it completes.
    fn run_benchmarks_for_revision(&self, revision: &str) -> Result<()> {
        for benchmark in &self.config.benchmarks {
            let records = self.run_benchmark(benchmark, revision)?;
            self.reporter.post_results(&records);
        }
        Ok(())
    }

    /// Measure one benchmark and assemble its four metric records, all
    /// sharing the checksum of the archived stdout.
    fn run_benchmark(&self, benchmark: &BenchmarkSpec, revision: &str) -> Result<Vec<MetricRecord>> {
        info!("running {}:{}", benchmark.executable, benchmark.name);
        let stdout_path = self.capture_dir.join(format!(
            "{}_{}_{}_stdout.txt",
            benchmark.executable, benchmark.name, revision
        ));
        let stderr_path = self.capture_dir.join(format!(
            "{}_{}_{}_stderr.txt",
            benchmark.executable, benchmark.name, revision
        ));

        let measurement = self.sampler.measure(
            &benchmark.argv,
            &self.config.folder,
            &stdout_path,
            &stderr_path,
        )?;
        let checksum = self.archive.archive(&stdout_path)?;
        OutputArchive::remove_if_empty(&stderr_path)?;

        let metrics = [
            ("duration", measurement.duration_secs),
            ("rss", measurement.peak_rss_bytes as f64),
            ("usr", measurement.user_cpu_secs),
            ("sys", measurement.system_cpu_secs),
        ];
        let records = metrics
            .into_iter()
            .map(|(metric, value)| MetricRecord {
                commitid: revision.to_string(),
                repo: self.config.repo_name.clone(),
                branch: self.branch_label.clone(),
                environment: self.environment.clone(),
                executable: benchmark.executable.clone(),
                benchmark: benchmark.name.clone(),
                metric: metric.to_string(),
                result_value: value,
                checksum: checksum.clone(),
            })
            .collect();
        Ok(records)
    }
}
