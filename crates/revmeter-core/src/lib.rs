//! # revmeter-core
//!
//! **Per-commit benchmark measurement without instrumenting the target.**
//!
//! `revmeter-core` is the revision-benchmark execution engine behind the
//! `revmeter` CLI. Given a source repository, a range of revisions, and a set
//! of benchmark commands, it builds each revision, runs every benchmark as a
//! child process, samples the process's resource usage while it is alive, and
//! posts structured metric records to an ingestion endpoint.
//!
//! ## Quick Start
//!
//! ```no_run
//! use revmeter_core::{Config, Harness, HarnessOptions, HarnessPaths};
//!
//! let config = Config::load(std::path::Path::new("revmeter.yaml")).unwrap();
//! let options = HarnessOptions {
//!     branch: "master".to_string(),
//!     ..Default::default()
//! };
//! let harness = Harness::new(config, options, HarnessPaths::default()).unwrap();
//! harness.run(2).unwrap();
//! ```
//!
//! ## Architecture
//!
//! Revision walker → build → sampler → archive → reporter
//!
//! The walker resolves the ordered revision list (oldest first) from version
//! control, or a single pinned pseudo-revision in reference mode. Each
//! revision is checked out and built, then every configured benchmark runs
//! under the [`Sampler`], which polls the child's resource snapshot at a fixed
//! cadence and reduces the samples to duration, peak RSS, and cumulative CPU
//! time. Captured stdout is deduplicated into a content-addressed archive;
//! the resulting [`MetricRecord`] batch is posted per benchmark.
//!
//! Everything is strictly sequential: no two benchmarks ever compete for the
//! machine, which is what makes the measurements comparable across commits.

pub mod archive;
pub mod command;
pub mod config;
pub mod error;
pub mod harness;
pub mod record;
pub mod repo;
pub mod report;
pub mod sampler;

pub use archive::OutputArchive;
pub use config::{BenchmarkSpec, Config, ReferenceRevision};
pub use error::{HarnessError, Result};
pub use harness::{Harness, HarnessOptions, HarnessPaths};
pub use record::{MetricRecord, RevisionMetadata, hostname};
pub use repo::RevisionWalker;
pub use report::{DEFAULT_ENDPOINT, Reporter};
pub use sampler::{DEFAULT_SAMPLE_INTERVAL, MeasurementResult, Sample, Sampler};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
