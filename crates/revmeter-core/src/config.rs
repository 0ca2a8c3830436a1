//! Harness configuration: YAML model and command tokenization.
//!
//! The configuration file names the working copy, the repository, one build
//! command, and the benchmark specs. Build and benchmark commands arrive as
//! free-text strings; they are tokenized into argv vectors exactly once at
//! load time and never re-interpreted through a shell, so a missing
//! executable and a non-zero exit stay distinguishable failure modes.
//!
//! # Example
//!
//! ```yaml
//! folder: /tmp/checkout
//! repoUrl: https://example.org/project.git
//! repoName: project
//! build: make -j4
//! benchmarks:
//!   - name: sort_large
//!     executable: bench
//!     command: ./bench --suite sort --size large
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HarnessError, Result};

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One benchmark to run for every revision.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkSpec {
    /// Benchmark name, e.g. `"sort_large"`.
    pub name: String,
    /// Executable label used in metric records and capture file names.
    pub executable: String,
    /// Command line as written in the configuration file.
    pub command: String,
    /// Tokenized form of `command`, filled in at load time.
    #[serde(skip)]
    pub argv: Vec<String>,
}

/// The pinned pseudo-revision measured in reference mode.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceRevision {
    /// Literal revision id, e.g. a tag name or `"baseline"`.
    pub name: String,
    /// ISO-8601 date reported in the synthesized metadata.
    pub date: String,
}

/// Full harness configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Working-copy directory. Exclusively owned by the harness for the run.
    pub folder: PathBuf,
    /// Clone URL, used only when the working copy does not exist yet.
    #[serde(rename = "repoUrl", default)]
    pub repo_url: String,
    /// Repository name carried into every record.
    #[serde(rename = "repoName")]
    pub repo_name: String,
    /// Build command, run inside the working copy after each checkout.
    #[serde(default)]
    pub build: String,
    /// Benchmarks to run for every revision, in order.
    pub benchmarks: Vec<BenchmarkSpec>,
    /// Pinned revision for reference mode (`--nobuild`).
    #[serde(default)]
    pub revision: Option<ReferenceRevision>,
    /// Tokenized form of `build`, filled in at load time.
    #[serde(skip)]
    pub build_argv: Vec<String>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Parse configuration from a YAML string and tokenize every command.
    pub fn from_yaml(text: &str) -> Result<Config> {
        let mut config: Config = serde_yaml::from_str(text)
            .map_err(|e| HarnessError::Config(format!("invalid configuration: {e}")))?;

        config.build_argv = tokenize(&config.build)?;
        for benchmark in &mut config.benchmarks {
            benchmark.argv = tokenize(&benchmark.command)?;
            if benchmark.argv.is_empty() {
                return Err(HarnessError::Config(format!(
                    "benchmark `{}` has an empty command",
                    benchmark.name
                )));
            }
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Command tokenization
// ---------------------------------------------------------------------------

/// Split a command string into an argv vector.
///
/// Follows shell word-splitting rules closely enough for benchmark command
/// lines: whitespace separates tokens, single quotes preserve everything
/// literally, double quotes allow backslash escapes, and a backslash outside
/// quotes escapes the next character. No expansion of any kind happens.
pub fn tokenize(command: &str) -> Result<Vec<String>> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars();

    let unterminated =
        || HarnessError::Config(format!("unterminated quote in command `{command}`"));

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    argv.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unterminated()),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(e) => current.push(e),
                            None => return Err(unterminated()),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unterminated()),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(e) => current.push(e),
                    None => {
                        return Err(HarnessError::Config(format!(
                            "trailing backslash in command `{command}`"
                        )));
                    }
                }
            }
            _ => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        argv.push(current);
    }
    Ok(argv)
}
