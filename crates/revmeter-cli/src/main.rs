//! CLI for revmeter — continuous benchmarking across revisions.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use revmeter_core::{Config, Harness, HarnessError, HarnessOptions, HarnessPaths};

#[derive(Parser)]
#[command(name = "revmeter")]
#[command(about = "Build each revision, run its benchmarks, and report the measurements")]
#[command(version = revmeter_core::VERSION)]
struct Cli {
    /// Configuration file
    config: PathBuf,

    /// Branch to build
    #[arg(long, default_value = "master")]
    branch: String,

    /// Number of revisions, starting with the latest
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Label results as reference values for the benchmarks run
    #[arg(long)]
    reference: bool,

    /// Assume the executable is already built; measure the pinned revision
    /// from the configuration without touching version control
    #[arg(long)]
    nobuild: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("revmeter: {e}");
            return ExitCode::from(2);
        }
    };

    let options = HarnessOptions {
        branch: cli.branch,
        reference: cli.reference,
        nobuild: cli.nobuild,
        endpoint: None,
    };
    let harness = match Harness::new(config, options, HarnessPaths::default()) {
        Ok(harness) => harness,
        Err(e @ HarnessError::Config(_)) => {
            eprintln!("revmeter: {e}");
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("revmeter: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = harness.run(cli.count) {
        eprintln!("revmeter: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["revmeter", "revmeter.yaml"]);
        assert_eq!(cli.config, PathBuf::from("revmeter.yaml"));
        assert_eq!(cli.branch, "master");
        assert_eq!(cli.count, 1);
        assert!(!cli.reference);
        assert!(!cli.nobuild);
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::parse_from([
            "revmeter",
            "conf.yaml",
            "--branch",
            "main",
            "--count",
            "5",
            "--reference",
            "--nobuild",
        ]);
        assert_eq!(cli.branch, "main");
        assert_eq!(cli.count, 5);
        assert!(cli.reference);
        assert!(cli.nobuild);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
