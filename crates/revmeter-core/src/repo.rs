//! Revision walker: resolves which revisions to measure and their metadata.
//!
//! Two modes exist. History mode drives git over its command-line interface:
//! it prepares the working copy (clone if absent, then fetch/checkout/pull),
//! lists the most recent first-parent revisions of the target branch, and
//! queries per-revision metadata with a formatted `git show`. Reference mode
//! bypasses version control entirely: the revision list is a single pinned
//! name from configuration and its metadata is synthesized, for measuring an
//! externally-prepared executable as a comparison baseline.
//!
//! The working copy is a single exclusively-owned mutable resource: absent →
//! cloned → checked out at revision R, every transition caller-synchronous.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::command;
use crate::error::{HarnessError, Result};
use crate::record::RevisionMetadata;

/// Pretty format producing author email, ISO date, subject, and body on
/// separate lines. `-s` suppresses the diff so the body stays the commit
/// message alone.
const SHOW_FORMAT: &str = "--pretty=format:%ae%n%aI%n%s%n%b";

enum WalkerMode {
    History { repo_url: String, branch: String },
    Pinned { name: String, date: String },
}

/// Resolves the ordered revision list and per-revision metadata.
pub struct RevisionWalker {
    folder: PathBuf,
    repo_name: String,
    branch_label: String,
    mode: WalkerMode,
}

impl RevisionWalker {
    /// Walker over version-control history for `branch`.
    ///
    /// `branch_label` is the branch name recorded in metadata; it usually
    /// equals `branch` but is relabeled `"reference"` in reference runs.
    pub fn history(
        folder: impl Into<PathBuf>,
        repo_name: impl Into<String>,
        branch_label: impl Into<String>,
        repo_url: impl Into<String>,
        branch: impl Into<String>,
    ) -> RevisionWalker {
        RevisionWalker {
            folder: folder.into(),
            repo_name: repo_name.into(),
            branch_label: branch_label.into(),
            mode: WalkerMode::History {
                repo_url: repo_url.into(),
                branch: branch.into(),
            },
        }
    }

    /// Walker pinned to a single configured pseudo-revision.
    pub fn pinned(
        folder: impl Into<PathBuf>,
        repo_name: impl Into<String>,
        branch_label: impl Into<String>,
        name: impl Into<String>,
        date: impl Into<String>,
    ) -> RevisionWalker {
        RevisionWalker {
            folder: folder.into(),
            repo_name: repo_name.into(),
            branch_label: branch_label.into(),
            mode: WalkerMode::Pinned {
                name: name.into(),
                date: date.into(),
            },
        }
    }

    /// Working-copy directory.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Bring the working copy to the tip of the target branch.
    ///
    /// Creates the folder if absent, clones if there is no `.git` yet, then
    /// fetches and fast-forwards the branch. A no-op in pinned mode, where
    /// the build was performed externally.
    pub fn prepare(&self) -> Result<()> {
        let WalkerMode::History { repo_url, branch } = &self.mode else {
            debug!("pinned revision, skipping repository preparation");
            return Ok(());
        };
        if !self.folder.exists() {
            fs::create_dir_all(&self.folder)?;
        }
        if !self.folder.join(".git").exists() {
            let folder = self.folder.to_string_lossy();
            command::run(&argv(&["git", "clone", repo_url, &folder]), None)?;
        }
        command::run(&argv(&["git", "fetch"]), Some(&self.folder))?;
        command::run(&argv(&["git", "checkout", branch]), Some(&self.folder))?;
        command::run(&argv(&["git", "pull"]), Some(&self.folder))?;
        Ok(())
    }

    /// The up-to-`count` most recent revisions, ordered oldest first.
    ///
    /// Follows the first-parent chain of the target branch; git lists newest
    /// first, so the result is reversed. In pinned mode the list is exactly
    /// the configured revision name.
    pub fn revisions(&self, count: usize) -> Result<Vec<String>> {
        match &self.mode {
            WalkerMode::History { branch, .. } => {
                let listed = command::run_captured(
                    &argv(&[
                        "git",
                        "rev-list",
                        "--max-count",
                        &count.to_string(),
                        "--first-parent",
                        branch,
                    ]),
                    Some(&self.folder),
                )?;
                let mut revisions: Vec<String> = listed
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                revisions.reverse();
                Ok(revisions)
            }
            WalkerMode::Pinned { name, .. } => Ok(vec![name.clone()]),
        }
    }

    /// Metadata for one revision.
    ///
    /// History mode queries a formatted `git show`; pinned mode synthesizes
    /// the fields, with no author and `"Reference revision {name}"` standing
    /// in for title and message.
    pub fn details(&self, revision: &str) -> Result<RevisionMetadata> {
        match &self.mode {
            WalkerMode::History { .. } => {
                let shown = command::run_captured(
                    &argv(&["git", "show", "-s", SHOW_FORMAT, revision]),
                    Some(&self.folder),
                )?;
                let (author, date, title, message) = parse_show(revision, &shown)?;
                Ok(RevisionMetadata {
                    repo: self.repo_name.clone(),
                    branch: self.branch_label.clone(),
                    sha: revision.to_string(),
                    author: Some(author),
                    date,
                    title,
                    message,
                })
            }
            WalkerMode::Pinned { name, date } => Ok(RevisionMetadata {
                repo: self.repo_name.clone(),
                branch: self.branch_label.clone(),
                sha: name.clone(),
                author: None,
                date: date.clone(),
                title: format!("Reference revision {name}"),
                message: format!("Reference revision {name}"),
            }),
        }
    }

    /// Check the working copy out at `revision`. A no-op in pinned mode.
    pub fn checkout(&self, revision: &str) -> Result<()> {
        if matches!(self.mode, WalkerMode::Pinned { .. }) {
            return Ok(());
        }
        command::run(&argv(&["git", "checkout", revision]), Some(&self.folder))
    }
}

/// Split a formatted `git show` into (author, date, title, message).
///
/// Line 1 is the author email, line 2 the ISO-8601 date, line 3 the subject;
/// the remaining lines joined back together form the body.
fn parse_show(revision: &str, text: &str) -> Result<(String, String, String, String)> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 3 {
        return Err(HarnessError::MalformedDetails {
            revision: revision.to_string(),
            reason: format!("expected at least 3 lines, got {}", lines.len()),
        });
    }
    Ok((
        lines[0].to_string(),
        lines[1].to_string(),
        lines[2].to_string(),
        lines[3..].join("\n"),
    ))
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
