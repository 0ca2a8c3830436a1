//! Wire records for the ingestion endpoint.
//!
//! Two payload shapes exist: one [`RevisionMetadata`] object per revision,
//! posted before any benchmark runs, and batches of [`MetricRecord`]s, one
//! record per scalar of a measurement. Field names are fixed by the ingestion
//! service's JSON schema; both types are immutable once constructed.

use serde::{Deserialize, Serialize};

/// Metadata describing one revision, sent once to the `revision` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionMetadata {
    pub repo: String,
    pub branch: String,
    pub sha: String,
    /// Author email. Absent in reference mode, where nothing was committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// ISO-8601 author date.
    pub date: String,
    /// Commit subject line.
    pub title: String,
    /// Commit body, empty if the commit had none.
    pub message: String,
}

/// One scalar measurement, sent in batches to the `result` endpoint.
///
/// Every benchmark execution produces four of these (`duration`, `rss`,
/// `usr`, `sys`), all sharing the checksum of the benchmark's archived
/// stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub commitid: String,
    pub repo: String,
    pub branch: String,
    /// Host the measurement ran on.
    pub environment: String,
    pub executable: String,
    pub benchmark: String,
    /// Metric name: `duration`, `rss`, `usr`, or `sys`.
    pub metric: String,
    pub result_value: f64,
    /// Content address of the benchmark's archived stdout.
    pub checksum: String,
}

/// Host name of the machine running the harness, used as the `environment`
/// field of every metric record. Falls back to `"unknown"`.
pub fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for buf.len() bytes and gethostname NUL-terminates
    // the result on success (truncating if necessary).
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).into_owned();
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}
