//! JSON-over-HTTP reporter for the ingestion endpoint.
//!
//! Serializes revision metadata and metric-record batches and posts them to
//! the local ingestion service with blocking requests. Delivery failures —
//! connection refused, timeouts, non-2xx responses — are logged and swallowed
//! here; a run never aborts because the collector is down, and there are no
//! retries. Response bodies are logged, never validated against a schema.

use std::time::Duration;

use log::{debug, error, info};
use serde::Serialize;

use crate::error::Result;
use crate::record::{MetricRecord, RevisionMetadata};

/// Default base URL of the ingestion service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8123";

/// Per-request timeout. Generous, because the pipeline blocks on each post.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts payloads to the `revision` and `result` endpoints.
pub struct Reporter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl Reporter {
    /// Reporter against the default local ingestion service.
    pub fn new() -> Result<Reporter> {
        Self::with_base_url(DEFAULT_ENDPOINT)
    }

    /// Reporter against a custom base URL (tests point this at a stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Reporter> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Reporter {
            client,
            base_url: base_url.into(),
        })
    }

    /// Post one revision's metadata.
    pub fn post_revision(&self, metadata: &RevisionMetadata) {
        info!("reporting revision {}", metadata.sha);
        self.post("revision", metadata);
    }

    /// Post one benchmark's batch of metric records.
    pub fn post_results(&self, records: &[MetricRecord]) {
        if let Some(first) = records.first() {
            info!(
                "reporting {} metrics for {}:{}",
                records.len(),
                first.executable,
                first.benchmark
            );
        }
        self.post("result", &records);
    }

    fn post<T: Serialize + ?Sized>(&self, kind: &str, payload: &T) {
        let url = format!("{}/{kind}/", self.base_url);
        let sent = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send();
        match sent {
            Ok(response) => {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                if status.is_success() {
                    if !body.is_empty() {
                        debug!("{url} responded: {body}");
                    }
                } else {
                    error!("{url} returned {status}: {body}");
                }
            }
            Err(e) => error!("failed to deliver to {url}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn metadata() -> RevisionMetadata {
        RevisionMetadata {
            repo: "y".to_string(),
            branch: "master".to_string(),
            sha: "abc123".to_string(),
            author: Some("dev@example.org".to_string()),
            date: "2026-01-01T00:00:00Z".to_string(),
            title: "A commit".to_string(),
            message: String::new(),
        }
    }

    /// Accept one connection, read the full request, respond 200, and return
    /// (request head, body).
    fn one_shot_stub(listener: TcpListener) -> thread::JoinHandle<(String, String)> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                    let length = head
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= pos + 4 + length {
                        let body =
                            String::from_utf8_lossy(&buf[pos + 4..pos + 4 + length]).to_string();
                        stream
                            .write_all(
                                b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                            )
                            .unwrap();
                        return (head, body);
                    }
                }
            }
            panic!("connection closed before a full request arrived");
        })
    }

    #[test]
    fn post_revision_sends_json_to_revision_path() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stub = one_shot_stub(listener);

        let reporter = Reporter::with_base_url(format!("http://{addr}")).unwrap();
        reporter.post_revision(&metadata());

        let (head, body) = stub.join().unwrap();
        assert!(head.starts_with("POST /revision/ "));
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(head.to_ascii_lowercase().contains("accept: application/json"));
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["sha"], "abc123");
    }

    #[test]
    fn post_results_sends_record_array_to_result_path() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stub = one_shot_stub(listener);

        let records = vec![MetricRecord {
            commitid: "abc123".to_string(),
            repo: "y".to_string(),
            branch: "master".to_string(),
            environment: "host1".to_string(),
            executable: "e1".to_string(),
            benchmark: "b1".to_string(),
            metric: "rss".to_string(),
            result_value: 4096.0,
            checksum: "cafe".to_string(),
        }];
        let reporter = Reporter::with_base_url(format!("http://{addr}")).unwrap();
        reporter.post_results(&records);

        let (head, body) = stub.join().unwrap();
        assert!(head.starts_with("POST /result/ "));
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["metric"], "rss");
    }

    #[test]
    fn delivery_failure_is_swallowed() {
        // Nothing listens on the discard port; the post must not panic or err.
        let reporter = Reporter::with_base_url("http://127.0.0.1:9").unwrap();
        reporter.post_revision(&metadata());
        reporter.post_results(&[]);
    }
}
