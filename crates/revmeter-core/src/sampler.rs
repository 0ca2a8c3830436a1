//! Child-process resource sampling and reduction.
//!
//! The sampler launches a benchmark with its stdout/stderr redirected to
//! capture files, then polls the live process's resource snapshot at a fixed
//! cadence until it exits. A snapshot only becomes a [`Sample`] if every
//! field — CPU times, RSS, thread count, descriptor count — resolved in the
//! same poll; a process caught mid-transition yields nothing rather than a
//! partial sample.
//!
//! Process exit is observed by a dedicated waiter thread blocking in
//! `Child::wait()`, so the wall-clock duration is measured from launch to
//! exit independently of the sampling loop's own scheduling jitter.
//!
//! Resource snapshots come from `/proc/<pid>` and are therefore Linux-only;
//! on other targets every probe misses and a measurement degrades to
//! duration plus zero fallbacks.

use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::command::render;
use crate::error::{HarnessError, Result};

/// Default cadence for polling the child's resource snapshot.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Samples and reduction
// ---------------------------------------------------------------------------

/// One fully-resolved snapshot of a running benchmark process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time since the process was launched.
    pub elapsed: Duration,
    /// Cumulative user-mode CPU seconds.
    pub user_cpu_secs: f64,
    /// Cumulative kernel-mode CPU seconds.
    pub system_cpu_secs: f64,
    /// Resident-set size in bytes.
    pub rss_bytes: u64,
    /// Thread count.
    pub threads: u64,
    /// Open file descriptor count.
    pub open_fds: u64,
}

/// Summary metrics reduced from one benchmark execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    /// Wall-clock launch-to-exit duration in seconds.
    pub duration_secs: f64,
    /// Maximum RSS across all samples, in bytes.
    pub peak_rss_bytes: u64,
    /// Cumulative user CPU seconds at the last sample.
    pub user_cpu_secs: f64,
    /// Cumulative system CPU seconds at the last sample.
    pub system_cpu_secs: f64,
}

impl MeasurementResult {
    /// Reduce a sample sequence to summary metrics.
    ///
    /// Peak RSS is the maximum over all samples; the CPU counters are
    /// monotonically non-decreasing, so the last sample already carries total
    /// consumption. A process that exits before the first poll tick leaves an
    /// empty sample set: duration is still measured, and RSS/CPU fall back to
    /// zero rather than failing the benchmark.
    pub fn reduce(samples: &[Sample], duration: Duration) -> MeasurementResult {
        let Some(last) = samples.last() else {
            warn!("no valid samples captured; reporting zero rss/cpu");
            return MeasurementResult {
                duration_secs: duration.as_secs_f64(),
                peak_rss_bytes: 0,
                user_cpu_secs: 0.0,
                system_cpu_secs: 0.0,
            };
        };
        MeasurementResult {
            duration_secs: duration.as_secs_f64(),
            peak_rss_bytes: samples.iter().map(|s| s.rss_bytes).max().unwrap_or(0),
            user_cpu_secs: last.user_cpu_secs,
            system_cpu_secs: last.system_cpu_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Launches benchmark processes and measures them over their lifetime.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    interval: Duration,
}

impl Sampler {
    /// Sampler with the default 100 ms cadence.
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_SAMPLE_INTERVAL)
    }

    /// Sampler with a custom polling cadence.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run one benchmark to completion and measure it.
    ///
    /// The process starts in `dir` with stdin closed and stdout/stderr
    /// redirected to the given capture files. A benchmark that exits non-zero
    /// is logged but still measured — only launch failures are errors here.
    pub fn measure(
        &self,
        argv: &[String],
        dir: &Path,
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> Result<MeasurementResult> {
        let program = argv
            .first()
            .ok_or_else(|| HarnessError::Config("empty benchmark command".to_string()))?;
        let stdout = File::create(stdout_path)?;
        let stderr = File::create(stderr_path)?;

        let start = Instant::now();
        let mut child = Command::new(program)
            .args(&argv[1..])
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| HarnessError::Launch {
                command: render(argv),
                source: e,
            })?;
        let pid = child.id();

        // The waiter thread owns the child and timestamps its exit; the
        // sampling loop below never races the exit notification.
        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let status = child.wait();
            let exited_at = Instant::now();
            let _ = tx.send((status, exited_at));
        });

        let mut samples: Vec<Sample> = Vec::new();
        let (status, exited_at) = loop {
            match rx.recv_timeout(self.interval) {
                Ok(done) => break done,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(sample) = probe(pid, start) {
                        samples.push(sample);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(HarnessError::Io(std::io::Error::other(
                        "benchmark waiter thread died",
                    )));
                }
            }
        };
        let _ = waiter.join();

        let status = status?;
        if !status.success() {
            warn!(
                "benchmark `{}` exited with {:?}",
                render(argv),
                status.code()
            );
        }
        let duration = exited_at.duration_since(start);
        debug!(
            "`{}` ran for {:.3}s, {} valid samples",
            render(argv),
            duration.as_secs_f64(),
            samples.len()
        );
        Ok(MeasurementResult::reduce(&samples, duration))
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Process snapshot probe (/proc)
// ---------------------------------------------------------------------------

/// Snapshot a live process's resource usage.
///
/// Returns `None` unless every field resolves: utime/stime/thread count from
/// `/proc/<pid>/stat`, resident pages from `/proc/<pid>/statm`, and the open
/// descriptor count from `/proc/<pid>/fd`. A process that exits between the
/// reads simply misses this tick.
#[cfg(target_os = "linux")]
fn probe(pid: u32, started: Instant) -> Option<Sample> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The comm field may contain spaces and parentheses; everything after the
    // last ')' is fixed-position.
    let (_, rest) = stat.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    let threads: u64 = fields.get(17)?.parse().ok()?;

    let statm = fs::read_to_string(format!("/proc/{pid}/statm")).ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;

    let open_fds = fs::read_dir(format!("/proc/{pid}/fd")).ok()?.count() as u64;

    let tck = clock_ticks_per_sec();
    Some(Sample {
        elapsed: started.elapsed(),
        user_cpu_secs: utime as f64 / tck,
        system_cpu_secs: stime as f64 / tck,
        rss_bytes: resident_pages * page_size(),
        threads,
        open_fds,
    })
}

#[cfg(not(target_os = "linux"))]
fn probe(_pid: u32, _started: Instant) -> Option<Sample> {
    None
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_sec() -> f64 {
    // SAFETY: sysconf with a valid name has no preconditions.
    let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if tck > 0 { tck as f64 } else { 100.0 }
}

#[cfg(target_os = "linux")]
fn page_size() -> u64 {
    // SAFETY: sysconf with a valid name has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn sample(rss: u64, user: f64, system: f64) -> Sample {
        Sample {
            elapsed: Duration::from_millis(100),
            user_cpu_secs: user,
            system_cpu_secs: system,
            rss_bytes: rss,
            threads: 1,
            open_fds: 4,
        }
    }

    // -----------------------------------------------------------------------
    // Reduction tests
    // -----------------------------------------------------------------------

    #[test]
    fn reduce_peak_rss_is_maximum() {
        let samples = vec![
            sample(100, 0.1, 0.0),
            sample(500, 0.2, 0.1),
            sample(300, 0.3, 0.1),
        ];
        let result = MeasurementResult::reduce(&samples, Duration::from_millis(350));
        assert_eq!(result.peak_rss_bytes, 500);
    }

    #[test]
    fn reduce_cpu_comes_from_last_sample() {
        let samples = vec![sample(100, 0.1, 0.05), sample(100, 0.4, 0.2)];
        let result = MeasurementResult::reduce(&samples, Duration::from_millis(250));
        assert_eq!(result.user_cpu_secs, 0.4);
        assert_eq!(result.system_cpu_secs, 0.2);
    }

    #[test]
    fn reduce_duration_is_independent_of_samples() {
        let result = MeasurementResult::reduce(&[sample(1, 0.0, 0.0)], Duration::from_secs(2));
        assert_eq!(result.duration_secs, 2.0);
    }

    #[test]
    fn reduce_empty_sample_set_falls_back_to_zero() {
        let result = MeasurementResult::reduce(&[], Duration::from_millis(42));
        assert!(result.duration_secs > 0.0);
        assert_eq!(result.peak_rss_bytes, 0);
        assert_eq!(result.user_cpu_secs, 0.0);
        assert_eq!(result.system_cpu_secs, 0.0);
    }

    // -----------------------------------------------------------------------
    // Measurement tests (spawn real processes)
    // -----------------------------------------------------------------------

    #[test]
    fn measure_redirects_output() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("stdout.txt");
        let err = tmp.path().join("stderr.txt");
        let sampler = Sampler::new();
        sampler
            .measure(
                &argv(&["sh", "-c", "echo visible; echo hidden 1>&2"]),
                tmp.path(),
                &out,
                &err,
            )
            .unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "visible");
        assert_eq!(fs::read_to_string(&err).unwrap().trim(), "hidden");
    }

    #[test]
    fn measure_fast_exit_yields_zero_fallbacks() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("stdout.txt");
        let err = tmp.path().join("stderr.txt");
        let result = Sampler::new()
            .measure(&argv(&["true"]), tmp.path(), &out, &err)
            .unwrap();
        // Exits well under one polling interval: no samples, duration still real.
        assert!(result.duration_secs > 0.0);
        assert_eq!(result.peak_rss_bytes, 0);
        assert_eq!(result.user_cpu_secs, 0.0);
        assert_eq!(result.system_cpu_secs, 0.0);
    }

    #[test]
    fn measure_long_running_process_collects_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("stdout.txt");
        let err = tmp.path().join("stderr.txt");
        let sampler = Sampler::with_interval(Duration::from_millis(20));
        let result = sampler
            .measure(&argv(&["sleep", "0.3"]), tmp.path(), &out, &err)
            .unwrap();
        assert!(result.duration_secs >= 0.25);
        #[cfg(target_os = "linux")]
        assert!(result.peak_rss_bytes > 0, "expected /proc samples on Linux");
    }

    #[test]
    fn measure_nonzero_exit_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("stdout.txt");
        let err = tmp.path().join("stderr.txt");
        let result = Sampler::new()
            .measure(&argv(&["sh", "-c", "exit 3"]), tmp.path(), &out, &err)
            .unwrap();
        assert!(result.duration_secs > 0.0);
    }

    #[test]
    fn measure_missing_executable_is_launch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("stdout.txt");
        let err = tmp.path().join("stderr.txt");
        let result = Sampler::new().measure(
            &argv(&["/nonexistent/benchmark"]),
            tmp.path(),
            &out,
            &err,
        );
        assert!(matches!(result, Err(HarnessError::Launch { .. })));
    }

    // -----------------------------------------------------------------------
    // Probe tests
    // -----------------------------------------------------------------------

    #[cfg(target_os = "linux")]
    #[test]
    fn probe_own_pid_resolves_all_fields() {
        let sample = probe(std::process::id(), Instant::now()).expect("self probe");
        assert!(sample.rss_bytes > 0);
        assert!(sample.threads >= 1);
        assert!(sample.open_fds > 0);
    }

    #[test]
    fn probe_dead_pid_is_invalid() {
        // PID 0 never has a /proc entry owned by us.
        assert!(probe(0, Instant::now()).is_none());
    }
}
