//! Submission lifecycle event log.
//!
//! Appends one timestamped line per event to `.codegen/observe.log` in the
//! workspace, with optional verbose mirroring to stderr. Logging is
//! fire-and-forget from the caller's perspective: the pipeline never fails
//! because a log line could not be written.

use anyhow::Result;
use chrono::Utc;
use codegen_core::runtime_dir;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            verbose: false,
        })
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn request_started(&self, model: &str, stream: bool) {
        self.record("request.started", json!({"model": model, "stream": stream}));
    }

    pub fn request_rendered(&self, chunks: usize, bytes: usize) {
        self.record("request.rendered", json!({"chunks": chunks, "bytes": bytes}));
    }

    pub fn request_empty(&self) {
        self.record("request.empty", json!({}));
    }

    pub fn request_failed(&self, detail: &str) {
        self.record("request.failed", json!({"detail": detail}));
    }

    pub fn card_copied(&self, index: usize) {
        self.record("card.copied", json!({"index": index}));
    }

    fn record(&self, event: &str, payload: serde_json::Value) {
        let line = format!("{} {event} {payload}", Utc::now().to_rfc3339());
        if self.verbose {
            eprintln!("[codegen] {line}");
        }
        let _ = self.append_log_line(&line);
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_append_to_the_workspace_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let observer = Observer::new(dir.path()).expect("observer");
        observer.request_started("gpt-5-nano", true);
        observer.request_rendered(3, 42);

        let log = fs::read_to_string(runtime_dir(dir.path()).join("observe.log")).expect("log");
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("request.started"));
        assert!(lines[0].contains("gpt-5-nano"));
        assert!(lines[1].contains("request.rendered"));
    }

    #[test]
    fn failures_record_detail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let observer = Observer::new(dir.path()).expect("observer");
        observer.request_failed("API error 500: boom");
        let log = fs::read_to_string(runtime_dir(dir.path()).join("observe.log")).expect("log");
        assert!(log.contains("request.failed"));
        assert!(log.contains("boom"));
    }
}
