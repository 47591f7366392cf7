/// Optional on-disk capture of the upstream event stream.
///
/// When a capture directory is configured, each proxied response opens one
/// timestamped log file and appends every upstream `data` payload as an SSE
/// frame, before rewriting. Capture problems are logged and otherwise
/// ignored: they must never affect the response.
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::stream::sse;

static CAPTURE_SEQ: AtomicU64 = AtomicU64::new(1);

pub struct EventCapture {
    file: File,
    path: PathBuf,
    failed: bool,
}

impl EventCapture {
    /// Open a fresh capture file under `dir`, creating the directory if
    /// needed. The sequence suffix keeps concurrent responses apart.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the directory or file cannot be
    /// created.
    pub fn create(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let seq = CAPTURE_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("sse_{timestamp}_{seq}.log"));
        let file = File::create(&path)?;
        Ok(Self {
            file,
            path,
            failed: false,
        })
    }

    /// Append one upstream data payload as a `data: …\n\n` frame.
    pub fn record(&mut self, data: &str) {
        if data.is_empty() || self.failed {
            return;
        }
        if let Err(err) = self.file.write_all(sse::frame(data).as_bytes()) {
            tracing::warn!("sse capture write to {} failed: {err}", self.path.display());
            self.failed = true;
        }
    }
}
