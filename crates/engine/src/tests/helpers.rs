use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "sst")
                .unwrap_or(false)
        })
        .count()
}

pub fn count_wal_files(dir: &Path) -> usize {
    fs::read_dir(dir.join("walfile"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "wal")
                .unwrap_or(false)
        })
        .count()
}

/// Polls `pred` until it holds or the timeout passes. Background flushes
/// and compactions are asynchronous; tests that assert on their results
/// wait through this.
pub fn wait_for<F: FnMut() -> bool>(mut pred: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if pred() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
