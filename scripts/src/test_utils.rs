//! Helpers shared by unit tests

use std::{
    env, fs,
    path::PathBuf,
    process,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Distinguishes scratch directories created within one test process
static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A fresh, empty directory under the system temp directory
pub fn scratch_dir(label: &str) -> PathBuf {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = env::temp_dir().join(format!("migration-scripts-{}-{}-{}", process::id(), label, n));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("failed to create scratch dir");
    dir
}
