//! Working copy lifecycle
//!
//! A working copy is a temp directory holding the minimized extract. It is
//! removed when dropped. Live working copies are also tracked in a
//! process-wide registry so a ctrl-c can remove them before exiting.

use crate::target::TargetDescriptor;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "amend-";

static LIVE_WORKING_COPIES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashSet<PathBuf>> {
    LIVE_WORKING_COPIES.get_or_init(|| Mutex::new(HashSet::new()))
}

fn with_registry<T>(f: impl FnOnce(&mut HashSet<PathBuf>) -> T) -> T {
    let mut guard = match registry().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}

/// Ephemeral minimized extract. Owned by exactly one correction run.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    file: PathBuf,
}

impl WorkingCopy {
    /// Create an empty working copy whose target file mirrors `target`'s layout.
    pub fn create(target: &TargetDescriptor) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!(
                "{}{}-",
                WORKSPACE_PREFIX,
                sanitize_component(target.method_name())
            ))
            .tempdir()?;
        let file = target.file_under(dir.path());
        with_registry(|live| live.insert(dir.path().to_path_buf()));
        tracing::debug!(dir = %dir.path().display(), "working copy created");
        Ok(Self { dir, file })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// The target file inside the working copy
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Whether the minimizer left the target file in place
    pub fn is_populated(&self) -> bool {
        self.file.is_file()
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        // TempDir removes the directory right after this
        with_registry(|live| live.remove(self.dir.path()));
        tracing::debug!(dir = %self.dir.path().display(), "working copy removed");
    }
}

/// Remove every registered working copy. Returns how many were removed.
pub fn cleanup_registered() -> usize {
    with_registry(drain)
}

fn drain(live: &mut HashSet<PathBuf>) -> usize {
    let mut removed = 0;
    for dir in live.drain() {
        if std::fs::remove_dir_all(&dir).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Remove working copies on ctrl-c, then exit with status 130.
pub fn install_cleanup_handler() -> Result<(), String> {
    ctrlc::set_handler(|| {
        let removed = cleanup_registered();
        eprintln!();
        eprintln!("  Interrupted. Removed {} working cop{}.", removed, if removed == 1 { "y" } else { "ies" });
        std::process::exit(130);
    })
    .map_err(|e| format!("Failed to install interrupt handler: {}", e))
}

fn sanitize_component(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('-');
        }
    }
    if out.is_empty() {
        "target".to_string()
    } else {
        out.chars().take(48).collect()
    }
}
