// sandbox.rs — Build sandbox.
//
// Generation backends are run from inside a dedicated build directory so
// that every artifact they drop lands there and nowhere else. The working
// directory of the process is switched for the duration of the run and
// restored afterwards, failure or not. Because the working directory is
// process-wide state, at most one sandboxed build may run at a time.
//
// Preconditions: build directory path decided by the configuration.
// Postconditions: directory exists; cwd restored on scope exit.
// Failure modes: directory creation or cwd switch fails; a build is
//                already in flight.
// Side effects: filesystem and process working directory.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Serializes every test that touches the working directory or the
/// build lock; the test harness runs threads in parallel inside one
/// process.
#[cfg(test)]
pub(crate) static TEST_CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Set while a sandboxed build is in flight. The working directory is
/// shared by every thread, so nested or concurrent runs are refused
/// rather than silently interleaved.
static BUILD_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
pub enum SandboxError {
    /// Another sandboxed build holds the working directory.
    AlreadyRunning,
    CreateDir { path: PathBuf, source: io::Error },
    EnterDir { path: PathBuf, source: io::Error },
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::AlreadyRunning => {
                write!(f, "a sandboxed build is already running in this process")
            }
            SandboxError::CreateDir { path, source } => {
                write!(f, "cannot create build directory {}: {}", path.display(), source)
            }
            SandboxError::EnterDir { path, source } => {
                write!(f, "cannot enter build directory {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SandboxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SandboxError::AlreadyRunning => None,
            SandboxError::CreateDir { source, .. } | SandboxError::EnterDir { source, .. } => {
                Some(source)
            }
        }
    }
}

/// Scope guard that holds the build lock and the previous working
/// directory. Dropping it restores both, so an early `?` return inside
/// the sandboxed section cannot leave the process stranded in the build
/// directory.
#[derive(Debug)]
pub struct CwdGuard {
    previous: PathBuf,
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        // Restoration failure leaves nothing better to do than report it.
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            eprintln!(
                "mcfg: failed to restore working directory {}: {}",
                self.previous.display(),
                e
            );
        }
        BUILD_IN_FLIGHT.store(false, Ordering::SeqCst);
    }
}

/// Create the build directory if needed and move the process into it.
///
/// Returns a guard whose drop restores the previous working directory
/// and releases the build lock.
pub fn enter(build_dir: &Path) -> Result<CwdGuard, SandboxError> {
    if BUILD_IN_FLIGHT.swap(true, Ordering::SeqCst) {
        return Err(SandboxError::AlreadyRunning);
    }

    let result = (|| {
        std::fs::create_dir_all(build_dir).map_err(|source| SandboxError::CreateDir {
            path: build_dir.to_path_buf(),
            source,
        })?;
        let previous = std::env::current_dir().map_err(|source| SandboxError::EnterDir {
            path: build_dir.to_path_buf(),
            source,
        })?;
        std::env::set_current_dir(build_dir).map_err(|source| SandboxError::EnterDir {
            path: build_dir.to_path_buf(),
            source,
        })?;
        Ok(CwdGuard { previous })
    })();

    if result.is_err() {
        BUILD_IN_FLIGHT.store(false, Ordering::SeqCst);
    }
    result
}
