// backend.rs — Generation backend interface.
//
// The engine never emits code itself; it prepares a build configuration
// and a patched model snapshot, then hands both to an external backend
// process. The trait seam exists so tests can substitute a backend that
// never touches the system.
//
// Preconditions: called from inside the build sandbox; validated config.
// Postconditions: on success, artifacts are in the working directory.
// Failure modes: backend missing, backend exits nonzero.
// Side effects: files written to the working directory; child process.

use std::io::Read;
use std::process::{Command, Stdio};

use crate::buildcfg::BuildConfig;
use crate::model::Model;

/// Name of the configuration file consumed by backends.
pub const CONFIG_FILE: &str = "build_config.json";

/// A failed backend run. Causes are reported in the order the backend
/// emitted them; order is load-bearing for the final report.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub message: String,
    pub causes: Vec<String>,
}

impl BackendFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }
}

/// Anything able to turn a build configuration plus a model snapshot
/// into generated artifacts.
pub trait Backend {
    fn name(&self) -> &str;

    /// Run one generation pass in the current working directory.
    fn generate(&self, config: &BuildConfig, model: &Model) -> Result<(), BackendFailure>;
}

/// Backend that shells out to an external generator program, passing it
/// the path of the written configuration file as its single argument.
pub struct CommandBackend {
    program: String,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn write_inputs(&self, config: &BuildConfig, model: &Model) -> Result<(), BackendFailure> {
        std::fs::write(CONFIG_FILE, config.to_json()).map_err(|e| {
            BackendFailure::new(format!("cannot write {}: {}", CONFIG_FILE, e))
        })?;
        let snapshot = format!("{}.model.json", model.name);
        model
            .save(std::path::Path::new(&snapshot))
            .map_err(|e| BackendFailure::new(format!("cannot write model snapshot: {}", e)))?;
        Ok(())
    }
}

impl Backend for CommandBackend {
    fn name(&self) -> &str {
        &self.program
    }

    fn generate(&self, config: &BuildConfig, model: &Model) -> Result<(), BackendFailure> {
        self.write_inputs(config, model)?;

        let mut child = Command::new(&self.program)
            .arg(CONFIG_FILE)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BackendFailure::new(format!("cannot start backend `{}`: {}", self.program, e))
            })?;

        let mut stderr = String::new();
        if let Some(pipe) = child.stderr.as_mut() {
            // Best effort; a backend that closes stderr early is fine.
            pipe.read_to_string(&mut stderr).ok();
        }

        let status = child.wait().map_err(|e| {
            BackendFailure::new(format!("backend `{}` did not finish: {}", self.program, e))
        })?;

        if status.success() {
            return Ok(());
        }

        let mut failure = BackendFailure::new(format!(
            "backend `{}` exited with {}",
            self.program, status
        ));
        failure.causes = stderr
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Err(failure)
    }
}
