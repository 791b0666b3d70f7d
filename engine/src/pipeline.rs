// pipeline.rs — Engine state and pass orchestration
//
// Holds all pass artifacts in one state struct and runs the minimal set
// of passes for a given terminal PassId, converting component failures
// into coded diagnostics as it goes.
//
// Preconditions: options carry resolved identifiers, search path, target.
// Postconditions: all artifacts for required passes are populated, or
//   has_error is set and the phase is Failed.
// Failure modes: any pass emitting error-level diagnostics.
// Side effects: calls on_pass_complete after each pass for immediate
//   display; the generate pass touches the filesystem and spawns the
//   backend process.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use crate::backend::Backend;
use crate::buildcfg::BuildConfig;
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::loader::{self, LoadError, LoadedDictionary};
use crate::model::{self, Model, ModelError};
use crate::pass::{descriptor, required_passes, PassId};
use crate::scan::ScanReport;
use crate::storage;
use crate::target::TargetDevice;

// ── Phase tracking ─────────────────────────────────────────────────────────

/// Lifecycle of one engine run. Phases only ever advance; a failed pass
/// moves straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    DictionaryLoaded,
    GraphConfigured,
    Scanned,
    ConfigurationBuilt,
    Building,
    Succeeded,
    Failed,
}

// ── Options ────────────────────────────────────────────────────────────────

/// Everything the runner needs beyond the state itself.
pub struct EngineOptions {
    /// Dictionary identifier, resolved against the search path.
    pub dictionary: String,
    /// Model identifier, resolved against the search path.
    pub model: String,
    /// Directories searched for dictionary and model files, in order.
    pub search_dirs: Vec<PathBuf>,
    pub target: &'static TargetDevice,
    pub build_dir: PathBuf,
    pub verbose: bool,
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Filename of the provenance artifact written into the build directory.
pub const BUILD_INFO_FILE: &str = "build-info.json";

/// Provenance metadata for reproducible builds, written next to the
/// generated artifacts as `build-info.json`. Both hashes are hex-encoded
/// SHA-256 digests so downstream caching can key on the file as-is.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    /// Digest of the raw dictionary source text.
    pub dictionary_hash: String,
    /// Digest of `Model::canonical_json()` (compact, whitespace-free).
    pub model_fingerprint: String,
    /// Crate version from `Cargo.toml`.
    pub engine_version: &'static str,
}

impl Provenance {
    pub fn to_json(&self) -> String {
        // Serialization of these plain fields cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Compute provenance from dictionary source text and the loaded model.
/// Fingerprinting the canonical JSON keeps the result independent of
/// display formatting and file paths.
pub fn compute_provenance(dictionary_source: &str, model: &Model) -> Provenance {
    Provenance {
        dictionary_hash: sha256_hex(dictionary_source.as_bytes()),
        model_fingerprint: sha256_hex(model.canonical_json().as_bytes()),
        engine_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── State ──────────────────────────────────────────────────────────────────

/// Holds all engine artifacts and accumulated diagnostics.
pub struct EngineState {
    pub dictionary: Option<LoadedDictionary>,
    pub model: Option<Model>,
    pub scan: Option<ScanReport>,
    pub config: Option<BuildConfig>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
    pub phase: Phase,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            dictionary: None,
            model: None,
            scan: None,
            config: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
            phase: Phase::Idle,
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `EngineState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

// ── Diagnostic conversion ──────────────────────────────────────────────────

fn load_error_diag(err: LoadError) -> Diagnostic {
    match err {
        LoadError::NotFound { ref ident, ref searched } => {
            let dirs = searched
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            Diagnostic::new(DiagLevel::Error, format!("{}", err))
                .with_code(codes::E0001)
                .with_hint(format!(
                    "expected `{}.{}` in one of: {}",
                    ident,
                    loader::DICT_EXT,
                    dirs
                ))
        }
        LoadError::Io { .. } => {
            Diagnostic::new(DiagLevel::Error, format!("{}", err)).with_code(codes::E0001)
        }
        LoadError::Execution { path, causes } => {
            let mut diag = Diagnostic::new(
                DiagLevel::Error,
                format!("dictionary {} failed to execute", path.display()),
            )
            .with_code(codes::E0002);
            for cause in causes {
                diag = diag.with_cause(cause.message, cause.span);
            }
            diag
        }
    }
}

fn model_error_diag(err: ModelError) -> Diagnostic {
    let code = match err {
        ModelError::NotFound { .. } => codes::E0201,
        ModelError::Io { .. } | ModelError::Parse { .. } => codes::E0202,
    };
    Diagnostic::new(DiagLevel::Error, format!("{}", err)).with_code(code)
}

// ── Per-pass post-processing ───────────────────────────────────────────────

fn has_error_diags(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

/// Per-pass post-processing: callback, accumulate, verbose, error check.
/// Returns Err if error diagnostics were produced.
fn finish_pass(
    state: &mut EngineState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: std::time::Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_error_diags(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "mcfg: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        state.phase = Phase::Failed;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose →
/// error check → phase advance.
pub fn run_pipeline(
    state: &mut EngineState,
    terminal: PassId,
    options: &EngineOptions,
    backend: &dyn Backend,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    let passes = required_passes(terminal);

    for &pass_id in &passes {
        match pass_id {
            PassId::LoadDictionary => {
                let t = Instant::now();
                let result = loader::load(&options.dictionary, &options.search_dirs);
                let elapsed = t.elapsed();
                match result {
                    Ok(loaded) => {
                        state.dictionary = Some(loaded);
                        finish_pass(state, pass_id, vec![], elapsed, options.verbose, &mut on_pass_complete)?;
                        state.phase = Phase::DictionaryLoaded;
                    }
                    Err(err) => {
                        let diags = vec![load_error_diag(err)];
                        finish_pass(state, pass_id, diags, elapsed, options.verbose, &mut on_pass_complete)?;
                    }
                }
            }
            PassId::ResolveStorage => {
                let t = Instant::now();
                let table = &mut state
                    .dictionary
                    .as_mut()
                    .ok_or(PipelineError { failing_pass: pass_id })?
                    .table;
                let result = storage::resolve(table);
                let elapsed = t.elapsed();
                let diags = match result {
                    Ok(()) => vec![],
                    Err(err) => {
                        let span = err.decl_span;
                        vec![Diagnostic::new(DiagLevel::Error, format!("{}", err))
                            .with_code(codes::E0101)
                            .with_span(span)
                            .with_hint("valid storage classes: exported, imported, auto")]
                    }
                };
                finish_pass(state, pass_id, diags, elapsed, options.verbose, &mut on_pass_complete)?;
            }
            PassId::LoadModel => {
                let t = Instant::now();
                let result = model::load(&options.model, &options.search_dirs);
                let elapsed = t.elapsed();
                match result {
                    Ok(loaded) => {
                        if let Some(dict) = &state.dictionary {
                            state.provenance = Some(compute_provenance(&dict.source, &loaded));
                        }
                        state.model = Some(loaded);
                        finish_pass(state, pass_id, vec![], elapsed, options.verbose, &mut on_pass_complete)?;
                        state.phase = Phase::GraphConfigured;
                    }
                    Err(err) => {
                        let diags = vec![model_error_diag(err)];
                        finish_pass(state, pass_id, diags, elapsed, options.verbose, &mut on_pass_complete)?;
                    }
                }
            }
            PassId::SmartScan => {
                let t = Instant::now();
                let report = {
                    let model = state
                        .model
                        .as_mut()
                        .ok_or(PipelineError { failing_pass: pass_id })?;
                    let table = &state
                        .dictionary
                        .as_ref()
                        .ok_or(PipelineError { failing_pass: pass_id })?
                        .table;
                    crate::scan::smart_scan(model, table)
                };
                let elapsed = t.elapsed();
                state.scan = Some(report);
                finish_pass(state, pass_id, vec![], elapsed, options.verbose, &mut on_pass_complete)?;
                state.phase = Phase::Scanned;
            }
            PassId::BuildConfig => {
                let t = Instant::now();
                let (config, diags, validation) = {
                    let model = state
                        .model
                        .as_ref()
                        .ok_or(PipelineError { failing_pass: pass_id })?;
                    let (config, warnings) = crate::buildcfg::build_config(
                        model,
                        options.target,
                        options.build_dir.clone(),
                    );
                    let validation = crate::buildcfg::validate(&config);
                    (config, warnings, validation)
                };
                let elapsed = t.elapsed();
                let mut diags = diags;
                match validation {
                    Ok(()) => {
                        if let Some(model) = state.model.as_mut() {
                            crate::buildcfg::apply_bindings(model, &config);
                        }
                        state.config = Some(config);
                        finish_pass(state, pass_id, diags, elapsed, options.verbose, &mut on_pass_complete)?;
                        state.phase = Phase::ConfigurationBuilt;
                    }
                    Err(err) => {
                        diags.push(
                            Diagnostic::new(DiagLevel::Error, format!("{}", err))
                                .with_code(codes::E0301),
                        );
                        finish_pass(state, pass_id, diags, elapsed, options.verbose, &mut on_pass_complete)?;
                    }
                }
            }
            PassId::Generate => {
                state.phase = Phase::Building;
                let t = Instant::now();
                let result = run_generate(state, backend);
                let elapsed = t.elapsed();
                match result {
                    Ok(()) => {
                        finish_pass(state, pass_id, vec![], elapsed, options.verbose, &mut on_pass_complete)?;
                        state.phase = Phase::Succeeded;
                    }
                    Err(diag) => {
                        finish_pass(state, pass_id, vec![diag], elapsed, options.verbose, &mut on_pass_complete)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Enter the sandbox and run the backend. Any failure is reported as a
/// build-failure diagnostic with the backend's causes in order.
fn run_generate(state: &EngineState, backend: &dyn Backend) -> Result<(), Diagnostic> {
    let config = state
        .config
        .as_ref()
        .ok_or_else(|| Diagnostic::new(DiagLevel::Error, "no build configuration"))?;
    let model = state
        .model
        .as_ref()
        .ok_or_else(|| Diagnostic::new(DiagLevel::Error, "no model loaded"))?;

    let guard = crate::sandbox::enter(&config.build_dir).map_err(|e| {
        Diagnostic::new(DiagLevel::Error, format!("{}", e)).with_code(codes::E0401)
    })?;

    // The provenance record lands next to the generated artifacts; the
    // guard restores the working directory if the write fails.
    if let Some(provenance) = &state.provenance {
        std::fs::write(BUILD_INFO_FILE, provenance.to_json()).map_err(|e| {
            Diagnostic::new(
                DiagLevel::Error,
                format!("could not write {}: {}", BUILD_INFO_FILE, e),
            )
            .with_code(codes::E0401)
        })?;
    }

    let result = backend.generate(config, model);
    drop(guard);

    result.map_err(|failure| {
        let mut diag = Diagnostic::new(DiagLevel::Error, failure.message).with_code(codes::E0401);
        for cause in failure.causes {
            diag = diag.with_cause(cause, None);
        }
        diag
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendFailure;
    use crate::sandbox;
    use crate::target;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    struct FakeBackend {
        fail_with: Option<Vec<String>>,
    }

    impl Backend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn generate(&self, _config: &BuildConfig, _model: &Model) -> Result<(), BackendFailure> {
            match &self.fail_with {
                None => Ok(()),
                Some(causes) => {
                    let mut f = BackendFailure::new("generation failed");
                    f.causes = causes.clone();
                    Err(f)
                }
            }
        }
    }

    fn fixture_dir(dict: &str, model_json: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "mcfg-pipeline-{}-{}",
            std::process::id(),
            n
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("dict.dd"), dict).unwrap();
        std::fs::write(dir.join("servo.model.json"), model_json).unwrap();
        dir
    }

    const DICT: &str = "param Threshold: int32 = 40\nsignal Speed: double\n";

    const MODEL: &str = r#"{
        "name": "servo",
        "root": {
            "id": "root", "name": "servo",
            "blocks": [
                {"id": "b1", "kind": "constant", "value": "Threshold", "out_type": "double"}
            ],
            "subsystems": [
                {"id": "s1", "name": "Motor Control", "atomic": true, "blocks": [], "subsystems": []}
            ]
        }
    }"#;

    fn options(dir: &Path, target: &str) -> EngineOptions {
        EngineOptions {
            dictionary: "dict".to_string(),
            model: "servo".to_string(),
            search_dirs: vec![dir.to_path_buf()],
            target: target::lookup(target).unwrap(),
            build_dir: dir.join("build"),
            verbose: false,
        }
    }

    #[test]
    fn full_run_succeeds_and_advances_phases() {
        let _serial = sandbox::TEST_CWD_LOCK.lock().unwrap();
        let dir = fixture_dir(DICT, MODEL);
        let mut state = EngineState::new();
        let backend = FakeBackend { fail_with: None };
        run_pipeline(
            &mut state,
            PassId::Generate,
            &options(&dir, "host"),
            &backend,
            |_, _| {},
        )
        .unwrap();
        assert_eq!(state.phase, Phase::Succeeded);
        assert!(!state.has_error);
        assert_eq!(state.scan.as_ref().unwrap().fix_count(), 1);
        assert!(state.provenance.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn successful_build_writes_build_info() {
        let _serial = sandbox::TEST_CWD_LOCK.lock().unwrap();
        let dir = fixture_dir(DICT, MODEL);
        let mut state = EngineState::new();
        let backend = FakeBackend { fail_with: None };
        run_pipeline(
            &mut state,
            PassId::Generate,
            &options(&dir, "host"),
            &backend,
            |_, _| {},
        )
        .unwrap();

        let text = std::fs::read_to_string(dir.join("build").join(BUILD_INFO_FILE)).unwrap();
        let provenance = state.provenance.as_ref().unwrap();
        assert_eq!(provenance.dictionary_hash.len(), 64);
        assert!(text.contains(&provenance.dictionary_hash));
        assert!(text.contains(&provenance.model_fingerprint));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn scan_terminal_stops_before_config() {
        let dir = fixture_dir(DICT, MODEL);
        let mut state = EngineState::new();
        let backend = FakeBackend { fail_with: None };
        run_pipeline(
            &mut state,
            PassId::SmartScan,
            &options(&dir, "host"),
            &backend,
            |_, _| {},
        )
        .unwrap();
        assert_eq!(state.phase, Phase::Scanned);
        assert!(state.config.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_dictionary_fails_first_pass() {
        let dir = fixture_dir(DICT, MODEL);
        let mut opts = options(&dir, "host");
        opts.dictionary = "absent".to_string();
        let mut state = EngineState::new();
        let backend = FakeBackend { fail_with: None };
        let err = run_pipeline(&mut state, PassId::Generate, &opts, &backend, |_, _| {})
            .unwrap_err();
        assert_eq!(err.failing_pass, PassId::LoadDictionary);
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.diagnostics[0].code, Some(codes::E0001));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn backend_failure_surfaces_causes_in_order() {
        let _serial = sandbox::TEST_CWD_LOCK.lock().unwrap();
        let dir = fixture_dir(DICT, MODEL);
        let mut state = EngineState::new();
        let backend = FakeBackend {
            fail_with: Some(vec!["undefined symbol `Gain`".to_string(), "aborting".to_string()]),
        };
        let err = run_pipeline(
            &mut state,
            PassId::Generate,
            &options(&dir, "host"),
            &backend,
            |_, _| {},
        )
        .unwrap_err();
        assert_eq!(err.failing_pass, PassId::Generate);
        let diag = state.diagnostics.last().unwrap();
        assert_eq!(diag.code, Some(codes::E0401));
        assert_eq!(diag.cause_chain[0].message, "undefined symbol `Gain`");
        assert_eq!(diag.cause_chain[1].message, "aborting");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn degraded_target_still_succeeds_with_warning() {
        let _serial = sandbox::TEST_CWD_LOCK.lock().unwrap();
        let dir = fixture_dir(DICT, MODEL);
        let mut state = EngineState::new();
        let backend = FakeBackend { fail_with: None };
        run_pipeline(
            &mut state,
            PassId::Generate,
            &options(&dir, "cortex-m4"),
            &backend,
            |_, _| {},
        )
        .unwrap();
        assert_eq!(state.phase, Phase::Succeeded);
        assert!(state
            .diagnostics
            .iter()
            .any(|d| d.code == Some(codes::W0302)));
        assert!(!state.config.as_ref().unwrap().wide_arithmetic);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn provenance_is_stable_for_identical_inputs() {
        let dir = fixture_dir(DICT, MODEL);
        let run = || {
            let mut state = EngineState::new();
            let backend = FakeBackend { fail_with: None };
            run_pipeline(
                &mut state,
                PassId::SmartScan,
                &options(&dir, "host"),
                &backend,
                |_, _| {},
            )
            .unwrap();
            state.provenance.unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.dictionary_hash, b.dictionary_hash);
        assert_eq!(a.model_fingerprint, b.model_fingerprint);
        std::fs::remove_dir_all(&dir).ok();
    }
}
