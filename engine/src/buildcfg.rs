// buildcfg.rs — Build configuration builder
//
// Assembles target-hardware, numeric-mode, and function-packaging
// settings from the fixed engine policy plus per-subsystem overrides
// found in the model. Validation runs before any backend invocation;
// no partial builds are attempted.
//
// Preconditions: model loaded; target taken from the capability table.
// Postconditions: a complete `BuildConfig`, plus warnings for degraded
//                 options.
// Failure modes: atomic subsystem without usable function packaging.
// Side effects: none (the pipeline applies bindings back to the model).

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::model::{Model, Packaging};
use crate::target::TargetDevice;

// ── Types ───────────────────────────────────────────────────────────────────

/// Solver mode for generated timing. Deterministic generated-code timing
/// requires fixed-step; variable-step is deliberately not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverMode {
    FixedStep,
}

/// Function packaging decided for one subsystem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionBinding {
    pub subsystem_id: String,
    pub subsystem_name: String,
    pub atomic: bool,
    pub packaging: Packaging,
    pub function_name: String,
}

/// The finalized configuration handed to the generation backend.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
    pub model_name: String,
    pub target_device: String,
    /// Native 64-bit arithmetic in generated code.
    pub wide_arithmetic: bool,
    pub solver_mode: SolverMode,
    pub build_dir: PathBuf,
    pub bindings: Vec<FunctionBinding>,
}

impl BuildConfig {
    pub fn to_json(&self) -> String {
        // Serialization of these plain structs cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Configuration-validation failure; aborts before the backend runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    AtomicSubsystemMisconfigured { subsystem: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::AtomicSubsystemMisconfigured { subsystem, reason } => {
                write!(f, "atomic subsystem `{}` misconfigured: {}", subsystem, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Assemble a complete build configuration.
///
/// Policy: solver mode is fixed-step unconditionally; wide arithmetic is
/// enabled by default and degrades (with a warning, never an abort) on
/// targets that reject it; every atomic subsystem is bound to a
/// nonreusable function named from its override or its own name.
pub fn build_config(
    model: &Model,
    target: &TargetDevice,
    build_dir: PathBuf,
) -> (BuildConfig, Vec<Diagnostic>) {
    let mut warnings = Vec::new();

    let wide_arithmetic = if target.supports_wide_arithmetic {
        true
    } else {
        warnings.push(
            Diagnostic::new(
                DiagLevel::Warning,
                format!(
                    "target `{}` rejects native 64-bit arithmetic; continuing with fixed 32-bit widths",
                    target.name
                ),
            )
            .with_code(codes::W0302),
        );
        false
    };

    let bindings = model
        .atomic_subsystems()
        .into_iter()
        .map(|sub| FunctionBinding {
            subsystem_id: sub.id.clone(),
            subsystem_name: sub.name.clone(),
            atomic: true,
            packaging: sub.packaging.unwrap_or(Packaging::Nonreusable),
            function_name: sub
                .function_name
                .clone()
                .unwrap_or_else(|| derive_function_name(&sub.name)),
        })
        .collect();

    let config = BuildConfig {
        model_name: model.name.clone(),
        target_device: target.name.to_string(),
        wide_arithmetic,
        solver_mode: SolverMode::FixedStep,
        build_dir,
        bindings,
    };

    (config, warnings)
}

/// Derive a generated-function name from a subsystem's identifying name:
/// lowercased, non-identifier runs collapsed to `_`, `_step` suffix.
/// `Motor Control` → `motor_control_step`.
pub fn derive_function_name(subsystem_name: &str) -> String {
    let mut out = String::with_capacity(subsystem_name.len() + 5);
    let mut pending_sep = false;
    for c in subsystem_name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        // Nothing identifier-like to derive from; validation rejects it.
        return String::new();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out.push_str("_step");
    out
}

/// Check the atomic-subsystem invariant: nonreusable packaging and a
/// non-empty function name, for every atomic binding, before a build is
/// attempted.
pub fn validate(config: &BuildConfig) -> Result<(), ConfigError> {
    for binding in &config.bindings {
        if !binding.atomic {
            continue;
        }
        if binding.packaging != Packaging::Nonreusable {
            return Err(ConfigError::AtomicSubsystemMisconfigured {
                subsystem: binding.subsystem_name.clone(),
                reason: "packaging must be nonreusable".to_string(),
            });
        }
        if binding.function_name.is_empty() {
            return Err(ConfigError::AtomicSubsystemMisconfigured {
                subsystem: binding.subsystem_name.clone(),
                reason: "no function name assigned".to_string(),
            });
        }
    }
    Ok(())
}

/// Write the decided packaging attributes back into the model so the
/// patched snapshot handed to the backend is self-describing.
pub fn apply_bindings(model: &mut Model, config: &BuildConfig) {
    for binding in &config.bindings {
        if let Some(sub) = model.subsystem_mut(&binding.subsystem_id) {
            sub.packaging = Some(binding.packaging);
            sub.function_name = Some(binding.function_name.clone());
        }
    }
}

// ── Tests ──
