// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the engine's 6 configuration passes, their dependency edges,
// and the artifacts they produce. Used by the pipeline runner to compute
// minimal pass subsets for each --emit target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each engine pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    LoadDictionary,
    ResolveStorage,
    LoadModel,
    SmartScan,
    BuildConfig,
    Generate,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type
/// in the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Symbols,    // SymbolTable
    Resolved,   // SymbolTable with storage classes assigned
    Graph,      // Model
    ScanReport, // ScanReport + patched Model
    Config,     // BuildConfig
    Artifacts,  // backend output in the build directory
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about an engine pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Describes what invalidates this pass's output.
    pub invalidation_key: &'static str,
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::LoadDictionary => PassDescriptor {
            name: "load_dictionary",
            inputs: &[],
            outputs: &[ArtifactId::Symbols],
            invalidation_key: "dictionary source",
            invariants: "every declaration evaluated, values validated",
        },
        PassId::ResolveStorage => PassDescriptor {
            name: "resolve_storage",
            inputs: &[PassId::LoadDictionary],
            outputs: &[ArtifactId::Resolved],
            invalidation_key: "symbols",
            invariants: "every symbol carries a storage class",
        },
        PassId::LoadModel => PassDescriptor {
            name: "load_model",
            inputs: &[],
            outputs: &[ArtifactId::Graph],
            invalidation_key: "model file",
            invariants: "model graph deserialized and well-formed",
        },
        PassId::SmartScan => PassDescriptor {
            name: "smart_scan",
            inputs: &[PassId::ResolveStorage, PassId::LoadModel],
            outputs: &[ArtifactId::ScanReport],
            invalidation_key: "resolved symbols + graph",
            invariants: "no constant block disagrees with its symbol's type",
        },
        PassId::BuildConfig => PassDescriptor {
            name: "build_config",
            inputs: &[PassId::SmartScan],
            outputs: &[ArtifactId::Config],
            invalidation_key: "patched graph + target",
            invariants: "atomic subsystems bound, config validated",
        },
        PassId::Generate => PassDescriptor {
            name: "generate",
            inputs: &[PassId::BuildConfig],
            outputs: &[ArtifactId::Artifacts],
            invalidation_key: "config + patched graph + backend",
            invariants: "artifacts present in the build directory",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 6 pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 6] = [
    PassId::LoadDictionary,
    PassId::ResolveStorage,
    PassId::LoadModel,
    PassId::SmartScan,
    PassId::BuildConfig,
    PassId::Generate,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_resolve_storage_skips_model_side() {
        let passes = required_passes(PassId::ResolveStorage);
        assert_eq!(passes, vec![PassId::LoadDictionary, PassId::ResolveStorage]);
        assert!(!passes.contains(&PassId::LoadModel));
        assert!(!passes.contains(&PassId::SmartScan));
    }

    #[test]
    fn required_passes_generate_includes_all() {
        let passes = required_passes(PassId::Generate);
        assert_eq!(passes.len(), 6);
        assert_eq!(
            passes,
            vec![
                PassId::LoadDictionary,
                PassId::ResolveStorage,
                PassId::LoadModel,
                PassId::SmartScan,
                PassId::BuildConfig,
                PassId::Generate,
            ]
        );
    }

    #[test]
    fn required_passes_smart_scan_pulls_both_inputs() {
        let passes = required_passes(PassId::SmartScan);
        assert_eq!(
            passes,
            vec![
                PassId::LoadDictionary,
                PassId::ResolveStorage,
                PassId::LoadModel,
                PassId::SmartScan,
            ]
        );
    }

    #[test]
    fn required_passes_load_dictionary_is_minimal() {
        let passes = required_passes(PassId::LoadDictionary);
        assert_eq!(passes, vec![PassId::LoadDictionary]);
    }

    #[test]
    fn all_descriptors_have_outputs() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            assert!(
                !desc.outputs.is_empty(),
                "pass {:?} has no outputs declared",
                pass
            );
        }
    }

    #[test]
    fn dependency_edges_are_consistent() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            for dep in desc.inputs {
                // Dependency must come before this pass in topological order
                let dep_passes = required_passes(*pass);
                let dep_pos = dep_passes.iter().position(|p| p == dep);
                let self_pos = dep_passes.iter().position(|p| p == pass);
                assert!(
                    dep_pos.unwrap() < self_pos.unwrap(),
                    "{:?} depends on {:?} but it comes later in topological order",
                    pass,
                    dep
                );
            }
        }
    }
}
