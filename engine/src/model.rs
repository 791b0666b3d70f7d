// model.rs — Dataflow model graph interface
//
// The visual editor owns the model; the engine consumes a serialized
// snapshot (`<ident>.model.json`), inspects it, and patches block output
// types in place. Only the queries the engine needs are provided:
// recursive constant-block enumeration, atomic-subsystem enumeration, and
// per-subsystem function-packaging attributes.
//
// Preconditions: model files are valid UTF-8 JSON.
// Postconditions: loaded models round-trip through serde unchanged apart
//                 from engine patches.
// Failure modes: unresolved identifier, I/O errors, malformed JSON.
// Side effects: file reads/writes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filename suffix for model snapshots.
pub const MODEL_EXT: &str = "model.json";

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ModelError {
    /// The identifier did not resolve to a model file on the search path.
    NotFound {
        ident: String,
        searched: Vec<PathBuf>,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::NotFound { ident, searched } => {
                write!(f, "model `{}` not found (searched ", ident)?;
                for (i, dir) in searched.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dir.display())?;
                }
                write!(f, ")")
            }
            ModelError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            ModelError::Parse { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for ModelError {}

// ── Graph types ─────────────────────────────────────────────────────────────

/// Function packaging for a generated subsystem function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    Nonreusable,
    Reusable,
}

/// Block kind of constant-valued blocks, the only kind the engine
/// inspects. All other kinds are carried opaquely and round-trip
/// untouched.
pub const CONSTANT_KIND: &str = "constant";

/// A block inside a subsystem. `value` is the editor's textual value
/// field; for constant blocks it may be a literal or a symbol name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub value: String,
    /// Declared output type, owned by the editor, patched by the scanner.
    #[serde(default)]
    pub out_type: String,
}

impl Block {
    pub fn is_constant(&self) -> bool {
        self.kind == CONSTANT_KIND
    }
}

/// A (possibly nested) subsystem scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsystem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub atomic: bool,
    /// Explicit generated-function name override.
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub packaging: Option<Packaging>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub subsystems: Vec<Subsystem>,
}

/// A complete model snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub root: Subsystem,
}

// ── Queries ─────────────────────────────────────────────────────────────────

impl Subsystem {
    fn collect_constants_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Block>) {
        for block in &mut self.blocks {
            if block.is_constant() {
                out.push(block);
            }
        }
        for sub in &mut self.subsystems {
            sub.collect_constants_mut(out);
        }
    }

    fn collect_atomic<'a>(&'a self, out: &mut Vec<&'a Subsystem>) {
        if self.atomic {
            out.push(self);
        }
        for sub in &self.subsystems {
            sub.collect_atomic(out);
        }
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Subsystem> {
        if self.id == id {
            return Some(self);
        }
        self.subsystems.iter_mut().find_map(|s| s.find_mut(id))
    }
}

impl Model {
    /// Every constant-valued block, recursively including nested
    /// subsystem scopes, in depth-first declaration order.
    pub fn constant_blocks_mut(&mut self) -> Vec<&mut Block> {
        let mut out = Vec::new();
        self.root.collect_constants_mut(&mut out);
        out
    }

    /// Every subsystem flagged atomic, recursively, depth-first.
    pub fn atomic_subsystems(&self) -> Vec<&Subsystem> {
        let mut out = Vec::new();
        self.root.collect_atomic(&mut out);
        out
    }

    /// Mutable access to a subsystem by id (packaging attribute writes).
    pub fn subsystem_mut(&mut self, id: &str) -> Option<&mut Subsystem> {
        self.root.find_mut(id)
    }

    /// Compact canonical JSON, used for the provenance fingerprint.
    pub fn canonical_json(&self) -> String {
        // Serialization of these plain structs cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Write the (patched) model snapshot to `path`, pretty-printed the
    /// way the editor emits it.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// ── Loading ─────────────────────────────────────────────────────────────────

/// Resolve `<ident>.model.json` against the ordered search directories.
pub fn locate(ident: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    for dir in search_paths {
        let candidate = if ident.ends_with(&format!(".{MODEL_EXT}")) {
            dir.join(ident)
        } else {
            dir.join(format!("{ident}.{MODEL_EXT}"))
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Locate and deserialize the model named by `ident`.
pub fn load(ident: &str, search_paths: &[PathBuf]) -> Result<Model, ModelError> {
    let path = locate(ident, search_paths).ok_or_else(|| ModelError::NotFound {
        ident: ident.to_string(),
        searched: search_paths.to_vec(),
    })?;

    let text = std::fs::read_to_string(&path).map_err(|e| ModelError::Io {
        path: path.clone(),
        source: e,
    })?;

    serde_json::from_str(&text).map_err(|e| ModelError::Parse { path, source: e })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_block(id: &str, value: &str, out_type: &str) -> Block {
        Block {
            id: id.to_string(),
            kind: CONSTANT_KIND.to_string(),
            value: value.to_string(),
            out_type: out_type.to_string(),
        }
    }

    fn sample_model() -> Model {
        Model {
            name: "servo".to_string(),
            root: Subsystem {
                id: "root".to_string(),
                name: "servo".to_string(),
                atomic: false,
                function_name: None,
                packaging: None,
                blocks: vec![
                    leaf_block("b1", "Threshold", "double"),
                    Block {
                        id: "b2".to_string(),
                        kind: "gain".to_string(),
                        value: String::new(),
                        out_type: "double".to_string(),
                    },
                ],
                subsystems: vec![Subsystem {
                    id: "s1".to_string(),
                    name: "Motor Control".to_string(),
                    atomic: true,
                    function_name: None,
                    packaging: None,
                    blocks: vec![leaf_block("b3", "Gain", "double")],
                    subsystems: vec![Subsystem {
                        id: "s2".to_string(),
                        name: "Inner Loop".to_string(),
                        atomic: true,
                        function_name: Some("inner_loop_run".to_string()),
                        packaging: Some(Packaging::Nonreusable),
                        blocks: vec![],
                        subsystems: vec![],
                    }],
                }],
            },
        }
    }

    #[test]
    fn constant_enumeration_recurses_and_skips_other_kinds() {
        let mut model = sample_model();
        let ids: Vec<_> = model
            .constant_blocks_mut()
            .iter()
            .map(|b| b.id.clone())
            .collect();
        assert_eq!(ids, vec!["b1", "b3"]);
    }

    #[test]
    fn atomic_enumeration_recurses() {
        let model = sample_model();
        let ids: Vec<_> = model.atomic_subsystems().iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn subsystem_lookup_and_packaging_write() {
        let mut model = sample_model();
        let sub = model.subsystem_mut("s1").unwrap();
        sub.packaging = Some(Packaging::Nonreusable);
        sub.function_name = Some("motor_control_step".to_string());
        assert!(model.subsystem_mut("nope").is_none());
        assert_eq!(
            model.subsystem_mut("s1").unwrap().packaging,
            Some(Packaging::Nonreusable)
        );
    }

    #[test]
    fn deserialize_with_defaults_and_unknown_kinds() {
        let json = r#"{
            "name": "m",
            "root": {
                "id": "root", "name": "m",
                "blocks": [
                    {"id": "b1", "kind": "constant", "value": "X", "out_type": "double"},
                    {"id": "b2", "kind": "gain"}
                ]
            }
        }"#;
        let model: Model = serde_json::from_str(json).unwrap();
        assert!(!model.root.atomic);
        assert!(model.root.blocks[0].is_constant());
        assert!(!model.root.blocks[1].is_constant());
        assert_eq!(model.root.blocks[1].kind, "gain");
        assert!(model.root.subsystems.is_empty());
    }

    #[test]
    fn canonical_json_is_stable() {
        let model = sample_model();
        assert_eq!(model.canonical_json(), model.canonical_json());
        assert!(model.canonical_json().contains("\"Motor Control\""));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = std::env::temp_dir().join("mcfg_model_roundtrip_test");
        std::fs::create_dir_all(&dir).unwrap();
        let model = sample_model();
        model.save(&dir.join("servo.model.json")).unwrap();

        let loaded = load("servo", &[dir.clone()]).unwrap();
        assert_eq!(loaded, model);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_not_found() {
        let err = load("ghost", &[std::env::temp_dir().join("mcfg_model_missing_dir")]).unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[test]
    fn load_malformed_json() {
        let dir = std::env::temp_dir().join("mcfg_model_badjson_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.model.json"), "{ not json").unwrap();
        let err = load("broken", &[dir.clone()]).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
