// scan.rs — Type-mismatch scanner ("smart scan")
//
// Reconciles a constant block's declared output type with the declared
// type of the dictionary symbol it references. This removes the single
// most common authoring defect: a constant block defaulted to a wide
// floating type while its parameter is declared with a precise type.
//
// Preconditions: the symbol table is loaded and storage-resolved.
// Postconditions: for every constant block whose value names a parameter
//                 with a concrete type, out_type equals the symbol type.
// Failure modes: none — unknown names and literals are skipped, never
//                invented.
// Side effects: patches block output types in the model, in place.
//
// Known limitation: only Parameter mismatches are repaired. A signal
// declared `uint32` feeding a block defaulted to `double` is left alone;
// signal-side repair is out of this pass's responsibility.

use crate::model::Model;
use crate::symtab::{SymbolKind, SymbolTable};

/// One auto-fixed block.
#[derive(Debug, Clone, PartialEq)]
pub struct FixRecord {
    pub block_id: String,
    pub symbol: String,
    pub from: String,
    pub to: String,
}

/// Outcome of a scan. Zero fixes is a valid, reported outcome.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub fixes: Vec<FixRecord>,
    pub constants_visited: usize,
}

impl ScanReport {
    pub fn fix_count(&self) -> usize {
        self.fixes.len()
    }
}

/// Walk every constant-valued block (recursively, through nested
/// subsystems) and rewrite its declared output type where it disagrees
/// with the referenced parameter's declared type.
///
/// Idempotent: a second scan over the same model/table performs no
/// writes and reports zero fixes.
pub fn smart_scan(model: &mut Model, table: &SymbolTable) -> ScanReport {
    let mut report = ScanReport::default();

    for block in model.constant_blocks_mut() {
        report.constants_visited += 1;

        // The value field is only a candidate symbol name: plain
        // literals are not evaluable as a variable lookup.
        let candidate = block.value.trim();
        if is_literal(candidate) {
            continue;
        }

        // Not every non-literal names a declared symbol.
        let Some(symbol) = table.lookup(candidate) else {
            continue;
        };

        // Only parameters feed constant blocks by convention; a symbol
        // that is still `Inferred` gives the block nothing to adopt.
        if symbol.kind != SymbolKind::Parameter || !symbol.data_type.is_concrete() {
            continue;
        }

        let want = symbol.data_type.name();
        if block.out_type != want {
            report.fixes.push(FixRecord {
                block_id: block.id.clone(),
                symbol: symbol.name.clone(),
                from: std::mem::replace(&mut block.out_type, want.to_string()),
                to: want.to_string(),
            });
        }
    }

    report
}

/// True when the value field holds a literal rather than a name.
fn is_literal(value: &str) -> bool {
    value.is_empty() || value == "true" || value == "false" || value.parse::<f64>().is_ok()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::execute;
    use crate::model::{Block, Model, Subsystem, CONSTANT_KIND};

    fn constant(id: &str, value: &str, out_type: &str) -> Block {
        Block {
            id: id.to_string(),
            kind: CONSTANT_KIND.to_string(),
            value: value.to_string(),
            out_type: out_type.to_string(),
        }
    }

    fn flat_model(blocks: Vec<Block>) -> Model {
        Model {
            name: "m".to_string(),
            root: Subsystem {
                id: "root".to_string(),
                name: "m".to_string(),
                atomic: false,
                function_name: None,
                packaging: None,
                blocks,
                subsystems: vec![],
            },
        }
    }

    fn table(source: &str) -> SymbolTable {
        execute(source).expect("dictionary should execute")
    }

    #[test]
    fn scenario_a_parameter_mismatch_is_fixed() {
        let table = table("param Threshold : int32 = 192");
        let mut model = flat_model(vec![constant("c1", "Threshold", "double")]);

        let report = smart_scan(&mut model, &table);

        assert_eq!(report.fix_count(), 1);
        assert_eq!(model.root.blocks[0].out_type, "int32");
        let fix = &report.fixes[0];
        assert_eq!(fix.block_id, "c1");
        assert_eq!(fix.symbol, "Threshold");
        assert_eq!(fix.from, "double");
        assert_eq!(fix.to, "int32");
    }

    #[test]
    fn scenario_b_no_references_no_writes() {
        let table = table("param Threshold : int32 = 192");
        let mut model = flat_model(vec![
            constant("c1", "0.5", "double"),
            constant("c2", "SomethingElse", "double"),
        ]);
        let before = model.clone();

        let report = smart_scan(&mut model, &table);

        assert_eq!(report.fix_count(), 0);
        assert_eq!(report.constants_visited, 2);
        assert_eq!(model, before);
    }

    #[test]
    fn scan_is_idempotent() {
        let table = table("param Threshold : int32 = 192\nparam Gain : single = 2");
        let mut model = flat_model(vec![
            constant("c1", "Threshold", "double"),
            constant("c2", "Gain", "double"),
        ]);

        let first = smart_scan(&mut model, &table);
        assert_eq!(first.fix_count(), 2);

        let second = smart_scan(&mut model, &table);
        assert_eq!(second.fix_count(), 0);
        assert_eq!(second.constants_visited, 2);
    }

    #[test]
    fn nested_subsystems_are_scanned() {
        let table = table("param Depth : uint16 = 8");
        let mut model = flat_model(vec![]);
        model.root.subsystems.push(Subsystem {
            id: "s1".to_string(),
            name: "outer".to_string(),
            atomic: false,
            function_name: None,
            packaging: None,
            blocks: vec![],
            subsystems: vec![Subsystem {
                id: "s2".to_string(),
                name: "inner".to_string(),
                atomic: false,
                function_name: None,
                packaging: None,
                blocks: vec![constant("deep", "Depth", "double")],
                subsystems: vec![],
            }],
        });

        let report = smart_scan(&mut model, &table);
        assert_eq!(report.fix_count(), 1);
        assert_eq!(
            model.root.subsystems[0].subsystems[0].blocks[0].out_type,
            "uint16"
        );
    }

    #[test]
    fn matching_type_is_not_rewritten() {
        let table = table("param Threshold : int32 = 192");
        let mut model = flat_model(vec![constant("c1", "Threshold", "int32")]);
        let report = smart_scan(&mut model, &table);
        assert_eq!(report.fix_count(), 0);
        assert_eq!(report.constants_visited, 1);
    }

    #[test]
    fn signals_are_never_fixed() {
        let table = table("signal Speed : uint32");
        let mut model = flat_model(vec![constant("c1", "Speed", "double")]);
        let report = smart_scan(&mut model, &table);
        assert_eq!(report.fix_count(), 0);
        assert_eq!(model.root.blocks[0].out_type, "double");
    }

    #[test]
    fn inferred_parameters_are_skipped() {
        let table = table("param Gain = 2.5");
        let mut model = flat_model(vec![constant("c1", "Gain", "double")]);
        let report = smart_scan(&mut model, &table);
        assert_eq!(report.fix_count(), 0);
    }

    #[test]
    fn literal_values_are_skipped() {
        // `192` parses as a number even though a symbol could share the
        // spelling of `true`/`false`.
        let table = table("param Threshold : int32 = 192");
        let mut model = flat_model(vec![
            constant("c1", "192", "double"),
            constant("c2", "true", "double"),
            constant("c3", "-3.5e2", "double"),
            constant("c4", "", "double"),
        ]);
        let report = smart_scan(&mut model, &table);
        assert_eq!(report.fix_count(), 0);
        assert_eq!(report.constants_visited, 4);
    }

    #[test]
    fn non_constant_blocks_are_ignored() {
        let table = table("param Threshold : int32 = 192");
        let mut model = flat_model(vec![Block {
            id: "g1".to_string(),
            kind: "gain".to_string(),
            value: "Threshold".to_string(),
            out_type: "double".to_string(),
        }]);
        let report = smart_scan(&mut model, &table);
        assert_eq!(report.constants_visited, 0);
        assert_eq!(model.root.blocks[0].out_type, "double");
    }

    #[test]
    fn symbol_own_type_is_never_changed() {
        let table = table("param Threshold : int32 = 192");
        let mut model = flat_model(vec![constant("c1", "Threshold", "double")]);
        smart_scan(&mut model, &table);
        assert_eq!(
            table.lookup("Threshold").unwrap().data_type,
            crate::symtab::DataType::Int32
        );
    }
}
