// report.rs — Final run report rendering.
//
// Pure string rendering of an engine run's outcome: success with the
// artifact location, fixes, and warnings, or failure with every error
// diagnostic and its cause chain in emission order. No I/O here; the
// caller decides where the text goes.

use crate::diag::DiagLevel;
use crate::pipeline::{EngineState, Phase};

/// Render the end-of-run report for a build terminal.
pub fn render(state: &EngineState) -> String {
    let mut out = String::new();

    if let Some(scan) = &state.scan {
        for fix in &scan.fixes {
            out.push_str(&format!(
                "fixed: block `{}` retyped {} -> {} (symbol `{}`)\n",
                fix.block_id, fix.from, fix.to, fix.symbol
            ));
        }
    }

    for diag in &state.diagnostics {
        if diag.level == DiagLevel::Warning {
            out.push_str(&format!("{}\n", diag));
        }
    }

    match state.phase {
        Phase::Succeeded => {
            let dir = state
                .config
                .as_ref()
                .map(|c| c.build_dir.display().to_string())
                .unwrap_or_else(|| ".".to_string());
            out.push_str(&format!("build succeeded: artifacts in {}\n", dir));
            if let Some(scan) = &state.scan {
                if scan.fix_count() > 0 {
                    out.push_str(&format!(
                        "smart scan repaired {} constant block(s)\n",
                        scan.fix_count()
                    ));
                }
            }
        }
        Phase::Failed => {
            for diag in &state.diagnostics {
                if diag.is_error() {
                    out.push_str(&format!("{}\n", diag));
                }
            }
            out.push_str("build failed\n");
        }
        _ => {
            // Intermediate terminal (--emit before the build stage); the
            // caller prints the requested artifact itself.
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{codes, Diagnostic};
    use crate::scan::{FixRecord, ScanReport};

    #[test]
    fn success_report_names_build_dir_and_fixes() {
        let mut state = EngineState::new();
        state.phase = Phase::Succeeded;
        state.scan = Some(ScanReport {
            fixes: vec![FixRecord {
                block_id: "b1".to_string(),
                symbol: "Threshold".to_string(),
                from: "double".to_string(),
                to: "int32".to_string(),
            }],
            constants_visited: 3,
        });
        let (config, _) = crate::buildcfg::build_config(
            &crate::model::Model {
                name: "servo".to_string(),
                root: crate::model::Subsystem {
                    id: "root".to_string(),
                    name: "servo".to_string(),
                    atomic: false,
                    function_name: None,
                    packaging: None,
                    blocks: vec![],
                    subsystems: vec![],
                },
            },
            crate::target::lookup("host").unwrap(),
            std::path::PathBuf::from("build/servo"),
        );
        state.config = Some(config);

        let report = render(&state);
        assert!(report.contains("build succeeded: artifacts in build/servo"));
        assert!(report.contains("repaired 1 constant block(s)"));
        assert!(report.contains("retyped double -> int32"));
    }

    #[test]
    fn failure_report_lists_causes_in_order() {
        let mut state = EngineState::new();
        state.phase = Phase::Failed;
        state.has_error = true;
        state.diagnostics.push(
            Diagnostic::new(DiagLevel::Error, "backend `gen` exited with exit status: 1")
                .with_code(codes::E0401)
                .with_cause("undefined symbol `Gain`", None)
                .with_cause("aborting", None),
        );

        let report = render(&state);
        assert!(report.contains("E0401"));
        let first = report.find("undefined symbol `Gain`").unwrap();
        let second = report.find("aborting").unwrap();
        assert!(first < second);
        assert!(report.trim_end().ends_with("build failed"));
    }

    #[test]
    fn warnings_appear_on_success() {
        let mut state = EngineState::new();
        state.phase = Phase::Succeeded;
        state.diagnostics.push(
            Diagnostic::new(
                DiagLevel::Warning,
                "target `cortex-m4` rejects native 64-bit arithmetic; continuing with fixed 32-bit widths",
            )
            .with_code(codes::W0302),
        );
        let report = render(&state);
        assert!(report.contains("W0302"));
        assert!(report.contains("build succeeded"));
    }
}
