use clap::Parser;
use std::path::PathBuf;

use mcfg::backend::CommandBackend;
use mcfg::pass::PassId;
use mcfg::pipeline::{run_pipeline, EngineOptions, EngineState};
use mcfg::{report, target};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    /// Resolved data dictionary dump
    Dict,
    /// Smart-scan fix report
    Scan,
    /// Build configuration JSON
    Config,
    /// Full sandboxed build (default)
    Build,
}

#[derive(Parser, Debug)]
#[command(
    name = "mcfg",
    version,
    about = "Model configuration engine — prepares and runs code-generation builds"
)]
struct Cli {
    /// Model identifier, resolved as <name>.model.json on the search path
    #[arg(default_value = "model")]
    model: String,

    /// Data dictionary identifier, resolved as <name>.dd on the search path
    #[arg(short, long, default_value = "data_dictionary")]
    dict: String,

    /// Search directory for dictionary and model files (repeatable)
    #[arg(long = "path")]
    path: Vec<PathBuf>,

    /// Target device
    #[arg(short, long, default_value = target::DEFAULT_TARGET)]
    target: String,

    /// Build directory (default: build/<model>)
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Generation backend program
    #[arg(long, default_value = "codegen-backend")]
    generator: String,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Build)]
    emit: EmitStage,

    /// Print engine phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let target = match target::lookup(&cli.target) {
        Some(t) => t,
        None => {
            eprintln!(
                "mcfg: error: unknown target `{}` (supported: {})",
                cli.target,
                target::target_names().join(", ")
            );
            std::process::exit(2);
        }
    };

    let search_dirs = if cli.path.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.path.clone()
    };

    let build_dir = cli
        .build_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("build").join(&cli.model));

    if cli.verbose {
        eprintln!("mcfg: model     = {}", cli.model);
        eprintln!("mcfg: dict      = {}", cli.dict);
        eprintln!("mcfg: target    = {}", target.name);
        eprintln!("mcfg: build dir = {}", build_dir.display());
        eprintln!("mcfg: emit      = {:?}", cli.emit);
    }

    let options = EngineOptions {
        dictionary: cli.dict.clone(),
        model: cli.model.clone(),
        search_dirs,
        target,
        build_dir,
        verbose: cli.verbose,
    };

    let terminal = match cli.emit {
        EmitStage::Dict => PassId::ResolveStorage,
        EmitStage::Scan => PassId::SmartScan,
        EmitStage::Config => PassId::BuildConfig,
        EmitStage::Build => PassId::Generate,
    };

    let backend = CommandBackend::new(cli.generator.clone());
    let mut state = EngineState::new();
    let _ = run_pipeline(&mut state, terminal, &options, &backend, |_, _| {});

    // Warnings, fixes, and (on failure) errors with their cause chains.
    eprint!("{}", report::render(&state));

    if state.has_error {
        std::process::exit(1);
    }

    match cli.emit {
        EmitStage::Dict => {
            if let Some(dict) = &state.dictionary {
                print!("{}", dict.table);
            }
        }
        EmitStage::Scan => {
            if let Some(scan) = &state.scan {
                println!(
                    "scanned {} constant block(s), {} fixed",
                    scan.constants_visited,
                    scan.fix_count()
                );
            }
        }
        EmitStage::Config => {
            if let Some(config) = &state.config {
                println!("{}", config.to_json());
            }
            if cli.verbose {
                if let Some(p) = &state.provenance {
                    eprintln!("{}", p.to_json());
                }
            }
        }
        EmitStage::Build => {}
    }
}
