// loader.rs — Dictionary loader
//
// Locates a data-dictionary script by identifier on the project search
// path and executes it into a symbol table. The table is the single
// shared evaluation context: each parameter's defining expression is
// evaluated against the symbols bound by earlier statements.
//
// Preconditions: search paths name existing or probe-able directories.
// Postconditions: on success the table holds one symbol per declaration,
//                 in declaration order, with evaluated parameter values.
// Failure modes: unresolved identifier (`NotFound`), unreadable script
//                (`Io`), lex/parse/eval failure (`Execution`).
// Side effects: reads the script file. The loader runs exactly once per
//               build, before any other component touches the table.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::ast::{Dictionary, Expr, ParamDecl, SignalDecl, Span, StatementKind};
use crate::symtab::{DataType, Symbol, SymbolKind, SymbolTable};

/// Filename suffix for dictionary scripts.
pub const DICT_EXT: &str = "dd";

// ── Errors ──────────────────────────────────────────────────────────────────

/// One underlying lex/parse/eval failure, with its script location.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecFailure {
    pub message: String,
    pub span: Option<Span>,
}

/// Errors that can occur while loading a dictionary.
#[derive(Debug)]
pub enum LoadError {
    /// The identifier did not resolve to a script on the search path.
    NotFound {
        ident: String,
        searched: Vec<PathBuf>,
    },
    /// The script file exists but could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Script execution failed; `causes` holds every underlying failure
    /// in source order.
    Execution {
        path: PathBuf,
        causes: Vec<ExecFailure>,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound { ident, searched } => {
                write!(f, "dictionary `{}` not found (searched ", ident)?;
                for (i, dir) in searched.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dir.display())?;
                }
                write!(f, ")")
            }
            LoadError::Io { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            LoadError::Execution { path, causes } => {
                write!(
                    f,
                    "execution of {} failed ({} error{})",
                    path.display(),
                    causes.len(),
                    if causes.len() == 1 { "" } else { "s" }
                )
            }
        }
    }
}

impl std::error::Error for LoadError {}

// ── Result ──────────────────────────────────────────────────────────────────

/// A successfully loaded dictionary: the populated table plus the raw
/// script text and path (kept for provenance hashing and span rendering).
#[derive(Debug)]
pub struct LoadedDictionary {
    pub table: SymbolTable,
    pub source: String,
    pub path: PathBuf,
}

// ── Identifier resolution ───────────────────────────────────────────────────

/// Resolve `<ident>.dd` against the ordered search directories. First hit
/// wins. An identifier already carrying the extension is probed verbatim.
pub fn locate(ident: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    for dir in search_paths {
        let candidate = if Path::new(ident).extension().is_some_and(|e| e == DICT_EXT) {
            dir.join(ident)
        } else {
            dir.join(format!("{ident}.{DICT_EXT}"))
        };
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

// ── Loading ─────────────────────────────────────────────────────────────────

/// Locate, read, and execute the dictionary script named by `ident`.
pub fn load(ident: &str, search_paths: &[PathBuf]) -> Result<LoadedDictionary, LoadError> {
    let path = locate(ident, search_paths).ok_or_else(|| LoadError::NotFound {
        ident: ident.to_string(),
        searched: search_paths.to_vec(),
    })?;

    let source = std::fs::read_to_string(&path).map_err(|e| LoadError::Io {
        path: path.clone(),
        source: e,
    })?;

    let table = execute(&source).map_err(|causes| LoadError::Execution {
        path: path.clone(),
        causes,
    })?;

    Ok(LoadedDictionary {
        table,
        source,
        path,
    })
}

/// Execute dictionary script text into a fresh symbol table.
///
/// Parse errors are all reported; evaluation stops at the first failing
/// statement (execution "raises"), matching script semantics.
pub fn execute(source: &str) -> Result<SymbolTable, Vec<ExecFailure>> {
    let parse_result = crate::parser::parse(source);
    if !parse_result.errors.is_empty() {
        return Err(parse_result
            .errors
            .iter()
            .map(|e| ExecFailure {
                message: e.to_string(),
                span: Some(*e.span()),
            })
            .collect());
    }
    let dict = match parse_result.dictionary {
        Some(d) => d,
        None => {
            return Err(vec![ExecFailure {
                message: "parse produced no output".to_string(),
                span: None,
            }])
        }
    };

    let mut table = SymbolTable::new();
    run(&dict, &mut table).map_err(|e| vec![e])?;
    Ok(table)
}

/// Execute a parsed dictionary into `table`, statement by statement.
fn run(dict: &Dictionary, table: &mut SymbolTable) -> Result<(), ExecFailure> {
    for stmt in &dict.statements {
        match &stmt.kind {
            StatementKind::Param(p) => bind_param(p, stmt.span, table)?,
            StatementKind::Signal(s) => bind_signal(s, stmt.span, table)?,
        }
    }
    Ok(())
}

fn bind_param(decl: &ParamDecl, span: Span, table: &mut SymbolTable) -> Result<(), ExecFailure> {
    let value = eval(&decl.value, table)?;
    let declared = decl.ty.as_ref().map(|t| t.ty).unwrap_or(DataType::Inferred);

    if declared.is_concrete() {
        declared.validate_value(value).map_err(|message| ExecFailure {
            message: format!("parameter `{}`: {}", decl.name.name, message),
            span: Some(decl.value.span()),
        })?;
    }

    let symbol = Symbol {
        name: decl.name.name.clone(),
        kind: SymbolKind::Parameter,
        data_type: declared,
        storage_word: decl.storage.as_ref().map(|s| s.name.clone()),
        storage_class: None,
        identifier_override: decl.rename.as_ref().map(|r| r.name.clone()),
        value: Some(value),
        decl_span: span,
    };
    insert(table, symbol)?;

    // Inferred-type derivation: an untyped parameter defined by a bare
    // reference adopts the referenced symbol's concrete type.
    if declared == DataType::Inferred {
        if let Some(ref_name) = decl.value.as_ref_name() {
            if let Some(referenced_ty) = table
                .lookup(ref_name)
                .map(|s| s.data_type)
                .filter(|t| t.is_concrete())
            {
                table.derive_type(&decl.name.name, referenced_ty);
            }
        }
    }
    Ok(())
}

fn bind_signal(decl: &SignalDecl, span: Span, table: &mut SymbolTable) -> Result<(), ExecFailure> {
    let symbol = Symbol {
        name: decl.name.name.clone(),
        kind: SymbolKind::Signal,
        data_type: decl.ty.as_ref().map(|t| t.ty).unwrap_or(DataType::Inferred),
        storage_word: decl.storage.as_ref().map(|s| s.name.clone()),
        storage_class: None,
        identifier_override: decl.rename.as_ref().map(|r| r.name.clone()),
        value: None,
        decl_span: span,
    };
    insert(table, symbol)
}

fn insert(table: &mut SymbolTable, symbol: Symbol) -> Result<(), ExecFailure> {
    let span = symbol.decl_span;
    table.insert(symbol).map_err(|dup| ExecFailure {
        message: format!("{dup}"),
        span: Some(span),
    })
}

/// Evaluate a defining expression against the bindings made so far.
fn eval(expr: &Expr, table: &SymbolTable) -> Result<f64, ExecFailure> {
    use crate::ast::BinOp;
    match expr {
        Expr::Number(n, _) => Ok(*n),
        Expr::Bool(b, _) => Ok(if *b { 1.0 } else { 0.0 }),
        Expr::Ref(id) => match table.lookup(&id.name) {
            Some(sym) => sym.value.ok_or_else(|| ExecFailure {
                message: format!(
                    "signal `{}` has no compile-time value and cannot appear in an expression",
                    id.name
                ),
                span: Some(id.span),
            }),
            None => Err(ExecFailure {
                message: format!("unknown symbol `{}`", id.name),
                span: Some(id.span),
            }),
        },
        Expr::Neg(inner, _) => Ok(-eval(inner, table)?),
        Expr::Binary(op, lhs, rhs, span) => {
            let l = eval(lhs, table)?;
            let r = eval(rhs, table)?;
            match op {
                BinOp::Add => Ok(l + r),
                BinOp::Sub => Ok(l - r),
                BinOp::Mul => Ok(l * r),
                BinOp::Div => {
                    if r == 0.0 {
                        Err(ExecFailure {
                            message: "division by zero".to_string(),
                            span: Some(*span),
                        })
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
    }
}

// ── Tests ──
