// storage.rs — Storage class resolver
//
// Validates and normalizes each symbol's storage classification against
// the three recognized kinds. Runs after the loader and before anything
// reads storage classes; purely validates/normalizes the table.
//
// Preconditions: the symbol table is fully loaded.
// Postconditions: every symbol has a resolved `storage_class`.
// Failure modes: a declared word outside the fixed set (`UnknownStorageClass`).
// Side effects: none beyond filling defaults; idempotent.

use std::fmt;

use crate::ast::Span;
use crate::symtab::{StorageClass, SymbolKind, SymbolTable};

/// A symbol declared a storage classification outside the fixed set.
/// Never silently coerced — this is a configuration error.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownStorageClass {
    pub symbol: String,
    pub declared: String,
    pub decl_span: Span,
}

impl fmt::Display for UnknownStorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "symbol `{}` declares unknown storage class `{}` (expected exported, imported, or auto)",
            self.symbol, self.declared
        )
    }
}

impl std::error::Error for UnknownStorageClass {}

/// Resolve every symbol's storage class in place.
///
/// Defaults: a parameter with no declaration is `ExportedGlobal`
/// (parameters are tunable by default); a signal with no declaration is
/// `Auto` (no storage intent means a function-local temporary).
pub fn resolve(table: &mut SymbolTable) -> Result<(), UnknownStorageClass> {
    for sym in table.iter_mut() {
        let class = match &sym.storage_word {
            Some(word) => {
                StorageClass::parse_word(word).ok_or_else(|| UnknownStorageClass {
                    symbol: sym.name.clone(),
                    declared: word.clone(),
                    decl_span: sym.decl_span,
                })?
            }
            None => match sym.kind {
                SymbolKind::Parameter => StorageClass::ExportedGlobal,
                SymbolKind::Signal => StorageClass::Auto,
            },
        };
        sym.storage_class = Some(class);
    }
    Ok(())
}

// ── Tests ──
