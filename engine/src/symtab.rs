// symtab.rs — Symbol table for dictionary-declared variables
//
// Holds every declared parameter and signal with its type and storage
// intent. The table is the single shared evaluation context: the loader
// populates it in one pass, and every later phase only reads it (the one
// exception is inferred-type derivation, which narrows `Inferred` to a
// concrete type and nothing else).
//
// Preconditions: none.
// Postconditions: iteration order equals declaration order.
// Failure modes: duplicate insertion, invalid type derivation.
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::ast::Span;

// ── Data types ──────────────────────────────────────────────────────────────

/// The fixed numeric/boolean type set, plus the `Inferred` sentinel for
/// symbols declared without a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Single,
    Double,
    Inferred,
}

impl DataType {
    /// Parse a type name as written in dictionary scripts and model files.
    /// `Inferred` has no surface syntax.
    pub fn parse_name(name: &str) -> Option<DataType> {
        match name {
            "bool" => Some(DataType::Bool),
            "int8" => Some(DataType::Int8),
            "uint8" => Some(DataType::UInt8),
            "int16" => Some(DataType::Int16),
            "uint16" => Some(DataType::UInt16),
            "int32" => Some(DataType::Int32),
            "uint32" => Some(DataType::UInt32),
            "single" => Some(DataType::Single),
            "double" => Some(DataType::Double),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Single => "single",
            DataType::Double => "double",
            DataType::Inferred => "<inferred>",
        }
    }

    pub fn is_concrete(&self) -> bool {
        *self != DataType::Inferred
    }

    /// Check that an evaluated value is representable in this type.
    pub fn validate_value(&self, v: f64) -> Result<(), String> {
        let int_range = |min: f64, max: f64| -> Result<(), String> {
            if v.fract() != 0.0 {
                return Err(format!("value {} is not integral for type {}", v, self));
            }
            if v < min || v > max {
                return Err(format!("value {} out of range for type {}", v, self));
            }
            Ok(())
        };
        match self {
            DataType::Bool => {
                if v == 0.0 || v == 1.0 {
                    Ok(())
                } else {
                    Err(format!("value {} is not a bool", v))
                }
            }
            DataType::Int8 => int_range(i8::MIN as f64, i8::MAX as f64),
            DataType::UInt8 => int_range(0.0, u8::MAX as f64),
            DataType::Int16 => int_range(i16::MIN as f64, i16::MAX as f64),
            DataType::UInt16 => int_range(0.0, u16::MAX as f64),
            DataType::Int32 => int_range(i32::MIN as f64, i32::MAX as f64),
            DataType::UInt32 => int_range(0.0, u32::MAX as f64),
            DataType::Single | DataType::Double => {
                if v.is_finite() {
                    Ok(())
                } else {
                    Err(format!("value {} is not finite", v))
                }
            }
            DataType::Inferred => Ok(()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ── Storage class ───────────────────────────────────────────────────────────

/// Memory-visibility classification of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    /// Externally visible, tunable global owned by the generated output.
    ExportedGlobal,
    /// Referenced through an extern pointer; never defined by the output.
    ImportedExternPointer,
    /// Function-local temporary; never externally visible.
    Auto,
}

impl StorageClass {
    /// Map a storage-class word from a dictionary script onto the fixed set.
    pub fn parse_word(word: &str) -> Option<StorageClass> {
        match word {
            "exported" => Some(StorageClass::ExportedGlobal),
            "imported" => Some(StorageClass::ImportedExternPointer),
            "auto" => Some(StorageClass::Auto),
            _ => None,
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            StorageClass::ExportedGlobal => "exported",
            StorageClass::ImportedExternPointer => "imported",
            StorageClass::Auto => "auto",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.word())
    }
}

// ── Symbol ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Parameter,
    Signal,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Parameter => write!(f, "parameter"),
            SymbolKind::Signal => write!(f, "signal"),
        }
    }
}

/// A declared dictionary variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub data_type: DataType,
    /// Raw storage-class word from the script; `None` until declared or
    /// defaulted. The resolver fills `storage_class` from it.
    pub storage_word: Option<String>,
    /// Resolved classification; `None` until the storage resolver runs.
    pub storage_class: Option<StorageClass>,
    /// Identifier used in generated output when it differs from `name`.
    pub identifier_override: Option<String>,
    /// Evaluated value (parameters only).
    pub value: Option<f64>,
    pub decl_span: Span,
}

// ── Symbol table ────────────────────────────────────────────────────────────

/// Insert-once, lookup-many table keyed by symbol name.
/// Rebuilt from scratch on every engine run; never persisted.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
}

/// Attempt to bind a name that is already bound.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateSymbol {
    pub name: String,
    pub first_span: Span,
    pub second_span: Span,
}

impl fmt::Display for DuplicateSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate symbol `{}`", self.name)
    }
}

impl std::error::Error for DuplicateSymbol {}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new symbol. Names are unique across the table.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), DuplicateSymbol> {
        if let Some(first) = self.symbols.get(&symbol.name) {
            return Err(DuplicateSymbol {
                name: symbol.name.clone(),
                first_span: first.decl_span,
                second_span: symbol.decl_span,
            });
        }
        self.order.push(symbol.name.clone());
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Tagged-variant lookup: the caller gets the symbol's kind and type
    /// without any reflection on the evaluation context.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Iterate symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().map(|n| &self.symbols[n])
    }

    /// Mutable iteration, unordered (storage resolver only).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.symbols.values_mut()
    }

    /// Narrow an `Inferred` symbol to a concrete type. Any other mutation
    /// of a symbol's type is a programming error.
    pub fn derive_type(&mut self, name: &str, ty: DataType) -> bool {
        match self.symbols.get_mut(name) {
            Some(sym) if sym.data_type == DataType::Inferred && ty.is_concrete() => {
                sym.data_type = ty;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sym in self.iter() {
            let storage = sym
                .storage_class
                .map(|c| c.word())
                .or(sym.storage_word.as_deref())
                .unwrap_or("-");
            write!(
                f,
                "{:9} {:24} {:10} {:9}",
                sym.kind, sym.name, sym.data_type, storage
            )?;
            if let Some(v) = sym.value {
                write!(f, " = {v}")?;
            }
            if let Some(ident) = &sym.identifier_override {
                write!(f, " as {ident}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ── Tests ──
