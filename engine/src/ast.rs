// AST node types for data-dictionary .dd scripts.
//
// Every node carries a `SimpleSpan` for error reporting in downstream phases.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::symtab::DataType;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete dictionary script: a sequence of declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    pub statements: Vec<Statement>,
    pub span: Span,
}

// ── Statements ──

/// A top-level declaration with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Param(ParamDecl),
    Signal(SignalDecl),
}

// ── param_decl: 'param' IDENT (':' type)? '=' expr storage? rename? ──

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: Ident,
    /// Declared data type; `None` means the sentinel `Inferred`.
    pub ty: Option<TypeName>,
    pub value: Expr,
    /// Raw storage-class word, validated by the storage resolver.
    pub storage: Option<Ident>,
    /// `as <ident>` / `as "<name>"` — identifier used in generated output.
    pub rename: Option<Ident>,
}

// ── signal_decl: 'signal' IDENT (':' type)? storage? rename? ──

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDecl {
    pub name: Ident,
    pub ty: Option<TypeName>,
    pub storage: Option<Ident>,
    pub rename: Option<Ident>,
}

/// A validated type name with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub ty: DataType,
    pub span: Span,
}

// ── Expressions ──

/// A parameter's defining expression. Evaluated left to right against the
/// symbols already bound in the shared evaluation context.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64, Span),
    Bool(bool, Span),
    /// Reference to a previously bound symbol.
    Ref(Ident),
    Neg(Box<Expr>, Span),
    Binary(BinOp, Box<Expr>, Box<Expr>, Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, s) | Expr::Bool(_, s) | Expr::Neg(_, s) | Expr::Binary(_, _, _, s) => {
                *s
            }
            Expr::Ref(id) => id.span,
        }
    }

    /// The referenced name, when the expression is a bare symbol reference.
    /// Used for inferred-type derivation.
    pub fn as_ref_name(&self) -> Option<&str> {
        match self {
            Expr::Ref(id) => Some(&id.name),
            _ => None,
        }
    }
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
