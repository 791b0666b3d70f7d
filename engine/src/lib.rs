// mcfg — model configuration engine
//
// Library root. Engine phases live here as modules.

pub mod ast;
pub mod backend;
pub mod buildcfg;
pub mod diag;
pub mod lexer;
pub mod loader;
pub mod model;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod report;
pub mod sandbox;
pub mod scan;
pub mod storage;
pub mod symtab;
pub mod target;
