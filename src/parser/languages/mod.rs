//! Language-specific tree-sitter queries.
//!
//! Each language module provides:
//! - The queries scanners run against that grammar
//! - The grammar itself, when the `tree-sitter` feature is enabled

pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod typescript;

#[cfg(feature = "tree-sitter")]
use super::Grammar;

/// Tree-sitter language for a grammar.
#[cfg(feature = "tree-sitter")]
pub fn tree_sitter_language(grammar: Grammar) -> tree_sitter::Language {
    match grammar {
        Grammar::Python => python::language(),
        Grammar::Java => java::language(),
        Grammar::JavaScript => javascript::language(),
        Grammar::TypeScript => typescript::language(),
        Grammar::Go => go::language(),
    }
}
