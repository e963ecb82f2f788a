//! TypeScript queries. The TypeScript grammar shares JavaScript's expression
//! nodes, so route calls use the same query.

pub const ROUTE_CALL_QUERY: &str = super::javascript::ROUTE_CALL_QUERY;

#[cfg(feature = "tree-sitter")]
pub(crate) fn language() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}
