//! JavaScript queries.

/// Method calls on an identifier whose first argument is a string literal,
/// e.g. `app.get('/users', handler)` or `router.use('/api', api)`.
///
/// Captures:
/// - `object`: receiver (`app`, `router`)
/// - `verb`: method name
/// - `path`: first argument, quotes included
pub const ROUTE_CALL_QUERY: &str = r#"
(call_expression
  function: (member_expression
    object: (identifier) @object
    property: (property_identifier) @verb)
  arguments: (arguments . (string) @path)) @route
"#;

#[cfg(feature = "tree-sitter")]
pub(crate) fn language() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}
