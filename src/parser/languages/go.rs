//! Go queries.

/// HTTP router registrations and the context needed to resolve them.
///
/// Three patterns, each producing its own matches:
/// - `package`: the package clause name
/// - `group_var`, `group_parent`, `group_verb`, `group_prefix`: short
///   variable declarations such as `v1 := r.Group("/api/v1")`
/// - `object`, `verb`, `path`: selector calls whose first argument is an
///   interpreted string, such as `r.GET("/users", list)` or
///   `r.HandleFunc("/users", list).Methods("GET")`
pub const ROUTER_QUERY: &str = r#"
(package_clause (package_identifier) @package)

(short_var_declaration
  left: (expression_list (identifier) @group_var)
  right: (expression_list
    (call_expression
      function: (selector_expression
        operand: (identifier) @group_parent
        field: (field_identifier) @group_verb)
      arguments: (argument_list . (interpreted_string_literal) @group_prefix))))

(call_expression
  function: (selector_expression
    operand: (_) @object
    field: (field_identifier) @verb)
  arguments: (argument_list . (interpreted_string_literal) @path)) @route
"#;

#[cfg(feature = "tree-sitter")]
pub(crate) fn language() -> tree_sitter::Language {
    tree_sitter_go::LANGUAGE.into()
}

#[cfg(test)]
#[cfg(feature = "tree-sitter")]
mod tests {
    use super::*;
    use crate::parser::{query_parser, Grammar};

    #[test]
    fn test_router_matches() {
        let parser = query_parser(Grammar::Go, ROUTER_QUERY);
        let source = br#"
package api

func Routes(r *gin.Engine) {
    v1 := r.Group("/api/v1")
    v1.GET("/users", listUsers)
}
"#;

        let nodes = parser.parse(source).unwrap();
        assert!(nodes.iter().any(|n| n.capture("package") == Some("api")));
        assert!(nodes
            .iter()
            .any(|n| n.capture("group_var") == Some("v1") && n.capture("group_prefix") == Some("\"/api/v1\"")));
        assert!(nodes
            .iter()
            .any(|n| n.capture("verb") == Some("GET") && n.capture("object") == Some("v1")));
    }
}
