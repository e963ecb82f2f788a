//! Python queries.

/// Decorated function definitions whose decorator is a method call, e.g.
/// `@app.route("/users", methods=["POST"])` or `@bp.get("/items")`.
///
/// Captures:
/// - `object`: receiver of the decorator call (`app`, `bp`)
/// - `verb`: decorator method name (`route`, `get`, ...)
/// - `args`: the full argument list, including parentheses
/// - `handler`: decorated function name
/// - `params`: the function's parameter list
pub const DECORATED_ROUTE_QUERY: &str = r#"
(decorated_definition
  (decorator
    (call
      function: (attribute
        object: (identifier) @object
        attribute: (identifier) @verb)
      arguments: (argument_list) @args))
  definition: (function_definition
    name: (identifier) @handler
    parameters: (parameters) @params)) @route
"#;

#[cfg(feature = "tree-sitter")]
pub(crate) fn language() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}

#[cfg(test)]
#[cfg(feature = "tree-sitter")]
mod tests {
    use super::*;
    use crate::parser::{query_parser, Grammar};

    #[test]
    fn test_decorated_routes() {
        let parser = query_parser(Grammar::Python, DECORATED_ROUTE_QUERY);
        let source = br#"
from flask import Flask
app = Flask(__name__)

@app.route("/users", methods=["GET", "POST"])
def users():
    return []

@app.get("/users/<int:user_id>")
@login_required
def get_user(user_id):
    return {}

def helper():
    pass
"#;

        let nodes = parser.parse(source).unwrap();
        assert_eq!(nodes.len(), 2, "bare decorators and plain functions do not match");
        assert_eq!(nodes[0].capture("verb"), Some("route"));
        assert_eq!(nodes[0].capture("handler"), Some("users"));
        assert_eq!(nodes[0].capture("args"), Some(r#"("/users", methods=["GET", "POST"])"#));
        assert_eq!(nodes[1].capture("verb"), Some("get"));
        assert_eq!(nodes[1].capture("params"), Some("(user_id)"));
    }
}
