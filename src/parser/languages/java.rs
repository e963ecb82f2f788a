//! Java queries.

/// Annotated methods of annotated classes. One match per method.
///
/// Captures:
/// - `class_annotations`: the class modifiers (annotations included)
/// - `class_name`: class name
/// - `method_annotations`: the method modifiers
/// - `method_name`: method name
/// - `params`: the formal parameter list
pub const CONTROLLER_METHOD_QUERY: &str = r#"
(class_declaration
  (modifiers) @class_annotations
  name: (identifier) @class_name
  body: (class_body
    (method_declaration
      (modifiers) @method_annotations
      name: (identifier) @method_name
      parameters: (formal_parameters) @params))) @class
"#;

/// Fields of annotated classes. One match per field declarator.
///
/// Captures:
/// - `class_annotations`, `class_name`: as above
/// - `field_annotations`: field modifiers, when present
/// - `field_type`: declared type
/// - `field_name`: declarator name
pub const ENTITY_FIELD_QUERY: &str = r#"
(class_declaration
  (modifiers) @class_annotations
  name: (identifier) @class_name
  body: (class_body
    (field_declaration
      (modifiers)? @field_annotations
      type: (_) @field_type
      declarator: (variable_declarator
        name: (identifier) @field_name)))) @class
"#;

#[cfg(feature = "tree-sitter")]
pub(crate) fn language() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}
