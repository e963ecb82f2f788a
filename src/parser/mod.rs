//! Structural (tier 1) parsing.
//!
//! This module provides:
//! - `StructuralParser` trait: source bytes in, query matches out
//! - `AstNode` / `Capture`: a language-neutral view of one query match
//! - `ParseOutcome`: why a parser produced no confident result
//! - Tree-sitter implementations configured per grammar and query
//!
//! Without the `tree-sitter` feature every parser reports
//! [`ParseOutcome::Unavailable`] and scanners run on their fallbacks alone.

use thiserror::Error;

pub mod languages;

#[cfg(feature = "tree-sitter")]
pub mod treesitter;

/// One named capture of a query match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Capture name from the query, without the `@`.
    pub name: String,
    /// Source text of the captured node.
    pub text: String,
    /// Line number (1-indexed).
    pub line: usize,
}

/// A query match: the outermost matched node plus all captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    /// Grammar kind of the outermost captured node.
    pub kind: String,
    /// Line number (1-indexed) where the match starts.
    pub line: usize,
    pub captures: Vec<Capture>,
}

impl AstNode {
    /// Text of the first capture with the given name.
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.text.as_str())
    }

    /// Texts of every capture with the given name, in source order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.captures
            .iter()
            .filter(move |c| c.name == name)
            .map(|c| c.text.as_str())
    }
}

/// Reasons a structural parser declines a file. None of these are fatal;
/// the tier engine falls through to the fallback parser.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseOutcome {
    #[error("no structural parser available for {0}")]
    Unavailable(String),
    #[error("source rejected: {0}")]
    Rejected(String),
    #[error("invalid query: {0}")]
    Query(String),
}

/// Parser trait for tier 1 extraction.
pub trait StructuralParser: Send + Sync {
    /// Parse source and return every query match. An empty vector means the
    /// file parsed cleanly but contains nothing of interest.
    fn parse(&self, source: &[u8]) -> Result<Vec<AstNode>, ParseOutcome>;

    /// Return the language this parser handles (e.g., "java", "python").
    fn language(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }
}

/// Stand-in used when no grammar is compiled in.
#[derive(Debug, Clone)]
pub struct UnavailableParser {
    language: &'static str,
}

impl UnavailableParser {
    pub fn new(language: &'static str) -> Self {
        Self { language }
    }
}

impl StructuralParser for UnavailableParser {
    fn parse(&self, _source: &[u8]) -> Result<Vec<AstNode>, ParseOutcome> {
        Err(ParseOutcome::Unavailable(self.language.to_string()))
    }

    fn language(&self) -> &str {
        self.language
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Grammars the crate can parse structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    Java,
    JavaScript,
    TypeScript,
    Go,
}

impl Grammar {
    pub fn name(&self) -> &'static str {
        match self {
            Grammar::Python => "python",
            Grammar::Java => "java",
            Grammar::JavaScript => "javascript",
            Grammar::TypeScript => "typescript",
            Grammar::Go => "go",
        }
    }

    /// Grammar for a file extension (without the dot).
    pub fn for_extension(ext: &str) -> Option<Grammar> {
        match ext {
            "py" => Some(Grammar::Python),
            "java" => Some(Grammar::Java),
            "js" | "jsx" | "mjs" | "cjs" => Some(Grammar::JavaScript),
            "ts" | "tsx" => Some(Grammar::TypeScript),
            "go" => Some(Grammar::Go),
            _ => None,
        }
    }
}

/// Build a parser that runs `query` against files of the given grammar.
#[cfg(feature = "tree-sitter")]
pub fn query_parser(grammar: Grammar, query: &'static str) -> Box<dyn StructuralParser> {
    Box::new(treesitter::TreeSitterParser::new(treesitter::Config {
        language: languages::tree_sitter_language(grammar),
        language_name: grammar.name(),
        query,
    }))
}

/// Build a parser (always unavailable when tree-sitter is disabled).
#[cfg(not(feature = "tree-sitter"))]
pub fn query_parser(grammar: Grammar, _query: &'static str) -> Box<dyn StructuralParser> {
    Box::new(UnavailableParser::new(grammar.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_parser() {
        let parser = UnavailableParser::new("cobol");
        assert!(!parser.is_available());
        assert_eq!(
            parser.parse(b"IDENTIFICATION DIVISION."),
            Err(ParseOutcome::Unavailable("cobol".into()))
        );
    }

    #[test]
    fn test_node_captures() {
        let node = AstNode {
            kind: "call".into(),
            line: 3,
            captures: vec![
                Capture { name: "arg".into(), text: "a".into(), line: 3 },
                Capture { name: "verb".into(), text: "get".into(), line: 3 },
                Capture { name: "arg".into(), text: "b".into(), line: 4 },
            ],
        };
        assert_eq!(node.capture("verb"), Some("get"));
        assert_eq!(node.capture("missing"), None);
        assert_eq!(node.all("arg").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_grammar_for_extension() {
        assert_eq!(Grammar::for_extension("py"), Some(Grammar::Python));
        assert_eq!(Grammar::for_extension("tsx"), Some(Grammar::TypeScript));
        assert_eq!(Grammar::for_extension("rb"), None);
    }
}
