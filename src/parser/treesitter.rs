//! Tree-sitter based parser implementation.
//!
//! A [`TreeSitterParser`] is a grammar plus one query. Parsing runs the query
//! over the syntax tree and returns each match as an [`AstNode`]. Trees with
//! syntax errors are rejected so the caller can fall back to pattern matching
//! instead of trusting a partial tree.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Parser as TsParser, Query, QueryCursor};

use super::{AstNode, Capture, ParseOutcome, StructuralParser};

/// Configuration for a tree-sitter query parser.
#[derive(Clone)]
pub struct Config {
    /// The tree-sitter language
    pub language: Language,
    /// Language name (e.g., "python", "java")
    pub language_name: &'static str,
    /// Query whose matches become nodes
    pub query: &'static str,
}

/// Tree-sitter based parser.
pub struct TreeSitterParser {
    language: Language,
    language_name: &'static str,
    /// Compiled once; a broken query makes every parse decline.
    query: Result<Query, String>,
}

impl TreeSitterParser {
    /// Create a new tree-sitter parser with the given configuration.
    pub fn new(config: Config) -> Self {
        let query = Query::new(&config.language, config.query).map_err(|e| {
            tracing::error!(language = config.language_name, error = %e, "invalid tree-sitter query");
            e.to_string()
        });
        Self {
            language: config.language,
            language_name: config.language_name,
            query,
        }
    }

    /// Parse source code and return the tree.
    fn parse_tree(&self, source: &[u8]) -> Result<tree_sitter::Tree, ParseOutcome> {
        let mut parser = TsParser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseOutcome::Unavailable(format!("{}: {}", self.language_name, e)))?;
        parser
            .parse(source, None)
            .ok_or_else(|| ParseOutcome::Rejected("parser produced no tree".to_string()))
    }
}

impl StructuralParser for TreeSitterParser {
    fn parse(&self, source: &[u8]) -> Result<Vec<AstNode>, ParseOutcome> {
        let query = self
            .query
            .as_ref()
            .map_err(|e| ParseOutcome::Query(e.clone()))?;

        let tree = self.parse_tree(source)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ParseOutcome::Rejected(format!(
                "{} source has syntax errors",
                self.language_name
            )));
        }

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        let mut nodes = Vec::new();

        while let Some(m) = matches.next() {
            let mut outer: Option<tree_sitter::Node> = None;
            let mut captures = Vec::with_capacity(m.captures.len());

            for capture in m.captures {
                let node = capture.node;
                let span = node.end_byte() - node.start_byte();
                if outer.map_or(true, |o| span > o.end_byte() - o.start_byte()) {
                    outer = Some(node);
                }
                captures.push(Capture {
                    name: query.capture_names()[capture.index as usize].to_string(),
                    text: node.utf8_text(source).unwrap_or("").to_string(),
                    line: node.start_position().row + 1,
                });
            }

            if let Some(outer) = outer {
                captures.sort_by_key(|c| c.line);
                nodes.push(AstNode {
                    kind: outer.kind().to_string(),
                    line: outer.start_position().row + 1,
                    captures,
                });
            }
        }

        Ok(nodes)
    }

    fn language(&self) -> &str {
        self.language_name
    }
}
