//! Lightweight Java declaration reader for the pattern-based tiers.
//!
//! Splits a compilation unit into declarations at `{`, `;` and `}` (outside
//! strings, comments and parentheses), keeps track of the enclosing class and
//! classifies each member as a class, method or field. It is not a Java
//! parser: it only has to be good enough for annotation-driven frameworks
//! when the syntax tree is unavailable or rejected.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PACKAGE: Regex = Regex::new(r"^package\s+([\w.]+)$").unwrap();
    static ref CLASS: Regex = Regex::new(r"^(class|interface|enum|record|@interface)\s+(\w+)").unwrap();
    static ref METHOD: Regex =
        Regex::new(r"(?s)^(?:<[^>]*>\s*)?([\w.<>\[\],? ]+?)\s+(\w+)\s*\((.*)\)\s*(?:throws\s+[\w.,\s]+)?$").unwrap();
    static ref FIELD: Regex = Regex::new(r"(?s)^([\w.<>\[\],? ]+?)\s+(\w+)\s*(?:=.*)?$").unwrap();
    static ref ATTRIBUTE_STRING: Regex = Regex::new(r#"^\s*\{?\s*"([^"]*)""#).unwrap();
    static ref STRING: Regex = Regex::new(r#""([^"]*)""#).unwrap();
}

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "transient",
    "volatile",
    "strictfp",
    "default",
    "sealed",
    "non-sealed",
];

/// A single annotation, e.g. `@RequestMapping(value = "/a", method = RequestMethod.GET)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Annotation {
    /// Simple name, qualification dropped.
    pub name: String,
    /// Argument text without the surrounding parentheses.
    pub args: Option<String>,
}

impl Annotation {
    /// Value of a named attribute. For `value`, a bare first argument also
    /// counts (`@GetMapping("/x")`).
    pub fn attribute(&self, key: &str) -> Option<String> {
        let args = self.args.as_deref()?;
        for part in split_top_level(args) {
            match part.split_once('=') {
                Some((k, v)) if k.trim() == key => return Some(v.trim().to_string()),
                None if key == "value" => return Some(part.trim().to_string()),
                _ => {}
            }
        }
        None
    }

    /// First string literal of an attribute, e.g. a path.
    pub fn string_attribute(&self, key: &str) -> Option<String> {
        self.attribute(key)
            .and_then(|v| ATTRIBUTE_STRING.captures(&v).map(|c| c[1].to_string()))
    }

    /// Every string literal of an attribute (`topics = {"a", "b"}`).
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.attribute(key)
            .map(|v| STRING.captures_iter(&v).map(|c| c[1].to_string()).collect())
            .unwrap_or_default()
    }

    /// Path of a mapping annotation: `value`, then `path`, else empty.
    pub fn path(&self) -> String {
        self.string_attribute("value")
            .or_else(|| self.string_attribute("path"))
            .unwrap_or_default()
    }
}

/// Split on commas outside braces, parentheses, generics and strings.
pub(crate) fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    let bytes = args.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'{' | b'(' | b'<' if !in_string => depth += 1,
            b'}' | b')' | b'>' if !in_string => depth -= 1,
            b',' if !in_string && depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < args.len() {
        parts.push(&args[start..]);
    }
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Parse every annotation in a modifier list or declaration prefix.
pub(crate) fn parse_annotations(text: &str) -> Vec<Annotation> {
    let (annotations, _, _) = leading_annotations(text);
    annotations
}

/// Annotations and modifiers at the start of `text`, plus the remainder.
pub(crate) fn leading_annotations(text: &str) -> (Vec<Annotation>, Vec<String>, &str) {
    let mut annotations = Vec::new();
    let mut modifiers = Vec::new();
    let mut rest = text.trim_start();

    loop {
        if rest.starts_with('@') && !rest.starts_with("@interface") {
            let body = &rest[1..];
            let name_len = body
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
                .unwrap_or(body.len());
            let name = body[..name_len].rsplit('.').next().unwrap_or("").to_string();
            let mut after = body[name_len..].trim_start();
            let mut args = None;
            if after.starts_with('(') {
                let (inner, remaining) = match matching_paren(after) {
                    Some(close) => (&after[1..close], &after[close + 1..]),
                    None => (&after[1..], ""),
                };
                args = Some(inner.trim().to_string());
                after = remaining;
            }
            annotations.push(Annotation { name, args });
            rest = after.trim_start();
            continue;
        }

        let word_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '-'))
            .unwrap_or(rest.len());
        let word = &rest[..word_len];
        if word_len > 0 && MODIFIERS.contains(&word) {
            modifiers.push(word.to_string());
            rest = rest[word_len..].trim_start();
            continue;
        }
        break;
    }
    (annotations, modifiers, rest)
}

/// Index of the parenthesis closing the one at `text[0]`.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0;
    let mut in_string = false;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        match c {
            '"' if prev != '\\' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        prev = c;
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemberKind {
    Class { keyword: String, name: String },
    Method { return_type: String, name: String, params: String },
    Field { field_type: String, name: String },
}

/// One declaration with its annotations, modifiers and source line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Declaration {
    pub annotations: Vec<Annotation>,
    pub modifiers: Vec<String>,
    pub kind: MemberKind,
    /// Innermost enclosing class, `None` for top-level types.
    pub class: Option<String>,
    pub line: usize,
}

impl Declaration {
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

/// A compilation unit read by [`read_source`].
#[derive(Debug, Default)]
pub(crate) struct JavaSource {
    pub declarations: Vec<Declaration>,
}

impl JavaSource {
    pub fn classes(&self) -> impl Iterator<Item = (&Declaration, &str)> {
        self.declarations.iter().filter_map(|d| match &d.kind {
            MemberKind::Class { name, .. } => Some((d, name.as_str())),
            _ => None,
        })
    }

    /// Members declared directly in class `class`.
    pub fn members_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Declaration> + 'a {
        self.declarations
            .iter()
            .filter(move |d| d.class.as_deref() == Some(class))
    }
}

#[derive(Debug)]
enum Scope {
    Class(String),
    Block,
}

/// Read the declarations of a Java source file.
pub(crate) fn read_source(content: &str) -> JavaSource {
    let mut source = JavaSource::default();
    let mut stack: Vec<Scope> = Vec::new();
    let mut chunk = String::new();
    let mut chunk_line = 1;
    let mut line = 1;
    let mut paren_depth = 0i32;

    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        // comments
        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && next == Some('*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i += 2;
            continue;
        }

        // string and char literals are copied verbatim
        if c == '"' || c == '\'' {
            let quote = c;
            chunk.push(c);
            i += 1;
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    chunk.push(chars[i]);
                    i += 1;
                }
                if chars[i] == '\n' {
                    line += 1;
                }
                chunk.push(chars[i]);
                i += 1;
            }
            chunk.push(quote);
            i += 1;
            continue;
        }

        if c == '\n' {
            line += 1;
        }
        if chunk.trim().is_empty() && !c.is_whitespace() {
            chunk_line = line;
        }

        match c {
            '(' => {
                paren_depth += 1;
                chunk.push(c);
            }
            ')' => {
                paren_depth -= 1;
                chunk.push(c);
            }
            '{' | ';' if paren_depth <= 0 => {
                let enclosing = match stack.last() {
                    Some(Scope::Class(name)) => Some(name.clone()),
                    Some(Scope::Block) => None,
                    None => None,
                };
                let at_member_level = matches!(stack.last(), Some(Scope::Class(_)) | None);
                let declaration = if at_member_level {
                    classify(chunk.trim(), enclosing, chunk_line)
                } else {
                    None
                };
                if c == '{' {
                    match &declaration {
                        Some(Declaration {
                            kind: MemberKind::Class { keyword, name },
                            ..
                        }) if keyword != "enum" => stack.push(Scope::Class(name.clone())),
                        _ => stack.push(Scope::Block),
                    }
                }
                if let Some(d) = declaration {
                    source.declarations.push(d);
                }
                chunk.clear();
                paren_depth = 0;
            }
            '}' if paren_depth <= 0 => {
                stack.pop();
                chunk.clear();
            }
            _ => chunk.push(c),
        }
        i += 1;
    }

    source
}

fn classify(chunk: &str, class: Option<String>, line: usize) -> Option<Declaration> {
    if chunk.is_empty() {
        return None;
    }
    if PACKAGE.is_match(chunk) || chunk.starts_with("import ") {
        return None;
    }

    let (annotations, modifiers, rest) = leading_annotations(chunk);
    let rest = rest.trim();

    let kind = if let Some(caps) = CLASS.captures(rest) {
        MemberKind::Class {
            keyword: caps[1].to_string(),
            name: caps[2].to_string(),
        }
    } else if let Some(caps) = METHOD.captures(rest) {
        MemberKind::Method {
            return_type: caps[1].trim().to_string(),
            name: caps[2].to_string(),
            params: caps[3].trim().to_string(),
        }
    } else if let Some(caps) = FIELD.captures(rest) {
        if class.is_none() {
            return None;
        }
        MemberKind::Field {
            field_type: caps[1].trim().to_string(),
            name: caps[2].to_string(),
        }
    } else {
        return None;
    };

    Some(Declaration {
        annotations,
        modifiers,
        kind,
        class,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER: &str = r#"
package com.acme.orders;

import org.springframework.web.bind.annotation.*;

/** Orders API. { not a block } */
@RestController
@RequestMapping(value = {"/api/orders"}, produces = "application/json")
public class OrderController {
    private final OrderService service; // injected

    @GetMapping("/{id}")
    public ResponseEntity<Order> get(@PathVariable("id") Long id) {
        if (id == null) { return null; }
        return service.find(id);
    }

    @RequestMapping(path = "/search", method = RequestMethod.POST)
    public List<Order> search(@RequestBody Query q) throws IOException {
        String s = "};{";
        return List.of();
    }
}
"#;

    #[test]
    fn test_parse_annotations() {
        let annotations = parse_annotations(r#"@Entity @Table(name = "orders", schema = "shop") public"#);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].name, "Entity");
        assert_eq!(annotations[0].args, None);
        assert_eq!(annotations[1].string_attribute("name").as_deref(), Some("orders"));
        assert_eq!(annotations[1].string_attribute("schema").as_deref(), Some("shop"));
    }

    #[test]
    fn test_annotation_paths() {
        let a = &parse_annotations(r#"@GetMapping("/x")"#)[0];
        assert_eq!(a.path(), "/x");
        let a = &parse_annotations(r#"@RequestMapping(path = "/y", method = RequestMethod.PUT)"#)[0];
        assert_eq!(a.path(), "/y");
        assert_eq!(a.attribute("method").as_deref(), Some("RequestMethod.PUT"));
        let a = &parse_annotations(r#"@KafkaListener(topics = {"a", "b"}, groupId = "g")"#)[0];
        assert_eq!(a.string_list("topics"), vec!["a", "b"]);
        let a = &parse_annotations("@org.springframework.stereotype.Controller")[0];
        assert_eq!(a.name, "Controller");
        assert_eq!(a.path(), "");
    }

    #[test]
    fn test_read_source() {
        let source = read_source(CONTROLLER);

        let (class, name) = source.classes().next().unwrap();
        assert_eq!(name, "OrderController");
        assert!(class.annotation("RestController").is_some());
        assert_eq!(class.annotation("RequestMapping").unwrap().path(), "/api/orders");

        let members: Vec<_> = source.members_of("OrderController").collect();
        assert_eq!(members.len(), 3);
        assert!(matches!(&members[0].kind, MemberKind::Field { name, .. } if name == "service"));
        assert!(members[0].modifiers.iter().any(|m| m == "final"));
        match &members[1].kind {
            MemberKind::Method { name, return_type, params } => {
                assert_eq!(name, "get");
                assert_eq!(return_type, "ResponseEntity<Order>");
                assert!(params.contains("@PathVariable"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(members[1].line, 12);
        assert!(matches!(&members[2].kind, MemberKind::Method { name, .. } if name == "search"));
    }

    #[test]
    fn test_garbage_does_not_panic() {
        for input in ["", "}}}}", "class {", "@(", "\"unterminated", "/* open", "a(b(c"] {
            let _ = read_source(input);
        }
    }
}
