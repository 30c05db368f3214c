//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct, the [`ParseError`] type and the
//! byte scanner every other parsing module builds on.
//!
//! # Parser Architecture
//!
//! There is no token stream. Source text is cut into pieces by scanning for
//! delimiters at bracket depth zero, outside string literals and comments:
//! - `declarations`: top-level `fn` blocks and their signatures
//! - `statements`: statement splitting, `if`/`while` blocks and assignment targets
//! - `expressions`: operator splitting by precedence, then primaries
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state (the node id counter).

use crate::parser::ast::*;
use rustc_hash::FxHashMap;
use std::fmt;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// The offending source text, shortened to one line
    pub snippet: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, snippet: &str) -> Self {
        let line = snippet.trim().lines().next().unwrap_or("");
        let snippet = if line.chars().count() > 48 {
            format!("{}...", line.chars().take(48).collect::<String>())
        } else {
            line.to_string()
        };
        ParseError {
            message: message.into(),
            snippet,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.snippet.is_empty() {
            write!(f, "Parse error: {}", self.message)
        } else {
            write!(f, "Parse error: {} near `{}`", self.message, self.snippet)
        }
    }
}

impl std::error::Error for ParseError {}

/// Declared or inferred types of the names bound so far in one function
pub(crate) type FnScope = FxHashMap<String, TypeTag>;

/// Hand-written scanner parser for the teaching language
pub struct Parser {
    pub(crate) source: String,
    next_id: NodeId,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        check_string_literals(source)?;
        Ok(Self {
            source: source.to_string(),
            next_id: 0,
        })
    }

    /// Parse the entire program (all top-level functions)
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let source = self.source.clone();
        self.parse_functions(&source)
    }

    // ===== Node construction =====

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_id(),
            kind,
        }
    }

    pub(crate) fn instr(&mut self, kind: InstrKind) -> Instr {
        Instr {
            id: self.next_id(),
            kind,
        }
    }
}

// ===== Scanning helpers =====

/// A byte outside string literals and comments, with its bracket depth.
///
/// Openers report the depth outside them and closers the depth after
/// closing, so a top-level `(..)` pair is reported at depth 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scanned {
    pub index: usize,
    pub byte: u8,
    pub depth: usize,
}

pub(crate) fn scan(text: &str) -> Vec<Scanned> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        match byte {
            b'"' => {
                i = string_end(bytes, i) + 1;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'(' | b'[' | b'{' => {
                out.push(Scanned { index: i, byte, depth });
                depth += 1;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                out.push(Scanned { index: i, byte, depth });
            }
            _ => out.push(Scanned { index: i, byte, depth }),
        }
        i += 1;
    }
    out
}

/// Index of the closing quote of the string literal opened at `open`
fn string_end(bytes: &[u8], open: usize) -> usize {
    let mut j = open + 1;
    while j < bytes.len() && bytes[j] != b'"' {
        if bytes[j] == b'\\' {
            j += 1;
        }
        j += 1;
    }
    j
}

fn check_string_literals(source: &str) -> Result<(), ParseError> {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i);
                if end >= bytes.len() {
                    return Err(ParseError::new("unterminated string literal", &source[i..]));
                }
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Index of the bracket closing the one at `open`
pub(crate) fn matching_close(text: &str, open: usize) -> Option<usize> {
    let scanned = scan(text);
    let start = scanned.iter().position(|s| s.index == open)?;
    let depth = scanned[start].depth;
    scanned[start + 1..]
        .iter()
        .find(|s| s.depth == depth && matches!(s.byte, b')' | b']' | b'}'))
        .map(|s| s.index)
}

/// Index of the bracket opening the one at `close`
pub(crate) fn matching_open(text: &str, close: usize) -> Option<usize> {
    let mut open = Vec::new();
    for s in scan(text) {
        match s.byte {
            b'(' | b'[' | b'{' => open.push(s.index),
            b')' | b']' | b'}' => {
                let opener = open.pop();
                if s.index == close {
                    return opener;
                }
            }
            _ => {}
        }
    }
    None
}

/// First occurrence of `byte` at depth 0
pub(crate) fn find_top_level(text: &str, byte: u8) -> Option<usize> {
    scan(text)
        .into_iter()
        .find(|s| s.depth == 0 && s.byte == byte)
        .map(|s| s.index)
}

/// Split at every depth-0 `sep`; empty trailing pieces are dropped
pub(crate) fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for s in scan(text) {
        if s.depth == 0 && s.byte == sep {
            pieces.push(&text[start..s.index]);
            start = s.index + 1;
        }
    }
    pieces.push(&text[start..]);
    if pieces.last().is_some_and(|p| p.trim().is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Remove `//` comments outside string literals
pub(crate) fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                out.push_str(&text[start..i]);
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        out.push_str(&text[start..]);
    }
    out
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(is_ident_char),
        _ => false,
    }
}

/// The text after `keyword` if `text` starts with it as a whole word
pub(crate) fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if is_ident_char(c) => None,
        _ => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source)
            .expect("Parser creation failed")
            .parse_program()
            .expect("Parsing failed")
    }

    fn main_body(source: &str) -> Block {
        parse(source).get("main").expect("main missing").body.clone()
    }

    fn only_expr(source: &str) -> Expr {
        let body = main_body(source);
        match &body[0].kind {
            InstrKind::LetBinding { init: Some(init), .. } => init.clone(),
            InstrKind::Expression(expr) => expr.clone(),
            other => panic!("unexpected instruction {:?}", other),
        }
    }

    #[test]
    fn test_scan_depths() {
        let scanned = scan("f(a[1], \"(\")");
        let close = scanned.iter().find(|s| s.byte == b')').unwrap();
        assert_eq!(close.depth, 0);
        assert_eq!(matching_close("f(a[1], \"(\")", 1), Some(11));
        assert_eq!(split_top_level("a, f(b, c), \"x,y\"", b',').len(), 3);
    }

    #[test]
    fn test_functions_and_signatures() {
        let program = parse(
            "// helper\nfn add(a: i32, mut b: i32) -> i32 {\n    return a + b;\n}\n\nfn main() {\n    let x = add(1, 2);\n}\n",
        );
        assert_eq!(program.order, vec!["add", "main"]);
        let add = program.get("add").unwrap();
        assert_eq!(add.params.len(), 2);
        assert_eq!(add.params[1].name, "b");
        assert_eq!(add.return_type, Some(TypeTag::I32));
    }

    #[test]
    fn test_unterminated_body_is_an_error() {
        let result = Parser::new("fn main() {\n let x = 1;\n").unwrap().parse_program();
        assert!(result.is_err(), "expected error, got {:?}", result);
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let expr = only_expr("fn main() { let x = 10 - 3 - 2; }");
        assert_eq!(expr.to_string(), "10 - 3 - 2");
        let ExprKind::BinaryOp { op, left, .. } = &expr.kind else {
            panic!("expected binary op, got {:?}", expr);
        };
        assert_eq!(*op, BinOp::Sub);
        assert!(matches!(left.kind, ExprKind::BinaryOp { op: BinOp::Sub, .. }));
    }

    #[test]
    fn test_precedence_and_unary_minus() {
        let expr = only_expr("fn main() { let x = 1 + 2 * -3; }");
        let ExprKind::BinaryOp { op, right, .. } = &expr.kind else {
            panic!("expected binary op, got {:?}", expr);
        };
        assert_eq!(*op, BinOp::Add);
        let ExprKind::BinaryOp { op, right, .. } = &right.kind else {
            panic!("expected product, got {:?}", right);
        };
        assert_eq!(*op, BinOp::Mul);
        assert!(matches!(
            right.kind,
            ExprKind::Literal { value: crate::memory::Value::Int(-3), .. }
        ));
    }

    #[test]
    fn test_statement_priority() {
        let body = main_body(
            "fn main() {\n let mut v = vec![1, 2];\n v.push(3);\n v[0] = 4;\n v[1] += 2;\n drop(v);\n return;\n}",
        );
        assert!(matches!(body[0].kind, InstrKind::LetBinding { .. }));
        assert!(matches!(body[1].kind, InstrKind::Expression(_)));
        assert!(matches!(
            body[2].kind,
            InstrKind::Assignment { target: LValue::ArrayIndex { .. }, .. }
        ));
        assert!(matches!(
            body[3].kind,
            InstrKind::CompoundAssignment { op: BinOp::Add, .. }
        ));
        assert!(matches!(body[4].kind, InstrKind::Drop { is_vec: true, .. }));
        assert!(matches!(body[5].kind, InstrKind::Return(None)));
    }

    #[test]
    fn test_drop_of_box_is_not_a_vec_drop() {
        let body = main_body("fn main() { let b = Box::new(1); let c = b; drop(c); }");
        assert!(matches!(body[2].kind, InstrKind::Drop { is_vec: false, .. }));
    }

    #[test]
    fn test_drop_of_moved_vec_parameter() {
        let program = parse("fn f(v: Vec<i32>) { let w = v; drop(w); }\nfn main() { }");
        let body = &program.get("f").unwrap().body;
        assert!(matches!(body[1].kind, InstrKind::Drop { is_vec: true, .. }));
    }

    #[test]
    fn test_else_if_chain() {
        let body = main_body(
            "fn main() {\n let x = 2;\n if x < 1 {\n  x = 0;\n } else if x < 3 {\n  x = 1;\n } else {\n  x = 2;\n }\n}",
        );
        let InstrKind::IfElse { else_body, .. } = &body[1].kind else {
            panic!("expected if, got {:?}", body[1]);
        };
        assert_eq!(else_body.len(), 1);
        assert!(matches!(else_body[0].kind, InstrKind::IfElse { .. }));
    }

    #[test]
    fn test_literals_and_macros() {
        assert!(matches!(
            only_expr("fn main() { let a = [0; 3]; }").kind,
            ExprKind::ArrayLiteral(ref items) if items.len() == 3
        ));
        assert!(matches!(
            only_expr("fn main() { let v: Vec<i32> = Vec::new(); }").kind,
            ExprKind::VecMacro(ref items) if items.is_empty()
        ));
        assert!(matches!(
            only_expr("fn main() { println!(\"{}, {}\", 1, 2); }").kind,
            ExprKind::Println { ref args, newline: true, .. } if args.len() == 2
        ));
        assert!(matches!(
            only_expr("fn main() { let r = rand_int(1, 6); }").kind,
            ExprKind::RandInt { .. }
        ));
        assert!(matches!(
            only_expr("fn main() { let n = (*v).len(); }").kind,
            ExprKind::MethodCall { ref method, .. } if method == "len"
        ));
        assert!(matches!(
            only_expr("fn main() { let y = **p; }").kind,
            ExprKind::Dereference { levels: 2, .. }
        ));
    }

    #[test]
    fn test_comments_become_nops() {
        let body = main_body("fn main() {\n // set up\n let x = 1; // trailing\n}");
        assert!(matches!(body[0].kind, InstrKind::Nop(_)));
        assert!(matches!(body[1].kind, InstrKind::LetBinding { .. }));
        assert!(matches!(body[2].kind, InstrKind::Nop(_)));
    }

    #[test]
    fn test_malformed_statements_fail() {
        for source in [
            "fn main() { let 1x = 2; }",
            "fn main() { drop(1 + 2); }",
            "fn main() { let r = rand_int(1); }",
            "fn main() { let x = ; }",
            "fn main() { let x = 1 }",
            "fn main() { 1 + = 2; }",
            "fn main() { let s = \"open; }",
        ] {
            let result = Parser::new(source).and_then(|mut p| p.parse_program());
            assert!(result.is_err(), "expected error for {:?}, got {:?}", source, result);
        }
    }

    #[test]
    fn test_node_ids_are_unique() {
        let program = parse("fn main() { let x = 1 + 2; if x > 1 { x = f(x); } }\nfn f(a: i32) -> i32 { return a; }");
        let mut ids = Vec::new();
        for def in program.iter() {
            for instr in def.body.iter() {
                ids.extend(instr.subtree_ids());
            }
        }
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }
}
