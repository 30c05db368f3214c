//! Expression parsing
//!
//! Binary operators are found by scanning for the rightmost depth-0 operator
//! of the loosest precedence level, which makes every level left-associative:
//!
//! 1. `||`
//! 2. `&&`
//! 3. `==` `!=` `<=` `>=` `<` `>`
//! 4. `+` `-`
//! 5. `*` `/`
//!
//! A `-` or `*` that follows another operator (or nothing) is unary and is
//! skipped, so `a - -b` and `a * *p` split at the first operator.
//!
//! Whatever has no binary operator left is a primary: literals, macros
//! (`vec!`, `println!`, `print!`), `Box::new`, `Vec::new`, references,
//! dereferences, method calls, function calls, indexing and variables.

use crate::memory::Value;
use crate::parser::ast::*;
use crate::parser::parse::{
    is_identifier, matching_close, matching_open, scan, split_top_level, ParseError,
    Parser,
};

/// Operator levels from loosest to tightest
const LEVELS: [&[&str]; 5] = [
    &["||"],
    &["&&"],
    &["==", "!=", "<=", ">=", "<", ">"],
    &["+", "-"],
    &["*", "/"],
];

impl Parser {
    /// Parse a complete expression
    pub(crate) fn parse_expr(&mut self, text: &str) -> Result<Expr, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::new("expected expression", text));
        }

        for level in LEVELS {
            if let Some((at, symbol)) = rightmost_operator(text, level) {
                let op = BinOp::from_symbol(symbol)
                    .ok_or_else(|| ParseError::new(format!("unknown operator '{}'", symbol), text))?;
                let left = self.parse_expr(&text[..at])?;
                let right = self.parse_expr(&text[at + symbol.len()..])?;
                return Ok(self.expr(ExprKind::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }));
            }
        }

        self.parse_primary(text)
    }

    fn parse_primary(&mut self, text: &str) -> Result<Expr, ParseError> {
        if wrapped_in(text, b'(') {
            return self.parse_expr(&text[1..text.len() - 1]);
        }

        let digits = text.strip_prefix('-').unwrap_or(text);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let value: i32 = text
                .parse()
                .map_err(|_| ParseError::new("integer literal out of range", text))?;
            return Ok(self.literal(Value::Int(value), TypeTag::I32));
        }

        if let Some(operand) = text.strip_prefix('-') {
            let operand = self.parse_expr(operand)?;
            return Ok(self.expr(ExprKind::Unary {
                op: UnOp::Neg,
                operand: Box::new(operand),
            }));
        }

        if let Some(operand) = text.strip_prefix('!') {
            let operand = self.parse_expr(operand)?;
            return Ok(self.expr(ExprKind::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            }));
        }

        match text {
            "true" => return Ok(self.literal(Value::Bool(true), TypeTag::Bool)),
            "false" => return Ok(self.literal(Value::Bool(false), TypeTag::Bool)),
            "Vec::new()" => return Ok(self.expr(ExprKind::VecMacro(Vec::new()))),
            _ => {}
        }

        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            let value = unescape(&text[1..text.len() - 1]);
            return Ok(self.literal(Value::Str(value), TypeTag::Str));
        }

        if wrapped_in(text, b'[') {
            let elements = self.parse_elements(&text[1..text.len() - 1])?;
            return Ok(self.expr(ExprKind::ArrayLiteral(elements)));
        }

        if let Some(inner) = macro_body(text, "vec!", b'[') {
            let elements = self.parse_elements(inner)?;
            return Ok(self.expr(ExprKind::VecMacro(elements)));
        }

        if let Some(inner) = macro_body(text, "Box::new", b'(') {
            let inner = self.parse_expr(inner)?;
            return Ok(self.expr(ExprKind::BoxNew(Box::new(inner))));
        }

        for (name, newline) in [("println!", true), ("print!", false)] {
            if let Some(inner) = macro_body(text, name, b'(') {
                return self.parse_print(inner, newline);
            }
        }

        if let Some(target) = text.strip_prefix('&') {
            let target = target.trim_start();
            let target = target.strip_prefix("mut ").unwrap_or(target).trim();
            if !is_identifier(target) {
                return Err(ParseError::new("references can only be taken of variables", text));
            }
            return Ok(self.expr(ExprKind::Reference(target.to_string())));
        }

        if let Some(call) = self.parse_method_call(text)? {
            return Ok(call);
        }

        if text.starts_with('*') {
            let levels = text.bytes().take_while(|&b| b == b'*').count();
            let inner = self.parse_expr(&text[levels..])?;
            return Ok(self.expr(ExprKind::Dereference {
                inner: Box::new(inner),
                levels,
            }));
        }

        if let Some(call) = self.parse_call(text)? {
            return Ok(call);
        }

        if text.ends_with(']') {
            if let Some(open) = matching_open(text, text.len() - 1).filter(|&open| open > 0) {
                let array = self.parse_expr(&text[..open])?;
                let index = self.parse_expr(&text[open + 1..text.len() - 1])?;
                return Ok(self.expr(ExprKind::ArrayAccess {
                    array: Box::new(array),
                    index: Box::new(index),
                }));
            }
        }

        // `v.len` style field reads resolve against the `v.len` metadata label
        if text.split('.').all(is_identifier) {
            return Ok(self.expr(ExprKind::Variable(text.to_string())));
        }

        Err(ParseError::new("unrecognized expression", text))
    }

    fn literal(&mut self, value: Value, ty: TypeTag) -> Expr {
        self.expr(ExprKind::Literal { value, ty })
    }

    /// Elements of `[a, b, c]` or `[x; n]`
    fn parse_elements(&mut self, inner: &str) -> Result<Vec<Expr>, ParseError> {
        let repeat = split_top_level(inner, b';');
        if repeat.len() == 2 {
            let count_text = repeat[1].trim();
            let count: usize = count_text
                .parse()
                .map_err(|_| ParseError::new("repeat count must be an integer literal", count_text))?;
            let mut elements = Vec::with_capacity(count);
            for _ in 0..count {
                elements.push(self.parse_expr(repeat[0])?);
            }
            return Ok(elements);
        }

        split_top_level(inner, b',')
            .into_iter()
            .map(|element| self.parse_expr(element))
            .collect()
    }

    fn parse_print(&mut self, inner: &str, newline: bool) -> Result<Expr, ParseError> {
        let mut pieces = split_top_level(inner, b',').into_iter();
        let format = match pieces.next().map(str::trim) {
            None => String::new(),
            Some(first) if first.len() >= 2 && first.starts_with('"') && first.ends_with('"') => {
                unescape(&first[1..first.len() - 1])
            }
            Some(first) => {
                // A bare argument prints like `"{}"`
                let arg = self.parse_expr(first)?;
                let mut args = vec![arg];
                for piece in pieces {
                    args.push(self.parse_expr(piece)?);
                }
                return Ok(self.expr(ExprKind::Println {
                    format: "{}".to_string(),
                    args,
                    newline,
                }));
            }
        };

        let args = pieces
            .map(|piece| self.parse_expr(piece))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.expr(ExprKind::Println {
            format,
            args,
            newline,
        }))
    }

    /// `object.method(args)` where the call parentheses close the text
    fn parse_method_call(&mut self, text: &str) -> Result<Option<Expr>, ParseError> {
        if !text.ends_with(')') {
            return Ok(None);
        }
        let Some(open) = matching_open(text, text.len() - 1) else {
            return Ok(None);
        };
        let head = &text[..open];
        let Some(dot) = scan(head)
            .into_iter()
            .filter(|s| s.depth == 0 && s.byte == b'.')
            .map(|s| s.index)
            .last()
        else {
            return Ok(None);
        };

        let method = head[dot + 1..].trim();
        let receiver = head[..dot].trim();
        if !is_identifier(method) || receiver.is_empty() || receiver.starts_with('&') {
            return Ok(None);
        }
        // `*p.len()` derefs the call result
        if receiver.starts_with('*') {
            return Ok(None);
        }

        let object = self.parse_expr(receiver)?;
        let args = self.parse_args(&text[open + 1..text.len() - 1])?;
        Ok(Some(self.expr(ExprKind::MethodCall {
            object: Box::new(object),
            method: method.to_string(),
            args,
        })))
    }

    /// `name(args)`, including the `rand_int` builtin
    fn parse_call(&mut self, text: &str) -> Result<Option<Expr>, ParseError> {
        let Some(open) = text.find('(') else {
            return Ok(None);
        };
        let name = text[..open].trim();
        if !is_identifier(name) || matching_close(text, open) != Some(text.len() - 1) {
            return Ok(None);
        }

        let mut args = self.parse_args(&text[open + 1..text.len() - 1])?;
        if name == "rand_int" {
            if args.len() != 2 {
                return Err(ParseError::new(
                    format!("rand_int expects 2 arguments, got {}", args.len()),
                    text,
                ));
            }
            let max = args.pop();
            let min = args.pop();
            if let (Some(min), Some(max)) = (min, max) {
                return Ok(Some(self.expr(ExprKind::RandInt {
                    min: Box::new(min),
                    max: Box::new(max),
                })));
            }
        }

        Ok(Some(self.expr(ExprKind::FunctionCall {
            name: name.to_string(),
            args,
        })))
    }

    fn parse_args(&mut self, inner: &str) -> Result<Vec<Expr>, ParseError> {
        split_top_level(inner, b',')
            .into_iter()
            .map(|arg| self.parse_expr(arg))
            .collect()
    }
}

/// Rightmost binary occurrence of one of `ops` at depth 0
fn rightmost_operator<'o>(text: &str, ops: &[&'o str]) -> Option<(usize, &'o str)> {
    let bytes = text.as_bytes();
    let positions: Vec<usize> = scan(text)
        .into_iter()
        .filter(|s| s.depth == 0)
        .map(|s| s.index)
        .collect();

    for &at in positions.iter().rev() {
        let Some(&symbol) = ops.iter().find(|op| text[at..].starts_with(**op)) else {
            continue;
        };
        let next = bytes.get(at + symbol.len()).copied();
        let prev = text[..at].bytes().rev().find(|b| !b.is_ascii_whitespace());

        let valid = match symbol {
            // Part of `<=`, `->`, `<<` or `=>`
            "<" | ">" => {
                next != Some(b'=')
                    && !matches!(bytes.get(at.wrapping_sub(1)), Some(b'<' | b'>' | b'-' | b'='))
            }
            // Compound assignments never reach expression parsing
            "+" | "-" | "*" | "/" => {
                next != Some(b'=')
                    && next != Some(b'>')
                    && prev.is_some_and(|b| !b"+-*/=!<>,(&|[;{".contains(&b))
            }
            _ => true,
        };
        let valid = valid && at > 0 && !text[..at].trim().is_empty();

        if valid {
            return Some((at, symbol));
        }
    }
    None
}

/// True if the whole text is one bracket pair opened by `open`
fn wrapped_in(text: &str, open: u8) -> bool {
    text.as_bytes().first() == Some(&open) && matching_close(text, 0) == Some(text.len() - 1)
}

/// Text between the brackets of `name(...)` or `name[...]` when they span the rest
fn macro_body<'a>(text: &'a str, name: &str, open: u8) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?;
    let offset = text.len() - rest.trim_start().len();
    if text.as_bytes().get(offset) != Some(&open) {
        return None;
    }
    (matching_close(text, offset) == Some(text.len() - 1)).then(|| &text[offset + 1..text.len() - 1])
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
