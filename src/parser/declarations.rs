//! Function declaration parsing
//!
//! This module handles parsing of top-level items:
//! - Function definitions: `fn name(params) -> T { body }`
//! - Parameter lists: `name: T` and `mut name: T`
//!
//! Text between functions that is not a comment (attributes, `use` lines,
//! stray statements) is skipped with a warning.

use crate::parser::ast::*;
use crate::parser::parse::{
    find_top_level, is_ident_char, is_identifier, matching_close, scan, split_top_level,
    strip_comments, FnScope, ParseError, Parser,
};
use tracing::{debug, warn};

impl Parser {
    pub(crate) fn parse_functions(&mut self, source: &str) -> Result<Program, ParseError> {
        let mut program = Program::new();
        let mut rest = source;

        loop {
            let Some(start) = next_fn_keyword(rest) else {
                skip_outside_text(rest);
                break;
            };
            skip_outside_text(&rest[..start]);

            let (def, after) = self.parse_function(&rest[start + 2..])?;
            if program.get(&def.name).is_some() {
                return Err(ParseError::new(
                    format!("function '{}' is defined twice", def.name),
                    &rest[start..],
                ));
            }
            debug!(name = %def.name, params = def.params.len(), instructions = def.body.len(), "parsed function");
            program.insert(def);
            rest = after;
        }

        Ok(program)
    }

    /// Parse one function; `text` starts right after the `fn` keyword
    fn parse_function<'a>(&mut self, text: &'a str) -> Result<(FunctionDef, &'a str), ParseError> {
        let open = find_top_level(text, b'(')
            .ok_or_else(|| ParseError::new("expected '(' after function name", text))?;
        let name = text[..open].trim();
        if !is_identifier(name) {
            return Err(ParseError::new(format!("invalid function name '{}'", name), text));
        }

        let close = matching_close(text, open)
            .ok_or_else(|| ParseError::new("unterminated parameter list", text))?;
        let params = parse_params(&text[open + 1..close])?;

        let after = &text[close + 1..];
        let brace = find_top_level(after, b'{')
            .ok_or_else(|| ParseError::new(format!("expected body for function '{}'", name), text))?;

        let signature = after[..brace].trim();
        let return_type = if signature.is_empty() {
            None
        } else {
            let ty = signature
                .strip_prefix("->")
                .ok_or_else(|| ParseError::new("unexpected text in function signature", signature))?;
            Some(TypeTag::parse(ty))
        };

        let end = matching_close(after, brace)
            .ok_or_else(|| ParseError::new(format!("unterminated body of function '{}'", name), text))?;

        let mut scope = FnScope::default();
        for param in &params {
            if let Some(ty) = &param.ty {
                scope.insert(param.name.clone(), ty.clone());
            }
        }
        let body = self.parse_block(&after[brace + 1..end], &mut scope)?;

        let def = FunctionDef {
            name: name.to_string(),
            params,
            return_type,
            body,
        };
        Ok((def, &after[end + 1..]))
    }
}

fn parse_params(text: &str) -> Result<Vec<Param>, ParseError> {
    let mut params = Vec::new();
    for piece in split_top_level(text, b',') {
        let piece = piece.trim();
        let piece = piece.strip_prefix("mut ").unwrap_or(piece).trim();

        let (name, ty) = match piece.split_once(':') {
            Some((name, ty)) => (name.trim(), Some(TypeTag::parse(ty))),
            None => (piece, None),
        };
        if !is_identifier(name) {
            return Err(ParseError::new(format!("invalid parameter '{}'", piece), text));
        }
        params.push(Param {
            name: name.to_string(),
            ty,
        });
    }
    Ok(params)
}

/// Offset of the next `fn` keyword at depth 0
fn next_fn_keyword(text: &str) -> Option<usize> {
    scan(text)
        .into_iter()
        .filter(|s| s.depth == 0 && s.byte == b'f')
        .map(|s| s.index)
        .find(|&i| {
            let before_ok = text[..i].chars().next_back().map_or(true, |c| !is_ident_char(c));
            let after = &text[i..];
            before_ok
                && after.starts_with("fn")
                && after[2..].chars().next().is_some_and(char::is_whitespace)
        })
}

fn skip_outside_text(text: &str) {
    let stripped = strip_comments(text);
    let skipped = stripped.trim();
    if !skipped.is_empty() {
        warn!(text = skipped, "skipping text outside of functions");
    }
}
