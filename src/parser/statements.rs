//! Statement parsing
//!
//! A block is cut at depth-0 semicolons. `if`/`else` and `while` are
//! recognized first and take their bodies by brace matching, so one-line
//! blocks work the same as multi-line ones. `//` comments at statement
//! position become [`InstrKind::Nop`] markers.
//!
//! Each remaining statement is classified in this order:
//! 1. `return [expr]`
//! 2. `drop(name)`
//! 3. `let [mut] name[: T] [= expr]`
//! 4. compound assignment (`+=`, `-=`, `*=`, `/=`)
//! 5. assignment
//! 6. expression statement

use crate::parser::ast::*;
use crate::parser::parse::{
    find_top_level, is_identifier, matching_close, matching_open, scan, strip_comments,
    strip_keyword, FnScope, ParseError, Parser,
};
use std::rc::Rc;

impl Parser {
    /// Parse the statements between a pair of braces
    pub(crate) fn parse_block(&mut self, text: &str, scope: &mut FnScope) -> Result<Block, ParseError> {
        let mut instrs = Vec::new();
        let mut rest = text.trim_start();

        while !rest.is_empty() {
            if let Some(comment) = rest.strip_prefix("//") {
                let end = comment.find('\n').unwrap_or(comment.len());
                let nop = InstrKind::Nop(comment[..end].trim().to_string());
                instrs.push(self.instr(nop));
                rest = comment[end..].trim_start();
                continue;
            }

            if let Some(after) = strip_keyword(rest, "if") {
                let (instr, after) = self.parse_if(after, scope)?;
                instrs.push(instr);
                rest = after.trim_start();
                continue;
            }

            if let Some(after) = strip_keyword(rest, "while") {
                let (condition, body, after) = self.parse_guarded_block(after, "while", scope)?;
                let instr = self.instr(InstrKind::While { condition, body });
                instrs.push(instr);
                rest = after.trim_start();
                continue;
            }

            let end = find_top_level(rest, b';')
                .ok_or_else(|| ParseError::new("expected ';' after statement", rest))?;
            let instr = self.parse_statement(&rest[..end], scope)?;
            instrs.push(instr);
            rest = rest[end + 1..].trim_start();
        }

        Ok(Rc::from(instrs))
    }

    /// `text` starts right after `if`
    fn parse_if<'a>(&mut self, text: &'a str, scope: &mut FnScope) -> Result<(Instr, &'a str), ParseError> {
        let (condition, then_body, after) = self.parse_guarded_block(text, "if", scope)?;
        let trimmed = after.trim_start();

        let (else_body, after) = match strip_keyword(trimmed, "else") {
            None => (Rc::from(Vec::new()), after),
            Some(rest) => {
                let rest = rest.trim_start();
                if let Some(nested) = strip_keyword(rest, "if") {
                    let (instr, after) = self.parse_if(nested, scope)?;
                    (Rc::from(vec![instr]), after)
                } else if rest.starts_with('{') {
                    let end = matching_close(rest, 0)
                        .ok_or_else(|| ParseError::new("unterminated else block", rest))?;
                    (self.parse_block(&rest[1..end], scope)?, &rest[end + 1..])
                } else {
                    return Err(ParseError::new("expected '{' or 'if' after else", rest));
                }
            }
        };

        let instr = self.instr(InstrKind::IfElse {
            condition,
            then_body,
            else_body,
        });
        Ok((instr, after))
    }

    /// Parse `condition { body }` and return the text after the closing brace
    fn parse_guarded_block<'a>(
        &mut self,
        text: &'a str,
        keyword: &str,
        scope: &mut FnScope,
    ) -> Result<(Expr, Block, &'a str), ParseError> {
        let open = find_top_level(text, b'{')
            .ok_or_else(|| ParseError::new(format!("expected '{{' after {} condition", keyword), text))?;
        let condition = self.parse_expr(&text[..open])?;
        let close = matching_close(text, open)
            .ok_or_else(|| ParseError::new(format!("unterminated {} block", keyword), text))?;
        let body = self.parse_block(&text[open + 1..close], scope)?;
        Ok((condition, body, &text[close + 1..]))
    }

    fn parse_statement(&mut self, text: &str, scope: &mut FnScope) -> Result<Instr, ParseError> {
        let stripped = strip_comments(text);
        let stmt = stripped.trim();
        if stmt.is_empty() {
            return Err(ParseError::new("empty statement", text));
        }

        if let Some(rest) = strip_keyword(stmt, "return") {
            let rest = rest.trim();
            let value = if rest.is_empty() {
                None
            } else {
                Some(self.parse_expr(rest)?)
            };
            return Ok(self.instr(InstrKind::Return(value)));
        }

        if let Some(inner) = stmt.strip_prefix("drop(").and_then(|s| s.strip_suffix(')')) {
            let name = inner.trim();
            if !is_identifier(name) {
                return Err(ParseError::new("drop expects a variable name", stmt));
            }
            let is_vec = scope.get(name).is_some_and(TypeTag::is_vec);
            return Ok(self.instr(InstrKind::Drop {
                name: name.to_string(),
                is_vec,
            }));
        }

        if let Some(rest) = strip_keyword(stmt, "let") {
            return self.parse_let(rest.trim(), scope);
        }

        if let Some((at, op)) = find_compound(stmt) {
            let target = self.parse_lvalue(&stmt[..at])?;
            let value = self.parse_expr(&stmt[at + 2..])?;
            return Ok(self.instr(InstrKind::CompoundAssignment { target, op, value }));
        }

        if let Some(at) = find_assign(stmt) {
            let target = self.parse_lvalue(&stmt[..at])?;
            let value = self.parse_expr(&stmt[at + 1..])?;
            return Ok(self.instr(InstrKind::Assignment { target, value }));
        }

        let expr = self.parse_expr(stmt)?;
        Ok(self.instr(InstrKind::Expression(expr)))
    }

    fn parse_let(&mut self, text: &str, scope: &mut FnScope) -> Result<Instr, ParseError> {
        let text = strip_keyword(text, "mut").map_or(text, str::trim);

        let (binding, init) = match find_assign(text) {
            Some(at) => (&text[..at], Some(self.parse_expr(&text[at + 1..])?)),
            None => (text, None),
        };

        let (name, ty) = match binding.split_once(':') {
            Some((name, ty)) => (name.trim(), Some(TypeTag::parse(ty))),
            None => (binding.trim(), None),
        };
        if !is_identifier(name) {
            return Err(ParseError::new(format!("invalid variable name '{}'", name), text));
        }

        let inferred = match (&ty, &init) {
            (None, Some(init)) => infer_type(init, scope),
            _ => None,
        };
        match ty.as_ref().or(inferred.as_ref()) {
            Some(known) => scope.insert(name.to_string(), known.clone()),
            None => scope.remove(name),
        };

        Ok(self.instr(InstrKind::LetBinding {
            name: name.to_string(),
            ty,
            inferred,
            init,
        }))
    }

    /// Parse the left side of an assignment
    pub(crate) fn parse_lvalue(&mut self, text: &str) -> Result<LValue, ParseError> {
        let text = text.trim();

        if is_identifier(text) {
            return Ok(LValue::Variable(text.to_string()));
        }

        if text.starts_with('*') {
            let levels = text.chars().take_while(|&c| c == '*').count();
            let inner = self.parse_expr(&text[levels..])?;
            return Ok(LValue::Dereference { inner, levels });
        }

        if text.ends_with(']') {
            if let Some(open) = matching_open(text, text.len() - 1).filter(|&open| open > 0) {
                let array = self.parse_expr(&text[..open])?;
                let index = self.parse_expr(&text[open + 1..text.len() - 1])?;
                return Ok(LValue::ArrayIndex { array, index });
            }
        }

        if let Some((object, field)) = text.rsplit_once('.') {
            if let Some(field) = VecField::from_name(field.trim()) {
                let object = self.parse_expr(object)?;
                return Ok(LValue::Field { object, field });
            }
        }

        Err(ParseError::new("invalid assignment target", text))
    }
}

/// Position of a plain `=` at depth 0 (not part of `==`, `<=`, `+=`, ...)
fn find_assign(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    scan(text)
        .into_iter()
        .find(|s| {
            s.depth == 0
                && s.byte == b'='
                && bytes.get(s.index + 1) != Some(&b'=')
                && (s.index == 0 || !b"=!<>+-*/".contains(&bytes[s.index - 1]))
        })
        .map(|s| s.index)
}

/// Position and operator of a depth-0 `op=`
fn find_compound(text: &str) -> Option<(usize, BinOp)> {
    let bytes = text.as_bytes();
    scan(text).into_iter().find_map(|s| {
        let is_compound = s.depth == 0
            && b"+-*/".contains(&s.byte)
            && bytes.get(s.index + 1) == Some(&b'=')
            && bytes.get(s.index + 2) != Some(&b'=');
        if !is_compound {
            return None;
        }
        BinOp::from_symbol(&text[s.index..s.index + 1]).map(|op| (s.index, op))
    })
}

/// Type of an unannotated binding, as far as it can be told from the initializer
fn infer_type(init: &Expr, scope: &FnScope) -> Option<TypeTag> {
    match &init.kind {
        ExprKind::Literal { ty, .. } => Some(ty.clone()),
        ExprKind::VecMacro(_) => Some(TypeTag::Vec(Box::new(TypeTag::I32))),
        ExprKind::ArrayLiteral(elements) => Some(TypeTag::Array(Box::new(TypeTag::I32), elements.len())),
        ExprKind::BoxNew(_) => Some(TypeTag::Boxed(Box::new(TypeTag::I32))),
        ExprKind::Reference(name) => {
            let target = scope.get(name).cloned().unwrap_or(TypeTag::I32);
            Some(TypeTag::Ref(Box::new(target)))
        }
        ExprKind::Variable(name) => scope.get(name).cloned(),
        ExprKind::MethodCall { object, method, .. } => match method.as_str() {
            "clone" => infer_type(object, scope),
            "len" => Some(TypeTag::Usize),
            _ => None,
        },
        ExprKind::Dereference { inner, levels } => {
            let mut ty = infer_type(inner, scope)?;
            for _ in 0..*levels {
                ty = match ty {
                    TypeTag::Ref(target) | TypeTag::Raw(target) | TypeTag::Boxed(target) => *target,
                    _ => return None,
                };
            }
            Some(ty)
        }
        ExprKind::ArrayAccess { array, .. } => match infer_type(array, scope) {
            Some(TypeTag::Array(elem, _)) | Some(TypeTag::Vec(elem)) => Some(*elem),
            _ => Some(TypeTag::I32),
        },
        ExprKind::BinaryOp { .. } | ExprKind::Unary { .. } | ExprKind::RandInt { .. } => {
            Some(TypeTag::I32)
        }
        ExprKind::FunctionCall { .. } | ExprKind::Println { .. } => None,
    }
}
