//! Program listing pane rendering with syntax highlighting
//!
//! The listing is rebuilt from the AST rather than the source text: every
//! instruction is shown through its `Display` description, nested blocks are
//! indented, and the instruction at the program counter carries a `▶` marker.
//!
//! # Rendering
//!
//! The pane uses a simple character-by-character tokenizer to apply syntax
//! highlighting styles without requiring a full lexer.

use super::utils::{border_style, clamp_scroll, visible_height};
use crate::parser::ast::{Block as InstrBlock, InstrKind, NodeId, Program};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Simple syntax highlighting for instruction descriptions
fn highlight_source_code(line: &str) -> Line<'_> {
    let mut spans = Vec::new();
    let mut current_word = String::new();

    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
            if !current_word.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_word)));
            }
            let rest: String = chars[i..].iter().collect();
            spans.push(Span::styled(rest, Style::default().fg(DEFAULT_THEME.comment)));
            break;
        }

        if c == '"' {
            if !current_word.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_word)));
            }
            let mut end = i + 1;
            while end < chars.len() && chars[end] != '"' {
                end += if chars[end] == '\\' { 2 } else { 1 };
            }
            let end = (end + 1).min(chars.len());
            let literal: String = chars[i..end].iter().collect();
            spans.push(Span::styled(literal, Style::default().fg(DEFAULT_THEME.string)));
            i = end;
            continue;
        }

        if !c.is_alphanumeric() && c != '_' && c != '!' {
            if !current_word.is_empty() {
                let style = get_keyword_style(&current_word, c == '(');
                spans.push(Span::styled(std::mem::take(&mut current_word), style));
            }
            let style = match c {
                '{' | '}' | '(' | ')' | '[' | ']' => Style::default().fg(DEFAULT_THEME.primary),
                _ => Style::default().fg(DEFAULT_THEME.fg),
            };
            spans.push(Span::styled(c.to_string(), style));
            i += 1;
            continue;
        }

        current_word.push(c);
        i += 1;
    }

    if !current_word.is_empty() {
        let style = get_keyword_style(&current_word, false);
        spans.push(Span::styled(current_word, style));
    }

    Line::from(spans)
}

fn get_keyword_style(word: &str, is_function: bool) -> Style {
    match word {
        "i32" | "usize" | "bool" | "str" | "Vec" | "Box" | "ptr" => {
            Style::default().fg(DEFAULT_THEME.type_name)
        }
        "fn" | "let" | "mut" | "return" | "if" | "else" | "while" | "drop" => Style::default()
            .fg(DEFAULT_THEME.keyword)
            .add_modifier(Modifier::BOLD),
        "true" | "false" | "null" => Style::default().fg(DEFAULT_THEME.number),
        _ if word.chars().all(|c| c.is_ascii_digit()) => Style::default().fg(DEFAULT_THEME.number),
        _ if word.ends_with('!') || is_function => Style::default().fg(DEFAULT_THEME.function),
        _ => Style::default().fg(DEFAULT_THEME.fg),
    }
}

/// One row of the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub indent: usize,
    pub text: String,
    /// Instruction shown on this row, if any
    pub instr: Option<NodeId>,
}

/// Flatten the program into indented listing rows, functions in declaration order
pub fn listing_lines(program: &Program) -> Vec<ListingLine> {
    let mut lines = Vec::new();
    for def in program.iter() {
        lines.push(ListingLine {
            indent: 0,
            text: def.to_string(),
            instr: None,
        });
        push_block(&mut lines, &def.body, 1);
        lines.push(closing(0));
        lines.push(ListingLine {
            indent: 0,
            text: String::new(),
            instr: None,
        });
    }
    lines.pop();
    lines
}

fn push_block(lines: &mut Vec<ListingLine>, block: &InstrBlock, indent: usize) {
    for instr in block.iter() {
        lines.push(ListingLine {
            indent,
            text: instr.to_string(),
            instr: Some(instr.id),
        });
        match &instr.kind {
            InstrKind::IfElse {
                then_body,
                else_body,
                ..
            } => {
                push_block(lines, then_body, indent + 1);
                if !else_body.is_empty() {
                    lines.push(ListingLine {
                        indent,
                        text: "} else {".to_string(),
                        instr: None,
                    });
                    push_block(lines, else_body, indent + 1);
                }
                lines.push(closing(indent));
            }
            InstrKind::While { body, .. } => {
                push_block(lines, body, indent + 1);
                lines.push(closing(indent));
            }
            _ => {}
        }
    }
}

fn closing(indent: usize) -> ListingLine {
    ListingLine {
        indent,
        text: "}".to_string(),
        instr: None,
    }
}

/// Scroll state for the program pane
#[derive(Debug, Default)]
pub struct SourceScrollState {
    pub offset: usize,
    /// Set when the user scrolls; cleared on the next step so the marker is followed again
    pub manual: bool,
}

/// Data needed to render the program pane
pub struct SourceRenderData<'a> {
    pub program: &'a Program,
    pub current: Option<NodeId>,
    pub is_error: bool,
}

/// Render the program listing pane
pub fn render_source_pane(
    frame: &mut Frame,
    area: Rect,
    data: SourceRenderData,
    is_focused: bool,
    scroll_state: &mut SourceScrollState,
) {
    let block = Block::default()
        .title(" Program ")
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let lines = listing_lines(data.program);
    let height = visible_height(area.height);

    let current_row = data
        .current
        .and_then(|id| lines.iter().position(|line| line.instr == Some(id)));
    if let (Some(row), false) = (current_row, scroll_state.manual) {
        if row < scroll_state.offset || row >= scroll_state.offset + height {
            scroll_state.offset = row.saturating_sub(height / 2);
        }
    }
    scroll_state.offset = clamp_scroll(scroll_state.offset, lines.len(), height);

    let visible: Vec<Line> = lines
        .iter()
        .enumerate()
        .skip(scroll_state.offset)
        .take(height)
        .map(|(row, line)| {
            let is_current = Some(row) == current_row;
            let (marker, marker_style, background) = match (is_current, data.is_error) {
                (true, true) => (
                    "▶ ",
                    Style::default().fg(DEFAULT_THEME.error).add_modifier(Modifier::BOLD),
                    Style::default().bg(DEFAULT_THEME.error),
                ),
                (true, false) => (
                    "▶ ",
                    Style::default()
                        .fg(DEFAULT_THEME.secondary)
                        .add_modifier(Modifier::BOLD),
                    Style::default().bg(DEFAULT_THEME.current_line_bg),
                ),
                _ => ("  ", Style::default(), Style::default()),
            };

            let mut content = highlight_source_code(&line.text);
            if is_current {
                for span in &mut content.spans {
                    span.style = span.style.patch(background);
                }
            }

            let mut spans = vec![
                Span::styled(marker, marker_style),
                Span::raw("    ".repeat(line.indent)),
            ];
            spans.extend(content.spans);
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(visible).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_listing_nests_blocks() {
        let program = Parser::new(
            "fn main() {\n let x = 1;\n if x > 0 {\n  x = 2;\n } else {\n  x = 3;\n }\n while x > 0 {\n  x -= 1;\n }\n}",
        )
        .expect("Parser creation failed")
        .parse_program()
        .expect("Parsing failed");

        let texts: Vec<String> = listing_lines(&program)
            .into_iter()
            .map(|line| format!("{}{}", "  ".repeat(line.indent), line.text))
            .collect();
        assert_eq!(
            texts,
            vec![
                "fn main() {",
                "  let x = 1;",
                "  if x > 0 {",
                "    x = 2;",
                "  } else {",
                "    x = 3;",
                "  }",
                "  while x > 0 {",
                "    x -= 1;",
                "  }",
                "}",
            ]
        );
    }
}
