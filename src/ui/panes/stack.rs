//! Call stack pane rendering
//!
//! Frames are listed innermost first. Each entry shows the function, the
//! address range it reserved, its bindings sorted by address, and where its
//! result will be stored once it returns.

use super::utils::{border_style, clamp_scroll, visible_height};
use crate::memory::{Frame as StackFrame, Memory};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Scroll state for the stack pane
#[derive(Debug, Default)]
pub struct StackScrollState {
    pub offset: usize,
}

/// Data needed to render the stack pane
pub struct StackRenderData<'a> {
    pub memory: &'a Memory,
    /// Number of callers waiting for a result
    pub pending_returns: usize,
}

/// Header text of one frame: name, reserved range and return target
pub fn frame_summary(frame: &StackFrame) -> String {
    let range = frame.range();
    let mut summary = format!(
        "{}()  0x{:02X}..0x{:02X}  {} slots",
        frame.function,
        range.start,
        range.end.saturating_sub(1),
        frame.size
    );
    if let Some(destination) = &frame.ret.destination {
        summary.push_str(&format!("  → {}", destination));
    }
    if let Some(ty) = &frame.ret.ty {
        summary.push_str(&format!(": {}", ty));
    }
    summary
}

/// Render the call stack pane
pub fn render_stack_pane(
    frame: &mut Frame,
    area: Rect,
    data: StackRenderData,
    is_focused: bool,
    scroll_state: &mut StackScrollState,
) {
    let block = Block::default()
        .title(format!(" Call Stack ({} pending returns) ", data.pending_returns))
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let frames = data.memory.frames();
    let mut items = Vec::new();

    if frames.is_empty() {
        items.push(ListItem::new(Span::styled(
            "(empty)",
            Style::default().fg(DEFAULT_THEME.comment),
        )));
    }

    for (depth, stack_frame) in frames.iter().enumerate().rev() {
        let color = DEFAULT_THEME.frames[depth % DEFAULT_THEME.frames.len()];
        items.push(ListItem::new(Line::from(Span::styled(
            frame_summary(stack_frame),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))));

        let mut vars: Vec<(&String, &usize)> = stack_frame.vars.iter().collect();
        vars.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, addr) in vars {
            let value = data
                .memory
                .cells()
                .get(*addr)
                .map(|cell| cell.value.to_string())
                .unwrap_or_default();
            items.push(ListItem::new(Line::from(vec![
                Span::styled(format!("  0x{:02X} ", addr), Style::default().fg(DEFAULT_THEME.comment)),
                Span::styled(format!("{:<10}", name), Style::default().fg(DEFAULT_THEME.fg)),
                Span::styled(value, Style::default().fg(DEFAULT_THEME.number)),
            ])));
        }
    }

    let height = visible_height(area.height);
    scroll_state.offset = clamp_scroll(scroll_state.offset, items.len(), height);
    let visible: Vec<ListItem> = items
        .into_iter()
        .skip(scroll_state.offset)
        .take(height)
        .collect();

    frame.render_widget(List::new(visible).block(block), area);
}
