//! Output pane: what the program has printed so far
//!
//! Output from `print!` that has not been terminated by a newline yet is shown
//! with a trailing cursor, so partial lines are visible while stepping.

use super::utils::{border_style, clamp_scroll, visible_height};
use crate::snapshot::MockTerminal;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Padding, Paragraph},
    Frame,
};

/// Render the output pane
pub fn render_terminal_pane(
    frame: &mut Frame,
    area: Rect,
    terminal: &MockTerminal,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let lines = terminal.get_output();
    let title = match lines.len() {
        0 => " Output ".to_string(),
        1 => " Output (1 line) ".to_string(),
        n => format!(" Output ({} lines) ", n),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    if lines.is_empty() {
        let paragraph = Paragraph::new("(nothing printed yet)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let partial = !terminal.text().ends_with('\n');
    let last = lines.len() - 1;
    let items: Vec<ListItem> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut spans = vec![Span::styled(line.as_str(), Style::default().fg(DEFAULT_THEME.fg))];
            if partial && i == last {
                spans.push(Span::styled("▏", Style::default().fg(DEFAULT_THEME.secondary)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    // usize::MAX pins the view to the newest line
    let height = visible_height(area.height);
    *scroll_offset = clamp_scroll(*scroll_offset, items.len(), height);

    let visible: Vec<ListItem> = items.into_iter().skip(*scroll_offset).take(height).collect();
    let list = List::new(visible).block(block.padding(Padding::new(1, 0, 0, 0)));
    frame.render_widget(list, area);
}
