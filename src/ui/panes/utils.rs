//! Helpers shared by several panes

use crate::ui::theme::DEFAULT_THEME;
use ratatui::style::{Modifier, Style};

pub fn border_style(is_focused: bool) -> Style {
    if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    }
}

/// Clamp a scroll offset so the window never runs past the last item
pub fn clamp_scroll(offset: usize, total_items: usize, visible_height: usize) -> usize {
    if total_items > visible_height {
        offset.min(total_items - visible_height)
    } else {
        0
    }
}

/// Usable rows inside a bordered pane, at least one
pub fn visible_height(area_height: u16) -> usize {
    area_height.saturating_sub(2).max(1) as usize
}
