//! Memory pane rendering
//!
//! One row per address from the top of the stack down to address 0, so the
//! stack grows toward the bottom of the pane and the heap toward the top.
//! Cells are colored by owner: a palette cycled by frame depth for stack
//! cells, green for live heap cells, red for freed ones. A rule marks the
//! `STACK_LIMIT` boundary.

use super::utils::{border_style, clamp_scroll, visible_height};
use crate::memory::{Address, Cell, Memory, Value, MEM_SIZE, STACK_LIMIT};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Who a cell currently belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Frame(usize),
    Heap,
    Freed,
    Free,
}

/// Display columns for one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    pub address: String,
    pub value: String,
    pub label: String,
    pub ty: String,
    pub region: Region,
}

pub fn describe_cell(addr: Address, cell: &Cell) -> MemoryRow {
    let region = match cell.frame {
        Some(depth) => Region::Frame(depth),
        None if cell.freed => Region::Freed,
        None if cell.is_free() => Region::Free,
        None => Region::Heap,
    };

    let value = match (&cell.value, cell.points_to()) {
        (_, Some(target)) => format!("→ 0x{:02X}", target),
        (Value::Uninitialized, None) => "·".to_string(),
        (Value::Str(s), None) => format!("{:?}", s),
        (other, None) => other.to_string(),
    };

    MemoryRow {
        address: format!("0x{:02X}", addr),
        value,
        label: cell.label.clone(),
        ty: cell.ty.as_ref().map(ToString::to_string).unwrap_or_default(),
        region,
    }
}

fn region_style(region: Region) -> Style {
    match region {
        Region::Frame(depth) => {
            Style::default().fg(DEFAULT_THEME.frames[depth % DEFAULT_THEME.frames.len()])
        }
        Region::Heap => Style::default().fg(DEFAULT_THEME.heap),
        Region::Freed => Style::default()
            .fg(DEFAULT_THEME.freed)
            .add_modifier(Modifier::CROSSED_OUT),
        Region::Free => Style::default().fg(DEFAULT_THEME.comment),
    }
}

/// Scroll state for the memory pane
#[derive(Debug, Default)]
pub struct MemoryScrollState {
    pub offset: usize,
}

/// Render the memory pane
pub fn render_memory_pane(
    frame: &mut Frame,
    area: Rect,
    memory: &Memory,
    is_focused: bool,
    scroll_state: &mut MemoryScrollState,
) {
    let block = Block::default()
        .title(format!(" Memory (sp 0x{:02X}) ", memory.stack_pointer()))
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let mut items = Vec::with_capacity(MEM_SIZE + 1);
    for addr in (0..MEM_SIZE).rev() {
        let Some(cell) = memory.cells().get(addr) else {
            continue;
        };
        let row = describe_cell(addr, cell);
        let style = region_style(row.region);

        let line = Line::from(vec![
            Span::styled(format!("{} ", row.address), Style::default().fg(DEFAULT_THEME.comment)),
            Span::styled("│ ", Style::default().fg(DEFAULT_THEME.border_normal)),
            Span::styled(
                format!("{:>8} ", row.value),
                if cell.is_pointer {
                    Style::default().fg(DEFAULT_THEME.pointer)
                } else {
                    style
                },
            ),
            Span::styled("│ ", Style::default().fg(DEFAULT_THEME.border_normal)),
            Span::styled(format!("{:<10} ", row.label), style.add_modifier(Modifier::BOLD)),
            Span::styled(row.ty, Style::default().fg(DEFAULT_THEME.type_name)),
        ]);
        items.push(ListItem::new(line));

        if addr == STACK_LIMIT {
            items.push(ListItem::new(Line::from(Span::styled(
                "──── STACK_LIMIT ────",
                Style::default().fg(DEFAULT_THEME.secondary),
            ))));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::TypeTag;

    #[test]
    fn test_describe_pointer_and_freed_cells() {
        let pointer = Cell {
            value: Value::Int(4),
            label: "p".to_string(),
            ty: Some(TypeTag::Ref(Box::new(TypeTag::I32))),
            is_pointer: true,
            frame: Some(0),
            ..Cell::default()
        };
        let row = describe_cell(24, &pointer);
        assert_eq!(row.address, "0x18");
        assert_eq!(row.value, "→ 0x04");
        assert_eq!(row.ty, "&i32");
        assert_eq!(row.region, Region::Frame(0));

        let freed = Cell {
            value: Value::Freed,
            label: "v[0]".to_string(),
            freed: true,
            ..Cell::default()
        };
        let row = describe_cell(1, &freed);
        assert_eq!(row.value, "FREED");
        assert_eq!(row.region, Region::Freed);

        assert_eq!(describe_cell(0, &Cell::default()).region, Region::Free);
    }
}
