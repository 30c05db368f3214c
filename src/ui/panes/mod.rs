//! TUI pane rendering modules
//!
//! This module provides the rendering logic for all visual panes in the TUI,
//! organized by responsibility for maintainability.
//!
//! # Pane Modules
//!
//! - [`source`]: Program listing with syntax highlighting and the `▶` execution marker
//! - [`memory`]: Every address of the flat memory, colored by owner
//! - [`stack`]: Call stack with frames, bindings and return targets
//! - [`terminal`]: Output from `print!` and `println!`
//! - [`status`]: Status bar with keybindings and execution state
//! - `utils`: Shared border and scrolling helpers
//!
//! # Architecture
//!
//! Each pane module exports:
//! - A primary `render_*_pane()` function
//! - Associated state types (e.g., `StackScrollState`, `StackRenderData`)
//! - Helper functions specific to that pane

mod utils;

pub mod memory;
pub mod source;
pub mod stack;
pub mod status;
pub mod terminal;

// Re-export render functions for convenience
pub use memory::{render_memory_pane, MemoryScrollState};
pub use source::{render_source_pane, SourceRenderData, SourceScrollState};
pub use stack::{render_stack_pane, StackRenderData, StackScrollState};
pub use status::{render_status_bar, StatusRenderData};
pub use terminal::render_terminal_pane;
