// Snapshot management for stepping backward through a run

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::scheduler::ProgramCounter;
use crate::memory::Memory;

/// Mock terminal capturing `print!`/`println!` output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockTerminal {
    text: String,
}

impl MockTerminal {
    pub fn new() -> Self {
        MockTerminal {
            text: String::new(),
        }
    }

    /// Print without newline
    pub fn print(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn println(&mut self, text: &str) {
        self.text.push_str(text);
        self.text.push('\n');
    }

    /// Raw output, newlines included
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Output split into lines; a trailing newline does not open an empty line
    pub fn get_output(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.text.split('\n').map(|s| s.to_string()).collect();
        if lines.last().is_some_and(|s| s.is_empty()) {
            lines.pop();
        }
        lines
    }
}

/// Complete observable state after one step
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub memory: Memory,
    pub terminal: MockTerminal,
    pub pc: ProgramCounter,
}

impl Snapshot {
    /// Estimate the memory usage of this snapshot in bytes
    pub fn estimated_size(&self) -> usize {
        // Cells: value, label and type, assume 64 bytes each
        let cells = self.memory.cells().len() * 64;

        // Frames: bindings plus resumable contexts
        let frames: usize = self
            .memory
            .frames()
            .iter()
            .map(|frame| 96 + frame.vars.len() * 32 + frame.contexts.len() * 80)
            .sum();

        let terminal = self.terminal.text().len();
        let pc = 64 + (self.pc.blocks.len() + self.pc.returns.len()) * 48;

        cells + frames + terminal + pc
    }
}

/// Manages execution history for reverse execution
#[derive(Debug)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
    max_memory: usize,
    current_memory: usize,
}

impl SnapshotManager {
    pub fn new(max_memory: usize) -> Self {
        SnapshotManager {
            snapshots: Vec::new(),
            max_memory,
            current_memory: 0,
        }
    }

    /// Add a snapshot to history
    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), RuntimeError> {
        let snapshot_size = snapshot.estimated_size();

        if self.current_memory + snapshot_size > self.max_memory {
            return Err(RuntimeError::SnapshotLimitExceeded {
                current: self.current_memory + snapshot_size,
                limit: self.max_memory,
            });
        }

        self.current_memory += snapshot_size;
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Get a snapshot by index
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Get current memory usage
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    /// Get max memory limit
    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_joins_print_and_println() {
        let mut terminal = MockTerminal::new();
        terminal.print("a = ");
        terminal.println("1");
        terminal.println("done");

        assert_eq!(terminal.get_output(), vec!["a = 1", "done"]);
    }

    #[test]
    fn test_snapshot_limit() {
        let snapshot = Snapshot {
            memory: Memory::new(),
            terminal: MockTerminal::new(),
            pc: ProgramCounter::new("main"),
        };
        let size = snapshot.estimated_size();
        let mut manager = SnapshotManager::new(size + size / 2);

        assert!(manager.push(snapshot.clone()).is_ok());
        assert!(matches!(
            manager.push(snapshot),
            Err(RuntimeError::SnapshotLimitExceeded { .. })
        ));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.memory_usage(), size);
    }
}
