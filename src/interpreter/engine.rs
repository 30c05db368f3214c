// Stepping session for the teaching-language interpreter

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::machine::Machine;
use crate::interpreter::scheduler::{frame_size, ProgramCounter};
use crate::memory::{Memory, ReturnDescriptor};
use crate::parser::ast::{Instr, Program};
use crate::snapshot::{MockTerminal, Snapshot, SnapshotManager};
use tracing::{debug, warn};

/// Name of the entry function
pub const ENTRY_POINT: &str = "main";

/// Default snapshot history budget in bytes
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 64 * 1024 * 1024;

/// Settings for one stepping session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum estimated bytes of snapshot history
    pub snapshot_limit: usize,
    /// Seed for `rand_int`; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            seed: None,
        }
    }
}

/// The interpreter that steps through a parsed program
pub struct Interpreter {
    /// Parsed program, shared read-only with every evaluation
    pub(crate) program: Program,

    /// Memory, terminal and random source
    pub(crate) machine: Machine,

    /// Current position of execution
    pub(crate) pc: ProgramCounter,

    /// Snapshot manager for reverse execution
    snapshots: SnapshotManager,

    /// Current position in execution history (for stepping backward/forward)
    history_position: usize,

    /// First runtime error; the session halts on it
    error: Option<RuntimeError>,
}

impl Interpreter {
    /// Create a session positioned before the first instruction of `main`
    pub fn new(program: Program, config: SessionConfig) -> Result<Self, RuntimeError> {
        let main = program.get(ENTRY_POINT).ok_or(RuntimeError::NoMainFunction)?;
        let size = frame_size(main, &program);

        let mut machine = Machine::new(config.seed);
        machine
            .memory
            .push_frame(ENTRY_POINT, size, ReturnDescriptor::default())?;

        let mut interpreter = Interpreter {
            program,
            machine,
            pc: ProgramCounter::new(ENTRY_POINT),
            snapshots: SnapshotManager::new(config.snapshot_limit),
            history_position: 0,
            error: None,
        };
        interpreter.take_snapshot()?;
        Ok(interpreter)
    }

    /// Perform one atomic step.
    ///
    /// Returns whether the program counter moved; a suspended evaluation
    /// makes progress without moving it. Once a step has failed, every later
    /// step reports the same error.
    pub fn step(&mut self) -> Result<bool, RuntimeError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.is_finished() {
            return Ok(false);
        }

        match self.advance() {
            Ok(moved) => Ok(moved),
            Err(err) => {
                warn!(error = %err, function = %self.pc.function, index = self.pc.index, "runtime error");
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Run the program from the current point to completion, recording history
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while !self.is_finished() || self.history_position + 1 < self.snapshots.len() {
            self.step_forward()?;
        }
        debug!(snapshots = self.snapshots.len(), "run finished");
        Ok(())
    }

    /// Take a snapshot of the current execution state
    fn take_snapshot(&mut self) -> Result<(), RuntimeError> {
        let snapshot = Snapshot {
            memory: self.machine.memory.clone(),
            terminal: self.machine.terminal.clone(),
            pc: self.pc.clone(),
        };
        self.snapshots.push(snapshot)?;
        self.history_position = self.snapshots.len() - 1;
        Ok(())
    }

    /// Restore execution state from a snapshot
    fn restore_snapshot(&mut self, index: usize) -> Result<(), RuntimeError> {
        let snapshot = self
            .snapshots
            .get(index)
            .ok_or_else(|| RuntimeError::HistoryOperationFailed {
                message: format!("snapshot {} not found in history", index),
            })?;

        self.machine.memory = snapshot.memory.clone();
        self.machine.terminal = snapshot.terminal.clone();
        self.pc = snapshot.pc.clone();
        self.history_position = index;
        Ok(())
    }

    /// Step backward in execution (restore previous snapshot)
    pub fn step_backward(&mut self) -> Result<(), RuntimeError> {
        if self.history_position == 0 {
            return Err(RuntimeError::HistoryOperationFailed {
                message: "already at the beginning of execution".to_string(),
            });
        }
        self.restore_snapshot(self.history_position - 1)
    }

    /// Step forward: replay the next snapshot, or execute until the program counter moves
    pub fn step_forward(&mut self) -> Result<(), RuntimeError> {
        if self.history_position + 1 < self.snapshots.len() {
            return self.restore_snapshot(self.history_position + 1);
        }

        if self.is_finished() {
            return Err(RuntimeError::HistoryOperationFailed {
                message: "execution finished".to_string(),
            });
        }

        while !self.step()? {
            if self.is_finished() {
                break;
            }
        }
        self.take_snapshot()
    }

    /// Rewind to the beginning of execution history
    pub fn rewind_to_start(&mut self) -> Result<(), RuntimeError> {
        if self.snapshots.is_empty() {
            return Err(RuntimeError::HistoryOperationFailed {
                message: "no snapshots available".to_string(),
            });
        }
        self.restore_snapshot(0)
    }

    // ========== Getter methods for UI ==========

    /// The program being executed
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn memory(&self) -> &Memory {
        &self.machine.memory
    }

    /// Get a reference to the terminal output
    pub fn terminal(&self) -> &MockTerminal {
        &self.machine.terminal
    }

    pub fn pc(&self) -> &ProgramCounter {
        &self.pc
    }

    /// The instruction the next step executes, if any
    pub fn current_instruction(&self) -> Option<Instr> {
        let block = self.pc.current_block(&self.program).ok()?;
        block.get(self.pc.index).cloned()
    }

    /// The error that halted the session
    pub fn error(&self) -> Option<&RuntimeError> {
        self.error.as_ref()
    }

    /// Get the current history position
    pub fn history_position(&self) -> usize {
        self.history_position
    }

    /// Get the total number of snapshots
    pub fn total_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// True once `main` has run past its last instruction or returned
    pub fn is_finished(&self) -> bool {
        if self.pc.function != ENTRY_POINT || !self.pc.returns.is_empty() || !self.pc.blocks.is_empty() {
            return false;
        }
        self.program
            .get(ENTRY_POINT)
            .map_or(true, |main| self.pc.index >= main.body.len())
    }
}
