//! Mutable execution state shared by every node
//!
//! [`Machine`] owns memory, the captured terminal and the random source. The
//! parsed [`Program`](crate::parser::ast::Program) stays outside and is passed
//! by reference, so evaluation can borrow the AST while mutating the machine.
//!
//! Evaluation is split across sibling modules, each adding an `impl Machine`:
//! `expressions`, `lvalues`, `statements`, `builtins` and `memory_ops`.

use crate::memory::Memory;
use crate::snapshot::MockTerminal;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct Machine {
    pub memory: Memory,
    pub terminal: MockTerminal,
    pub(crate) rng: StdRng,
}

impl Machine {
    /// Fresh machine; a seed makes `rand_int` reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Machine {
            memory: Memory::new(),
            terminal: MockTerminal::new(),
            rng,
        }
    }
}
