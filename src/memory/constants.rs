// Geometry of the simulated address space

/// Total number of addressable cells
pub const MEM_SIZE: usize = 26;

/// Highest stack address; frames grow downward from here
pub const STACK_TOP: usize = MEM_SIZE - 1;

/// Lowest heap address; address 0 is never allocated
pub const HEAP_BOTTOM: usize = 1;

/// First stack address. Frames may not extend below it and heap runs must end before it.
pub const STACK_LIMIT: usize = 12;

/// Dangling address stored in the `ptr` word of a Vec that owns no buffer
pub const DANGLING: usize = 0;
