pub mod callgraph;
pub mod memory_codegen;
pub mod rewrite;
pub mod source;
pub mod timing_codegen;

/// Hardware thread count of the MT-3000 accelerator. Every emitted
/// per-thread table has exactly this many slots.
pub const NUM_THREADS: usize = 24;
