//! The bytecode-to-circuit interpreter, from the per-instruction dispatch
//! to the gate-level lowerings behind it.
mod bitops;
mod ops;
mod state;
mod tree;

/// reexport the interpreter state and call frames for simpler usage
pub use ops::CallQueues;
pub use state::{Interpreter, OutputEntry, WireSeq};

/// split up tests into an other file for simpler implementation
#[cfg(test)]
mod tests;
