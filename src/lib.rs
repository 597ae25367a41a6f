pub mod builder;
pub mod clear;
pub mod definitions;
mod error;
pub mod interp;
pub mod opcode;
pub mod program;

// reexported so callers get the driver and errors from the crate root
mod runner;
pub use error::*;
pub use runner::*;
