//! Compute module - Program representation, VM boundary and evolution.

pub mod evolution;
pub mod machine;
pub mod program;
pub mod rng;

pub use machine::{ArgKind, CompileError, Instruction, InstructionClass, InstructionSet, Machine, Processor};
pub use program::Program;
pub use rng::SharedRng;
