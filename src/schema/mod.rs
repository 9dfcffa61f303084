//! Schema module - Configuration and data types shared by the engine.

mod breeding;
mod config;
mod solution;

pub use breeding::*;
pub use config::*;
pub use solution::*;
