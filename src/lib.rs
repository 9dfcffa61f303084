//! Island Evolve - Island-model genetic programming for virtual machine programs.
//!
//! Candidate programs are plain text. Islands breed them, run them on an
//! external VM, score them and periodically migrate the best island's
//! programs to the others.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration types and the solutions/reports islands exchange
//! - `compute`: Program codec, VM boundary traits and the evolution engine
//!
//! The VM itself is not part of this crate. Implement [`Machine`] and
//! [`Processor`] for it and hand the machine to each island.
//!
//! # Example
//!
//! ```rust
//! use island_evolve::compute::evolution::{Breeder, CopyBreeder, Selector, TopXSelector};
//! use island_evolve::schema::Solution;
//!
//! let copies = CopyBreeder::new(4).breed(&["A".to_string(), "B".to_string()]);
//! assert_eq!(copies, vec!["A", "B", "A", "B"]);
//!
//! let solutions: Vec<Solution> = [10, 8, 6, 4]
//!     .iter()
//!     .map(|&r| Solution::new(r, format!("p{r}")))
//!     .collect();
//! let kept = TopXSelector::new(3).select(&solutions);
//! assert_eq!(kept.iter().map(|s| s.reward).collect::<Vec<_>>(), vec![10, 8, 6]);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{IslandEvolver, PopulationSpec, SolutionCache};
pub use compute::{Machine, Processor, Program, SharedRng};
pub use schema::{EngineConfig, EvolverConfig, Solution};
