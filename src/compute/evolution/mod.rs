//! Island-model genetic programming over VM program text.
//!
//! # Overview
//!
//! - **Breeders** (`breeder`): Copy, random generation, crossover, mutation,
//!   the migration influx and composites
//! - **Selectors** (`selector`): Top-X, tournament, stochastic universal
//!   sampling and And/Or composites
//! - **Evaluators** (`evaluator`): Rewards from a processor's terminal state
//! - **Solution cache** (`cache`): Fingerprinted best scores with snapshots
//! - **Solver** (`solver`): The breed, execute, evaluate, select loop of one island
//! - **Island evolver** (`island`): Runs solvers and migrates champions
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use island_evolve::compute::SharedRng;
//! use island_evolve::compute::evolution::{
//!     CostEvaluator, InverseEvaluator, IslandEvolver, PopulationSpec, SolutionCache,
//! };
//! use island_evolve::schema::{BreedingConfig, EvolverConfig, SelectionConfig};
//!
//! // `machine` is an `Arc<dyn Machine>` provided by the VM crate.
//! let config = EvolverConfig::default();
//! let cache = Arc::new(SolutionCache::open(&config.cache));
//! let rng = Arc::new(SharedRng::from_entropy());
//! let instructions = Arc::new(machine.instruction_set().clone());
//!
//! let mut evolver = IslandEvolver::new(config, cache)?;
//! for _ in 0..4 {
//!     evolver.add_population(PopulationSpec {
//!         machine: Arc::clone(&machine),
//!         breeder: Box::new(BreedingConfig::default().build(Arc::clone(&instructions), Arc::clone(&rng))),
//!         evaluator: Box::new(InverseEvaluator::new(CostEvaluator)),
//!         selector: SelectionConfig::default().build(Arc::clone(&rng)),
//!     })?;
//! }
//! ```

mod breeder;
mod cache;
mod evaluator;
mod island;
mod selector;
mod solver;

pub use breeder::{
    Breeder, CopyBreeder, CrossoverBreeder, Influx, InfluxBreeder, LabelPool, MultiBreeder,
    MutationBreeder, RandomBreeder,
};
pub use cache::{CacheError, CacheSnapshotter, CacheStats, Fingerprint, SolutionCache};
pub use evaluator::{CostEvaluator, Evaluator, InverseEvaluator, MultiEvaluator, TimeEvaluator};
pub use island::{ChampionSink, EvolveError, FileChampionSink, Harvest, IslandEvolver, PopulationSpec};
pub use selector::{
    AndSelector, OrSelector, Selector, StochasticUniversalSelector, TopXSelector,
    TournamentSelector,
};
pub use solver::{Solver, SolverConfig, SolverHandle, SolverStats};
