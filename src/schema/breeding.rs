//! Breeding and selection pipeline configuration.
//!
//! These types describe a standard island pipeline declaratively so it can be
//! loaded from JSON. `BreedingConfig::build` and `SelectionConfig::build`
//! (in `compute::evolution`) turn them into runtime operators.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Genetic operators feeding one island, run in this order:
/// copy, random, mutation, crossover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreedingConfig {
    /// Survivors replicated unchanged into the next generation. 0 disables.
    #[serde(default = "default_copy_size")]
    pub copy_size: usize,
    /// Fresh random programs per generation.
    #[serde(default)]
    pub random: Option<RandomConfig>,
    /// Point mutation of survivors.
    #[serde(default)]
    pub mutation: Option<MutationConfig>,
    /// Line-window crossover of survivors.
    #[serde(default)]
    pub crossover: Option<CrossoverConfig>,
    /// Label names available to generated jump targets.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Default for BreedingConfig {
    fn default() -> Self {
        Self {
            copy_size: default_copy_size(),
            random: Some(RandomConfig::default()),
            mutation: Some(MutationConfig::default()),
            crossover: Some(CrossoverConfig::default()),
            labels: Vec::new(),
        }
    }
}

fn default_copy_size() -> usize {
    15
}

/// Random program generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomConfig {
    #[serde(default = "default_breed_size")]
    pub population_size: usize,
    #[serde(default = "default_program_length")]
    pub program_length: usize,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            population_size: default_breed_size(),
            program_length: default_program_length(),
        }
    }
}

/// Mutation operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    #[serde(default = "default_breed_size")]
    pub population_size: usize,
    /// Per-line mutation probability (0.0-1.0).
    #[serde(default = "default_mutation_chance")]
    pub mutation_chance: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            population_size: default_breed_size(),
            mutation_chance: default_mutation_chance(),
        }
    }
}

/// Crossover operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossoverConfig {
    #[serde(default = "default_breed_size")]
    pub population_size: usize,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            population_size: default_breed_size(),
        }
    }
}

fn default_breed_size() -> usize {
    25
}
fn default_program_length() -> usize {
    50
}
fn default_mutation_chance() -> f64 {
    0.1
}

impl BreedingConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(random) = &self.random {
            if random.population_size == 0 {
                return Err(ConfigError::ZeroPopulation("random"));
            }
            if random.program_length == 0 {
                return Err(ConfigError::ZeroProgramLength);
            }
        }
        if let Some(mutation) = &self.mutation {
            if mutation.population_size == 0 {
                return Err(ConfigError::ZeroPopulation("mutation"));
            }
            if !(0.0..=1.0).contains(&mutation.mutation_chance) {
                return Err(ConfigError::InvalidMutationChance(mutation.mutation_chance));
            }
        }
        if let Some(crossover) = &self.crossover
            && crossover.population_size == 0
        {
            return Err(ConfigError::ZeroPopulation("crossover"));
        }
        // The first generation is bred from no seeds.
        if self.random.is_none() {
            return Err(ConfigError::EmptyPipeline);
        }
        Ok(())
    }
}

/// Survivor selection strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method")]
pub enum SelectionConfig {
    /// Best `keep` solutions (`keep mod len`, see `TopXSelector`).
    TopX { keep: usize },
    /// Pairwise reward-biased tournaments.
    Tournament { keep: usize },
    /// Stochastic universal sampling.
    StochasticUniversal { keep: usize },
    /// Concatenate every member's selection.
    And { selectors: Vec<SelectionConfig> },
    /// First member with a non-empty selection.
    Or { selectors: Vec<SelectionConfig> },
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self::And {
            selectors: vec![Self::TopX { keep: 10 }, Self::Tournament { keep: 10 }],
        }
    }
}

impl SelectionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::TopX { keep } | Self::Tournament { keep } | Self::StochasticUniversal { keep } => {
                if *keep == 0 {
                    return Err(ConfigError::ZeroKeep);
                }
                Ok(())
            }
            Self::And { selectors } | Self::Or { selectors } => {
                if selectors.is_empty() {
                    return Err(ConfigError::EmptyComposite);
                }
                selectors.iter().try_for_each(Self::validate)
            }
        }
    }
}
