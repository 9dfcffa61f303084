//! Genetic operators that turn survivors into the next generation.
//!
//! Every breeder works on program text. Generated or recombined text does
//! not have to compile; the machine rejects what it cannot run and the
//! solver scores such programs as maximally unfit.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::compute::machine::{ArgKind, Instruction, InstructionSet};
use crate::compute::program::{self, Line, Operand, Program};
use crate::compute::rng::SharedRng;
use crate::schema::BreedingConfig;

/// Produces a generation of programs from a set of seed programs.
pub trait Breeder: Send + Sync {
    fn breed(&self, seeds: &[Program]) -> Vec<Program>;
}

impl<B: Breeder + ?Sized> Breeder for Box<B> {
    fn breed(&self, seeds: &[Program]) -> Vec<Program> {
        (**self).breed(seeds)
    }
}

impl<B: Breeder + ?Sized> Breeder for Arc<B> {
    fn breed(&self, seeds: &[Program]) -> Vec<Program> {
        (**self).breed(seeds)
    }
}

/// Label names available for generated labels and jump targets.
#[derive(Debug, Clone, Default)]
pub struct LabelPool {
    words: Vec<String>,
}

impl LabelPool {
    pub fn new(words: Vec<String>) -> Self {
        let words = words
            .into_iter()
            .map(|w| w.trim().trim_start_matches(':').to_string())
            .filter(|w| !w.is_empty() && w.chars().all(|c| c.is_alphanumeric() || c == '_'))
            .collect();
        Self { words }
    }

    /// A random label name. Falls back to a generated name when the pool is empty.
    pub fn pick(&self, rng: &SharedRng) -> String {
        match rng.pick(&self.words) {
            Some(word) => word.clone(),
            None => format!("l{}", rng.below(10_000)),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Random operand for a declared argument slot.
fn random_operand(kind: ArgKind, labels: &LabelPool, rng: &SharedRng) -> Operand {
    match kind {
        ArgKind::Literal => Operand::Literal(rng.small_int()),
        ArgKind::Reference => Operand::Reference(rng.small_int()),
        ArgKind::Label => Operand::Label(labels.pick(rng)),
    }
}

/// Random operator instruction, or `None` when the set has no operators.
fn random_operation(
    instructions: &InstructionSet,
    labels: &LabelPool,
    rng: &SharedRng,
) -> Option<Line> {
    let operators: Vec<&Instruction> = instructions.operators().collect();
    let instruction = rng.pick(&operators)?;
    Some(Line::Operation {
        name: instruction.name.clone(),
        operands: instruction
            .args
            .iter()
            .map(|&kind| random_operand(kind, labels, rng))
            .collect(),
    })
}

// ============================================================================
// Copy
// ============================================================================

/// Replicates seeds cyclically up to a fixed population size.
#[derive(Debug, Clone)]
pub struct CopyBreeder {
    pub population_size: usize,
}

impl CopyBreeder {
    pub fn new(population_size: usize) -> Self {
        Self { population_size }
    }
}

impl Breeder for CopyBreeder {
    fn breed(&self, seeds: &[Program]) -> Vec<Program> {
        if seeds.is_empty() {
            return Vec::new();
        }
        seeds
            .iter()
            .cycle()
            .take(self.population_size)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Random
// ============================================================================

/// Generates fresh programs of random operator instructions, ignoring seeds.
#[derive(Debug, Clone)]
pub struct RandomBreeder {
    pub population_size: usize,
    pub program_length: usize,
    instructions: Arc<InstructionSet>,
    labels: LabelPool,
    rng: Arc<SharedRng>,
}

impl RandomBreeder {
    pub fn new(
        population_size: usize,
        program_length: usize,
        instructions: Arc<InstructionSet>,
        labels: LabelPool,
        rng: Arc<SharedRng>,
    ) -> Self {
        Self {
            population_size,
            program_length,
            instructions,
            labels,
            rng,
        }
    }

    fn random_program(&self) -> Program {
        let mut program = String::new();
        for _ in 0..self.program_length {
            match random_operation(&self.instructions, &self.labels, &self.rng) {
                Some(line) => {
                    program.push_str(&line.to_string());
                    program.push('\n');
                }
                None => break,
            }
        }
        program
    }
}

impl Breeder for RandomBreeder {
    fn breed(&self, _seeds: &[Program]) -> Vec<Program> {
        (0..self.population_size)
            .map(|_| self.random_program())
            .collect()
    }
}

// ============================================================================
// Crossover
// ============================================================================

/// Splices a window of lines from one parent into another.
///
/// For parents of `l1` and `l2` lines and `m = min(l1, l2)`, the window is
/// `[split, end)` with `split = r1 mod m` and `end = (r2 mod (m - split)) + split`.
/// The child takes parent two's lines inside the window and past the end of
/// parent one, and parent one's lines elsewhere, so it is `max(l1, l2)` lines
/// long.
#[derive(Debug, Clone)]
pub struct CrossoverBreeder {
    pub population_size: usize,
    rng: Arc<SharedRng>,
}

impl CrossoverBreeder {
    pub fn new(population_size: usize, rng: Arc<SharedRng>) -> Self {
        Self {
            population_size,
            rng,
        }
    }

    fn cross(&self, parent1: &str, parent2: &str) -> Program {
        let lines1: Vec<&str> = parent1.split('\n').collect();
        let lines2: Vec<&str> = parent2.split('\n').collect();
        let (l1, l2) = (lines1.len(), lines2.len());
        let shorter = l1.min(l2);

        let split = self.rng.below(shorter);
        let end = self.rng.below(shorter - split) + split;

        (0..l1.max(l2))
            .map(|x| {
                if x >= l1 || (x >= split && x < end && x < l2) {
                    lines2[x]
                } else {
                    lines1[x]
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Breeder for CrossoverBreeder {
    fn breed(&self, seeds: &[Program]) -> Vec<Program> {
        if seeds.is_empty() {
            return Vec::new();
        }
        (0..self.population_size)
            .map(|_| {
                let parent1 = &seeds[self.rng.below(seeds.len())];
                let parent2 = &seeds[self.rng.below(seeds.len())];
                self.cross(parent1, parent2)
            })
            .collect()
    }
}

// ============================================================================
// Mutation
// ============================================================================

/// Point mutation of seed programs, line by line.
///
/// Each line is touched with probability `mutation_chance`. A touched line
/// may first get up to nine random lines spliced in front of it, and is then
/// deleted, replaced by a label, or mutated in place. In-place mutation keeps
/// every operand's kind: literals stay literals, references stay references
/// and label operands stay labels.
#[derive(Debug, Clone)]
pub struct MutationBreeder {
    pub population_size: usize,
    pub mutation_chance: f64,
    instructions: Arc<InstructionSet>,
    labels: LabelPool,
    rng: Arc<SharedRng>,
}

impl MutationBreeder {
    pub fn new(
        population_size: usize,
        mutation_chance: f64,
        instructions: Arc<InstructionSet>,
        labels: LabelPool,
        rng: Arc<SharedRng>,
    ) -> Self {
        Self {
            population_size,
            mutation_chance,
            instructions,
            labels,
            rng,
        }
    }

    fn mutate(&self, seed: &str) -> Program {
        let lines = program::parse(seed);
        let existing = program::label_names(&lines);
        let mut out = Vec::with_capacity(lines.len());

        for line in &lines {
            if !self.rng.chance(self.mutation_chance) {
                out.push(line.clone());
                continue;
            }

            if self.rng.chance(self.mutation_chance) {
                for _ in 0..self.rng.below(10) {
                    if self.rng.chance(0.1) {
                        out.push(Line::Label(self.label_name(&existing)));
                    } else if let Some(op) =
                        random_operation(&self.instructions, &self.labels, &self.rng)
                    {
                        out.push(op);
                    }
                }
            }

            if self.rng.chance(0.1) && !out.is_empty() {
                continue;
            }
            if self.rng.chance(0.1) {
                out.push(Line::Label(self.label_name(&existing)));
                continue;
            }
            out.push(self.mutate_line(line, &existing));
        }

        program::render(&out)
    }

    fn mutate_line(&self, line: &Line, existing: &[String]) -> Line {
        match line {
            Line::Label(name) => {
                if self.rng.chance(0.5) {
                    Line::Label(self.label_name(existing))
                } else {
                    Line::Label(name.clone())
                }
            }
            Line::Operation { name, operands } => Line::Operation {
                name: self.mutate_opcode(name),
                operands: operands
                    .iter()
                    .map(|operand| self.mutate_operand(operand, existing))
                    .collect(),
            },
            Line::Raw(_) => line.clone(),
        }
    }

    /// Swap for another instruction with the same class and signature.
    fn mutate_opcode(&self, name: &str) -> String {
        if !self.rng.chance(0.5) {
            return name.to_string();
        }
        let Some(current) = self.instructions.get(name) else {
            return name.to_string();
        };
        let candidates: Vec<&Instruction> = self.instructions.compatible_with(current).collect();
        self.rng
            .pick(&candidates)
            .map_or_else(|| name.to_string(), |i| i.name.clone())
    }

    fn mutate_operand(&self, operand: &Operand, existing: &[String]) -> Operand {
        match operand {
            Operand::Literal(v) => Operand::Literal(self.perturb(*v)),
            Operand::Reference(v) => Operand::Reference(self.perturb(*v)),
            Operand::Label(name) => {
                if self.rng.chance(0.5) {
                    Operand::Label(self.label_name(existing))
                } else {
                    Operand::Label(name.clone())
                }
            }
        }
    }

    fn perturb(&self, value: i64) -> i64 {
        if self.rng.chance(0.5) {
            self.rng.small_int()
        } else if self.rng.chance(0.5) {
            value.saturating_add(1)
        } else if self.rng.chance(0.5) {
            value.saturating_sub(1)
        } else {
            value
        }
    }

    /// An existing label of the program half the time, a pool label otherwise.
    fn label_name(&self, existing: &[String]) -> String {
        if self.rng.chance(0.5)
            && let Some(name) = self.rng.pick(existing)
        {
            return name.clone();
        }
        self.labels.pick(&self.rng)
    }
}

impl Breeder for MutationBreeder {
    fn breed(&self, seeds: &[Program]) -> Vec<Program> {
        if seeds.is_empty() {
            return Vec::new();
        }
        seeds
            .iter()
            .cycle()
            .take(self.population_size)
            .map(|seed| self.mutate(seed))
            .collect()
    }
}

// ============================================================================
// Influx
// ============================================================================

/// Bounded queue carrying migrated program batches to every island.
///
/// One producer publishes, any number of [`InfluxBreeder`]s consume. Each
/// batch is delivered to exactly one consumer.
pub struct Influx {
    sender: Sender<Vec<Program>>,
    receiver: Receiver<Vec<Program>>,
}

impl Influx {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Publish a batch without blocking. Returns false if the queue was full.
    pub fn publish(&self, batch: Vec<Program>) -> bool {
        match self.sender.try_send(batch) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("Influx full, dropping migrated batch");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// A breeder that drains this queue.
    pub fn breeder(&self) -> InfluxBreeder {
        InfluxBreeder {
            receiver: self.receiver.clone(),
        }
    }
}

/// Breeder that ignores its seeds and yields the next migrated batch, if any.
#[derive(Clone)]
pub struct InfluxBreeder {
    receiver: Receiver<Vec<Program>>,
}

impl Breeder for InfluxBreeder {
    fn breed(&self, _seeds: &[Program]) -> Vec<Program> {
        self.receiver.try_recv().unwrap_or_default()
    }
}

// ============================================================================
// Multi
// ============================================================================

/// Concatenates the output of several breeders, dropping blank programs.
#[derive(Default)]
pub struct MultiBreeder {
    breeders: Vec<Box<dyn Breeder>>,
}

impl MultiBreeder {
    pub fn new(breeders: Vec<Box<dyn Breeder>>) -> Self {
        Self { breeders }
    }

    /// Append a breeder.
    pub fn push(&mut self, breeder: impl Breeder + 'static) {
        self.breeders.push(Box::new(breeder));
    }

    /// Builder-style append.
    pub fn with(mut self, breeder: impl Breeder + 'static) -> Self {
        self.push(breeder);
        self
    }

    pub fn len(&self) -> usize {
        self.breeders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeders.is_empty()
    }
}

impl Breeder for MultiBreeder {
    fn breed(&self, seeds: &[Program]) -> Vec<Program> {
        self.breeders
            .iter()
            .flat_map(|b| b.breed(seeds))
            .filter(|p| !p.trim().is_empty())
            .collect()
    }
}

impl BreedingConfig {
    /// Build the configured operators as one composite breeder.
    pub fn build(&self, instructions: Arc<InstructionSet>, rng: Arc<SharedRng>) -> MultiBreeder {
        let labels = LabelPool::new(self.labels.clone());
        let mut multi = MultiBreeder::default();

        if self.copy_size > 0 {
            multi.push(CopyBreeder::new(self.copy_size));
        }
        if let Some(random) = &self.random {
            multi.push(RandomBreeder::new(
                random.population_size,
                random.program_length,
                Arc::clone(&instructions),
                labels.clone(),
                Arc::clone(&rng),
            ));
        }
        if let Some(mutation) = &self.mutation {
            multi.push(MutationBreeder::new(
                mutation.population_size,
                mutation.mutation_chance,
                Arc::clone(&instructions),
                labels.clone(),
                Arc::clone(&rng),
            ));
        }
        if let Some(crossover) = &self.crossover {
            multi.push(CrossoverBreeder::new(crossover.population_size, rng));
        }
        multi
    }
}
