//! Boundary to the virtual machine that executes evolved programs.
//!
//! The engine never interprets programs itself. A [`Machine`] hands out
//! reusable [`Processor`]s which compile program text, run it under the
//! machine's termination policy and expose the terminal state to evaluators.
//! The [`InstructionSet`] table tells breeders which opcodes exist and what
//! operand kinds each one takes.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Kind of a single operand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    /// Register or memory address.
    Reference,
    /// Raw integer literal.
    Literal,
    /// Jump target naming a label.
    Label,
}

/// How an instruction participates in control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InstructionClass {
    /// Plain operator, safe to generate blindly.
    #[default]
    Operator,
    /// Jumps, calls and returns. Never generated at random.
    Movement,
    /// Label pseudo-instruction. Never generated at random.
    Label,
}

/// One entry of the instruction table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Opcode mnemonic.
    pub name: String,
    /// Control flow class.
    #[serde(default)]
    pub class: InstructionClass,
    /// Declared operand slots.
    #[serde(default)]
    pub args: Vec<ArgKind>,
}

impl Instruction {
    /// Plain operator.
    pub fn operator(name: impl Into<String>, args: Vec<ArgKind>) -> Self {
        Self {
            name: name.into(),
            class: InstructionClass::Operator,
            args,
        }
    }

    /// Control flow instruction.
    pub fn movement(name: impl Into<String>, args: Vec<ArgKind>) -> Self {
        Self {
            name: name.into(),
            class: InstructionClass::Movement,
            args,
        }
    }
}

/// Instruction table exposed by the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSet {
    instructions: Vec<Instruction>,
}

impl InstructionSet {
    /// Create from a list of instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Append an instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Look up an instruction by mnemonic.
    pub fn get(&self, name: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.name == name)
    }

    /// All instructions.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instructions eligible for blind random generation.
    pub fn operators(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions
            .iter()
            .filter(|i| i.class == InstructionClass::Operator)
    }

    /// Instructions of the same class and operand signature as `instruction`,
    /// including itself when it belongs to the table.
    pub fn compatible_with<'a>(
        &'a self,
        instruction: &'a Instruction,
    ) -> impl Iterator<Item = &'a Instruction> {
        self.instructions
            .iter()
            .filter(move |i| i.class == instruction.class && i.args == instruction.args)
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Program text the machine could not compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct CompileError {
    /// Zero-based line index.
    pub line: usize,
    /// Human-readable cause.
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A reusable execution unit.
///
/// Implementations own their registers and share whatever heap and
/// termination condition the [`Machine`] that created them was built with.
/// `run` must return once the termination condition fires and must contain
/// faults of the program it runs.
pub trait Processor: Send {
    /// Clear registers, stack and cost counters.
    fn reset(&mut self);

    /// Compile program text and load it for execution.
    fn compile_and_load(&mut self, program: &str) -> Result<(), CompileError>;

    /// Execute the loaded program until termination.
    fn run(&mut self);

    /// Execution cost accumulated by the last run.
    fn cost(&self) -> i64;

    /// When the last run started.
    fn started_at(&self) -> Instant;

    /// Normalized text of the loaded program.
    fn decompile(&self) -> String;
}

/// Factory for processors bound to one instruction set, heap and
/// termination policy.
pub trait Machine: Send + Sync {
    /// Create a fresh processor.
    fn processor(&self) -> Box<dyn Processor>;

    /// Instruction table understood by this machine.
    fn instruction_set(&self) -> &InstructionSet;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A toy machine for exercising the engine without a real VM.
    //!
    //! Programs are scored by summing integer literals. A line reading
    //! `halt!` fails compilation and `panic!` panics during the run.
    //! Decompiling trims every line.

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn instruction_set() -> InstructionSet {
        InstructionSet::new(vec![
            Instruction::operator("noop", vec![]),
            Instruction::operator("set", vec![ArgKind::Reference, ArgKind::Literal]),
            Instruction::operator("add", vec![ArgKind::Reference, ArgKind::Reference]),
            Instruction::operator("sub", vec![ArgKind::Reference, ArgKind::Reference]),
            Instruction::operator("push", vec![ArgKind::Reference]),
            Instruction::movement("jump", vec![ArgKind::Label]),
            Instruction {
                name: "label".to_string(),
                class: InstructionClass::Label,
                args: vec![ArgKind::Label],
            },
        ])
    }

    #[derive(Default)]
    pub struct SumMachine {
        pub instructions: InstructionSet,
        pub runs: Arc<AtomicUsize>,
    }

    impl SumMachine {
        pub fn new() -> Self {
            Self {
                instructions: instruction_set(),
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Machine for SumMachine {
        fn processor(&self) -> Box<dyn Processor> {
            Box::new(SumProcessor {
                program: String::new(),
                total: 0,
                started: Instant::now(),
                runs: Arc::clone(&self.runs),
            })
        }

        fn instruction_set(&self) -> &InstructionSet {
            &self.instructions
        }
    }

    pub struct SumProcessor {
        program: String,
        total: i64,
        started: Instant,
        runs: Arc<AtomicUsize>,
    }

    impl Processor for SumProcessor {
        fn reset(&mut self) {
            self.program.clear();
            self.total = 0;
        }

        fn compile_and_load(&mut self, program: &str) -> Result<(), CompileError> {
            if let Some(line) = program.lines().position(|l| l.trim() == "halt!") {
                return Err(CompileError::new(line, "halt! is not an instruction"));
            }
            self.program = program.to_string();
            Ok(())
        }

        fn run(&mut self) {
            self.started = Instant::now();
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.program.lines().any(|l| l.trim() == "panic!") {
                panic!("processor fault");
            }
            self.total = self
                .program
                .split(|c: char| !(c.is_ascii_digit() || c == '-'))
                .filter_map(|token| token.parse::<i64>().ok())
                .sum();
        }

        fn cost(&self) -> i64 {
            self.total
        }

        fn started_at(&self) -> Instant {
            self.started
        }

        fn decompile(&self) -> String {
            self.program
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_exclude_movement_and_labels() {
        let set = testing::instruction_set();
        let names: Vec<_> = set.operators().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["noop", "set", "add", "sub", "push"]);
    }

    #[test]
    fn test_compatible_with_matches_signature() {
        let set = testing::instruction_set();
        let add = set.get("add").unwrap();
        let names: Vec<_> = set.compatible_with(add).map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["add", "sub"]);
    }

    #[test]
    fn test_instruction_set_serialization() {
        let set = testing::instruction_set();
        let json = serde_json::to_string(&set).unwrap();
        let parsed: InstructionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::new(3, "unknown opcode");
        assert_eq!(err.to_string(), "line 3: unknown opcode");
    }
}
