//! Line-level view of program text.
//!
//! Breeders work on text rather than compiled programs, so this module only
//! knows enough syntax to recombine and perturb lines:
//!
//! ```text
//! :loop            label marker
//! set $4, 12       opcode with a reference and a literal
//! jump :loop       opcode with a label reference
//! ```
//!
//! Lines that fit neither shape survive as [`Line::Raw`] so that a
//! round trip through [`parse`] and [`render`] never loses text. Final
//! validation is left to the machine's compiler.

use std::fmt;

/// Program text. Equality and hashing are byte-exact.
pub type Program = String;

/// A single operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Integer literal, written `42`.
    Literal(i64),
    /// Register or memory address, written `$3`.
    Reference(i64),
    /// Label reference, written `:name`.
    Label(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{v}"),
            Operand::Reference(v) => write!(f, "${v}"),
            Operand::Label(name) => write!(f, ":{name}"),
        }
    }
}

impl Operand {
    fn parse(token: &str) -> Option<Self> {
        if let Some(rest) = token.strip_prefix('$') {
            rest.parse().ok().map(Operand::Reference)
        } else if let Some(rest) = token.strip_prefix(':') {
            is_label_name(rest).then(|| Operand::Label(rest.to_string()))
        } else {
            token.parse().ok().map(Operand::Literal)
        }
    }
}

/// One line of a program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Line {
    /// Label marker.
    Label(String),
    /// Opcode with operands.
    Operation { name: String, operands: Vec<Operand> },
    /// Anything else, kept verbatim.
    Raw(String),
}

impl Line {
    /// Parse one line of text.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();

        if let Some(name) = trimmed.strip_prefix(':') {
            if is_label_name(name) {
                return Line::Label(name.to_string());
            }
            return Line::Raw(text.to_string());
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };
        if !is_opcode(name) {
            return Line::Raw(text.to_string());
        }

        let mut operands = Vec::new();
        if !rest.is_empty() {
            for token in rest.split(',') {
                match Operand::parse(token.trim()) {
                    Some(operand) => operands.push(operand),
                    None => return Line::Raw(text.to_string()),
                }
            }
        }

        Line::Operation {
            name: name.to_string(),
            operands,
        }
    }

    /// Label name if this is a label marker.
    pub fn label(&self) -> Option<&str> {
        match self {
            Line::Label(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Label(name) => write!(f, ":{name}"),
            Line::Operation { name, operands } => {
                write!(f, "{name}")?;
                for (i, operand) in operands.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{operand}")?;
                }
                Ok(())
            }
            Line::Raw(text) => f.write_str(text),
        }
    }
}

/// Split program text into lines.
pub fn parse(program: &str) -> Vec<Line> {
    program.split('\n').map(Line::parse).collect()
}

/// Join lines back into program text.
pub fn render(lines: &[Line]) -> Program {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Names of all label markers, in program order.
pub fn label_names(lines: &[Line]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.label().map(str::to_string))
        .collect()
}

fn is_label_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_opcode(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_alphabetic)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
