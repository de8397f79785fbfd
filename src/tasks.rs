//! Arithmetic task generation
//!
//! Pure functions over a caller-supplied random source. Generated tasks
//! are always well-formed: subtraction never goes negative, division
//! always divides exactly, multiplication factors are never zero.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::lang::Language;
use crate::{Error, Result};

/// Multiplication factor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Factor {
    /// Draw both factors at random (1-9, zero excluded) for every task
    Random,
    /// Drill one fixed times table (2-9)
    Fixed(u8),
}

/// Arithmetic operation of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Addition of two operands
    Addition,
    /// Subtraction with a non-negative result
    Subtraction,
    /// Times-table or random-factor multiplication
    Multiplication(Factor),
    /// Exact integer division
    Division,
}

impl Operation {
    /// Display symbol for question text
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Addition => "+",
            Self::Subtraction => "−",
            Self::Multiplication(_) => "×",
            Self::Division => "÷",
        }
    }

    /// Spoken operator word, per language.
    ///
    /// Questions are always voiced with the word form, never the symbol.
    #[must_use]
    pub const fn spoken_word(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Addition, Language::Ru) => "плюс",
            (Self::Addition, Language::En) => "plus",
            (Self::Subtraction, Language::Ru) => "минус",
            (Self::Subtraction, Language::En) => "minus",
            (Self::Multiplication(_), Language::Ru) => "умножить на",
            (Self::Multiplication(_), Language::En) => "times",
            (Self::Division, Language::Ru) => "разделить на",
            (Self::Division, Language::En) => "divided by",
        }
    }
}

/// Difficulty level, controlling operand ranges and session defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Single-digit friendly ranges
    #[default]
    Easy,
    /// Mixed one- and two-digit operands
    Medium,
    /// Two-digit operands throughout
    Hard,
}

impl Difficulty {
    /// Operand range for addition and subtraction
    #[must_use]
    pub const fn additive_range(self) -> RangeInclusive<i64> {
        match self {
            Self::Easy => 1..=10,
            Self::Medium => 1..=50,
            Self::Hard => 1..=100,
        }
    }

    /// Operand range for multiplication and division
    #[must_use]
    pub const fn multiplicative_range(self) -> RangeInclusive<i64> {
        match self {
            Self::Easy => 1..=9,
            Self::Medium => 1..=99,
            Self::Hard => 10..=99,
        }
    }

    /// Multiplicand range when drilling a fixed times table
    #[must_use]
    pub const fn table_range(self) -> RangeInclusive<i64> {
        match self {
            Self::Easy => 1..=9,
            Self::Medium => 1..=12,
            Self::Hard => 1..=15,
        }
    }

    /// Default number of tasks per session
    #[must_use]
    pub const fn default_task_count(self) -> usize {
        match self {
            Self::Easy => 10,
            Self::Medium => 15,
            Self::Hard => 20,
        }
    }

    /// Default per-question answer time limit
    #[must_use]
    pub const fn default_time_limit(self) -> Duration {
        match self {
            Self::Easy => Duration::from_secs(20),
            Self::Medium => Duration::from_secs(15),
            Self::Hard => Duration::from_secs(10),
        }
    }
}

/// One immutable arithmetic task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Operation of this task
    pub operation: Operation,
    /// Left operand
    pub operand1: i64,
    /// Right operand
    pub operand2: i64,
    /// Correct integer result
    pub answer: i64,
}

impl Task {
    /// Generate one task for an operation at a difficulty.
    ///
    /// Always produces a valid task; all operations are valid at all
    /// difficulties.
    pub fn generate<R: Rng + ?Sized>(
        operation: Operation,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Self {
        match operation {
            Operation::Addition => {
                let range = difficulty.additive_range();
                let a = rng.gen_range(range.clone());
                let b = rng.gen_range(range);
                Self { operation, operand1: a, operand2: b, answer: a + b }
            }
            Operation::Subtraction => {
                let a = rng.gen_range(difficulty.additive_range());
                let b = rng.gen_range(1..=a);
                Self { operation, operand1: a, operand2: b, answer: a - b }
            }
            Operation::Multiplication(Factor::Random) => {
                let a = rng.gen_range(1..=9);
                let b = rng.gen_range(1..=9);
                Self { operation, operand1: a, operand2: b, answer: a * b }
            }
            Operation::Multiplication(Factor::Fixed(factor)) => {
                let a = i64::from(factor);
                let b = rng.gen_range(difficulty.table_range());
                Self { operation, operand1: a, operand2: b, answer: a * b }
            }
            Operation::Division => {
                let range = difficulty.multiplicative_range();
                let divisor = rng.gen_range(2..=*range.end());
                let quotient = rng.gen_range(range);
                Self {
                    operation,
                    operand1: divisor * quotient,
                    operand2: divisor,
                    answer: quotient,
                }
            }
        }
    }

    /// Question text for display ("7 × 8 = ?")
    #[must_use]
    pub fn display_text(&self) -> String {
        format!("{} {} {} = ?", self.operand1, self.operation.symbol(), self.operand2)
    }

    /// Question text for synthesis ("7 times 8" — word operator, no equals sign)
    #[must_use]
    pub fn spoken_text(&self, language: Language) -> String {
        format!(
            "{} {} {}",
            self.operand1,
            self.operation.spoken_word(language),
            self.operand2
        )
    }
}

/// Generate and shuffle a full session's worth of tasks.
///
/// Each task picks an operation uniformly at random from `operations`.
///
/// # Errors
///
/// Returns [`Error::Config`] if `operations` is empty.
pub fn generate_session<R: Rng + ?Sized>(
    operations: &[Operation],
    difficulty: Difficulty,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Task>> {
    let mut tasks: Vec<Task> = (0..count)
        .map(|_| {
            operations
                .choose(rng)
                .map(|op| Task::generate(*op, difficulty, rng))
                .ok_or_else(|| Error::Config("operation set is empty".to_string()))
        })
        .collect::<Result<_>>()?;

    tasks.shuffle(rng);
    Ok(tasks)
}
