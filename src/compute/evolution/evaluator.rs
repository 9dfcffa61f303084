//! Reward functions over a processor's terminal state.
//!
//! The engine only compares rewards, so sign and scale are up to the
//! evaluator. Composites let simple measures be combined, e.g. a fast
//! program score as `Inverse(Time)`.

use std::sync::Arc;

use crate::compute::machine::Processor;

/// Computes a reward from a processor that has finished running.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, processor: &dyn Processor) -> i64;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&self, processor: &dyn Processor) -> i64 {
        (**self).evaluate(processor)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn evaluate(&self, processor: &dyn Processor) -> i64 {
        (**self).evaluate(processor)
    }
}

/// Sum of several evaluators.
#[derive(Default)]
pub struct MultiEvaluator {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl MultiEvaluator {
    pub fn new(evaluators: Vec<Box<dyn Evaluator>>) -> Self {
        Self { evaluators }
    }

    /// Append an evaluator.
    pub fn with(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluators.push(Box::new(evaluator));
        self
    }
}

impl Evaluator for MultiEvaluator {
    fn evaluate(&self, processor: &dyn Processor) -> i64 {
        self.evaluators
            .iter()
            .fold(0i64, |acc, e| acc.saturating_add(e.evaluate(processor)))
    }
}

/// Negated reward of the wrapped evaluator.
pub struct InverseEvaluator<E> {
    inner: E,
}

impl<E: Evaluator> InverseEvaluator<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: Evaluator> Evaluator for InverseEvaluator<E> {
    fn evaluate(&self, processor: &dyn Processor) -> i64 {
        self.inner.evaluate(processor).saturating_neg()
    }
}

/// Nanoseconds elapsed since the processor's last run started.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeEvaluator;

impl Evaluator for TimeEvaluator {
    fn evaluate(&self, processor: &dyn Processor) -> i64 {
        i64::try_from(processor.started_at().elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// The processor's reported execution cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostEvaluator;

impl Evaluator for CostEvaluator {
    fn evaluate(&self, processor: &dyn Processor) -> i64 {
        processor.cost()
    }
}
