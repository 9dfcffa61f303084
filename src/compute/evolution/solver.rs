//! Per-island run loop.
//!
//! A solver breeds a generation, executes every program on a pooled
//! processor (or reuses the cached score), reports the scored generation and
//! breeds the next one from the selected survivors. It runs until cancelled.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};

use super::breeder::Breeder;
use super::cache::{Fingerprint, SolutionCache};
use super::evaluator::Evaluator;
use super::selector::Selector;
use crate::compute::Program;
use crate::compute::machine::{CompileError, Machine, Processor};
use crate::schema::{Report, Solution, programs_of};

/// Wait before re-bootstrapping when the breeder produced nothing at all.
const EMPTY_GENERATION_BACKOFF: Duration = Duration::from_millis(10);

/// Everything one island needs to evolve.
pub struct SolverConfig {
    /// Island id carried in reports.
    pub id: usize,
    /// Processor factory.
    pub machine: Arc<dyn Machine>,
    pub breeder: Box<dyn Breeder>,
    pub evaluator: Box<dyn Evaluator>,
    pub selector: Box<dyn Selector>,
    /// Report outbox. Sends never block.
    pub reports: Sender<Report>,
}

/// Running counters of a solver.
#[derive(Debug, Default)]
pub struct SolverStats {
    generations: AtomicU64,
    evaluations: AtomicU64,
    cache_hits: AtomicU64,
}

impl SolverStats {
    /// Completed generations.
    pub fn generations(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    /// Programs actually executed.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Programs scored from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }
}

/// Evolves one population.
pub struct Solver {
    id: usize,
    machine: Arc<dyn Machine>,
    breeder: Box<dyn Breeder>,
    evaluator: Box<dyn Evaluator>,
    selector: Box<dyn Selector>,
    reports: Sender<Report>,
    cache: Arc<SolutionCache>,
    cancelled: Arc<AtomicBool>,
    stats: Arc<SolverStats>,
}

impl Solver {
    pub fn new(config: SolverConfig, cache: Arc<SolutionCache>) -> Self {
        Self {
            id: config.id,
            machine: config.machine,
            breeder: config.breeder,
            evaluator: config.evaluator,
            selector: config.selector,
            reports: config.reports,
            cache,
            cancelled: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SolverStats::default()),
        }
    }

    /// Island id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Get shared counters.
    pub fn stats(&self) -> Arc<SolverStats> {
        Arc::clone(&self.stats)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Run until cancelled (blocking).
    pub fn run(&mut self) {
        log::info!("Solver {} started", self.id);

        let mut programs = self.breeder.breed(&[]);
        let mut processors: Vec<Box<dyn Processor>> = Vec::new();
        let mut generation = 0u64;

        while !self.is_cancelled() {
            if programs.is_empty() {
                programs = self.breeder.breed(&[]);
                if programs.is_empty() {
                    log::warn!("Solver {}: breeder produced no programs", self.id);
                    thread::sleep(EMPTY_GENERATION_BACKOFF);
                    continue;
                }
                log::debug!("Solver {}: re-bootstrapped empty generation", self.id);
            }

            let machine = &self.machine;
            processors.resize_with(programs.len(), || machine.processor());

            let Some(solutions) = self.evaluate_generation(&programs, &mut processors) else {
                break;
            };

            if let Some(best) = solutions.iter().max_by_key(|s| s.reward) {
                log::debug!(
                    "Solver {} generation {}: {} programs, best reward {}",
                    self.id,
                    generation,
                    solutions.len(),
                    best.reward
                );
            }

            self.report(generation, solutions.clone());
            self.stats.generations.fetch_add(1, Ordering::Relaxed);
            generation += 1;

            let survivors = self.selector.select(&solutions);
            programs = self.breeder.breed(&programs_of(&survivors));
        }

        log::info!("Solver {} stopped after {} generations", self.id, generation);
    }

    /// Score every program in order. Returns `None` if cancelled midway.
    fn evaluate_generation(
        &self,
        programs: &[Program],
        processors: &mut [Box<dyn Processor>],
    ) -> Option<Vec<Solution>> {
        let mut solutions = Vec::with_capacity(programs.len());
        for (program, processor) in programs.iter().zip(processors.iter_mut()) {
            if self.is_cancelled() {
                return None;
            }
            solutions.push(self.evaluate_program(program, processor));
        }
        Some(solutions)
    }

    fn evaluate_program(&self, program: &Program, processor: &mut Box<dyn Processor>) -> Solution {
        let fingerprint = Fingerprint::of(program);
        if let Some(cached) = self.cache.get(&fingerprint) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }

        let (reward, text) = self.execute(program, processor);
        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        log::trace!("Solver {}: {} scored {}", self.id, fingerprint, reward);

        self.cache.offer(fingerprint, Solution::new(reward, text))
    }

    /// Compile, run and evaluate one program. Compile errors and processor
    /// panics score `i64::MIN` and keep the bred text. Otherwise the solution
    /// carries the processor's normalized text.
    fn execute(&self, program: &str, processor: &mut Box<dyn Processor>) -> (i64, Program) {
        let run = || -> Result<(i64, Program), CompileError> {
            processor.reset();
            processor.compile_and_load(program)?;
            processor.run();
            Ok((self.evaluator.evaluate(&**processor), processor.decompile()))
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(run));

        match outcome {
            Ok(Ok(scored)) => scored,
            Ok(Err(e)) => {
                log::trace!("Solver {}: compile error: {}", self.id, e);
                (i64::MIN, program.to_string())
            }
            Err(_) => {
                log::warn!("Solver {}: processor panicked, replacing it", self.id);
                *processor = self.machine.processor();
                (i64::MIN, program.to_string())
            }
        }
    }

    fn report(&self, generation: u64, solutions: Vec<Solution>) {
        let report = Report {
            island: self.id,
            generation,
            solutions,
        };
        match self.reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::debug!("Solver {}: report channel full, dropping generation {}", self.id, generation);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("Solver {}: report channel closed", self.id);
            }
        }
    }

    /// Run on a dedicated thread.
    pub fn spawn(mut self) -> io::Result<SolverHandle> {
        let id = self.id;
        let cancel = self.cancel_handle();
        let stats = self.stats();
        let handle = thread::Builder::new()
            .name(format!("solver-{id}"))
            .spawn(move || self.run())?;

        Ok(SolverHandle {
            id,
            cancel,
            stats,
            handle: Some(handle),
        })
    }
}

/// Owner of a running solver thread. Dropping it cancels and joins.
pub struct SolverHandle {
    id: usize,
    cancel: Arc<AtomicBool>,
    stats: Arc<SolverStats>,
    handle: Option<JoinHandle<()>>,
}

impl SolverHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Signal the solver to stop. Takes effect before the next program.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the thread to exit.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("Solver {} thread panicked", self.id);
        }
    }
}

impl Drop for SolverHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::evaluator::CostEvaluator;
    use crate::compute::evolution::selector::TopXSelector;
    use crate::compute::machine::testing::SumMachine;
    use crossbeam_channel::{Receiver, bounded};

    /// Same programs every generation.
    struct Fixed(Vec<Program>);

    impl Breeder for Fixed {
        fn breed(&self, _seeds: &[Program]) -> Vec<Program> {
            self.0.clone()
        }
    }

    /// Programs only when bred from nothing.
    struct BootstrapOnly(Vec<Program>);

    impl Breeder for BootstrapOnly {
        fn breed(&self, seeds: &[Program]) -> Vec<Program> {
            if seeds.is_empty() { self.0.clone() } else { Vec::new() }
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn solver(
        breeder: impl Breeder + 'static,
        machine: SumMachine,
        cache: Arc<SolutionCache>,
    ) -> (Solver, Receiver<Report>) {
        let (reports, received) = bounded(16);
        let config = SolverConfig {
            id: 3,
            machine: Arc::new(machine),
            breeder: Box::new(breeder),
            evaluator: Box::new(CostEvaluator),
            selector: Box::new(TopXSelector::new(1)),
            reports,
        };
        (Solver::new(config, cache), received)
    }

    fn programs(texts: &[&str]) -> Vec<Program> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn next_report(received: &Receiver<Report>) -> Report {
        received.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_repeated_programs_hit_cache() {
        init_logging();
        let machine = SumMachine::new();
        let runs = Arc::clone(&machine.runs);
        let cache = Arc::new(SolutionCache::new());
        let (solver, received) = solver(
            Fixed(programs(&["set $1, 5", "set $1, 5"])),
            machine,
            Arc::clone(&cache),
        );
        let handle = solver.spawn().unwrap();

        for generation in 0..3 {
            let report = next_report(&received);
            assert_eq!(report.island, 3);
            assert_eq!(report.generation, generation);
            assert_eq!(report.solutions.len(), 2);
            assert!(report.solutions.iter().all(|s| s.reward == 6));
        }
        assert!(handle.stats().cache_hits() >= 5);
        handle.join();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_faulty_programs_score_minimum() {
        init_logging();
        let (solver, received) = solver(
            Fixed(programs(&["halt!", "panic!\nset $1, 2", "set $0, 7"])),
            SumMachine::new(),
            Arc::new(SolutionCache::new()),
        );
        let handle = solver.spawn().unwrap();

        let first = next_report(&received);
        let rewards: Vec<i64> = first.solutions.iter().map(|s| s.reward).collect();
        assert_eq!(rewards, vec![i64::MIN, i64::MIN, 7]);

        // The loop survives the panic.
        assert_eq!(next_report(&received).generation, 1);
        handle.join();
    }

    #[test]
    fn test_reports_carry_normalized_text() {
        let (solver, received) = solver(
            Fixed(programs(&["  set $1, 5  \nadd $1, $2", "halt!  "])),
            SumMachine::new(),
            Arc::new(SolutionCache::new()),
        );
        let handle = solver.spawn().unwrap();

        let report = next_report(&received);
        assert_eq!(report.solutions[0].program, "set $1, 5\nadd $1, $2");
        assert_eq!(report.solutions[0].reward, 9);
        // Uncompilable text is reported as bred.
        assert_eq!(report.solutions[1].program, "halt!  ");
        handle.join();
    }

    #[test]
    fn test_cancelled_before_run() {
        let (mut solver, received) = solver(
            Fixed(programs(&["set $1, 1"])),
            SumMachine::new(),
            Arc::new(SolutionCache::new()),
        );
        solver.cancel_handle().store(true, Ordering::Relaxed);
        solver.run();

        assert!(received.try_recv().is_err());
        assert_eq!(solver.stats().generations(), 0);
    }

    #[test]
    fn test_empty_generation_rebootstraps() {
        init_logging();
        let (solver, received) = solver(
            BootstrapOnly(programs(&["set $1, 1", "set $1, 2"])),
            SumMachine::new(),
            Arc::new(SolutionCache::new()),
        );
        let handle = solver.spawn().unwrap();

        for generation in 0..3 {
            let report = next_report(&received);
            assert_eq!(report.generation, generation);
            assert_eq!(report.solutions.len(), 2);
        }
        handle.join();
    }

    #[test]
    fn test_full_report_channel_does_not_block() {
        let (reports, _received) = bounded(1);
        let config = SolverConfig {
            id: 0,
            machine: Arc::new(SumMachine::new()),
            breeder: Box::new(Fixed(programs(&["set $1, 1"]))),
            evaluator: Box::new(CostEvaluator),
            selector: Box::new(TopXSelector::new(1)),
            reports,
        };
        let handle = Solver::new(config, Arc::new(SolutionCache::new())).spawn().unwrap();

        let start = std::time::Instant::now();
        while handle.stats().generations() < 5 {
            assert!(start.elapsed() < Duration::from_secs(10));
            thread::yield_now();
        }
        handle.join();
    }
}
