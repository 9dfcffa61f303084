//! Island model coordinator.
//!
//! Every island is a [`Solver`] on its own thread, fed by its own breeding
//! pipeline plus the shared [`Influx`]. A harvester thread collects one
//! report per island per round and queues the round for the migration
//! worker, which picks the round's champion and, after a short delay,
//! migrates the champion's programs to whichever island reads the influx
//! next. Rounds are migrated in order and none are skipped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use super::breeder::{Breeder, Influx, MultiBreeder};
use super::cache::{CacheSnapshotter, SolutionCache, write_atomically};
use super::evaluator::Evaluator;
use super::selector::Selector;
use super::solver::{Solver, SolverConfig, SolverHandle};
use crate::compute::machine::Machine;
use crate::schema::{Champion, ConfigError, EvolverConfig, Report, best_champion};

/// Errors raised while setting up islands.
#[derive(Debug, thiserror::Error)]
pub enum EvolveError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Solution cache error: {0}")]
    Cache(#[from] super::cache::CacheError),
    #[error("Failed to start thread: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Champion export
// ============================================================================

/// Receives each round's winning champion.
pub trait ChampionSink: Send + Sync {
    fn publish(&self, champion: &Champion) -> io::Result<()>;
}

/// Writes the champion's best program to a file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct FileChampionSink {
    path: PathBuf,
}

impl FileChampionSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChampionSink for FileChampionSink {
    fn publish(&self, champion: &Champion) -> io::Result<()> {
        let Some(program) = champion.best_program() else {
            return Ok(());
        };
        write_atomically(&self.path, program.as_bytes())
    }
}

// ============================================================================
// Harvest
// ============================================================================

/// One migration round: one champion per island id below `islands`.
#[derive(Debug)]
pub struct Harvest {
    islands: usize,
    champions: Vec<Champion>,
}

impl Harvest {
    pub fn new(islands: usize) -> Self {
        Self {
            islands,
            champions: Vec::with_capacity(islands),
        }
    }

    /// Record a report. A newer report from an island already harvested
    /// replaces its champion; islands outside the round are ignored.
    /// Returns true once every island has reported.
    pub fn offer(&mut self, report: Report) -> bool {
        if report.island >= self.islands {
            log::trace!("Ignoring report from island {} outside this round", report.island);
            return self.is_complete();
        }

        let champion = Champion::from_report(report);
        match self.champions.iter_mut().find(|c| c.island == champion.island) {
            Some(existing) => *existing = champion,
            None => self.champions.push(champion),
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.champions.len() == self.islands
    }

    /// Champions in receipt order.
    pub fn into_champions(self) -> Vec<Champion> {
        self.champions
    }
}

// ============================================================================
// Island evolver
// ============================================================================

/// One island's pipeline, before it is wired to the shared influx.
pub struct PopulationSpec {
    pub machine: Arc<dyn Machine>,
    pub breeder: Box<dyn Breeder>,
    pub evaluator: Box<dyn Evaluator>,
    pub selector: Box<dyn Selector>,
}

/// Shared between the evolver and the migration worker.
struct Migration {
    influx: Influx,
    sink: Option<Arc<dyn ChampionSink>>,
    delay: Duration,
}

impl Migration {
    /// Worker loop. Migrates every queued round in order, waiting out the
    /// delay before each one. Returns when the round queue disconnects or
    /// the evolver hangs up `stop`; a round still waiting then is dropped.
    fn run(&self, rounds: Receiver<Vec<Champion>>, stop: Receiver<()>) {
        for champions in rounds.iter() {
            let Some(best) = best_champion(champions) else {
                continue;
            };
            match stop.recv_timeout(self.delay) {
                Err(RecvTimeoutError::Timeout) => self.publish(best),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Migration worker stopping with a round pending");
                    return;
                }
            }
        }
    }

    fn publish(&self, best: Champion) {
        log::info!(
            "Migrating {} programs from island {} (reward {})",
            best.programs.len(),
            best.island,
            best.reward
        );
        self.influx.publish(best.programs.clone());

        if let Some(sink) = &self.sink
            && let Err(e) = sink.publish(&best)
        {
            log::warn!("Failed to export champion of island {}: {}", best.island, e);
        }
    }
}

/// Runs islands and migrates the best one's programs between rounds.
pub struct IslandEvolver {
    cache: Arc<SolutionCache>,
    migration: Arc<Migration>,
    reports: Sender<Report>,
    islands: Arc<AtomicUsize>,
    solvers: Vec<SolverHandle>,
    stopping: Arc<AtomicBool>,
    /// Dropped to interrupt the migration worker's delay.
    stop_migration: Option<Sender<()>>,
    harvester: Option<JoinHandle<()>>,
    migrator: Option<JoinHandle<()>>,
    snapshotter: Option<CacheSnapshotter>,
}

impl IslandEvolver {
    /// Create an evolver exporting champions to `config.champion_path`.
    pub fn new(config: EvolverConfig, cache: Arc<SolutionCache>) -> Result<Self, EvolveError> {
        let sink = config
            .champion_path
            .as_ref()
            .map(|path| Arc::new(FileChampionSink::new(path)) as Arc<dyn ChampionSink>);
        Self::with_sink(config, cache, sink)
    }

    /// Create an evolver with a custom champion sink.
    pub fn with_sink(
        config: EvolverConfig,
        cache: Arc<SolutionCache>,
        sink: Option<Arc<dyn ChampionSink>>,
    ) -> Result<Self, EvolveError> {
        config.validate()?;

        let (reports, received) = bounded(config.report_capacity);
        let (queue, rounds) = bounded(config.influx_capacity);
        let (stop_migration, stopped) = bounded::<()>(0);
        let migration = Arc::new(Migration {
            influx: Influx::new(config.influx_capacity),
            sink,
            delay: config.migration_delay(),
        });
        let islands = Arc::new(AtomicUsize::new(0));
        let stopping = Arc::new(AtomicBool::new(false));

        let migrator = {
            let migration = Arc::clone(&migration);
            thread::Builder::new()
                .name("migration".to_string())
                .spawn(move || migration.run(rounds, stopped))?
        };

        let harvester = {
            let islands = Arc::clone(&islands);
            let stopping = Arc::clone(&stopping);
            let idle = config.idle_interval();
            thread::Builder::new()
                .name("harvester".to_string())
                .spawn(move || harvest(received, &islands, &stopping, idle, queue))?
        };

        let snapshotter = match &config.cache.snapshot_path {
            Some(path) => Some(CacheSnapshotter::spawn(
                Arc::clone(&cache),
                path,
                config.cache.snapshot_interval(),
            )?),
            None => None,
        };

        log::info!("Island evolver started");

        Ok(Self {
            cache,
            migration,
            reports,
            islands,
            solvers: Vec::new(),
            stopping,
            stop_migration: Some(stop_migration),
            harvester: Some(harvester),
            migrator: Some(migrator),
            snapshotter,
        })
    }

    /// Start a solver for `population`. Returns the new island's id.
    pub fn add_population(&mut self, population: PopulationSpec) -> Result<usize, EvolveError> {
        let id = self.islands.load(Ordering::SeqCst);
        let influx: Box<dyn Breeder> = Box::new(self.migration.influx.breeder());
        let breeder = MultiBreeder::new(vec![population.breeder, influx]);

        let solver = Solver::new(
            SolverConfig {
                id,
                machine: population.machine,
                breeder: Box::new(breeder),
                evaluator: population.evaluator,
                selector: population.selector,
                reports: self.reports.clone(),
            },
            Arc::clone(&self.cache),
        );
        self.solvers.push(solver.spawn()?);
        self.islands.fetch_add(1, Ordering::SeqCst);

        log::info!("Added island {}", id);
        Ok(id)
    }

    /// Register an island driven outside this evolver. It takes part in
    /// harvesting by sending reports with the returned id through
    /// [`report_sender`](Self::report_sender).
    pub fn reserve_island(&mut self) -> usize {
        let id = self.islands.fetch_add(1, Ordering::SeqCst);
        log::info!("Reserved external island {}", id);
        id
    }

    /// Sender for the shared report channel.
    pub fn report_sender(&self) -> Sender<Report> {
        self.reports.clone()
    }

    /// The shared migration queue.
    pub fn influx(&self) -> &Influx {
        &self.migration.influx
    }

    /// The shared solution cache.
    pub fn cache(&self) -> &Arc<SolutionCache> {
        &self.cache
    }

    /// Number of islands taking part in harvesting.
    pub fn islands(&self) -> usize {
        self.islands.load(Ordering::SeqCst)
    }

    /// Handles of the solvers started by this evolver.
    pub fn solvers(&self) -> &[SolverHandle] {
        &self.solvers
    }

    /// Cancel every solver, stop harvesting and migrating, wait for the
    /// threads and write a final cache snapshot.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.stop_migration.take();
        for solver in &self.solvers {
            solver.cancel();
        }
        for solver in self.solvers.drain(..) {
            solver.join();
        }
        let threads = [("Harvester", self.harvester.take()), ("Migration", self.migrator.take())];
        let mut joined = false;
        for (name, handle) in threads {
            if let Some(handle) = handle {
                joined = true;
                if handle.join().is_err() {
                    log::warn!("{} thread panicked", name);
                }
            }
        }
        if let Some(snapshotter) = self.snapshotter.take() {
            snapshotter.stop();
        }
        if joined {
            log::info!("Island evolver stopped");
        }
    }
}

impl Drop for IslandEvolver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Harvester loop. Rounds need at least two islands. Complete rounds are
/// queued for the migration worker; a full queue holds the harvester back
/// rather than dropping a round.
fn harvest(
    received: Receiver<Report>,
    islands: &AtomicUsize,
    stopping: &AtomicBool,
    idle: Duration,
    rounds: Sender<Vec<Champion>>,
) {
    let mut round = 0u64;
    while !stopping.load(Ordering::SeqCst) {
        let count = islands.load(Ordering::SeqCst);
        if count < 2 {
            thread::sleep(idle);
            continue;
        }

        let mut harvest = Harvest::new(count);
        while !harvest.is_complete() {
            match received.recv_timeout(idle) {
                Ok(report) => {
                    harvest.offer(report);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if stopping.load(Ordering::SeqCst) {
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        log::debug!("Harvest round {} complete with {} islands", round, count);
        round += 1;

        if rounds.send(harvest.into_champions()).is_err() {
            log::debug!("Migration worker gone, harvester exiting");
            return;
        }
    }
}
