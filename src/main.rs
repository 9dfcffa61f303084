//! Island Evolve CLI - Check run configurations and inspect solution caches.

use std::fs;
use std::path::Path;
use std::process;

use island_evolve::{
    compute::evolution::{Fingerprint, SolutionCache},
    schema::{EngineConfig, IslandConfig},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("island-evolve", String::as_str);

    match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("--example"), _) => print_example_config(),
        (Some("check"), Some(path)) => check_config(Path::new(path)),
        (Some("cache"), Some(path)) => {
            let top = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
            summarize_cache(Path::new(path), top);
        }
        _ => {
            eprintln!("Usage: {} <command> [args]", program);
            eprintln!();
            eprintln!("Commands:");
            eprintln!("  --example                   Print an example run configuration");
            eprintln!("  check <config.json>         Validate a run configuration");
            eprintln!("  cache <snapshot.json> [n]   Show the n best cached solutions (default: 10)");
            process::exit(1);
        }
    }
}

fn check_config(path: &Path) {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        process::exit(1);
    });

    let config: EngineConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        process::exit(1);
    });

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        process::exit(1);
    }

    println!("Configuration OK");
    println!("  Islands: {}", config.islands.len());
    println!("  Influx capacity: {}", config.evolver.influx_capacity);
    println!("  Migration delay: {} ms", config.evolver.migration_delay_ms);
    match &config.evolver.cache.snapshot_path {
        Some(path) => println!(
            "  Cache snapshot: {} (every {} s)",
            path.display(),
            config.evolver.cache.snapshot_interval_secs
        ),
        None => println!("  Cache snapshot: disabled"),
    }
    if config.islands.len() < 2 {
        println!("  Note: migration needs at least two islands");
    }
}

fn summarize_cache(path: &Path, top: usize) {
    let cache = SolutionCache::new();
    let count = cache.hydrate(path).unwrap_or_else(|e| {
        eprintln!("Error loading snapshot: {}", e);
        process::exit(1);
    });

    println!("Solution cache: {} entries", count);
    for (rank, solution) in cache.best(top).iter().enumerate() {
        let first_line = solution.program.lines().next().unwrap_or("");
        println!(
            "  {:>3}. reward={:<20} {} {}",
            rank + 1,
            solution.reward,
            &Fingerprint::of(&solution.program).to_hex()[..12],
            first_line
        );
    }
}

fn print_example_config() {
    let config = EngineConfig {
        islands: vec![IslandConfig::default(); 2],
        ..Default::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error encoding example config: {}", e);
            process::exit(1);
        }
    }
}
