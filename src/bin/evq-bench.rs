use std::time::Instant;

use evq::{
    EventQueue, QueueOptions, Registry, Result, SimTime, StandardLogger, TieBreak, Workload,
};
use log::LevelFilter;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn arg<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .find_map(|s| s.strip_prefix(key).and_then(|s| s.strip_prefix('=')))
}

fn parse<T: std::str::FromStr>(args: &[String], key: &str, default: T) -> Result<T> {
    match arg(args, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| evq::Error::InvalidOption {
                key: key.trim_start_matches('-').to_string(),
                value: raw.to_string(),
            }),
        None => Ok(default),
    }
}

fn run() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();

    let level = if args.iter().any(|s| s == "-v") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = StandardLogger::setup(level);

    let mut options = QueueOptions::from_env()?;
    if let Some(name) = arg(&args, "--impl") {
        options = match name.parse()? {
            evq::Selection::Auto => options.auto(),
            evq::Selection::Named(name) => options.implementation(name),
        };
    }
    if let Some(tie_break) = arg(&args, "--tie-break") {
        options = options.tie_break(tie_break.parse::<TieBreak>()?);
    }
    if arg(&args, "--seed").is_some() {
        options.seed = Some(parse(&args, "--seed", 0u64)?);
    }

    let num = parse(&args, "--num", 400usize)?;
    let delay = parse(&args, "--delay", 1.0f64)?;
    let rounds = parse(&args, "--rounds", 1_000_000usize)?;

    let mut registry = Registry::<u64, SimTime>::standard();
    if args.iter().any(|s| s == "--calibrate") {
        registry.calibrate(Workload::standard())?;
    }
    for (rank, candidate) in registry.ranked().iter().enumerate() {
        println!(
            "#{} {:<10} efficiency {:.3}",
            rank + 1,
            candidate.name(),
            candidate.efficiency()
        );
    }

    let mut queue: Box<dyn EventQueue<u64, SimTime>> = registry.create(&options)?;
    let mut rng = StdRng::seed_from_u64(options.seed.unwrap_or(0x1234_5678));

    // SETUP
    let mut time = SimTime::ZERO;
    for e in 0..num as u64 {
        queue.enqueue(e, time);
        time += rng.random::<f64>() * 4.0 * delay;
    }

    // RUN
    let t0 = Instant::now();
    let mut now = SimTime::ZERO;
    for _ in 0..rounds {
        if let Some((e, t)) = queue.dequeue() {
            now = t;
            queue.enqueue(e, t + rng.random::<f64>() * 2.0 * delay);
        }
    }

    println!(
        "{} ({}): {} holds in {:.6}s, simulated until {}",
        queue.name(),
        queue.descriptor(),
        rounds,
        t0.elapsed().as_secs_f64(),
        now
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
