use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand};
use log::{error, info};
use edmcore::data::event::EventStore;
use pfareco::config::PfaConfig;
use pfareco::engine::TruthSeededEngine;
use pfareco::error::{PfaError, Result};
use pfareco::job::{process_parallel, EventProducts, PfaJob};
use pfareco::sim::synthetic::SyntheticEventBuilder;

/// Per-event particle-flow orchestration with reco-to-truth association
#[derive(Parser, Debug)]
#[command(name = "pfareco")]
#[command(about = "Run particle-flow reconstruction bookkeeping over event files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process events with the truth-seeded engine
    Run {
        /// JSON array of events
        #[arg(long)]
        events: PathBuf,

        /// JSON configuration, defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Summary output (.json, .bin or .zst), overrides the configured path
        #[arg(long)]
        summary: Option<String>,

        /// Write the per-event products as JSON
        #[arg(long)]
        products: Option<PathBuf>,

        /// Process events concurrently
        #[arg(long)]
        parallel: bool,

        /// Worker threads for --parallel (0 = rayon default)
        #[arg(long, default_value = "0")]
        threads: usize,
    },
    /// Write synthetic events as JSON
    Generate {
        #[arg(long)]
        out: PathBuf,

        /// Number of events
        #[arg(long, default_value = "10")]
        events: usize,

        #[arg(long, default_value = "1")]
        seed: u64,

        /// Primary particles per event
        #[arg(long, default_value = "4")]
        particles: usize,
    },
    /// Print the default configuration
    Config,
}

fn read_events(path: &Path) -> Result<Vec<EventStore>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn run(
    events: &Path,
    config: Option<&Path>,
    summary: Option<String>,
    products: Option<&Path>,
    parallel: bool,
    threads: usize,
) -> Result<()> {
    let mut config = match config {
        Some(path) => PfaConfig::from_json_file(path)?,
        None => PfaConfig::default(),
    };
    if summary.is_some() {
        config.output.summary_path = summary;
    }

    let events = read_events(events)?;
    info!("read {} events", events.len());

    let (results, report): (Vec<EventProducts>, _) = if parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| PfaError::Config(format!("thread pool: {}", e)))?;
        let calo_weight = config.calo_weight;
        let (results, _, report) = pool.install(|| {
            process_parallel(&config, &events, || TruthSeededEngine::new(calo_weight))
        })?;
        (results, report)
    } else {
        let engine = TruthSeededEngine::new(config.calo_weight);
        let mut job = PfaJob::new(config, engine)?;
        let results = job.run(&events);
        (results, job.finalize()?)
    };

    if let Some(path) = products {
        write_json(path, &results)?;
        info!("wrote products of {} events to {}", results.len(), path.display());
    }
    println!("{}", report);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { events, config, summary, products, parallel, threads } => {
            run(&events, config.as_deref(), summary, products.as_deref(), parallel, threads)
        }
        Command::Generate { out, events, seed, particles } => {
            let generated = SyntheticEventBuilder::new(seed).with_particles(particles).generate(events);
            write_json(&out, &generated).map(|_| info!("wrote {} events to {}", generated.len(), out.display()))
        }
        Command::Config => serde_json::to_string_pretty(&PfaConfig::default())
            .map(|json| println!("{}", json))
            .map_err(PfaError::from),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
