//! Command-line surface: create codes and run channel simulations against
//! stored ones.

use crate::bec::{self, Peeling};
use crate::benchmark::Stats;
use crate::cancel::CancelToken;
use crate::gallager;
use crate::gce;
use crate::hamming;
use crate::harddecision::{bit_flipping, Dwbf, Gallager as GallagerBitFlip};
use crate::linearblock::{systematic, LinearBlock};
use crate::random::{get_or_insert_global_seed, seeded_thread_rng, Seed};
use crate::rcj;
use crate::simulation::{self, DecoderKind, SimulationStats};
use crate::sparse::SparseVector;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Construction and channel simulation of binary linear block codes"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
    /// PRNG seed as a 256-bit hex string [default: from entropy]
    #[arg(long, global = true)]
    seed: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new code and store it as JSON
    #[command(subcommand)]
    Create(CreateCommand),
    /// Run a channel simulation against a stored code
    #[command(subcommand)]
    Sim(SimCommand),
}

#[derive(Subcommand)]
enum CreateCommand {
    /// Gallager LDPC built from stacked random bands
    Gallager(GallagerArgs),
    /// Girth-constrained extension LDPC
    Gce(GceArgs),
    /// Systematic Hamming code
    Hamming(HammingArgs),
    /// Girth-constrained graph-doubling LDPC
    Rcj(RcjArgs),
}

#[derive(Args)]
struct GallagerArgs {
    /// Output file for the code JSON
    output: PathBuf,
    /// Number of message bits
    #[arg(short, long, default_value_t = 1000)]
    message: usize,
    /// Column weight (ones per H column, >= 3)
    #[arg(short, long, default_value_t = 3)]
    column_weight: usize,
    /// Row weight (ones per H row, greater than the column weight)
    #[arg(short, long, default_value_t = 4)]
    row_weight: usize,
    /// Smallest allowed cycle: 4, 6, 8...
    #[arg(short, long, default_value_t = 4)]
    smallest_cycle: usize,
    /// Search iteration budget
    #[arg(short, long, default_value_t = 10_000)]
    iterations: usize,
    /// Worker threads (0 means one per CPU)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Overwrite the output file without creating a backup
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct GceArgs {
    /// Output file for the code JSON
    output: PathBuf,
    /// Number of check nodes (parity checks)
    #[arg(short, long)]
    check_nodes: usize,
    /// Number of variable nodes (code symbols)
    #[arg(short, long)]
    variable_nodes: usize,
    /// Target girth: 4, 6, 8...
    #[arg(short, long)]
    girth: usize,
    /// Search iteration budget
    #[arg(short, long, default_value_t = 1)]
    iterations: usize,
    /// Complete incomplete attempts even if that violates the girth target
    #[arg(short, long)]
    force: bool,
    /// Worker threads (0 means one per CPU)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Overwrite the output file without creating a backup
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct HammingArgs {
    /// Output file for the code JSON
    output: PathBuf,
    /// Parity symbols p >= 3; the codeword size is 2^p - 1
    #[arg(short, long, default_value_t = 4)]
    parity: usize,
    /// Worker threads (0 means one per CPU)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Overwrite the output file without creating a backup
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct RcjArgs {
    /// Output file for the code JSON
    output: PathBuf,
    /// Target girth: 4, 6, 8...
    #[arg(short, long)]
    girth: usize,
    /// Graph size parameter; must be a power of 2 greater than 1
    #[arg(short, long)]
    count: usize,
    /// Worker threads (0 means one per CPU)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Overwrite the output file without creating a backup
    #[arg(long)]
    overwrite: bool,
}

#[derive(Subcommand)]
enum SimCommand {
    /// BSC simulation with the Gallager bit-flipping decoder
    BscGallager(BscGallagerArgs),
    /// BSC simulation with the DWBF-F decoder
    BscDwbf(BscDwbfArgs),
    /// BEC simulation with the peeling decoder
    Bec(BecArgs),
}

#[derive(Args)]
struct ChannelArgs {
    /// Stored code JSON
    ecc: PathBuf,
    /// Result JSON, created if missing and resumed otherwise
    results: PathBuf,
    /// Trials per probability
    #[arg(short, long, default_value_t = 1_000_000)]
    trials: usize,
    /// Channel error probabilities to sweep
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_values_t = vec![0.01, 0.05, 0.10, 0.15, 0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50]
    )]
    probability: Vec<f64>,
    /// Worker threads (0 means one per CPU)
    #[arg(long, default_value_t = 0)]
    threads: usize,
    /// Save the result file after every this many trials
    #[arg(long, default_value_t = 10_000)]
    save_every: usize,
}

#[derive(Args)]
struct BscGallagerArgs {
    #[command(flatten)]
    common: ChannelArgs,
    /// Max bit-flipping iterations per codeword
    #[arg(short, long, default_value_t = 20)]
    iterations: usize,
}

#[derive(Args)]
struct BscDwbfArgs {
    #[command(flatten)]
    common: ChannelArgs,
    /// Max bit-flipping iterations per codeword
    #[arg(short, long, default_value_t = 20)]
    iterations: usize,
    /// Weighting hyperparameter, 0 < alpha < 1
    #[arg(short, long, default_value_t = 0.5)]
    alpha: f64,
    /// Reliability threshold eta
    #[arg(short, long, default_value_t = 0.0)]
    eta: f64,
}

#[derive(Args)]
struct BecArgs {
    #[command(flatten)]
    common: ChannelArgs,
}

pub fn run(cli: Cli) -> Result<()> {
    if let Some(seed) = cli.seed.as_deref() {
        let seed = Seed::try_from(seed).context("invalid --seed value")?;
        get_or_insert_global_seed(Some(seed));
    }
    let cancel = CancelToken::new();
    match cli.command {
        Command::Create(create) => run_create(&cancel, create),
        Command::Sim(sim) => run_sim(&cancel, sim),
    }
}

fn run_create(cancel: &CancelToken, command: CreateCommand) -> Result<()> {
    match command {
        CreateCommand::Gallager(args) => {
            let block = gallager::search(
                cancel,
                args.message,
                args.column_weight,
                args.row_weight,
                args.smallest_cycle,
                args.iterations,
                args.threads,
                &mut seeded_thread_rng(),
            )?
            .ok_or_else(|| anyhow!("no Gallager code found within the iteration budget"))?;
            save_created(&args.output, &block, args.overwrite)
        }
        CreateCommand::Gce(args) => {
            simulation::check_file_writable(&args.output, args.overwrite)?;
            let output = args.output.clone();
            let mut checkpoint = |best: &LinearBlock| {
                if let Err(err) = simulation::save_code(&output, best, true) {
                    warn!("failed to save checkpoint: {err}");
                }
            };
            let block = gce::search(
                cancel,
                args.check_nodes,
                args.variable_nodes,
                args.girth,
                args.iterations,
                args.threads,
                args.force,
                Some(&mut checkpoint),
            )?
            .ok_or_else(|| anyhow!("no GCE code found within the iteration budget"))?;
            save_created(&args.output, &block, true)
        }
        CreateCommand::Hamming(args) => {
            let block = hamming::new(cancel, args.parity, args.threads)?;
            save_created(&args.output, &block, args.overwrite)
        }
        CreateCommand::Rcj(args) => {
            let graph = rcj::build(cancel, args.girth, args.count)?;
            let h = graph.parity_check_matrix();
            let block = systematic(cancel, &h, args.threads)?;
            save_created(&args.output, &block, args.overwrite)
        }
    }
}

fn save_created(output: &PathBuf, block: &LinearBlock, overwrite: bool) -> Result<()> {
    info!(
        "message size {}, parity symbols {}, codeword size {}, code rate {:.2}",
        block.message_length(),
        block.parity_symbols(),
        block.codeword_length(),
        block.code_rate()
    );
    simulation::save_code(output, block, overwrite)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn run_sim(cancel: &CancelToken, command: SimCommand) -> Result<()> {
    match command {
        SimCommand::BscGallager(args) => {
            let (block, mut data) =
                load_validated(&args.common, DecoderKind::BscGallager)?;
            let repair = |_original: &SparseVector, received: &SparseVector| {
                let mut alg = GallagerBitFlip::new(block.parity());
                bit_flipping(&mut alg, block.parity(), received, args.iterations)
            };
            sweep_bsc(cancel, &block, &mut data, &args.common, &repair)
        }
        SimCommand::BscDwbf(args) => {
            let (block, mut data) = load_validated(&args.common, DecoderKind::BscDwbf)?;
            let repair = |_original: &SparseVector, received: &SparseVector| {
                let mut alg = Dwbf::new(block.parity(), args.alpha, args.eta);
                bit_flipping(&mut alg, block.parity(), received, args.iterations)
            };
            sweep_bsc(cancel, &block, &mut data, &args.common, &repair)
        }
        SimCommand::Bec(args) => {
            let (block, mut data) = load_validated(&args.common, DecoderKind::BecPeeling)?;
            let repair = |_original: &Vec<bec::ErasureBit>, received: &Vec<bec::ErasureBit>| {
                let mut alg = Peeling::new(block.parity());
                bec::flipping(&mut alg, received)
            };
            sweep_bec(cancel, &block, &mut data, &args.common, &repair)
        }
    }
}

fn load_validated(
    args: &ChannelArgs,
    kind: DecoderKind,
) -> Result<(LinearBlock, SimulationStats)> {
    let block = simulation::load_code(&args.ecc)
        .with_context(|| format!("failed to load code from {}", args.ecc.display()))?;
    let data = simulation::load_results(&args.results)?
        .unwrap_or_else(|| SimulationStats::new(kind, &block));
    data.validate_against(kind, block.parity())?;
    let workers = if args.threads == 0 {
        num_cpus::get()
    } else {
        args.threads
    };
    info!(
        "simulating {kind} over {} probabilities with {workers} threads",
        args.probability.len()
    );
    Ok((block, data))
}

fn sweep_bsc<R>(
    cancel: &CancelToken,
    block: &LinearBlock,
    data: &mut SimulationStats,
    args: &ChannelArgs,
    repair: &R,
) -> Result<()>
where
    R: Fn(&SparseVector, &SparseVector) -> SparseVector + Sync,
{
    for &p in &args.probability {
        let previous = data.stats_for(p).cloned().unwrap_or_default();
        let base = data.clone();
        let mut ticks = 0usize;
        let save_every = args.save_every.max(1);
        let mut checkpoint = |stats: &Stats| {
            ticks += 1;
            if ticks % save_every == 0 {
                let mut snapshot = base.clone();
                snapshot.set_stats(p, stats.clone());
                if let Err(err) = simulation::save_results(&args.results, &snapshot) {
                    warn!("failed to save checkpoint: {err}");
                }
            }
        };
        let stats = simulation::run_bsc(
            cancel,
            block,
            p,
            args.trials,
            args.threads,
            repair,
            previous,
            Some(&mut checkpoint),
        );
        data.set_stats(p, stats);
        simulation::save_results(&args.results, data)?;
        info!("p={p}: {}", data.stats_for(p).expect("stats just stored"));
    }
    Ok(())
}

fn sweep_bec<R>(
    cancel: &CancelToken,
    block: &LinearBlock,
    data: &mut SimulationStats,
    args: &ChannelArgs,
    repair: &R,
) -> Result<()>
where
    R: Fn(&Vec<bec::ErasureBit>, &Vec<bec::ErasureBit>) -> Vec<bec::ErasureBit> + Sync,
{
    for &p in &args.probability {
        let previous = data.stats_for(p).cloned().unwrap_or_default();
        let base = data.clone();
        let mut ticks = 0usize;
        let save_every = args.save_every.max(1);
        let mut checkpoint = |stats: &Stats| {
            ticks += 1;
            if ticks % save_every == 0 {
                let mut snapshot = base.clone();
                snapshot.set_stats(p, stats.clone());
                if let Err(err) = simulation::save_results(&args.results, &snapshot) {
                    warn!("failed to save checkpoint: {err}");
                }
            }
        };
        let stats = simulation::run_bec(
            cancel,
            block,
            p,
            args.trials,
            args.threads,
            repair,
            previous,
            Some(&mut checkpoint),
        );
        data.set_stats(p, stats);
        simulation::save_results(&args.results, data)?;
        info!("p={p}: {}", data.stats_for(p).expect("stats just stored"));
    }
    Ok(())
}
