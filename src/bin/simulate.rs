//! Random game simulation CLI.
//!
//! Plays Yankee-swap games with random players, checks engine invariants
//! after every action, and writes one JSON record per game.
//!
//! Usage:
//!   cargo run --release --bin simulate -- [OPTIONS]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yankee::game::GameConfig;
use yankee::simulate::{self, SimConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Random Yankee-swap game simulation")]
struct Args {
    /// Number of games to play.
    #[arg(long, default_value = "10")]
    games: usize,

    /// Tickets sold per game.
    #[arg(long, default_value = "12")]
    players: usize,

    /// Chance a turn is a steal when a target is available.
    #[arg(long, default_value = "0.5")]
    steal_rate: f64,

    /// Chance a player idles past the turn timeout before acting.
    #[arg(long, default_value = "0.1")]
    idle_rate: f64,

    /// Chance a wrong caller tries to act before each turn.
    #[arg(long, default_value = "0.2")]
    intrusion_rate: f64,

    /// Turn timeout in seconds.
    #[arg(long, default_value = "10800")]
    turn_timeout: u64,

    /// Forfeit skip debts older than this many seconds.
    #[arg(long)]
    forfeit_after: Option<u64>,

    /// Number of parallel threads.
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Random seed, 0 for entropy.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Output file path (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Suppress per-game progress output.
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("yankee=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = SimConfig {
        num_games: args.games,
        players: args.players,
        steal_rate: args.steal_rate.clamp(0.0, 1.0),
        idle_rate: args.idle_rate.clamp(0.0, 1.0),
        intrusion_rate: args.intrusion_rate.clamp(0.0, 1.0),
        game: GameConfig {
            turn_timeout: args.turn_timeout,
            skip_forfeit_after: args.forfeit_after,
            ..GameConfig::default()
        },
        threads: args.threads,
        seed: args.seed,
        quiet: args.quiet,
    };
    if let Err(e) = config.game.validate() {
        error!(error = %e, "invalid game configuration");
        return ExitCode::FAILURE;
    }

    info!(
        games = config.num_games,
        players = config.players,
        threads = config.threads,
        "simulation started"
    );
    let start = Instant::now();
    let games = simulate::run_games(&config);
    let elapsed = start.elapsed();

    let dirty = games.iter().filter(|g| !g.is_clean()).count();
    info!(
        games = games.len(),
        dirty,
        secs = elapsed.as_secs_f64(),
        "simulation complete"
    );

    let written = match &args.output {
        Some(path) => File::create(path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            simulate::write_jsonl(&games, &mut writer)?;
            writer.flush()
        }),
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            simulate::write_jsonl(&games, &mut writer).and_then(|_| writer.flush())
        }
    };
    if let Err(e) = written {
        error!(error = %e, "failed to write output");
        return ExitCode::FAILURE;
    }

    if dirty > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
