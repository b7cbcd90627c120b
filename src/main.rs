//! Yankee -- a Yankee-swap game engine speaking a line protocol.
//!
//! This binary reads commands from stdin and writes replies to stdout. Logs
//! go to stderr, filtered by `RUST_LOG`.

use std::io::{self, BufRead, Write};

use tracing_subscriber::EnvFilter;

use yankee::engine::Engine;
use yankee::protocol::parser::{parse_command, Command};

/// Runs the protocol loop until `quit` or end of input.
fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("yankee=info")),
        )
        .with_writer(io::stderr)
        .init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut engine = Engine::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        let cmd = match parse_command(&line) {
            Some(c) => c,
            None => continue,
        };

        match cmd {
            Command::Quit => break,
            cmd => engine.handle(cmd, &mut out)?,
        }
    }
    out.flush()
}
