//! Line protocol command parser.
//!
//! Parses incoming text commands into structured `Command` variants that the
//! session main loop can dispatch on. Player actions name the acting identity
//! right after the verb, e.g. `steal 0xabc 3`.

use tracing::warn;

use crate::game::{Address, AssetRef, Slot};

/// What a `release` command releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Prize,
    Proceeds,
    Leftovers,
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Synchronization ping; the session replies `readyok`.
    IsReady,

    /// Start a new game owned by `owner` with the current options.
    NewGame { owner: Address },

    /// Set a game option: `setoption name <id> [value <x>]`.
    SetOption { name: String, value: Option<String> },

    /// Replace all game options with a JSON config.
    Config { json: String },

    /// Set the session clock.
    Time { now: u64 },

    /// Move the session clock forward.
    Advance { secs: u64 },

    Whitelist { caller: Address, ids: Vec<Address> },

    Deposit { caller: Address, asset: AssetRef },

    /// Buy a ticket paying `paid`.
    Buy { caller: Address, paid: u64 },

    /// File the entropy request for the turn order.
    Request { seed: u64 },

    /// Finalize the turn order. Without words, the session's local entropy
    /// source fulfills the request.
    Finalize { token: Option<u64>, words: Vec<u64> },

    Claim { caller: Address },

    Steal {
        caller: Address,
        target: Slot,
        hint: Option<Slot>,
    },

    CatchUp { caller: Address, missed: Slot },

    CatchUpSteal {
        caller: Address,
        missed: Slot,
        target: Slot,
        hint: Option<Slot>,
    },

    /// Synchronize the turn clock without acting.
    Tick,

    /// Resolve `start..end`, or the whole game.
    Resolve { window: Option<(Slot, Slot)> },

    Release { kind: ReleaseKind, caller: Address },

    Reclaim { caller: Address, index: usize },

    Status,

    Holding { slot: Slot },

    Player { slot: Slot },

    /// Terminate the session.
    Quit,
}

/// Parses a single line of input into a `Command`.
///
/// Returns `None` for empty lines or unrecognized commands. Malformed
/// arguments for known commands also return `None` after logging a warning.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let (&verb, args) = tokens.split_first()?;

    let cmd = match verb {
        "isready" => Some(Command::IsReady),
        "quit" => Some(Command::Quit),
        "tick" => Some(Command::Tick),
        "status" => Some(Command::Status),

        "newgame" => parse_newgame(args),
        "setoption" => parse_setoption(args),
        "config" => parse_config(trimmed),
        "time" => number(args, 0).map(|now| Command::Time { now }),
        "advance" => number(args, 0).map(|secs| Command::Advance { secs }),
        "whitelist" => parse_whitelist(args),
        "deposit" => parse_deposit(args),
        "buy" => parse_buy(args),
        "request" => Some(Command::Request {
            seed: optional(args, 0)?.unwrap_or(0),
        }),
        "finalize" => parse_finalize(args),
        "claim" => caller(args).map(|caller| Command::Claim { caller }),
        "steal" => parse_steal(args),
        "catchup" => parse_catchup(args),
        "catchupsteal" => parse_catchup_steal(args),
        "resolve" => parse_resolve(args),
        "release" => parse_release(args),
        "reclaim" => Some(Command::Reclaim {
            caller: caller(args)?,
            index: number(args, 1)?,
        }),
        "holding" => number(args, 0).map(|slot| Command::Holding { slot }),
        "player" => number(args, 0).map(|slot| Command::Player { slot }),

        other => {
            warn!(command = other, "unknown command");
            return None;
        }
    };
    if cmd.is_none() {
        warn!(line = trimmed, "malformed command");
    }
    cmd
}

fn caller(args: &[&str]) -> Option<Address> {
    args.first().map(|&s| Address::new(s))
}

fn number<N: std::str::FromStr>(args: &[&str], idx: usize) -> Option<N> {
    args.get(idx)?.parse().ok()
}

/// `Some(None)` when the argument is absent, `None` when it does not parse.
fn optional<N: std::str::FromStr>(args: &[&str], idx: usize) -> Option<Option<N>> {
    match args.get(idx) {
        None => Some(None),
        Some(s) => s.parse().ok().map(Some),
    }
}

/// Parses `newgame <owner>`.
fn parse_newgame(args: &[&str]) -> Option<Command> {
    if args.len() != 1 {
        return None;
    }
    Some(Command::NewGame {
        owner: caller(args)?,
    })
}

/// Parses `setoption name <id> [value <x>]`.
fn parse_setoption(args: &[&str]) -> Option<Command> {
    if args.len() < 2 || args[0] != "name" {
        return None;
    }
    let (name, value) = match args.iter().position(|&t| t == "value") {
        Some(vi) => {
            let name = args[1..vi].join(" ");
            let value = &args[vi + 1..];
            (name, (!value.is_empty()).then(|| value.join(" ")))
        }
        None => (args[1..].join(" "), None),
    };
    if name.is_empty() {
        return None;
    }
    Some(Command::SetOption { name, value })
}

/// Parses `config <json>`, keeping the JSON text verbatim.
fn parse_config(line: &str) -> Option<Command> {
    let json = line.strip_prefix("config")?.trim();
    if json.is_empty() {
        return None;
    }
    Some(Command::Config {
        json: json.to_string(),
    })
}

/// Parses `whitelist <caller> <id>...`.
fn parse_whitelist(args: &[&str]) -> Option<Command> {
    let (&caller, ids) = args.split_first()?;
    if ids.is_empty() {
        return None;
    }
    Some(Command::Whitelist {
        caller: Address::new(caller),
        ids: ids.iter().map(|&s| Address::new(s)).collect(),
    })
}

/// Parses `deposit <caller> <collection> <token_id>`.
fn parse_deposit(args: &[&str]) -> Option<Command> {
    if args.len() != 3 {
        return None;
    }
    Some(Command::Deposit {
        caller: caller(args)?,
        asset: AssetRef::new(args[1], number(args, 2)?),
    })
}

/// Parses `buy <caller> <paid>`.
fn parse_buy(args: &[&str]) -> Option<Command> {
    Some(Command::Buy {
        caller: caller(args)?,
        paid: number(args, 1)?,
    })
}

/// Parses `finalize [<token> [<word>...]]`.
fn parse_finalize(args: &[&str]) -> Option<Command> {
    let token = optional(args, 0)?;
    let words = args
        .iter()
        .skip(1)
        .map(|w| w.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    Some(Command::Finalize { token, words })
}

/// Parses `steal <caller> <target> [<hint>]`.
fn parse_steal(args: &[&str]) -> Option<Command> {
    if args.len() > 3 {
        return None;
    }
    Some(Command::Steal {
        caller: caller(args)?,
        target: number(args, 1)?,
        hint: optional(args, 2)?,
    })
}

/// Parses `catchup <caller> <missed>`.
fn parse_catchup(args: &[&str]) -> Option<Command> {
    Some(Command::CatchUp {
        caller: caller(args)?,
        missed: number(args, 1)?,
    })
}

/// Parses `catchupsteal <caller> <missed> <target> [<hint>]`.
fn parse_catchup_steal(args: &[&str]) -> Option<Command> {
    if args.len() > 4 {
        return None;
    }
    Some(Command::CatchUpSteal {
        caller: caller(args)?,
        missed: number(args, 1)?,
        target: number(args, 2)?,
        hint: optional(args, 3)?,
    })
}

/// Parses `resolve [<start> <end>]`.
fn parse_resolve(args: &[&str]) -> Option<Command> {
    match args.len() {
        0 => Some(Command::Resolve { window: None }),
        2 => Some(Command::Resolve {
            window: Some((number(args, 0)?, number(args, 1)?)),
        }),
        _ => None,
    }
}

/// Parses `release prize|proceeds|leftovers <caller>`.
fn parse_release(args: &[&str]) -> Option<Command> {
    let kind = match *args.first()? {
        "prize" => ReleaseKind::Prize,
        "proceeds" => ReleaseKind::Proceeds,
        "leftovers" => ReleaseKind::Leftovers,
        _ => return None,
    };
    Some(Command::Release {
        kind,
        caller: caller(&args[1..])?,
    })
}
