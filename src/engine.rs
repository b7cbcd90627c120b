//! Session state management.
//!
//! Holds the current game, the options for the next game, the in-memory
//! treasury and entropy source, and the session clock. Each command is
//! applied to the game at the session's current time.

use std::io::{self, Write};
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use crate::collab::{Ledger, LocalEntropy};
use crate::error::{ConfigError, GameError};
use crate::game::{GameConfig, GameState, RequestToken, Timestamp};
use crate::protocol::{Command, ReleaseKind};
use crate::turn::{ClockSync, TurnOutcome};
use crate::{payout, resolve, setup, turn};

/// Reasons a command fails, reported as `error <message>`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no game in progress")]
    NoGame,

    #[error("no pending order request")]
    NoPendingRequest,

    #[error("unknown option {0}")]
    UnknownOption(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("output failed: {0}")]
    Io(#[from] io::Error),
}

/// Holds the mutable state of a session between commands.
#[derive(Debug, Default)]
pub struct Engine {
    pub game: Option<GameState>,
    /// Options applied by the next `newgame`.
    pub config: GameConfig,
    pub ledger: Ledger,
    pub entropy: LocalEntropy,
    pub now: Timestamp,
}

fn game(slot: &mut Option<GameState>) -> Result<&mut GameState, SessionError> {
    slot.as_mut().ok_or(SessionError::NoGame)
}

fn parse_value<N: FromStr>(name: &str, value: Option<&str>) -> Result<N, SessionError> {
    let value = value.unwrap_or_default();
    value.parse().map_err(|_| SessionError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn prize_name(prize: Option<usize>) -> String {
    prize.map_or_else(|| "none".to_string(), |p| p.to_string())
}

impl Engine {
    /// Creates a session with default options and no game.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option for the next game.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<(), SessionError> {
        let config = &mut self.config;
        match name {
            "TicketPrice" => config.ticket_price = parse_value(name, value)?,
            "SalesClose" => config.sales_close = parse_value(name, value)?,
            "StartTime" => config.start_time = parse_value(name, value)?,
            "TurnTimeout" => config.turn_timeout = parse_value(name, value)?,
            "Capacity" => config.capacity = parse_value(name, value)?,
            "WhitelistedTickets" => config.whitelisted_tickets = parse_value(name, value)?,
            "SkipForfeitAfter" => {
                config.skip_forfeit_after = match value {
                    None | Some("none") => None,
                    Some(_) => Some(parse_value(name, value)?),
                }
            }
            other => return Err(SessionError::UnknownOption(other.to_string())),
        }
        Ok(())
    }

    /// Applies one command, writing its reply. Only output failures are
    /// returned; rejected commands are reported as `error` lines.
    pub fn handle<W: Write>(&mut self, cmd: Command, out: &mut W) -> io::Result<()> {
        match self.dispatch(cmd, out) {
            Ok(()) => {}
            Err(SessionError::Io(e)) => return Err(e),
            Err(e) => writeln!(out, "error {}", e)?,
        }
        out.flush()
    }

    fn dispatch<W: Write>(&mut self, cmd: Command, out: &mut W) -> Result<(), SessionError> {
        let now = self.now;
        match cmd {
            Command::IsReady => writeln!(out, "readyok")?,
            Command::Quit => {}

            Command::NewGame { owner } => {
                let state = GameState::new(self.config.clone(), owner.clone())?;
                self.game = Some(state);
                self.ledger = Ledger::new();
                self.entropy = LocalEntropy::new();
                info!(owner = %owner, "new game");
                writeln!(out, "ok newgame {}", owner)?;
            }
            Command::SetOption { name, value } => {
                self.set_option(&name, value.as_deref())?;
                writeln!(out, "ok option {}", name)?;
            }
            Command::Config { json } => {
                self.config = GameConfig::from_json(&json)?;
                writeln!(out, "ok config")?;
            }
            Command::Time { now } => {
                self.now = now;
                writeln!(out, "ok time {}", self.now)?;
            }
            Command::Advance { secs } => {
                self.now = self.now.saturating_add(secs);
                writeln!(out, "ok time {}", self.now)?;
            }

            Command::Whitelist { caller, ids } => {
                let count = ids.len();
                setup::whitelist(game(&mut self.game)?, &caller, ids)?;
                writeln!(out, "ok whitelist {}", count)?;
            }
            Command::Deposit { caller, asset } => {
                let state = game(&mut self.game)?;
                let index = setup::deposit_prize(state, &mut self.ledger, &caller, asset, now)?;
                writeln!(out, "ok deposit {}", index)?;
            }
            Command::Buy { caller, paid } => {
                let state = game(&mut self.game)?;
                let ticket = setup::register_ticket(state, &mut self.ledger, &caller, paid, now)?;
                writeln!(out, "ok ticket {}", ticket)?;
            }
            Command::Request { seed } => {
                let state = game(&mut self.game)?;
                let token = setup::request_order(state, &mut self.entropy, seed, now)?;
                writeln!(out, "ok request {}", token)?;
            }
            Command::Finalize { token, words } => {
                let state = game(&mut self.game)?;
                let token = token
                    .map(RequestToken)
                    .or(state.pending_request)
                    .ok_or(SessionError::NoPendingRequest)?;
                let words = if words.is_empty() {
                    self.entropy.fulfill(token).map_err(GameError::from)?
                } else {
                    words
                };
                setup::finalize_order(state, token, &words, now)?;
                let order: Vec<String> =
                    state.order.as_slice().iter().map(|t| t.to_string()).collect();
                writeln!(out, "ok order {}", order.join(" "))?;
            }

            Command::Claim { caller } => {
                let outcome = turn::claim(game(&mut self.game)?, &caller, now)?;
                self.report_turn(out, "claim", &outcome)?;
            }
            Command::Steal {
                caller,
                target,
                hint,
            } => {
                let outcome = turn::steal(game(&mut self.game)?, &caller, target, hint, now)?;
                self.report_turn(out, "steal", &outcome)?;
            }
            Command::CatchUp { caller, missed } => {
                let outcome = turn::catch_up_skip(game(&mut self.game)?, &caller, missed, now)?;
                self.report_turn(out, "catchup", &outcome)?;
            }
            Command::CatchUpSteal {
                caller,
                missed,
                target,
                hint,
            } => {
                let state = game(&mut self.game)?;
                let outcome = turn::catch_up_steal(state, &caller, missed, target, hint, now)?;
                self.report_turn(out, "catchupsteal", &outcome)?;
            }
            Command::Tick => {
                let state = game(&mut self.game)?;
                let sync = turn::tick(state, now)?;
                write_sync(out, &sync)?;
                writeln!(
                    out,
                    "ok tick turn {} skipped {}",
                    state.current_turn(),
                    state.players_skipped()
                )?;
            }

            Command::Resolve { window } => {
                let state = game(&mut self.game)?;
                let (start, end) = window.unwrap_or((0, state.order.len()));
                let resolution = resolve::resolve_window(state, start, end)?;
                for award in &resolution.awards {
                    writeln!(
                        out,
                        "award {} {} {}",
                        award.slot,
                        award.player,
                        prize_name(award.prize)
                    )?;
                }
                if !resolution.leftover.is_empty() {
                    let leftover: Vec<String> =
                        resolution.leftover.iter().map(|p| p.to_string()).collect();
                    writeln!(out, "leftover {}", leftover.join(" "))?;
                }
                writeln!(out, "ok resolve {}", state.phase.name())?;
            }
            Command::Release { kind, caller } => {
                let state = game(&mut self.game)?;
                match kind {
                    ReleaseKind::Prize => {
                        let asset = payout::release_prize(state, &mut self.ledger, &caller)?;
                        writeln!(out, "ok prize {}", asset)?;
                    }
                    ReleaseKind::Proceeds => {
                        let amount = payout::release_proceeds(state, &mut self.ledger, &caller)?;
                        writeln!(out, "ok proceeds {}", amount)?;
                    }
                    ReleaseKind::Leftovers => {
                        let assets = payout::release_leftovers(state, &mut self.ledger, &caller)?;
                        let names: Vec<String> = assets.iter().map(|a| a.to_string()).collect();
                        writeln!(out, "ok leftovers {}", names.join(" "))?;
                    }
                }
            }
            Command::Reclaim { caller, index } => {
                let state = game(&mut self.game)?;
                let asset = payout::reclaim_deposit(state, &mut self.ledger, &caller, index)?;
                writeln!(out, "ok reclaim {}", asset)?;
            }

            Command::Status => {
                let state = game(&mut self.game)?;
                writeln!(
                    out,
                    "ok status phase {} players {} turn {} skipped {} lastaction {} time {}",
                    state.phase.name(),
                    state.registry.len(),
                    state.current_turn(),
                    state.players_skipped(),
                    state.last_action(),
                    now
                )?;
            }
            Command::Holding { slot } => {
                let state = game(&mut self.game)?;
                if slot >= state.order.len() {
                    return Err(GameError::InvalidSlot(slot).into());
                }
                writeln!(out, "ok holding {} {}", slot, prize_name(state.holding(slot)))?;
            }
            Command::Player { slot } => {
                let state = game(&mut self.game)?;
                let player = state.player_at(slot).ok_or(GameError::InvalidSlot(slot))?;
                writeln!(out, "ok player {} {} ticket {}", slot, player.address, player.number)?;
            }
        }
        Ok(())
    }

    fn report_turn<W: Write>(
        &self,
        out: &mut W,
        verb: &str,
        outcome: &TurnOutcome,
    ) -> Result<(), SessionError> {
        write_sync(out, &outcome.sync)?;
        let skipped = self.game.as_ref().map_or(0, |g| g.players_skipped());
        write!(
            out,
            "ok {} slot {} next {} skipped {}",
            verb, outcome.slot, outcome.next_turn, skipped
        )?;
        if outcome.ready_for_resolution {
            write!(out, " ready")?;
        }
        writeln!(out)?;
        Ok(())
    }
}

fn write_sync<W: Write>(out: &mut W, sync: &ClockSync) -> io::Result<()> {
    for slot in &sync.lapsed {
        writeln!(out, "info lapsed {}", slot)?;
    }
    for slot in &sync.forfeited {
        writeln!(out, "info forfeited {}", slot)?;
    }
    Ok(())
}
