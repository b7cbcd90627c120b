//! Randomized game simulation.
//!
//! Plays full games with random players: each turn is a claim or a steal,
//! some players idle past the timeout and later catch up, and wrong callers
//! try to act out of turn. Invariants are checked after every accepted action
//! and the resolution is compared with the live holdings. Records are written
//! as JSONL.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::collab::{Ledger, LocalEntropy};
use crate::error::GameError;
use crate::game::{Address, AssetRef, GameConfig, GameState, Slot, SlotLink, Timestamp};
use crate::resolve::{resolve_window, Award};
use crate::turn::{self, TurnOutcome};
use crate::{payout, setup};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of games to play.
    pub num_games: usize,
    /// Tickets sold per game.
    pub players: usize,
    /// Chance a turn is a steal when a target is available.
    pub steal_rate: f64,
    /// Chance the acting player idles past the turn timeout first.
    pub idle_rate: f64,
    /// Chance a wrong caller tries to act before each turn.
    pub intrusion_rate: f64,
    pub game: GameConfig,
    /// Number of parallel threads for concurrent games.
    pub threads: usize,
    /// Random seed (0 = use entropy).
    pub seed: u64,
    /// Suppress per-game progress output.
    pub quiet: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            num_games: 10,
            players: 12,
            steal_rate: 0.5,
            idle_rate: 0.1,
            intrusion_rate: 0.2,
            game: GameConfig::default(),
            threads: 4,
            seed: 0,
            quiet: false,
        }
    }
}

/// Counts of what happened during one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub claims: usize,
    pub steals: usize,
    pub catch_ups: usize,
    pub lapses: usize,
    pub forfeits: usize,
    /// Out-of-turn moves correctly rejected.
    pub rejected: usize,
}

/// A complete simulated game record.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    /// Sequential game ID.
    pub game_id: usize,
    pub players: usize,
    /// Ticket number at each slot.
    pub order: Vec<u32>,
    pub counts: ActionCounts,
    pub awards: Vec<Award>,
    pub leftover: Vec<Slot>,
    /// Chain links followed by the resolver.
    pub resolver_steps: u64,
    /// Game clock when the last turn was played.
    pub finished_at: Timestamp,
    /// Invariant violations; empty for a correct engine.
    pub violations: Vec<String>,
}

impl GameRecord {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks the structural invariants of a game and describes each violation.
pub fn check_invariants(state: &GameState) -> Vec<String> {
    let mut violations = Vec::new();
    if !state.swaps.is_bijective() {
        violations.push("swap table is not a bijection".to_string());
    }
    if !state.order.is_empty() && !state.order.is_permutation() {
        violations.push("turn order is not a permutation".to_string());
    }
    for (i, player) in state.registry.players().iter().enumerate() {
        if player.number as usize != i + 1 {
            violations.push(format!("ticket {} stored at index {}", player.number, i));
        }
    }
    if state.cursor.current > state.order.len() {
        violations.push(format!(
            "cursor {} past {} slots",
            state.cursor.current,
            state.order.len()
        ));
    }
    let mut prev: Option<Slot> = None;
    for debt in &state.cursor.skipped {
        if debt.slot >= state.cursor.current {
            violations.push(format!("debt for slot {} at or after cursor", debt.slot));
        }
        if prev.is_some_and(|p| p >= debt.slot) {
            violations.push(format!("debt for slot {} out of order", debt.slot));
        }
        if state.history.link(debt.slot) != SlotLink::Open {
            violations.push(format!("debt for slot {} that already acted", debt.slot));
        }
        prev = Some(debt.slot);
    }
    violations
}

/// Picks a slot the caller may take from, if any.
fn pick_target(state: &GameState, caller_slot: Slot, rng: &mut SmallRng) -> Option<Slot> {
    let targets: Vec<Slot> = (0..state.order.len())
        .filter(|&s| state.swaps.is_claimed(s) && !state.guard.forbids(caller_slot, s))
        .collect();
    if targets.is_empty() {
        None
    } else {
        Some(targets[rng.gen_range(0..targets.len())])
    }
}

/// Has the player at `other` try to act on `slot`'s turn and checks that
/// the exact expected error comes back.
fn intrude_turn(
    state: &mut GameState,
    intruder: &Address,
    other: Slot,
    slot: Slot,
    now: Timestamp,
    rng: &mut SmallRng,
    record: &mut GameRecord,
) {
    let expected = if state.players_skipped() > 0 {
        GameError::SkipDebtOutstanding
    } else {
        GameError::NotYourTurn
    };
    let result = if rng.gen_bool(0.5) {
        turn::claim(state, intruder, now)
    } else {
        let target = rng.gen_range(0..state.order.len());
        turn::steal(state, intruder, target, None, now)
    };
    match result {
        Err(e) if e == expected => record.counts.rejected += 1,
        Err(e) => record.violations.push(format!(
            "slot {} acting on slot {}'s turn got \"{}\", expected \"{}\"",
            other, slot, e, expected
        )),
        Ok(_) => record
            .violations
            .push(format!("slot {} acted on slot {}'s turn", other, slot)),
    }
}

fn address_at(state: &GameState, slot: Slot) -> Option<Address> {
    state.player_at(slot).map(|p| p.address.clone())
}

/// Plays a single game from ticket sales to payouts.
pub fn play_game(config: &SimConfig, game_id: usize, rng: &mut SmallRng) -> GameRecord {
    let owner = Address::new("0xowner");
    let mut record = GameRecord {
        game_id,
        players: config.players,
        order: Vec::new(),
        counts: ActionCounts::default(),
        awards: Vec::new(),
        leftover: Vec::new(),
        resolver_steps: 0,
        finished_at: 0,
        violations: Vec::new(),
    };
    if let Err(e) = run_game(config, &owner, rng, &mut record) {
        record.violations.push(format!("unexpected rejection: {}", e));
    }
    record
}

fn run_game(
    config: &SimConfig,
    owner: &Address,
    rng: &mut SmallRng,
    record: &mut GameRecord,
) -> Result<(), GameError> {
    let mut state = match GameState::new(config.game.clone(), owner.clone()) {
        Ok(s) => s,
        Err(e) => {
            record.violations.push(format!("invalid game config: {}", e));
            return Ok(());
        }
    };
    let mut ledger = Ledger::new();
    let mut entropy = LocalEntropy::new();
    let timeout = state.config.turn_timeout;

    // === Setup ===
    setup::whitelist(&mut state, owner, [owner.clone()])?;
    let price = state.ticket_price();
    for i in 0..config.players {
        let player = Address::new(format!("0x{:04x}", i + 1));
        setup::register_ticket(&mut state, &mut ledger, &player, price, 0)?;
        setup::deposit_prize(&mut state, &mut ledger, owner, AssetRef::new("sim", i as u64), 0)?;
    }
    let mut now = state.start_time();
    let token = setup::request_order(&mut state, &mut entropy, rng.gen(), now)?;
    let words = entropy.fulfill(token)?;
    setup::finalize_order(&mut state, token, &words, now)?;
    record.order = state.order.as_slice().to_vec();

    // === Turns ===
    let max_rounds = 4 * config.players + 4;
    for _ in 0..max_rounds {
        if state.ready_for_resolution() {
            break;
        }
        if rng.gen_bool(config.idle_rate) {
            now += timeout + 1 + rng.gen_range(0..timeout);
        } else {
            now += rng.gen_range(1..=timeout);
        }
        // Settle the clock so the intrusion and the move below see the same queue.
        let sync = turn::tick(&mut state, now)?;
        record.counts.lapses += sync.lapsed.len();
        record.counts.forfeits += sync.forfeited.len();
        if state.ready_for_resolution() {
            break;
        }

        let debt = state.cursor.next_debt();
        let slot = match debt {
            Some(d) => d.slot,
            None => state.current_turn(),
        };
        let Some(caller) = address_at(&state, slot) else {
            record.violations.push(format!("no player at slot {}", slot));
            break;
        };

        if config.players > 1 && rng.gen_bool(config.intrusion_rate) {
            let other = (slot + rng.gen_range(1..config.players)) % config.players;
            if let Some(intruder) = address_at(&state, other) {
                intrude_turn(&mut state, &intruder, other, slot, now, rng, record);
            }
        }

        let target = if rng.gen_bool(config.steal_rate) {
            pick_target(&state, slot, rng)
        } else {
            None
        };
        let hint = target.and_then(|t| state.holding(t));
        let outcome: TurnOutcome = match (debt, target) {
            (Some(_), None) => turn::catch_up_skip(&mut state, &caller, slot, now)?,
            (Some(_), Some(t)) => turn::catch_up_steal(&mut state, &caller, slot, t, hint, now)?,
            (None, None) => turn::claim(&mut state, &caller, now)?,
            (None, Some(t)) => turn::steal(&mut state, &caller, t, hint, now)?,
        };
        record.counts.lapses += outcome.sync.lapsed.len();
        record.counts.forfeits += outcome.sync.forfeited.len();
        match (debt.is_some(), target.is_some()) {
            (true, _) => record.counts.catch_ups += 1,
            (false, true) => record.counts.steals += 1,
            (false, false) => record.counts.claims += 1,
        }
        record.violations.extend(check_invariants(&state));
    }
    record.finished_at = now;
    if !state.ready_for_resolution() {
        record.violations.push(format!("game not finished after {} rounds", max_rounds));
        return Ok(());
    }

    // === Resolution ===
    let n = state.order.len();
    let split = rng.gen_range(0..=n);
    let tail = resolve_window(&mut state, split, n)?;
    let head = resolve_window(&mut state, 0, split)?;
    record.awards = head.awards;
    record.awards.extend(tail.awards);
    record.leftover = tail.leftover;
    record.resolver_steps = state.resolution.resolver().steps();
    for award in &record.awards {
        if award.prize != state.holding(award.slot) {
            record.violations.push(format!(
                "slot {} resolved to {:?} but holds {:?}",
                award.slot,
                award.prize,
                state.holding(award.slot)
            ));
        }
    }
    if record.resolver_steps > 4 * n as u64 + 4 {
        record.violations.push(format!(
            "resolver took {} steps for {} slots",
            record.resolver_steps, n
        ));
    }

    // === Payouts ===
    for award in &record.awards {
        if award.prize.is_some() {
            payout::release_prize(&mut state, &mut ledger, &award.player)?;
        }
    }
    if state.proceeds > 0 {
        payout::release_proceeds(&mut state, &mut ledger, owner)?;
    }
    if !record.leftover.is_empty() {
        payout::release_leftovers(&mut state, &mut ledger, owner)?;
    }
    if !ledger.assets.is_empty() {
        record.violations.push(format!("{} assets left in custody", ledger.assets.len()));
    }
    debug!(game_id = record.game_id, steps = record.resolver_steps, "game finished");
    Ok(())
}

/// Runs a simulation, producing one record per game.
///
/// When `config.threads > 1`, games are played concurrently using rayon.
pub fn run_games(config: &SimConfig) -> Vec<GameRecord> {
    let mut games = Vec::with_capacity(config.num_games);
    run_games_with_callback(config, |game| {
        games.push(game);
    });
    games.sort_by_key(|g| g.game_id);
    games
}

/// Runs a simulation, calling `on_game` with each completed record.
pub fn run_games_with_callback<F>(config: &SimConfig, on_game: F)
where
    F: FnMut(GameRecord) + Send,
{
    if config.threads > 1 {
        run_parallel(config, on_game);
    } else {
        run_sequential(config, on_game);
    }
}

fn game_rng(config: &SimConfig, i: usize) -> SmallRng {
    if config.seed != 0 {
        SmallRng::seed_from_u64(config.seed.wrapping_add(i as u64))
    } else {
        SmallRng::from_entropy()
    }
}

fn log_game(config: &SimConfig, n: usize, game: &GameRecord) {
    if config.quiet {
        return;
    }
    info!(
        game = n,
        of = config.num_games,
        steals = game.counts.steals,
        lapses = game.counts.lapses,
        violations = game.violations.len(),
        "game complete"
    );
}

fn run_sequential<F>(config: &SimConfig, mut on_game: F)
where
    F: FnMut(GameRecord),
{
    for i in 0..config.num_games {
        let mut rng = game_rng(config, i);
        let game = play_game(config, i, &mut rng);
        log_game(config, i + 1, &game);
        on_game(game);
    }
}

/// Plays games concurrently on a rayon pool, delivering records to the
/// callback on the calling thread through a channel.
fn run_parallel<F>(config: &SimConfig, mut on_game: F)
where
    F: FnMut(GameRecord) + Send,
{
    use rayon::prelude::*;
    use std::sync::mpsc;

    let completed = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<GameRecord>();

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(config.threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "thread pool unavailable, playing sequentially");
            return run_sequential(config, on_game);
        }
    };

    std::thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                (0..config.num_games).into_par_iter().for_each_with(tx, |tx, i| {
                    let mut rng = game_rng(config, i);
                    let game = play_game(config, i, &mut rng);
                    let n = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    log_game(config, n, &game);
                    let _ = tx.send(game);
                });
            });
        });

        for game in rx {
            on_game(game);
        }
    });
}

/// Writes game records as JSONL (one JSON object per game, one per line).
pub fn write_jsonl<W: Write>(games: &[GameRecord], out: &mut W) -> std::io::Result<()> {
    for game in games {
        serde_json::to_writer(&mut *out, game)?;
        writeln!(out)?;
    }
    Ok(())
}
