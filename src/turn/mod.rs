//! Turn engine.
//!
//! The state machine deciding whose turn it is. Turns run strictly left to
//! right through the turn order. Each action first synchronizes the clock
//! (see `clock`), then validates, then mutates. A turn that lapses becomes a
//! skip debt; while any debt is outstanding, the only accepted action is
//! the catch-up by the owner of the oldest debt.

pub mod clock;
pub mod play;

use tracing::info;

use crate::error::{rejected, GameError};
use crate::game::{Address, GameState, Phase, Slot, Timestamp};

pub use clock::{sync_clock, ClockSync};
pub use play::Play;

/// Result of an accepted turn action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Slot that acted.
    pub slot: Slot,
    pub play: Play,
    /// Lapses and forfeits applied just before the action.
    pub sync: ClockSync,
    /// Cursor after the action.
    pub next_turn: Slot,
    pub ready_for_resolution: bool,
}

/// Claims a fresh prize on the caller's turn.
pub fn claim(
    state: &mut GameState,
    caller: &Address,
    now: Timestamp,
) -> Result<TurnOutcome, GameError> {
    play_turn(state, caller, Play::Claim, None, now).map_err(|e| rejected("claim", caller, e))
}

/// Takes the prize held by `target` on the caller's turn.
///
/// `prize_hint`, when given, is the prize the caller expects `target` to
/// hold; the steal is rejected if the target's holding has changed.
pub fn steal(
    state: &mut GameState,
    caller: &Address,
    target: Slot,
    prize_hint: Option<Slot>,
    now: Timestamp,
) -> Result<TurnOutcome, GameError> {
    play_turn(state, caller, Play::Steal { target }, prize_hint, now)
        .map_err(|e| rejected("steal", caller, e))
}

/// Repays the oldest skip debt by claiming. `missed_slot` must be the slot
/// of that debt and the caller its player.
pub fn catch_up_skip(
    state: &mut GameState,
    caller: &Address,
    missed_slot: Slot,
    now: Timestamp,
) -> Result<TurnOutcome, GameError> {
    catch_up(state, caller, missed_slot, Play::Claim, None, now)
        .map_err(|e| rejected("catch_up_skip", caller, e))
}

/// Repays the oldest skip debt by stealing from `target`.
pub fn catch_up_steal(
    state: &mut GameState,
    caller: &Address,
    missed_slot: Slot,
    target: Slot,
    prize_hint: Option<Slot>,
    now: Timestamp,
) -> Result<TurnOutcome, GameError> {
    catch_up(state, caller, missed_slot, Play::Steal { target }, prize_hint, now)
        .map_err(|e| rejected("catch_up_steal", caller, e))
}

/// Synchronizes the clock without acting.
pub fn tick(state: &mut GameState, now: Timestamp) -> Result<ClockSync, GameError> {
    state.require_phase(Phase::Active)?;
    Ok(sync_clock(state, now))
}

fn play_turn(
    state: &mut GameState,
    caller: &Address,
    play: Play,
    prize_hint: Option<Slot>,
    now: Timestamp,
) -> Result<TurnOutcome, GameError> {
    state.require_phase(Phase::Active)?;
    let sync = sync_clock(state, now);

    if state.cursor.players_skipped() != 0 {
        return Err(GameError::SkipDebtOutstanding);
    }
    if state.turns_exhausted() {
        return Err(GameError::GameFinished);
    }
    let slot = state.cursor.current;
    if state.slot_of(caller) != Some(slot) {
        return Err(GameError::NotYourTurn);
    }
    if let Play::Steal { target } = play {
        play::check_target(state, slot, target, prize_hint)?;
    }

    play::apply(state, slot, play);
    state.cursor.current += 1;
    state.clock.touch(now);
    info!(player = %caller, slot, play = ?play, next = state.cursor.current, "turn played");
    Ok(outcome(state, slot, play, sync))
}

fn catch_up(
    state: &mut GameState,
    caller: &Address,
    missed_slot: Slot,
    play: Play,
    prize_hint: Option<Slot>,
    now: Timestamp,
) -> Result<TurnOutcome, GameError> {
    state.require_phase(Phase::Active)?;
    let sync = sync_clock(state, now);

    let debt = state.cursor.next_debt().ok_or(GameError::NotYourTurn)?;
    if debt.slot != missed_slot || state.slot_of(caller) != Some(debt.slot) {
        return Err(GameError::NotYourTurn);
    }
    if let Play::Steal { target } = play {
        play::check_target(state, debt.slot, target, prize_hint)?;
    }

    state.cursor.skipped.pop_front();
    play::apply(state, debt.slot, play);
    state.clock.touch(now);
    info!(
        player = %caller,
        slot = debt.slot,
        play = ?play,
        skipped = state.cursor.players_skipped(),
        "missed turn caught up"
    );
    Ok(outcome(state, debt.slot, play, sync))
}

fn outcome(state: &GameState, slot: Slot, play: Play, sync: ClockSync) -> TurnOutcome {
    TurnOutcome {
        slot,
        play,
        sync,
        next_turn: state.cursor.current,
        ready_for_resolution: state.ready_for_resolution(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::game::{GameConfig, TurnOrder};

    const T: u64 = 10_800;
    const START: u64 = 5_000;

    fn addr(i: u32) -> Address {
        Address::new(format!("0x{}", i))
    }

    /// Active game where ticket `i` (address `0x{i}`) plays at slot `i - 1`.
    fn active_game(players: u32) -> GameState {
        let mut state = GameState::new(GameConfig::default(), Address::new("0xowner")).unwrap();
        for i in 1..=players {
            state.registry.register(addr(i)).unwrap();
        }
        state.install_order(TurnOrder::from_slots((1..=players).collect()), START);
        state
    }

    #[test]
    fn claim_advances_turn() {
        let mut state = active_game(2);
        let out = claim(&mut state, &addr(1), START + 1).unwrap();
        assert_eq!(out.slot, 0);
        assert_eq!(out.next_turn, 1);
        assert!(!out.ready_for_resolution);
        assert_eq!(state.current_turn(), 1);
        assert_eq!(state.last_action(), START + 1);
        assert_eq!(state.holding(0), Some(0));
    }

    #[test]
    fn forbids_claim_if_not_your_turn() {
        let mut state = active_game(2);
        let err = claim(&mut state, &addr(2), START + 1).unwrap_err();
        assert_eq!(err.to_string(), "not your turn");
        let err = claim(&mut state, &Address::new("0xstranger"), START + 1).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        assert_eq!(state.current_turn(), 0);
        assert_eq!(state.last_action(), START);
    }

    #[test]
    fn forbids_steal_if_not_your_turn() {
        let mut state = active_game(3);
        claim(&mut state, &addr(1), START + 1).unwrap();
        let before = state.clone();

        let err = steal(&mut state, &addr(3), 0, Some(0), START + 2).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        assert_eq!(err.kind(), ErrorKind::TurnViolation);
        let err = steal(&mut state, &addr(1), 0, None, START + 2).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        // Without skip debt a catch-up is never anyone's turn.
        let err = catch_up_steal(&mut state, &addr(2), 1, 0, None, START + 2).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);

        assert_eq!(state.current_turn(), before.current_turn());
        assert_eq!(state.last_action(), before.last_action());
        assert_eq!(state.swaps, before.swaps);
        assert_eq!(state.history, before.history);
        assert_eq!(state.guard.last_thief(0), None);
    }

    #[test]
    fn actions_require_active_phase() {
        let mut state = GameState::new(GameConfig::default(), Address::new("0xowner")).unwrap();
        state.registry.register(addr(1)).unwrap();
        let err = claim(&mut state, &addr(1), 0).unwrap_err();
        assert_eq!(
            err,
            GameError::WrongPhase {
                actual: Phase::Registration,
            }
        );
        assert_eq!(err.kind(), ErrorKind::PhaseViolation);
    }

    #[test]
    fn last_turn_makes_game_ready() {
        let mut state = active_game(2);
        claim(&mut state, &addr(1), START + 1).unwrap();
        let out = steal(&mut state, &addr(2), 0, Some(0), START + 2).unwrap();
        assert!(out.ready_for_resolution);
        assert_eq!(claim(&mut state, &addr(1), START + 3), Err(GameError::GameFinished));
    }

    #[test]
    fn steal_swaps_holdings() {
        let mut state = active_game(3);
        claim(&mut state, &addr(1), START + 1).unwrap();
        claim(&mut state, &addr(2), START + 2).unwrap();
        steal(&mut state, &addr(3), 0, None, START + 3).unwrap();
        assert_eq!(state.holding(0), Some(2));
        assert_eq!(state.holding(1), Some(1));
        assert_eq!(state.holding(2), Some(0));
        assert!(state.swaps.is_bijective());
    }

    #[test]
    fn steal_rejections_leave_state_unchanged() {
        let mut state = active_game(3);
        claim(&mut state, &addr(1), START + 1).unwrap();
        let before = state.clone();

        assert_eq!(
            steal(&mut state, &addr(2), 2, None, START + 2),
            Err(GameError::TargetNotClaimed(2))
        );
        assert_eq!(steal(&mut state, &addr(2), 7, None, START + 2), Err(GameError::InvalidSlot(7)));
        assert!(matches!(
            steal(&mut state, &addr(2), 0, Some(1), START + 2),
            Err(GameError::StalePrizeHint { .. })
        ));
        assert_eq!(state.cursor, before.cursor);
        assert_eq!(state.swaps, before.swaps);
        assert_eq!(state.clock, before.clock);
    }

    #[test]
    fn two_steals_on_one_slot() {
        let mut state = active_game(3);
        claim(&mut state, &addr(1), START + 1).unwrap();
        steal(&mut state, &addr(2), 0, Some(0), START + 2).unwrap();
        // Slot 0 now holds prize 1; slot 2 takes it.
        steal(&mut state, &addr(3), 0, Some(1), START + 3).unwrap();
        assert_eq!(state.holding(0), Some(2));
        assert_eq!(state.holding(1), Some(0));
        assert_eq!(state.holding(2), Some(1));
        assert_eq!(state.guard.last_thief(0), Some(2));
    }

    #[test]
    fn steal_back_from_own_thief_is_rejected() {
        let mut state = active_game(3);
        claim(&mut state, &addr(1), START + 1).unwrap();
        // Slot 1's turn is open; slot 0 is recorded as having taken from it.
        state.guard.record(1, 0);
        let err = steal(&mut state, &addr(2), 0, None, START + 2).unwrap_err();
        assert_eq!(err.to_string(), "cant steal from them again");
        assert_eq!(err.kind(), ErrorKind::StealViolation);
        // Claiming is still fine.
        claim(&mut state, &addr(2), START + 3).unwrap();
    }

    // === Missed turns ===

    #[test]
    fn missed_turn_blocks_until_caught_up() {
        let mut state = active_game(3);
        claim(&mut state, &addr(1), START + 1).unwrap();

        // Player 2 misses their turn; player 3 tries to act.
        let late = START + 1 + T + 1;
        let err = claim(&mut state, &addr(3), late).unwrap_err();
        assert_eq!(err.to_string(), "playersSkipped not zero");
        assert_eq!(state.players_skipped(), 1);
        assert_eq!(state.current_turn(), 2);

        // Only the missed player may catch up, and only for their own slot.
        assert_eq!(catch_up_skip(&mut state, &addr(3), 1, late), Err(GameError::NotYourTurn));
        assert_eq!(catch_up_skip(&mut state, &addr(2), 2, late), Err(GameError::NotYourTurn));
        assert_eq!(
            steal(&mut state, &addr(3), 0, None, late),
            Err(GameError::SkipDebtOutstanding)
        );

        let out = catch_up_skip(&mut state, &addr(2), 1, late + 5).unwrap();
        assert_eq!(out.slot, 1);
        assert_eq!(state.players_skipped(), 0);
        assert_eq!(state.current_turn(), 2);
        assert_eq!(state.last_action(), late + 5);
        assert_eq!(state.holding(1), Some(1));

        let out = claim(&mut state, &addr(3), late + 6).unwrap();
        assert!(out.ready_for_resolution);
    }

    #[test]
    fn exact_timeout_is_not_a_miss() {
        let mut state = active_game(2);
        claim(&mut state, &addr(1), START).unwrap();
        claim(&mut state, &addr(2), START + T).unwrap();
        assert_eq!(state.players_skipped(), 0);
    }

    #[test]
    fn debts_are_repaid_in_order() {
        let mut state = active_game(4);
        let late = START + 2 * T + 1;
        let out = tick(&mut state, late).unwrap();
        assert_eq!(out.lapsed, vec![0, 1]);

        assert_eq!(catch_up_skip(&mut state, &addr(2), 1, late), Err(GameError::NotYourTurn));
        catch_up_skip(&mut state, &addr(1), 0, late).unwrap();
        assert_eq!(state.players_skipped(), 1);
        assert_eq!(claim(&mut state, &addr(3), late), Err(GameError::SkipDebtOutstanding));
        catch_up_steal(&mut state, &addr(2), 1, 0, Some(0), late + 1).unwrap();
        assert_eq!(state.holding(1), Some(0));
        assert_eq!(state.holding(0), Some(1));

        claim(&mut state, &addr(3), late + 2).unwrap();
        claim(&mut state, &addr(4), late + 3).unwrap();
        assert!(state.ready_for_resolution());
    }

    #[test]
    fn catch_up_without_debt_is_not_your_turn() {
        let mut state = active_game(2);
        assert_eq!(catch_up_skip(&mut state, &addr(1), 0, START), Err(GameError::NotYourTurn));
    }

    #[test]
    fn catch_up_steal_validates_target() {
        let mut state = active_game(2);
        tick(&mut state, START + T + 1).unwrap();
        assert_eq!(
            catch_up_steal(&mut state, &addr(1), 0, 1, None, START + T + 2),
            Err(GameError::TargetNotClaimed(1))
        );
        assert_eq!(state.players_skipped(), 1);
    }

    #[test]
    fn last_slot_debt_keeps_game_open() {
        let mut state = active_game(2);
        claim(&mut state, &addr(1), START + 1).unwrap();
        tick(&mut state, START + 1 + T + 1).unwrap();
        assert!(state.turns_exhausted());
        assert!(!state.ready_for_resolution());
        let out = catch_up_skip(&mut state, &addr(2), 1, START + 1 + T + 2).unwrap();
        assert!(out.ready_for_resolution);
    }

    #[test]
    fn forfeited_debt_unblocks_the_game() {
        let config = GameConfig {
            skip_forfeit_after: Some(T / 2),
            ..GameConfig::default()
        };
        let mut state = GameState::new(config, Address::new("0xowner")).unwrap();
        for i in 1..=3 {
            state.registry.register(addr(i)).unwrap();
        }
        state.install_order(TurnOrder::from_slots(vec![1, 2, 3]), START);

        claim(&mut state, &addr(1), START).unwrap();
        // Slot 1 lapses at START + T and is still owed within the grace period.
        let err = claim(&mut state, &addr(3), START + T + 1).unwrap_err();
        assert_eq!(err, GameError::SkipDebtOutstanding);
        assert!(claim(&mut state, &addr(3), START + T + T / 2).is_err());

        let when = START + T + T / 2 + 1;
        let out = claim(&mut state, &addr(3), when).unwrap();
        assert!(out.sync.lapsed.is_empty());
        assert_eq!(out.sync.forfeited, vec![1]);
        assert!(out.ready_for_resolution);
        assert_eq!(catch_up_skip(&mut state, &addr(2), 1, when), Err(GameError::NotYourTurn));
    }
}
