//! Lazy skip detection.
//!
//! There is no timer. Whenever a turn action is attempted, the clock is
//! synchronized first: every whole timeout that has elapsed since the last
//! accepted action lapses the slot under the cursor into the skip debt queue,
//! and, when the game forfeits stale debts, debts older than the grace period
//! are dropped oldest first.

use tracing::info;

use crate::game::{GameState, Phase, SkipDebt, Slot, Timestamp};

/// Changes applied by one clock synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockSync {
    /// Slots whose turn lapsed, in the order they lapsed.
    pub lapsed: Vec<Slot>,
    /// Slots whose skip debt was forfeited, oldest first.
    pub forfeited: Vec<Slot>,
}

impl ClockSync {
    pub fn is_empty(&self) -> bool {
        self.lapsed.is_empty() && self.forfeited.is_empty()
    }
}

/// Brings the cursor and skip debt queue up to date with `now`.
///
/// The result depends only on the state and `now`, so running it again at
/// the same time changes nothing. Does nothing unless the game is active.
pub fn sync_clock(state: &mut GameState, now: Timestamp) -> ClockSync {
    let mut sync = ClockSync::default();
    if state.phase != Phase::Active {
        return sync;
    }

    let elapsed = now.saturating_sub(state.clock.last_action);
    let due = state.config.lapsed_turns(elapsed);
    while state.clock.lapsed < due {
        if state.turns_exhausted() {
            state.clock.lapsed = due;
            break;
        }
        state.clock.lapsed += 1;
        let slot = state.cursor.current;
        let lapsed_at = state
            .clock
            .last_action
            .saturating_add(state.clock.lapsed.saturating_mul(state.config.turn_timeout));
        state.cursor.skipped.push_back(SkipDebt { slot, lapsed_at });
        state.cursor.current += 1;
        info!(slot, lapsed_at, skipped = state.cursor.players_skipped(), "turn lapsed");
        sync.lapsed.push(slot);
    }

    if let Some(grace) = state.config.skip_forfeit_after {
        while let Some(debt) = state.cursor.next_debt() {
            if now.saturating_sub(debt.lapsed_at) <= grace {
                break;
            }
            state.cursor.skipped.pop_front();
            state.history.forfeit(debt.slot);
            info!(slot = debt.slot, lapsed_at = debt.lapsed_at, "skip debt forfeited");
            sync.forfeited.push(debt.slot);
        }
    }
    sync
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Address, GameConfig, SlotLink, TurnOrder};

    const T: u64 = 100;

    fn active_game(players: u32, forfeit: Option<u64>) -> GameState {
        let config = GameConfig {
            turn_timeout: T,
            skip_forfeit_after: forfeit,
            ..GameConfig::default()
        };
        let mut state = GameState::new(config, Address::new("0xowner")).unwrap();
        for i in 1..=players {
            state.registry.register(Address::new(format!("0x{}", i))).unwrap();
        }
        state.install_order(TurnOrder::from_slots((1..=players).collect()), 1_000);
        state
    }

    #[test]
    fn nothing_lapses_within_timeout() {
        let mut state = active_game(3, None);
        assert!(sync_clock(&mut state, 1_000 + T).is_empty());
        assert_eq!(state.current_turn(), 0);
        assert_eq!(state.players_skipped(), 0);
    }

    #[test]
    fn one_timeout_lapses_one_turn() {
        let mut state = active_game(3, None);
        let sync = sync_clock(&mut state, 1_000 + T + 1);
        assert_eq!(sync.lapsed, vec![0]);
        assert_eq!(state.current_turn(), 1);
        assert_eq!(state.players_skipped(), 1);
        assert_eq!(
            state.cursor.next_debt(),
            Some(SkipDebt {
                slot: 0,
                lapsed_at: 1_000 + T,
            })
        );
    }

    #[test]
    fn sync_is_idempotent() {
        let mut state = active_game(3, None);
        sync_clock(&mut state, 1_000 + T + 1);
        assert!(sync_clock(&mut state, 1_000 + T + 1).is_empty());
        assert!(sync_clock(&mut state, 1_000 + 2 * T).is_empty());
        assert_eq!(state.players_skipped(), 1);
    }

    #[test]
    fn consecutive_lapses_queue_in_order() {
        let mut state = active_game(3, None);
        let sync = sync_clock(&mut state, 1_000 + 2 * T + 1);
        assert_eq!(sync.lapsed, vec![0, 1]);
        let slots: Vec<Slot> = state.cursor.skipped.iter().map(|d| d.slot).collect();
        assert_eq!(slots, vec![0, 1]);
        assert_eq!(state.current_turn(), 2);
    }

    #[test]
    fn lapses_stop_at_the_last_slot() {
        let mut state = active_game(2, None);
        let sync = sync_clock(&mut state, u64::MAX);
        assert_eq!(sync.lapsed, vec![0, 1]);
        assert!(state.turns_exhausted());
        assert!(sync_clock(&mut state, u64::MAX).is_empty());
    }

    #[test]
    fn debts_are_kept_without_forfeiture() {
        let mut state = active_game(1, None);
        sync_clock(&mut state, 1_000 + T + 1);
        assert!(sync_clock(&mut state, 1_000_000).forfeited.is_empty());
        assert_eq!(state.players_skipped(), 1);
    }

    #[test]
    fn stale_debts_are_forfeited_oldest_first() {
        let mut state = active_game(3, Some(150));
        // Slot 0 lapses at 1100, slot 1 at 1200.
        let sync = sync_clock(&mut state, 1_201);
        assert_eq!(sync.lapsed, vec![0, 1]);
        assert!(sync.forfeited.is_empty());

        assert!(sync_clock(&mut state, 1_250).is_empty());
        let sync = sync_clock(&mut state, 1_251);
        assert_eq!(sync.forfeited, vec![0]);
        assert_eq!(state.history.link(0), SlotLink::Forfeited);
        assert_eq!(state.players_skipped(), 1);
        assert_eq!(state.cursor.next_debt().map(|d| d.slot), Some(1));
    }

    #[test]
    fn inactive_game_never_lapses() {
        let config = GameConfig {
            turn_timeout: T,
            ..GameConfig::default()
        };
        let mut state = GameState::new(config, Address::new("0xowner")).unwrap();
        assert!(sync_clock(&mut state, 1_000_000).is_empty());
    }
}
