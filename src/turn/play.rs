//! Claim and steal primitives.
//!
//! These apply a validated play to the swap tables. A steal first gives the
//! thief's slot its own fresh prize, then exchanges holdings with the victim,
//! so the victim ends up with the thief's fresh prize.

use crate::error::GameError;
use crate::game::{GameState, Slot};

/// A move made on a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Play {
    /// Keep the slot's own fresh prize.
    Claim,
    /// Take the prize currently held by `target`.
    Steal { target: Slot },
}

/// Checks that `caller_slot` may take from `target`.
///
/// `prize_hint`, when given, must match the prize `target` holds right now.
pub(crate) fn check_target(
    state: &GameState,
    caller_slot: Slot,
    target: Slot,
    prize_hint: Option<Slot>,
) -> Result<(), GameError> {
    if target >= state.order.len() {
        return Err(GameError::InvalidSlot(target));
    }
    let actual = state.swaps.holding(target);
    if actual.is_none() {
        return Err(GameError::TargetNotClaimed(target));
    }
    if state.guard.forbids(caller_slot, target) {
        return Err(GameError::DuplicateSteal);
    }
    if let Some(expected) = prize_hint {
        if actual != Some(expected) {
            return Err(GameError::StalePrizeHint {
                slot: target,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Applies a validated play for `slot`.
pub(crate) fn apply(state: &mut GameState, slot: Slot, play: Play) {
    match play {
        Play::Claim => {
            state.swaps.claim(slot);
            state.history.record_claim(slot);
        }
        Play::Steal { target } => {
            state.swaps.claim(slot);
            state.swaps.swap(slot, target);
            let prior_thief = state.guard.record(target, slot);
            state.history.record_steal(slot, target, prior_thief);
        }
    }
    debug_assert!(state.swaps.is_bijective());
}
