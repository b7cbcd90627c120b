//! Prize resolution.
//!
//! Converts the steal history of a finished game into final ownership. The
//! game may be resolved in windows of slots, in any order; it becomes
//! `Resolved` once every slot has been covered by some window.

pub mod chain;

use serde::Serialize;
use tracing::info;

use crate::error::GameError;
use crate::game::{Address, GameState, Phase, Slot};

pub use chain::Resolver;

/// Final prize of one turn slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Award {
    pub slot: Slot,
    pub player: Address,
    /// `None` when the slot forfeited its turn.
    pub prize: Option<Slot>,
}

/// Result of resolving one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// One award per slot in the window, ascending.
    pub awards: Vec<Award>,
    /// Prizes nobody holds, ascending. Only filled by the window that ends at
    /// the last slot.
    pub leftover: Vec<Slot>,
}

/// Which slots have been resolved so far, plus the memoized resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolutionProgress {
    covered: Vec<bool>,
    remaining: usize,
    resolver: Resolver,
}

impl ResolutionProgress {
    pub fn new(slots: usize) -> Self {
        ResolutionProgress {
            covered: vec![false; slots],
            remaining: slots,
            resolver: Resolver::new(slots),
        }
    }

    /// Slots not yet covered by any window.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_covered(&self, slot: Slot) -> bool {
        self.covered.get(slot).copied().unwrap_or(false)
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn cover(&mut self, slot: Slot) {
        if !self.covered[slot] {
            self.covered[slot] = true;
            self.remaining -= 1;
        }
    }
}

/// Final prize of `slot`, or `None` if it holds nothing.
pub fn final_prize(state: &mut GameState, slot: Slot) -> Option<Slot> {
    state
        .resolution
        .resolver
        .final_prize(&state.history, &state.guard, slot)
}

/// Prize slots nobody holds once the game is over.
///
/// Prize slots run over every turn slot and every frozen prize.
pub fn leftover_prizes(state: &mut GameState) -> Vec<Slot> {
    let slots = state.order.len();
    let universe = slots.max(state.prizes.len());
    let mut held = vec![false; universe];
    for slot in 0..slots {
        if let Some(prize) = final_prize(state, slot) {
            held[prize] = true;
        }
    }
    (0..universe).filter(|&p| !held[p]).collect()
}

/// Resolves the final prize of every slot in `start..end`.
///
/// Requires every turn to have been played, caught up, or forfeited.
pub fn resolve_window(
    state: &mut GameState,
    start: Slot,
    end: Slot,
) -> Result<Resolution, GameError> {
    match state.phase {
        Phase::Resolved => {}
        Phase::Active if state.ready_for_resolution() => {}
        Phase::Active => return Err(GameError::TurnsRemaining),
        actual => return Err(GameError::WrongPhase { actual }),
    }
    let slots = state.order.len();
    if start > end || end > slots {
        return Err(GameError::InvalidWindow { start, end });
    }

    let mut awards = Vec::with_capacity(end - start);
    for slot in start..end {
        let prize = final_prize(state, slot);
        let player = state
            .player_at(slot)
            .map(|p| p.address.clone())
            .ok_or(GameError::InvalidSlot(slot))?;
        awards.push(Award {
            slot,
            player,
            prize,
        });
    }
    let leftover = if end == slots {
        leftover_prizes(state)
    } else {
        Vec::new()
    };

    for slot in start..end {
        state.resolution.cover(slot);
    }
    info!(
        start,
        end,
        remaining = state.resolution.remaining(),
        steps = state.resolution.resolver.steps(),
        "window resolved"
    );
    if state.phase == Phase::Active && state.resolution.remaining() == 0 {
        state.phase = Phase::Resolved;
        info!(slots, "game resolved");
    }
    Ok(Resolution { awards, leftover })
}
