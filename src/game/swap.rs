//! Swap bookkeeping.
//!
//! Three per-slot tables are maintained side by side:
//!
//! - `SwapTable`: the prize each slot currently holds. Updated eagerly, so it
//!   answers live queries; restricted to claimed slots it is always a
//!   bijection onto the prizes in play.
//! - `StealGuard`: the slot that most recently took from each slot.
//! - `SlotHistory`: how each slot acquired its first holding. This is the
//!   lazy record the resolver walks to compute final ownership.

use serde::{Deserialize, Serialize};

use super::Slot;

/// Current holdings: `holdings[s] = Some(p)` means slot `s` holds the prize
/// introduced by slot `p`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapTable {
    holdings: Vec<Option<Slot>>,
}

impl SwapTable {
    pub fn new(slots: usize) -> Self {
        SwapTable {
            holdings: vec![None; slots],
        }
    }

    /// Marks `slot` as holding its own freshly introduced prize.
    pub fn claim(&mut self, slot: Slot) {
        self.holdings[slot] = Some(slot);
    }

    /// Exchanges the holdings of two slots.
    pub fn swap(&mut self, a: Slot, b: Slot) {
        self.holdings.swap(a, b);
    }

    pub fn holding(&self, slot: Slot) -> Option<Slot> {
        self.holdings.get(slot).copied().flatten()
    }

    pub fn is_claimed(&self, slot: Slot) -> bool {
        self.holding(slot).is_some()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn as_slice(&self) -> &[Option<Slot>] {
        &self.holdings
    }

    /// Returns true if the holdings of claimed slots are exactly the set of
    /// claimed slots, each held once.
    pub fn is_bijective(&self) -> bool {
        let n = self.holdings.len();
        let mut held = vec![false; n];
        for prize in self.holdings.iter().flatten() {
            if *prize >= n || held[*prize] {
                return false;
            }
            held[*prize] = true;
        }
        self.holdings
            .iter()
            .zip(held.iter())
            .all(|(holding, &is_held)| holding.is_some() == is_held)
    }
}

/// Last thief per slot, for the anti-retaliation rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StealGuard {
    last_thief: Vec<Option<Slot>>,
}

impl StealGuard {
    pub fn new(slots: usize) -> Self {
        StealGuard {
            last_thief: vec![None; slots],
        }
    }

    /// Records that `thief` took from `victim`; returns the previous thief.
    pub fn record(&mut self, victim: Slot, thief: Slot) -> Option<Slot> {
        self.last_thief[victim].replace(thief)
    }

    pub fn last_thief(&self, slot: Slot) -> Option<Slot> {
        self.last_thief.get(slot).copied().flatten()
    }

    /// Returns true if `caller` may not take from `target` because `target`
    /// is the slot that last took from `caller`.
    pub fn forbids(&self, caller: Slot, target: Slot) -> bool {
        self.last_thief(caller) == Some(target)
    }
}

/// How a slot acquired its first holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotLink {
    /// The slot has not acted yet.
    Open,
    /// The slot kept its own fresh prize.
    Claimed,
    /// The slot took whatever `victim` held at the time. `prior_thief` is
    /// the slot that had last taken from `victim` before this steal, if any;
    /// `victim` was then holding that thief's prize.
    Took {
        victim: Slot,
        prior_thief: Option<Slot>,
    },
    /// The slot's skip debt expired; it never holds a prize.
    Forfeited,
}

/// Per-slot acquisition links, in turn-slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotHistory {
    links: Vec<SlotLink>,
}

impl SlotHistory {
    pub fn new(slots: usize) -> Self {
        SlotHistory {
            links: vec![SlotLink::Open; slots],
        }
    }

    pub fn record_claim(&mut self, slot: Slot) {
        self.links[slot] = SlotLink::Claimed;
    }

    pub fn record_steal(&mut self, slot: Slot, victim: Slot, prior_thief: Option<Slot>) {
        self.links[slot] = SlotLink::Took {
            victim,
            prior_thief,
        };
    }

    pub fn forfeit(&mut self, slot: Slot) {
        self.links[slot] = SlotLink::Forfeited;
    }

    pub fn link(&self, slot: Slot) -> SlotLink {
        self.links.get(slot).copied().unwrap_or(SlotLink::Open)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
