//! Memoized chain walker.
//!
//! A slot that stole took whatever its victim held at that moment. If the
//! victim had already been stolen from, that was the prior thief's fresh
//! prize; otherwise it was whatever the victim itself acquired on its turn,
//! which is found by walking the victim's own link. Every slot resolved on
//! the way is memoized, so each link is followed at most once.

use crate::game::{Slot, SlotHistory, SlotLink, StealGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Memo {
    Unresolved,
    Resolved(Option<Slot>),
}

/// Resolves final prize ownership from the steal history.
///
/// Reusable across windows; `reset` sizes it for a new game.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    memo: Vec<Memo>,
    stack: Vec<Slot>,
    steps: u64,
}

impl Resolver {
    /// Creates a resolver for a game with `slots` turn slots.
    pub fn new(slots: usize) -> Self {
        let mut resolver = Resolver {
            memo: Vec::new(),
            stack: Vec::with_capacity(slots),
            steps: 0,
        };
        resolver.reset(slots);
        resolver
    }

    /// Forgets all memoized results.
    pub fn reset(&mut self, slots: usize) {
        self.memo.clear();
        self.memo.resize(slots, Memo::Unresolved);
        self.stack.clear();
        self.steps = 0;
    }

    /// Number of links followed since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Prize `slot` acquired on its own turn, or `None` if it never acted.
    pub fn acquired(&mut self, history: &SlotHistory, slot: Slot) -> Option<Slot> {
        if slot >= self.memo.len() {
            return None;
        }
        if let Memo::Resolved(prize) = self.memo[slot] {
            return prize;
        }

        self.stack.clear();
        self.stack.push(slot);
        while let Some(&top) = self.stack.last() {
            self.steps += 1;
            let resolved = match history.link(top) {
                SlotLink::Claimed => Some(top),
                SlotLink::Open | SlotLink::Forfeited => None,
                SlotLink::Took {
                    prior_thief: Some(thief),
                    ..
                } => Some(thief),
                SlotLink::Took {
                    victim,
                    prior_thief: None,
                } => match self.memo.get(victim) {
                    Some(Memo::Resolved(prize)) => *prize,
                    Some(Memo::Unresolved) => {
                        self.stack.push(victim);
                        continue;
                    }
                    None => None,
                },
            };
            self.memo[top] = Memo::Resolved(resolved);
            self.stack.pop();
        }

        match self.memo[slot] {
            Memo::Resolved(prize) => prize,
            Memo::Unresolved => None,
        }
    }

    /// Prize `slot` holds at the end of the game.
    ///
    /// A slot that was stolen from holds the fresh prize of its last thief;
    /// any other slot holds what it acquired.
    pub fn final_prize(
        &mut self,
        history: &SlotHistory,
        guard: &StealGuard,
        slot: Slot,
    ) -> Option<Slot> {
        self.steps += 1;
        match guard.last_thief(slot) {
            Some(thief) => Some(thief),
            None => self.acquired(history, slot),
        }
    }
}
