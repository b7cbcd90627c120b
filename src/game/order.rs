//! Turn order construction.
//!
//! The turn order is a permutation of ticket numbers `1..=N`, built once from
//! externally supplied entropy words and immutable afterwards. Slot `i` of
//! the order is the `i`-th turn of the game.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Slot, TicketNumber};

/// Correlates an entropy request with its delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps turn slots to ticket numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrder {
    slots: Vec<TicketNumber>,
}

impl TurnOrder {
    /// Wraps an explicit order. Callers are responsible for passing a
    /// permutation of `1..=N`; see `is_permutation`.
    pub fn from_slots(slots: Vec<TicketNumber>) -> Self {
        TurnOrder { slots }
    }

    /// Builds a shuffled order for `players` tickets from entropy words.
    pub fn shuffled(players: usize, words: &[u64]) -> Self {
        TurnOrder {
            slots: shuffle_tickets(players, words),
        }
    }

    /// Ticket number playing at `slot`.
    pub fn ticket_at(&self, slot: Slot) -> Option<TicketNumber> {
        self.slots.get(slot).copied()
    }

    /// Slot at which `ticket` plays. Linear in the number of players.
    pub fn slot_of(&self, ticket: TicketNumber) -> Option<Slot> {
        self.slots.iter().position(|&t| t == ticket)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn as_slice(&self) -> &[TicketNumber] {
        &self.slots
    }

    /// Returns true if the order contains every ticket `1..=len` exactly once.
    pub fn is_permutation(&self) -> bool {
        let n = self.slots.len();
        let mut seen = vec![false; n];
        for &t in &self.slots {
            let Some(idx) = (t as usize).checked_sub(1) else {
                return false;
            };
            if idx >= n || seen[idx] {
                return false;
            }
            seen[idx] = true;
        }
        true
    }
}

/// Shuffles ticket numbers `1..=players` with a Fisher-Yates pass.
///
/// The generator is seeded from the first four entropy words (missing words
/// count as zero), so the same words always yield the same order.
pub fn shuffle_tickets(players: usize, words: &[u64]) -> Vec<TicketNumber> {
    let mut seed = [0u8; 32];
    for (chunk, word) in seed.chunks_exact_mut(8).zip(words.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    let mut rng = StdRng::from_seed(seed);

    let mut tickets: Vec<TicketNumber> = (1..=players as TicketNumber).collect();
    for i in (1..tickets.len()).rev() {
        let j = rng.gen_range(0..=i);
        tickets.swap(i, j);
    }
    tickets
}
