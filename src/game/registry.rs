//! Player and depositor registry.
//!
//! Tracks the whitelist of identities allowed to deposit prizes and the
//! players who bought tickets. Ticket numbers start at 1 and are dense.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::TicketNumber;
use crate::error::GameError;

/// An opaque, address-like identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Address(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// A registered player: identity plus ticket number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub address: Address,
    pub number: TicketNumber,
}

/// Whitelisted depositors and ticket holders.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    depositors: HashSet<Address>,
    /// Players in purchase order; `players[n - 1]` holds ticket `n`.
    players: Vec<Player>,
    numbers: HashMap<Address, TicketNumber>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds identities to the depositor whitelist. Re-adding is a no-op.
    pub fn whitelist<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = Address>,
    {
        self.depositors.extend(ids);
    }

    /// Returns true if `id` is on the depositor whitelist.
    pub fn is_depositor(&self, id: &Address) -> bool {
        self.depositors.contains(id)
    }

    /// Assigns the next ticket number to `id`.
    pub fn register(&mut self, id: Address) -> Result<TicketNumber, GameError> {
        if self.numbers.contains_key(&id) {
            return Err(GameError::DuplicateTicket);
        }
        let number = self.players.len() as TicketNumber + 1;
        self.numbers.insert(id.clone(), number);
        self.players.push(Player {
            address: id,
            number,
        });
        Ok(number)
    }

    /// Looks up the player holding ticket `number`.
    pub fn player(&self, number: TicketNumber) -> Option<&Player> {
        let idx = (number as usize).checked_sub(1)?;
        self.players.get(idx)
    }

    /// Looks up the ticket number owned by `id`.
    pub fn number_of(&self, id: &Address) -> Option<TicketNumber> {
        self.numbers.get(id).copied()
    }

    /// Number of tickets sold.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// All players in ticket order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }
}
