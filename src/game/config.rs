//! Game configuration.
//!
//! All tunables of a single exchange: ticket price, the registration and
//! start thresholds, the turn timeout, the ticket capacity, and the skip
//! forfeiture policy. Loadable from JSON; every field has a default.

use serde::{Deserialize, Serialize};

use super::Timestamp;
use crate::error::ConfigError;

/// Default time a player has to act before their turn lapses (3 hours).
pub const DEFAULT_TURN_TIMEOUT: u64 = 10_800;

/// Largest number of tickets a single game can sell.
pub const MAX_CAPACITY: usize = 255;

/// Configuration for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Exact payment required to buy a ticket.
    pub ticket_price: u64,
    /// Ticket sales are open strictly before this time.
    pub sales_close: Timestamp,
    /// The turn order may be requested from this time on.
    pub start_time: Timestamp,
    /// Seconds a player has to act; a turn lapses once strictly more has passed.
    pub turn_timeout: u64,
    /// Maximum number of tickets.
    pub capacity: usize,
    /// When set, only whitelisted identities may buy tickets.
    pub whitelisted_tickets: bool,
    /// Seconds after which an unpaid skip debt is forfeited. `None` keeps
    /// debts until their owner catches up.
    pub skip_forfeit_after: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            ticket_price: 100,
            sales_close: 3_600,
            start_time: 3_600,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            capacity: MAX_CAPACITY,
            whitelisted_tickets: false,
            skip_forfeit_after: None,
        }
    }
}

impl GameConfig {
    /// Parses a configuration from JSON and validates it. Missing fields
    /// take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(ConfigError::Capacity {
                max: MAX_CAPACITY,
                got: self.capacity,
            });
        }
        if self.ticket_price.checked_mul(self.capacity as u64).is_none() {
            return Err(ConfigError::TicketPrice {
                price: self.ticket_price,
                capacity: self.capacity,
            });
        }
        if self.sales_close > self.start_time {
            return Err(ConfigError::SalesAfterStart {
                sales_close: self.sales_close,
                start_time: self.start_time,
            });
        }
        Ok(())
    }

    /// Number of whole turns that have lapsed after `elapsed` idle seconds.
    ///
    /// A turn lapses once strictly more than `turn_timeout` seconds pass, so
    /// exactly `turn_timeout` idle seconds lapse nothing.
    pub fn lapsed_turns(&self, elapsed: u64) -> u64 {
        elapsed.saturating_sub(1) / self.turn_timeout
    }
}
