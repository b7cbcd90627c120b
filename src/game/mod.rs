//! Game data model.
//!
//! Contains the registry of players, the turn order, the swap bookkeeping,
//! the configuration, and the `GameState` aggregate that every action
//! handler receives by exclusive reference.

pub mod config;
pub mod order;
pub mod registry;
pub mod state;
pub mod swap;

/// Seconds on the game clock.
pub type Timestamp = u64;

/// A 1-indexed ticket number, assigned in purchase order.
pub type TicketNumber = u32;

/// A position in the turn order. Prizes are identified by the slot that
/// introduced them, so prize indices use the same type.
pub type Slot = usize;

pub use config::{GameConfig, DEFAULT_TURN_TIMEOUT, MAX_CAPACITY};
pub use order::{shuffle_tickets, RequestToken, TurnOrder};
pub use registry::{Address, Player, Registry};
pub use state::{AssetRef, Deposit, GameClock, GameState, Phase, SharedGame, SkipDebt, TurnCursor};
pub use swap::{SlotHistory, SlotLink, StealGuard, SwapTable};
