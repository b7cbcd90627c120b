//! Error types for game operations.
//!
//! Every rejected action maps to exactly one `GameError` variant. The display
//! strings of the contract-facing variants are part of the observable
//! behavior and must not change.

use thiserror::Error;
use tracing::debug;

use crate::game::state::Phase;
use crate::game::{Address, Slot};

/// Broad category of a rejected action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the role the action needs (whitelist, owner).
    AccessDenied,
    /// Action attempted in the wrong game phase or before a time threshold.
    PhaseViolation,
    /// Wrong caller for the current turn, or skip debt outstanding.
    TurnViolation,
    /// Steal target is invalid or the anti-retaliation rule applies.
    StealViolation,
    /// Bookkeeping conflict such as a second ticket for one identity.
    StateViolation,
    /// An external collaborator (treasury, entropy) failed.
    DependencyUnavailable,
}

/// A rejected game action.
///
/// The engine state is unchanged whenever one of these is returned, apart
/// from clock synchronization that already happened before validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("you are not allowed to deposit")]
    NotWhitelisted,

    #[error("caller is not the owner")]
    NotOwner,

    #[error("cant buy more")]
    DuplicateTicket,

    #[error("all {0} tickets are sold")]
    GameFull(usize),

    #[error("ticket price is {expected}, got {paid}")]
    IncorrectPayment { expected: u64, paid: u64 },

    #[error("ticket sales are closed")]
    SalesClosed,

    #[error("game has not started yet")]
    GameNotStarted,

    #[error("action not allowed in phase {actual:?}")]
    WrongPhase { actual: Phase },

    #[error("no pending order request with token {0}")]
    UnknownRequest(u64),

    #[error("not your turn")]
    NotYourTurn,

    #[error("playersSkipped not zero")]
    SkipDebtOutstanding,

    #[error("game has finished")]
    GameFinished,

    #[error("slot {0} is out of range")]
    InvalidSlot(Slot),

    #[error("slot {0} has not claimed a prize")]
    TargetNotClaimed(Slot),

    #[error("cant steal from them again")]
    DuplicateSteal,

    #[error("slot {slot} holds prize {actual:?}, expected {expected}")]
    StalePrizeHint {
        slot: Slot,
        expected: Slot,
        actual: Option<Slot>,
    },

    #[error("turns remain before resolution")]
    TurnsRemaining,

    #[error("invalid resolution window {start}..{end}")]
    InvalidWindow { start: Slot, end: Slot },

    #[error("caller has no ticket")]
    NotAPlayer,

    #[error("already released")]
    AlreadyReleased,

    #[error("nothing to release")]
    NothingToRelease,

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl GameError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotWhitelisted | GameError::NotOwner | GameError::NotAPlayer => {
                ErrorKind::AccessDenied
            }
            GameError::SalesClosed
            | GameError::GameNotStarted
            | GameError::WrongPhase { .. }
            | GameError::UnknownRequest(_)
            | GameError::TurnsRemaining => ErrorKind::PhaseViolation,
            GameError::NotYourTurn | GameError::SkipDebtOutstanding | GameError::GameFinished => {
                ErrorKind::TurnViolation
            }
            GameError::InvalidSlot(_)
            | GameError::TargetNotClaimed(_)
            | GameError::DuplicateSteal
            | GameError::StalePrizeHint { .. } => ErrorKind::StealViolation,
            GameError::DuplicateTicket
            | GameError::GameFull(_)
            | GameError::IncorrectPayment { .. }
            | GameError::InvalidWindow { .. }
            | GameError::AlreadyReleased
            | GameError::NothingToRelease => ErrorKind::StateViolation,
            GameError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
        }
    }
}

/// Logs a rejected action and hands the error back for propagation.
pub(crate) fn rejected(action: &'static str, caller: &Address, err: GameError) -> GameError {
    debug!(action, caller = %caller, kind = ?err.kind(), error = %err, "action rejected");
    err
}

/// Errors raised while loading or validating a `GameConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("turn timeout must be positive")]
    ZeroTimeout,

    #[error("capacity must be between 1 and {max}, got {got}")]
    Capacity { max: usize, got: usize },

    #[error("ticket price {price} times capacity {capacity} overflows")]
    TicketPrice { price: u64, capacity: usize },

    #[error("ticket sales close at {sales_close}, after the game starts at {start_time}")]
    SalesAfterStart { sales_close: u64, start_time: u64 },

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}
