//! Yankee-swap game engine library.
//!
//! Exposes the game model, the setup, turn, resolution, and payout
//! operations, the collaborator interfaces, and the line protocol for use by
//! integration tests and the binaries.

pub mod collab;
pub mod engine;
pub mod error;
pub mod game;
pub mod payout;
pub mod protocol;
pub mod resolve;
pub mod setup;
pub mod simulate;
pub mod turn;

pub use error::{ConfigError, ErrorKind, GameError};
