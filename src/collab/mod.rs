//! External collaborators.
//!
//! The engine never holds assets or generates randomness itself. It calls
//! out through `TreasuryGateway` for custody and `EntropySource` for the
//! turn-order randomness. In-memory implementations back the binaries and
//! the tests.

pub mod entropy;
pub mod treasury;

pub use entropy::{EntropyError, EntropySource, LocalEntropy};
pub use treasury::{Ledger, LedgerEvent, TreasuryError, TreasuryGateway};
