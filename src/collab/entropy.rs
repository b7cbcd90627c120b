//! Entropy source interface.
//!
//! Turn-order randomness arrives asynchronously: the engine files a request
//! and later receives the words for that request's token.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::error::GameError;
use crate::game::RequestToken;

/// Errors reported by an entropy source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntropyError {
    #[error("entropy source is offline")]
    Offline,

    #[error("unknown request {0}")]
    UnknownRequest(RequestToken),
}

impl From<EntropyError> for GameError {
    fn from(e: EntropyError) -> Self {
        GameError::DependencyUnavailable(format!("entropy: {}", e))
    }
}

/// Something that can be asked for random words.
pub trait EntropySource {
    /// Files a request for randomness derived from `seed`. The words are
    /// delivered later, correlated by the returned token.
    fn request(&mut self, seed: u64) -> Result<RequestToken, EntropyError>;
}

/// Number of words a `LocalEntropy` delivery contains.
pub const WORDS_PER_DELIVERY: usize = 4;

/// A local entropy source that fulfills requests from a seeded generator.
#[derive(Debug, Clone, Default)]
pub struct LocalEntropy {
    pub(crate) next_token: u64,
    pub(crate) pending: Vec<(RequestToken, u64)>,
    /// When set, requests fail with `EntropyError::Offline`.
    pub offline: bool,
}

impl LocalEntropy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the words for a pending request and forgets the request.
    pub fn fulfill(&mut self, token: RequestToken) -> Result<Vec<u64>, EntropyError> {
        let idx = self
            .pending
            .iter()
            .position(|(t, _)| *t == token)
            .ok_or(EntropyError::UnknownRequest(token))?;
        let (_, seed) = self.pending.remove(idx);
        let mut rng = SmallRng::seed_from_u64(seed ^ token.0.rotate_left(32));
        Ok((0..WORDS_PER_DELIVERY).map(|_| rng.gen()).collect())
    }

    /// Tokens of requests not yet fulfilled.
    pub fn pending(&self) -> impl Iterator<Item = RequestToken> + '_ {
        self.pending.iter().map(|(t, _)| *t)
    }
}

impl EntropySource for LocalEntropy {
    fn request(&mut self, seed: u64) -> Result<RequestToken, EntropyError> {
        if self.offline {
            return Err(EntropyError::Offline);
        }
        self.next_token += 1;
        let token = RequestToken(self.next_token);
        self.pending.push((token, seed));
        Ok(token)
    }
}
