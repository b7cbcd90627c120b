//! Asset custody interface.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::error::GameError;
use crate::game::{Address, AssetRef};

/// Errors reported by a treasury.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("treasury is offline")]
    Offline,

    #[error("insufficient funds: need {needed}, holding {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("funds would overflow")]
    FundsOverflow,

    #[error("asset {0} is already in custody")]
    DuplicateAsset(AssetRef),

    #[error("asset {0} is not in custody")]
    UnknownAsset(AssetRef),
}

impl From<TreasuryError> for GameError {
    fn from(e: TreasuryError) -> Self {
        GameError::DependencyUnavailable(format!("treasury: {}", e))
    }
}

/// Custody of payments and prize assets.
///
/// Each call either completes or fails without effect; the engine mutates
/// its own state only after a call succeeds.
pub trait TreasuryGateway {
    /// Takes a ticket payment of `amount` from `from`.
    fn collect_payment(&mut self, from: &Address, amount: u64) -> Result<(), TreasuryError>;

    /// Takes custody of a prize asset deposited by `from`.
    fn record_prize_deposit(
        &mut self,
        from: &Address,
        asset: &AssetRef,
    ) -> Result<(), TreasuryError>;

    /// Transfers a prize asset out of custody to `to`.
    fn release_asset(&mut self, asset: &AssetRef, to: &Address) -> Result<(), TreasuryError>;

    /// Pays `amount` of held funds to `to`.
    fn release_funds(&mut self, to: &Address, amount: u64) -> Result<(), TreasuryError>;
}

/// A movement recorded by the in-memory `Ledger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Payment { from: Address, amount: u64 },
    Deposit { from: Address, asset: AssetRef },
    AssetReleased { asset: AssetRef, to: Address },
    FundsReleased { to: Address, amount: u64 },
}

/// In-memory treasury that records every movement.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub funds: u64,
    pub assets: HashSet<AssetRef>,
    /// Released assets and their recipients.
    pub owners: HashMap<AssetRef, Address>,
    pub events: Vec<LedgerEvent>,
    /// When set, every call fails with `TreasuryError::Offline`.
    pub offline: bool,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_online(&self) -> Result<(), TreasuryError> {
        if self.offline {
            return Err(TreasuryError::Offline);
        }
        Ok(())
    }

    /// Total funds released to `to`.
    pub fn paid_to(&self, to: &Address) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                LedgerEvent::FundsReleased { to: t, amount } if t == to => *amount,
                _ => 0,
            })
            .sum()
    }
}

impl TreasuryGateway for Ledger {
    fn collect_payment(&mut self, from: &Address, amount: u64) -> Result<(), TreasuryError> {
        self.check_online()?;
        self.funds = self.funds.checked_add(amount).ok_or(TreasuryError::FundsOverflow)?;
        self.events.push(LedgerEvent::Payment {
            from: from.clone(),
            amount,
        });
        Ok(())
    }

    fn record_prize_deposit(
        &mut self,
        from: &Address,
        asset: &AssetRef,
    ) -> Result<(), TreasuryError> {
        self.check_online()?;
        if !self.assets.insert(asset.clone()) {
            return Err(TreasuryError::DuplicateAsset(asset.clone()));
        }
        self.events.push(LedgerEvent::Deposit {
            from: from.clone(),
            asset: asset.clone(),
        });
        Ok(())
    }

    fn release_asset(&mut self, asset: &AssetRef, to: &Address) -> Result<(), TreasuryError> {
        self.check_online()?;
        if !self.assets.remove(asset) {
            return Err(TreasuryError::UnknownAsset(asset.clone()));
        }
        self.owners.insert(asset.clone(), to.clone());
        self.events.push(LedgerEvent::AssetReleased {
            asset: asset.clone(),
            to: to.clone(),
        });
        Ok(())
    }

    fn release_funds(&mut self, to: &Address, amount: u64) -> Result<(), TreasuryError> {
        self.check_online()?;
        if amount > self.funds {
            return Err(TreasuryError::InsufficientFunds {
                needed: amount,
                available: self.funds,
            });
        }
        self.funds -= amount;
        self.events.push(LedgerEvent::FundsReleased {
            to: to.clone(),
            amount,
        });
        Ok(())
    }
}
