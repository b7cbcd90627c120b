//! Releases after resolution.
//!
//! Prizes, ticket proceeds, and unclaimed assets leave custody only once the
//! game is `Resolved`. The one exception is `reclaim_deposit`, which lets the
//! owner take back their own deposit before the game goes active.

use tracing::{info, warn};

use crate::collab::TreasuryGateway;
use crate::error::{rejected, GameError};
use crate::game::{Address, AssetRef, GameState, Phase, Slot};
use crate::resolve;

/// Releases the caller's final prize to them. Each player may do this once.
pub fn release_prize<T>(
    state: &mut GameState,
    treasury: &mut T,
    caller: &Address,
) -> Result<AssetRef, GameError>
where
    T: TreasuryGateway + ?Sized,
{
    let (slot, asset) =
        check_prize(state, caller).map_err(|e| rejected("release_prize", caller, e))?;
    if let Err(e) = treasury.release_asset(&asset, caller) {
        warn!(player = %caller, asset = %asset, error = %e, "prize release failed");
        return Err(e.into());
    }
    state.released[slot] = true;
    info!(player = %caller, slot, asset = %asset, "prize released");
    Ok(asset)
}

fn check_prize(state: &mut GameState, caller: &Address) -> Result<(Slot, AssetRef), GameError> {
    state.require_phase(Phase::Resolved)?;
    let slot = state.slot_of(caller).ok_or(GameError::NotAPlayer)?;
    if state.released.get(slot).copied().unwrap_or(true) {
        return Err(GameError::AlreadyReleased);
    }
    let asset = resolve::final_prize(state, slot)
        .and_then(|prize| state.prizes.get(prize))
        .cloned()
        .ok_or(GameError::NothingToRelease)?;
    Ok((slot, asset))
}

/// Pays the ticket proceeds not yet released to the owner.
pub fn release_proceeds<T>(
    state: &mut GameState,
    treasury: &mut T,
    caller: &Address,
) -> Result<u64, GameError>
where
    T: TreasuryGateway + ?Sized,
{
    let check = || -> Result<u64, GameError> {
        state.require_owner(caller)?;
        state.require_phase(Phase::Resolved)?;
        let amount = state.proceeds - state.proceeds_released;
        if amount == 0 {
            return Err(GameError::NothingToRelease);
        }
        Ok(amount)
    };
    let amount = check().map_err(|e| rejected("release_proceeds", caller, e))?;
    if let Err(e) = treasury.release_funds(caller, amount) {
        warn!(owner = %caller, amount, error = %e, "proceeds release failed");
        return Err(e.into());
    }
    state.proceeds_released += amount;
    info!(owner = %caller, amount, "proceeds released");
    Ok(amount)
}

/// Returns the assets no player ended up holding to the owner.
///
/// Each asset is marked as soon as the treasury releases it, so a call that
/// fails partway can be retried and picks up the remaining assets.
pub fn release_leftovers<T>(
    state: &mut GameState,
    treasury: &mut T,
    caller: &Address,
) -> Result<Vec<AssetRef>, GameError>
where
    T: TreasuryGateway + ?Sized,
{
    let pending =
        check_leftovers(state, caller).map_err(|e| rejected("release_leftovers", caller, e))?;
    let mut assets = Vec::with_capacity(pending.len());
    for (prize, asset) in pending {
        if let Err(e) = treasury.release_asset(&asset, caller) {
            warn!(
                owner = %caller,
                asset = %asset,
                released = assets.len(),
                error = %e,
                "leftover release failed"
            );
            return Err(e.into());
        }
        state.leftovers_released[prize] = true;
        assets.push(asset);
    }
    info!(owner = %caller, count = assets.len(), "leftovers released");
    Ok(assets)
}

/// Leftover prizes with an asset that are still in custody.
fn check_leftovers(
    state: &mut GameState,
    caller: &Address,
) -> Result<Vec<(Slot, AssetRef)>, GameError> {
    state.require_owner(caller)?;
    state.require_phase(Phase::Resolved)?;
    let universe = state.order.len().max(state.prizes.len());
    if state.leftovers_released.len() < universe {
        state.leftovers_released.resize(universe, false);
    }
    let leftover: Vec<(Slot, AssetRef)> = resolve::leftover_prizes(state)
        .into_iter()
        .filter_map(|prize| state.prizes.get(prize).map(|a| (prize, a.clone())))
        .collect();
    if leftover.is_empty() {
        return Err(GameError::NothingToRelease);
    }
    let pending: Vec<(Slot, AssetRef)> = leftover
        .into_iter()
        .filter(|(prize, _)| !state.leftovers_released.get(*prize).copied().unwrap_or(false))
        .collect();
    if pending.is_empty() {
        return Err(GameError::AlreadyReleased);
    }
    Ok(pending)
}

/// Returns deposit `index` to the owner who made it. Only before the game
/// goes active; the asset is then not frozen into the prize list.
pub fn reclaim_deposit<T>(
    state: &mut GameState,
    treasury: &mut T,
    caller: &Address,
    index: usize,
) -> Result<AssetRef, GameError>
where
    T: TreasuryGateway + ?Sized,
{
    let check = || -> Result<AssetRef, GameError> {
        state.require_owner(caller)?;
        if !state.phase.is_setup() {
            return Err(GameError::WrongPhase {
                actual: state.phase,
            });
        }
        let deposit = state
            .deposits
            .get(index)
            .filter(|d| d.depositor == *caller)
            .ok_or(GameError::NothingToRelease)?;
        if deposit.reclaimed {
            return Err(GameError::AlreadyReleased);
        }
        Ok(deposit.asset.clone())
    };
    let asset = check().map_err(|e| rejected("reclaim_deposit", caller, e))?;
    if let Err(e) = treasury.release_asset(&asset, caller) {
        warn!(owner = %caller, asset = %asset, error = %e, "deposit reclaim failed");
        return Err(e.into());
    }
    state.deposits[index].reclaimed = true;
    info!(owner = %caller, index, asset = %asset, "deposit reclaimed");
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Ledger, LedgerEvent, TreasuryError};
    use crate::game::{GameConfig, TurnOrder};
    use crate::resolve::resolve_window;
    use crate::turn;

    fn owner() -> Address {
        Address::new("0xowner")
    }

    fn addr(i: u32) -> Address {
        Address::new(format!("0x{}", i))
    }

    /// Three-player game with four deposited prizes, resolved after slot 1
    /// steals from slot 0 and slot 2 claims.
    fn resolved_game(ledger: &mut Ledger) -> GameState {
        let mut state = GameState::new(GameConfig::default(), owner()).unwrap();
        state.registry.whitelist([owner()]);
        for i in 1..=3 {
            crate::setup::register_ticket(&mut state, ledger, &addr(i), 100, 0).unwrap();
        }
        for id in 0..4 {
            let asset = AssetRef::new("art", id);
            crate::setup::deposit_prize(&mut state, ledger, &owner(), asset, 0).unwrap();
        }
        state.prizes = state.deposits.iter().map(|d| d.asset.clone()).collect();
        state.install_order(TurnOrder::from_slots(vec![1, 2, 3]), 10);
        turn::claim(&mut state, &addr(1), 11).unwrap();
        turn::steal(&mut state, &addr(2), 0, Some(0), 12).unwrap();
        turn::claim(&mut state, &addr(3), 13).unwrap();
        resolve_window(&mut state, 0, 3).unwrap();
        state
    }

    #[test]
    fn players_receive_final_prizes() {
        let mut ledger = Ledger::new();
        let mut state = resolved_game(&mut ledger);

        let first = release_prize(&mut state, &mut ledger, &addr(1)).unwrap();
        assert_eq!(first, AssetRef::new("art", 1));
        let second = release_prize(&mut state, &mut ledger, &addr(2)).unwrap();
        assert_eq!(second, AssetRef::new("art", 0));
        assert_eq!(
            release_prize(&mut state, &mut ledger, &addr(1)),
            Err(GameError::AlreadyReleased)
        );
        assert_eq!(
            release_prize(&mut state, &mut ledger, &Address::new("0xstranger")),
            Err(GameError::NotAPlayer)
        );
        assert_eq!(ledger.owners.get(&AssetRef::new("art", 0)), Some(&addr(2)));
    }

    #[test]
    fn nothing_is_released_before_resolution() {
        let mut ledger = Ledger::new();
        let mut state = GameState::new(GameConfig::default(), owner()).unwrap();
        crate::setup::register_ticket(&mut state, &mut ledger, &addr(1), 100, 0).unwrap();
        assert_eq!(
            release_prize(&mut state, &mut ledger, &addr(1)),
            Err(GameError::WrongPhase {
                actual: Phase::Registration,
            })
        );
        assert_eq!(
            release_proceeds(&mut state, &mut ledger, &owner()),
            Err(GameError::WrongPhase {
                actual: Phase::Registration,
            })
        );
    }

    #[test]
    fn proceeds_go_to_owner_once() {
        let mut ledger = Ledger::new();
        let mut state = resolved_game(&mut ledger);
        assert_eq!(release_proceeds(&mut state, &mut ledger, &addr(1)), Err(GameError::NotOwner));
        assert_eq!(release_proceeds(&mut state, &mut ledger, &owner()).unwrap(), 300);
        assert_eq!(ledger.paid_to(&owner()), 300);
        assert_eq!(
            release_proceeds(&mut state, &mut ledger, &owner()),
            Err(GameError::NothingToRelease)
        );
    }

    #[test]
    fn unheld_prizes_return_to_owner() {
        let mut ledger = Ledger::new();
        let mut state = resolved_game(&mut ledger);
        let assets = release_leftovers(&mut state, &mut ledger, &owner()).unwrap();
        assert_eq!(assets, vec![AssetRef::new("art", 3)]);
        assert_eq!(
            release_leftovers(&mut state, &mut ledger, &owner()),
            Err(GameError::AlreadyReleased)
        );
    }

    /// Ledger that goes offline after `releases` successful asset releases.
    struct FailingAfter {
        ledger: Ledger,
        releases: usize,
    }

    impl TreasuryGateway for FailingAfter {
        fn collect_payment(&mut self, from: &Address, amount: u64) -> Result<(), TreasuryError> {
            self.ledger.collect_payment(from, amount)
        }

        fn record_prize_deposit(
            &mut self,
            from: &Address,
            asset: &AssetRef,
        ) -> Result<(), TreasuryError> {
            self.ledger.record_prize_deposit(from, asset)
        }

        fn release_asset(&mut self, asset: &AssetRef, to: &Address) -> Result<(), TreasuryError> {
            if self.releases == 0 {
                return Err(TreasuryError::Offline);
            }
            self.releases -= 1;
            self.ledger.release_asset(asset, to)
        }

        fn release_funds(&mut self, to: &Address, amount: u64) -> Result<(), TreasuryError> {
            self.ledger.release_funds(to, amount)
        }
    }

    #[test]
    fn interrupted_leftover_release_resumes() {
        let mut treasury = FailingAfter {
            ledger: Ledger::new(),
            releases: 1,
        };
        let mut state = GameState::new(GameConfig::default(), owner()).unwrap();
        state.registry.whitelist([owner()]);
        crate::setup::register_ticket(&mut state, &mut treasury, &addr(1), 100, 0).unwrap();
        for id in 0..3 {
            let asset = AssetRef::new("art", id);
            crate::setup::deposit_prize(&mut state, &mut treasury, &owner(), asset, 0).unwrap();
        }
        state.prizes = state.deposits.iter().map(|d| d.asset.clone()).collect();
        state.install_order(TurnOrder::from_slots(vec![1]), 10);
        turn::claim(&mut state, &addr(1), 11).unwrap();
        resolve_window(&mut state, 0, 1).unwrap();

        let err = release_leftovers(&mut state, &mut treasury, &owner()).unwrap_err();
        assert!(matches!(err, GameError::DependencyUnavailable(_)));
        assert_eq!(state.leftovers_released, vec![false, true, false]);

        treasury.releases = usize::MAX;
        let rest = release_leftovers(&mut state, &mut treasury, &owner()).unwrap();
        assert_eq!(rest, vec![AssetRef::new("art", 2)]);
        assert_eq!(
            release_leftovers(&mut state, &mut treasury, &owner()),
            Err(GameError::AlreadyReleased)
        );
        let custody: Vec<&AssetRef> = treasury.ledger.assets.iter().collect();
        assert_eq!(custody, vec![&AssetRef::new("art", 0)]);
        assert_eq!(treasury.ledger.owners.get(&AssetRef::new("art", 1)), Some(&owner()));
    }

    #[test]
    fn failed_release_changes_nothing() {
        let mut ledger = Ledger::new();
        let mut state = resolved_game(&mut ledger);
        ledger.offline = true;
        let err = release_prize(&mut state, &mut ledger, &addr(3)).unwrap_err();
        assert!(matches!(err, GameError::DependencyUnavailable(_)));
        assert!(!state.released[2]);
        ledger.offline = false;
        let asset = release_prize(&mut state, &mut ledger, &addr(3)).unwrap();
        assert_eq!(asset, AssetRef::new("art", 2));
    }

    #[test]
    fn owner_reclaims_own_deposit_before_start() {
        let mut ledger = Ledger::new();
        let mut state = GameState::new(GameConfig::default(), owner()).unwrap();
        state.registry.whitelist([owner(), addr(9)]);
        let (mine, theirs) = (AssetRef::new("art", 1), AssetRef::new("art", 2));
        crate::setup::deposit_prize(&mut state, &mut ledger, &owner(), mine, 0).unwrap();
        crate::setup::deposit_prize(&mut state, &mut ledger, &addr(9), theirs, 0).unwrap();

        assert_eq!(
            reclaim_deposit(&mut state, &mut ledger, &owner(), 1),
            Err(GameError::NothingToRelease)
        );
        assert_eq!(reclaim_deposit(&mut state, &mut ledger, &addr(9), 1), Err(GameError::NotOwner));
        reclaim_deposit(&mut state, &mut ledger, &owner(), 0).unwrap();
        assert!(state.deposits[0].reclaimed);
        assert_eq!(
            reclaim_deposit(&mut state, &mut ledger, &owner(), 0),
            Err(GameError::AlreadyReleased)
        );
        assert!(matches!(ledger.events.last(), Some(LedgerEvent::AssetReleased { .. })));
    }
}
