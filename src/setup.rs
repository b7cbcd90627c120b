//! Pre-game operations.
//!
//! Whitelisting, ticket sales, prize deposits, and the two-step turn-order
//! build: `request_order` files an entropy request once the start threshold
//! has passed, `finalize_order` consumes the delivered words and activates
//! the game.

use tracing::{info, warn};

use crate::collab::{EntropySource, TreasuryGateway};
use crate::error::{rejected, GameError};
use crate::game::{
    Address, AssetRef, Deposit, GameState, Phase, RequestToken, TicketNumber, Timestamp, TurnOrder,
};

/// Adds depositor identities to the whitelist. Owner only.
pub fn whitelist<I>(state: &mut GameState, caller: &Address, ids: I) -> Result<(), GameError>
where
    I: IntoIterator<Item = Address>,
{
    state
        .require_owner(caller)
        .map_err(|e| rejected("whitelist", caller, e))?;
    let ids: Vec<Address> = ids.into_iter().collect();
    info!(owner = %caller, count = ids.len(), "depositors whitelisted");
    state.registry.whitelist(ids);
    Ok(())
}

/// Sells a ticket to `caller` for `paid`, returning the ticket number.
pub fn register_ticket<T>(
    state: &mut GameState,
    treasury: &mut T,
    caller: &Address,
    paid: u64,
    now: Timestamp,
) -> Result<TicketNumber, GameError>
where
    T: TreasuryGateway + ?Sized,
{
    state.refresh_phase(now);
    check_ticket(state, caller, paid).map_err(|e| rejected("register_ticket", caller, e))?;

    if let Err(e) = treasury.collect_payment(caller, paid) {
        warn!(player = %caller, error = %e, "ticket payment failed");
        return Err(e.into());
    }
    let number = state.registry.register(caller.clone())?;
    // At most `ticket_price * capacity`, which `GameConfig::validate` bounds.
    state.proceeds += paid;
    info!(player = %caller, ticket = number, "ticket sold");
    Ok(number)
}

fn check_ticket(state: &GameState, caller: &Address, paid: u64) -> Result<(), GameError> {
    if state.phase != Phase::Registration {
        return Err(GameError::SalesClosed);
    }
    if state.config.whitelisted_tickets && !state.registry.is_depositor(caller) {
        return Err(GameError::NotWhitelisted);
    }
    if state.registry.number_of(caller).is_some() {
        return Err(GameError::DuplicateTicket);
    }
    if state.registry.len() >= state.config.capacity {
        return Err(GameError::GameFull(state.config.capacity));
    }
    if paid != state.config.ticket_price {
        return Err(GameError::IncorrectPayment {
            expected: state.config.ticket_price,
            paid,
        });
    }
    Ok(())
}

/// Deposits a prize asset. Whitelisted depositors only, before the game is
/// active.
pub fn deposit_prize<T>(
    state: &mut GameState,
    treasury: &mut T,
    caller: &Address,
    asset: AssetRef,
    now: Timestamp,
) -> Result<usize, GameError>
where
    T: TreasuryGateway + ?Sized,
{
    state.refresh_phase(now);
    if !state.phase.is_setup() {
        return Err(rejected(
            "deposit",
            caller,
            GameError::WrongPhase {
                actual: state.phase,
            },
        ));
    }
    if !state.registry.is_depositor(caller) {
        return Err(rejected("deposit", caller, GameError::NotWhitelisted));
    }
    if let Err(e) = treasury.record_prize_deposit(caller, &asset) {
        warn!(depositor = %caller, asset = %asset, error = %e, "prize deposit failed");
        return Err(e.into());
    }
    info!(depositor = %caller, asset = %asset, "prize deposited");
    state.deposits.push(Deposit {
        depositor: caller.clone(),
        asset,
        reclaimed: false,
    });
    Ok(state.deposits.len() - 1)
}

/// Files the entropy request for the turn order.
///
/// Allowed from the start threshold on, in any setup phase. Re-requesting
/// while `Initializing` replaces the pending token.
pub fn request_order<E>(
    state: &mut GameState,
    entropy: &mut E,
    seed: u64,
    now: Timestamp,
) -> Result<RequestToken, GameError>
where
    E: EntropySource + ?Sized,
{
    if now < state.config.start_time {
        return Err(GameError::GameNotStarted);
    }
    state.refresh_phase(now);
    if !state.phase.is_setup() {
        return Err(GameError::WrongPhase {
            actual: state.phase,
        });
    }

    let token = match entropy.request(seed) {
        Ok(t) => t,
        Err(e) => {
            warn!(seed, error = %e, "turn order request failed");
            return Err(e.into());
        }
    };
    state.pending_request = Some(token);
    state.phase = Phase::Initializing;
    info!(token = token.0, players = state.registry.len(), "turn order requested");
    Ok(token)
}

/// Builds the turn order from delivered entropy and activates the game.
///
/// Either fully succeeds or leaves the game `Initializing` with the request
/// still pending.
pub fn finalize_order(
    state: &mut GameState,
    token: RequestToken,
    words: &[u64],
    now: Timestamp,
) -> Result<(), GameError> {
    if now < state.config.start_time {
        return Err(GameError::GameNotStarted);
    }
    state.require_phase(Phase::Initializing)?;
    if state.pending_request != Some(token) {
        return Err(GameError::UnknownRequest(token.0));
    }
    if words.is_empty() {
        warn!(token = token.0, "entropy delivery contained no words");
        return Err(GameError::DependencyUnavailable(
            "entropy delivery contained no words".to_string(),
        ));
    }
    let players = state.registry.len();
    if players > state.config.capacity {
        return Err(GameError::GameFull(state.config.capacity));
    }

    let order = TurnOrder::shuffled(players, words);
    debug_assert!(order.is_permutation());
    state.prizes = state
        .deposits
        .iter()
        .filter(|d| !d.reclaimed)
        .map(|d| d.asset.clone())
        .collect();
    state.install_order(order, now);
    info!(
        token = token.0,
        players,
        prizes = state.prizes.len(),
        "turn order finalized"
    );
    Ok(())
}
