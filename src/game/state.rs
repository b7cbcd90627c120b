//! Game state representation.
//!
//! `GameState` is the single aggregate every action handler mutates: the
//! registry, the turn order, the clock and cursor, the swap tables, the
//! deposits, and resolution progress. Fields are public so tests and tools
//! can set up arbitrary positions directly.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::config::GameConfig;
use super::order::{RequestToken, TurnOrder};
use super::registry::{Address, Player, Registry};
use super::swap::{SlotHistory, StealGuard, SwapTable};
use super::{Slot, TicketNumber, Timestamp};
use crate::error::{ConfigError, GameError};
use crate::resolve::ResolutionProgress;

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Tickets are on sale.
    Registration,
    /// Sales are closed; the start threshold has not been reached.
    AwaitingStart,
    /// Turn order requested, waiting for entropy.
    Initializing,
    /// Turns are being played.
    Active,
    /// Every slot has been resolved. Terminal.
    Resolved,
}

impl Phase {
    /// Lowercase name used by the text protocol.
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Registration => "registration",
            Phase::AwaitingStart => "awaitingstart",
            Phase::Initializing => "initializing",
            Phase::Active => "active",
            Phase::Resolved => "resolved",
        }
    }

    /// True for phases in which prizes may still be deposited or reclaimed.
    pub const fn is_setup(self) -> bool {
        matches!(
            self,
            Phase::Registration | Phase::AwaitingStart | Phase::Initializing
        )
    }
}

/// A prize asset held by the treasury.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub collection: String,
    pub token_id: u64,
}

impl AssetRef {
    pub fn new(collection: impl Into<String>, token_id: u64) -> Self {
        AssetRef {
            collection: collection.into(),
            token_id,
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.collection, self.token_id)
    }
}

/// A prize deposited before the game started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub depositor: Address,
    pub asset: AssetRef,
    pub reclaimed: bool,
}

/// Time of the last accepted turn action and lapses already applied since.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameClock {
    pub last_action: Timestamp,
    /// Lapses recorded since `last_action`; reset by every accepted action.
    pub lapsed: u64,
}

impl GameClock {
    /// Records an accepted action at `now`.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_action = now;
        self.lapsed = 0;
    }
}

/// A missed turn owed back by the player at `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipDebt {
    pub slot: Slot,
    /// Moment the turn lapsed.
    pub lapsed_at: Timestamp,
}

/// Whose turn it is, plus the FIFO queue of missed turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnCursor {
    pub current: Slot,
    pub skipped: VecDeque<SkipDebt>,
}

impl TurnCursor {
    /// Number of missed turns not yet caught up or forfeited.
    pub fn players_skipped(&self) -> usize {
        self.skipped.len()
    }

    /// The oldest outstanding debt.
    pub fn next_debt(&self) -> Option<SkipDebt> {
        self.skipped.front().copied()
    }
}

/// Complete state of one game.
#[derive(Debug, Clone)]
pub struct GameState {
    pub config: GameConfig,
    pub owner: Address,
    pub phase: Phase,
    pub registry: Registry,
    pub deposits: Vec<Deposit>,
    /// Ticket revenue collected through the treasury.
    pub proceeds: u64,
    pub proceeds_released: u64,
    pub pending_request: Option<RequestToken>,
    pub order: TurnOrder,
    /// Prize assets by prize slot, frozen when the order is finalized.
    pub prizes: Vec<AssetRef>,
    pub clock: GameClock,
    pub cursor: TurnCursor,
    pub swaps: SwapTable,
    pub guard: StealGuard,
    pub history: SlotHistory,
    pub resolution: ResolutionProgress,
    /// Per slot: prize already released to its player.
    pub released: Vec<bool>,
    /// Per prize slot: leftover asset already returned to the owner.
    pub leftovers_released: Vec<bool>,
}

impl GameState {
    /// Creates a game in the registration phase.
    pub fn new(config: GameConfig, owner: Address) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(GameState {
            config,
            owner,
            phase: Phase::Registration,
            registry: Registry::new(),
            deposits: Vec::new(),
            proceeds: 0,
            proceeds_released: 0,
            pending_request: None,
            order: TurnOrder::default(),
            prizes: Vec::new(),
            clock: GameClock::default(),
            cursor: TurnCursor::default(),
            swaps: SwapTable::default(),
            guard: StealGuard::default(),
            history: SlotHistory::default(),
            resolution: ResolutionProgress::default(),
            released: Vec::new(),
            leftovers_released: Vec::new(),
        })
    }

    /// Installs a finalized turn order and resets all per-slot tables.
    pub fn install_order(&mut self, order: TurnOrder, now: Timestamp) {
        let n = order.len();
        self.order = order;
        self.swaps = SwapTable::new(n);
        self.guard = StealGuard::new(n);
        self.history = SlotHistory::new(n);
        self.resolution = ResolutionProgress::new(n);
        self.released = vec![false; n];
        self.leftovers_released = vec![false; n.max(self.prizes.len())];
        self.cursor = TurnCursor::default();
        self.clock.touch(now);
        self.pending_request = None;
        self.phase = Phase::Active;
    }

    /// Moves from `Registration` to `AwaitingStart` once sales have closed.
    pub fn refresh_phase(&mut self, now: Timestamp) {
        if self.phase == Phase::Registration && now >= self.config.sales_close {
            self.phase = Phase::AwaitingStart;
        }
    }

    pub fn require_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase != expected {
            return Err(GameError::WrongPhase { actual: self.phase });
        }
        Ok(())
    }

    pub fn require_owner(&self, caller: &Address) -> Result<(), GameError> {
        if *caller != self.owner {
            return Err(GameError::NotOwner);
        }
        Ok(())
    }

    pub fn ticket_price(&self) -> u64 {
        self.config.ticket_price
    }

    pub fn start_time(&self) -> Timestamp {
        self.config.start_time
    }

    pub fn is_depositor(&self, id: &Address) -> bool {
        self.registry.is_depositor(id)
    }

    /// Player holding ticket `number`.
    pub fn player(&self, number: TicketNumber) -> Option<&Player> {
        self.registry.player(number)
    }

    /// Player whose turn is at `slot`.
    pub fn player_at(&self, slot: Slot) -> Option<&Player> {
        self.order.ticket_at(slot).and_then(|t| self.registry.player(t))
    }

    /// Turn slot of the player identified by `id`.
    pub fn slot_of(&self, id: &Address) -> Option<Slot> {
        let ticket = self.registry.number_of(id)?;
        self.order.slot_of(ticket)
    }

    pub fn current_turn(&self) -> Slot {
        self.cursor.current
    }

    pub fn players_skipped(&self) -> usize {
        self.cursor.players_skipped()
    }

    pub fn last_action(&self) -> Timestamp {
        self.clock.last_action
    }

    /// Prize currently held by `slot`.
    pub fn holding(&self, slot: Slot) -> Option<Slot> {
        self.swaps.holding(slot)
    }

    /// True once the cursor has passed the last slot.
    pub fn turns_exhausted(&self) -> bool {
        self.cursor.current >= self.order.len()
    }

    /// True once every slot has acted, been caught up, or forfeited.
    pub fn ready_for_resolution(&self) -> bool {
        self.phase == Phase::Active && self.turns_exhausted() && self.cursor.skipped.is_empty()
    }
}

/// A game shared between threads. Every action runs under one lock, so no
/// action ever observes another half-applied.
#[derive(Debug, Clone)]
pub struct SharedGame {
    inner: Arc<Mutex<GameState>>,
}

impl SharedGame {
    pub fn new(state: GameState) -> Self {
        SharedGame {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Applies `action` to the game under the lock.
    ///
    /// A panic inside an earlier action poisons the lock; the state is still
    /// consistent because actions validate before mutating, so the poison is
    /// cleared rather than propagated.
    pub fn with<R>(&self, action: impl FnOnce(&mut GameState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        action(&mut guard)
    }
}
