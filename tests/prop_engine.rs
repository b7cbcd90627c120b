//! Property-based tests for turn play and resolution.
//!
//! Run with: cargo test --release prop_engine

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use yankee::collab::{Ledger, LocalEntropy};
use yankee::game::{shuffle_tickets, Address, AssetRef, GameConfig, GameState, TurnOrder};
use yankee::simulate::{check_invariants, play_game, SimConfig};
use yankee::{setup, turn, GameError};

const T: u64 = 10_800;

fn started_game(n: usize, seed: u64, config: GameConfig) -> GameState {
    let owner = Address::new("0xowner");
    let mut state = GameState::new(config, owner.clone()).unwrap();
    let mut ledger = Ledger::new();
    let mut entropy = LocalEntropy::new();
    setup::whitelist(&mut state, &owner, [owner.clone()]).unwrap();
    let price = state.ticket_price();
    for i in 0..n {
        let player = Address::new(format!("0x{:02x}", i));
        setup::register_ticket(&mut state, &mut ledger, &player, price, 0).unwrap();
        let prize = AssetRef::new("p", i as u64);
        setup::deposit_prize(&mut state, &mut ledger, &owner, prize, 0).unwrap();
    }
    let now = state.start_time();
    let token = setup::request_order(&mut state, &mut entropy, seed, now).unwrap();
    let words = entropy.fulfill(token).unwrap();
    setup::finalize_order(&mut state, token, &words, now).unwrap();
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any entropy yields a permutation of the ticket numbers.
    #[test]
    fn prop_shuffle_is_permutation(
        players in 0usize..=255,
        words in proptest::collection::vec(any::<u64>(), 0..6)
    ) {
        let order = TurnOrder::from_slots(shuffle_tickets(players, &words));
        prop_assert_eq!(order.len(), players);
        prop_assert!(order.is_permutation());
    }

    /// Random games stay consistent and resolve to the live holdings.
    #[test]
    fn prop_random_game_is_clean(
        players in 1usize..40,
        steal_rate in 0.0f64..=1.0,
        idle_rate in 0.0f64..0.5,
        forfeit in proptest::option::of(1u64..2 * T),
        seed in any::<u64>()
    ) {
        let config = SimConfig {
            num_games: 1,
            players,
            steal_rate,
            idle_rate,
            intrusion_rate: 0.3,
            game: GameConfig {
                skip_forfeit_after: forfeit,
                ..GameConfig::default()
            },
            threads: 1,
            seed,
            quiet: true,
        };
        let mut rng = SmallRng::seed_from_u64(seed);
        let record = play_game(&config, 0, &mut rng);
        prop_assert!(record.is_clean(), "violations: {:?}", record.violations);
        prop_assert_eq!(record.awards.len(), players);

        let mut prizes: Vec<usize> = record.awards.iter().filter_map(|a| a.prize).collect();
        prizes.extend(&record.leftover);
        prizes.sort_unstable();
        prop_assert_eq!(prizes, (0..players).collect::<Vec<_>>());
    }

    /// While skip debt is outstanding, nobody may play the next turn.
    #[test]
    fn prop_skip_debt_blocks_turns(
        players in 2usize..12,
        idle in 1u64..6 * T,
        seed in any::<u64>()
    ) {
        let mut state = started_game(players, seed, GameConfig::default());
        let start = state.start_time();
        let first = state.player_at(0).unwrap().address.clone();
        turn::claim(&mut state, &first, start + 1).unwrap();

        let now = start + 1 + idle;
        let sync = turn::tick(&mut state, now).unwrap();
        prop_assert_eq!(sync.lapsed.len() as u64, ((idle - 1) / T).min(players as u64 - 1));
        prop_assert!(check_invariants(&state).is_empty());

        let slot = state.current_turn();
        let result = match state.player_at(slot) {
            Some(p) => {
                let caller = p.address.clone();
                turn::claim(&mut state, &caller, now)
            }
            None => turn::claim(&mut state, &first, now),
        };
        if state.players_skipped() > 0 {
            prop_assert_eq!(result.unwrap_err(), GameError::SkipDebtOutstanding);
        } else {
            prop_assert!(result.is_ok());
        }
        prop_assert!(state.swaps.is_bijective());
    }
}
