use proptest::prelude::*;
use raffle_engine::{
    InMemoryLedger, ManualClock, MockCoordinator, OracleError, PlayerId, Raffle, RaffleConfig, RaffleError,
    RaffleState, DEFAULT_BASE_FEE, DEFAULT_ENTRANCE_FEE,
};
use raffle_keeper::{Keeper, KeeperAction, KeeperError, KeeperSettings, Simulation};

type MockRaffle = Raffle<ManualClock, MockCoordinator, InMemoryLedger>;

const ALICE: PlayerId = PlayerId([0xa1; 32]);

fn mock_raffle() -> (MockRaffle, ManualClock) {
    let clock = ManualClock::new(1_000);
    let (coordinator, sub) = MockCoordinator::with_funded_subscription(DEFAULT_BASE_FEE * 10);
    let config = RaffleConfig::default().with_interval(30).with_subscription_id(sub);
    let raffle = Raffle::new(config, clock.clone(), coordinator, InMemoryLedger::new()).unwrap();
    (raffle, clock)
}

fn sim_settings() -> KeeperSettings {
    KeeperSettings {
        vrf_secret: Some("05".repeat(32)),
        start_time: Some(1_700_000_000),
        ..KeeperSettings::default()
    }
}

#[test]
fn tick_is_idle_until_interval_then_requests() {
    let (mut raffle, clock) = mock_raffle();
    let mut keeper = Keeper::new();
    raffle.enter_raffle(ALICE, DEFAULT_ENTRANCE_FEE).unwrap();

    clock.advance(29);
    assert_eq!(keeper.tick(&mut raffle).unwrap(), KeeperAction::Idle);
    assert_eq!(raffle.raffle_state(), RaffleState::Open);

    clock.advance(1);
    let action = keeper.tick(&mut raffle).unwrap();
    let KeeperAction::Requested(id) = action else {
        panic!("expected a request, got {action:?}");
    };
    assert_eq!(raffle.pending_request().map(|p| p.request_id), Some(id));
    assert_eq!(raffle.raffle_state(), RaffleState::Calculating);

    // Closed round: nothing more to do until the draw lands.
    assert_eq!(keeper.tick(&mut raffle).unwrap(), KeeperAction::Idle);
    let stats = keeper.stats();
    assert_eq!((stats.checks, stats.requests, stats.races), (3, 1, 0));
}

#[test]
fn tick_stays_idle_without_players() {
    let (mut raffle, clock) = mock_raffle();
    let mut keeper = Keeper::new();
    clock.advance(3_600);
    assert_eq!(keeper.tick(&mut raffle).unwrap(), KeeperAction::Idle);
    assert!(raffle.pending_request().is_none());
}

#[test]
fn deliver_without_pending_request_is_a_no_op() {
    let (mut raffle, _clock) = mock_raffle();
    let mut keeper = Keeper::new();
    assert_eq!(keeper.deliver(&mut raffle).unwrap(), None);
    assert_eq!(keeper.stats().draws, 0);
}

#[test]
fn deliver_pays_the_only_entrant_and_reopens() {
    let (mut raffle, clock) = mock_raffle();
    let mut keeper = Keeper::new();
    raffle.enter_raffle(ALICE, DEFAULT_ENTRANCE_FEE).unwrap();
    clock.advance(30);
    keeper.tick(&mut raffle).unwrap();

    assert_eq!(keeper.deliver(&mut raffle).unwrap(), Some(ALICE));
    assert_eq!(raffle.raffle_state(), RaffleState::Open);
    assert_eq!(raffle.recent_winner(), Some(ALICE));
    assert_eq!(raffle.ledger().balance_of(&ALICE), DEFAULT_ENTRANCE_FEE);
    assert_eq!(keeper.stats().draws, 1);
}

#[test]
fn rejected_payout_is_replayed_from_held_delivery() {
    let (mut raffle, clock) = mock_raffle();
    let mut keeper = Keeper::new();
    raffle.enter_raffle(ALICE, DEFAULT_ENTRANCE_FEE).unwrap();
    clock.advance(30);
    let KeeperAction::Requested(id) = keeper.tick(&mut raffle).unwrap() else {
        panic!("upkeep should be due");
    };

    raffle.ledger_mut().reject_payments_to(ALICE);
    let err = keeper.deliver(&mut raffle).unwrap_err();
    assert!(matches!(err, KeeperError::Raffle(RaffleError::PayoutFailed { winner, .. }) if winner == ALICE));
    // The coordinator has already settled the request.
    assert!(!raffle.oracle().is_pending(id));
    assert_eq!(raffle.raffle_state(), RaffleState::Calculating);

    raffle.ledger_mut().accept_payments_to(&ALICE);
    assert_eq!(keeper.deliver(&mut raffle).unwrap(), Some(ALICE));
    assert_eq!(raffle.balance(), 0);
    assert_eq!(raffle.ledger().balance_of(&ALICE), DEFAULT_ENTRANCE_FEE);
}

#[test]
fn verifying_keeper_refuses_unproven_delivery() {
    let (mut raffle, clock) = mock_raffle();
    let mut keeper = Keeper::new().verifying([0x42; 32]);
    raffle.enter_raffle(ALICE, DEFAULT_ENTRANCE_FEE).unwrap();
    clock.advance(30);
    keeper.tick(&mut raffle).unwrap();

    let err = keeper.deliver(&mut raffle).unwrap_err();
    assert!(matches!(err, KeeperError::Oracle(OracleError::InvalidProof)));
    assert_eq!(raffle.raffle_state(), RaffleState::Calculating);
    assert_eq!(raffle.number_of_players(), 1);
}

#[test]
fn simulation_runs_every_round_and_conserves_value() {
    let settings = sim_settings();
    let players = settings.player_ids().unwrap();
    let report = Simulation::new(settings.clone()).run().unwrap();

    assert_eq!(report.rounds.len(), 3);
    for (i, r) in report.rounds.iter().enumerate() {
        assert_eq!(r.round as usize, i + 1);
        assert_eq!(r.request_id.0, i as u64 + 1);
        assert_eq!(r.entrants, 4);
        assert_eq!(r.ticks, 3);
        assert_eq!(r.prize, u128::from(settings.entrance_fee) * 4);
        assert!(players.contains(&r.winner));
    }
    assert_eq!(report.total_prizes(), report.fees_paid);
    assert_eq!(
        report.subscription_balance,
        u128::from(settings.subscription_funds) - 3 * u128::from(settings.base_fee)
    );
    let stats = report.stats;
    assert_eq!((stats.checks, stats.requests, stats.draws), (9, 3, 3));
}

#[test]
fn simulation_is_reproducible_with_fixed_key_and_start() {
    let a = Simulation::new(sim_settings()).run().unwrap();
    let b = Simulation::new(sim_settings()).run().unwrap();
    assert_eq!(a, b);
}

#[test]
fn simulation_stalls_when_clock_never_moves() {
    let settings = KeeperSettings { poll_interval_secs: 0, max_ticks_per_round: 5, ..sim_settings() };
    let err = Simulation::new(settings).run().unwrap_err();
    assert!(matches!(err, KeeperError::Stalled { round: 1, ticks: 5 }));
}

#[test]
fn simulation_stops_on_exhausted_subscription() {
    let settings = KeeperSettings {
        subscription_funds: KeeperSettings::default().base_fee,
        rounds: 2,
        ..sim_settings()
    };
    let err = Simulation::new(settings).run().unwrap_err();
    assert!(matches!(err, KeeperError::Oracle(OracleError::InsufficientBalance { .. })));
}

#[test]
fn broke_players_drop_out() {
    let fee = KeeperSettings::default().entrance_fee;
    let settings = KeeperSettings { generated_players: 2, player_funds: fee, ..sim_settings() };
    let report = Simulation::new(settings).run().unwrap();
    let entrants: Vec<usize> = report.rounds.iter().map(|r| r.entrants).collect();
    assert_eq!(entrants, vec![2, 1, 1]);
    assert_eq!(report.total_prizes(), report.fees_paid);

    let settings = KeeperSettings { player_funds: fee - 1, ..sim_settings() };
    let report = Simulation::new(settings).run().unwrap();
    assert!(report.rounds.is_empty());
    assert_eq!(report.fees_paid, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Property test: over any roster size and round count, prizes equal fees
    #[test]
    fn prop_simulation_conserves_fees(players in 1u32..6, rounds in 1u32..5, interval in 0u64..90) {
        let settings = KeeperSettings {
            generated_players: players,
            rounds,
            interval_secs: interval,
            ..sim_settings()
        };
        let report = Simulation::new(settings).run().unwrap();
        prop_assert_eq!(report.rounds.len(), rounds as usize);
        prop_assert_eq!(report.total_prizes(), report.fees_paid);
        for r in &report.rounds {
            prop_assert_eq!(r.entrants, players as usize);
        }
    }
}
