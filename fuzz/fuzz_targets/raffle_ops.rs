#![no_main]

use libfuzzer_sys::fuzz_target;
use raffle_engine::{
    InMemoryLedger, ManualClock, MockCoordinator, PlayerId, Raffle, RaffleConfig, RaffleState, RequestId, U256,
};

const FEE: u128 = 100;

fuzz_target!(|data: &[u8]| {
    // Drive an arbitrary sequence of operations, two bytes per step
    let clock = ManualClock::new(0);
    let (coordinator, sub) = MockCoordinator::with_funded_subscription(u128::MAX / 2);
    let config = RaffleConfig::default().with_entrance_fee(FEE).with_interval(10).with_subscription_id(sub);
    let Ok(mut raffle) = Raffle::new(config, clock.clone(), coordinator, InMemoryLedger::new()) else {
        return;
    };

    let mut paid_in: u128 = 0;
    for step in data.chunks(2) {
        let (op, arg) = (step[0], step.get(1).copied().unwrap_or(0));
        match op % 5 {
            0 => {
                let paid = u128::from(arg) * 2;
                if raffle.enter_raffle(PlayerId([arg; 32]), paid).is_ok() {
                    paid_in += paid;
                }
            }
            1 => clock.advance(u64::from(arg)),
            2 => {
                let due = raffle.check_upkeep(&[]).upkeep_needed;
                assert_eq!(raffle.perform_upkeep(&[]).is_ok(), due);
            }
            3 => {
                if let Some(p) = raffle.pending_request() {
                    if let Ok(f) = raffle.oracle_mut().fulfill(p.request_id) {
                        let winner = raffle.fulfill_random_words(f.request_id, &f.random_words);
                        assert!(winner.is_ok());
                    }
                }
            }
            _ => {
                let word = U256::from(arg);
                let before = raffle.number_of_players();
                assert!(raffle.fulfill_random_words(RequestId(u64::MAX - u64::from(arg)), &[word]).is_err());
                assert_eq!(raffle.number_of_players(), before);
            }
        }

        assert_eq!(raffle.ledger().total() + raffle.balance(), paid_in);
        match raffle.raffle_state() {
            RaffleState::Open => assert!(raffle.pending_request().is_none()),
            RaffleState::Calculating => assert!(raffle.pending_request().is_some()),
        }
    }
});
