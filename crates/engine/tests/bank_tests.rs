//! End-to-end lifecycle tests: initialize, execute, cancel.

mod common;

use bankcheck_core::{expected_total, BankConfig, BankError, ConnectionPolicy, RunState};
use bankcheck_engine::Bank;
use common::{small_config, Harness};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Initialize, run the workload for `run_for`, then cancel.
fn run_for(harness: &Harness, config: &BankConfig, run_for: Duration) {
    let bank = harness.bank(config);
    bank.initialize().unwrap();

    let result = thread::scope(|scope| {
        let execute = scope.spawn(|| bank.execute());
        thread::sleep(run_for);
        harness.run.cancel_token().cancel();
        execute.join().unwrap()
    });
    result.unwrap();
}

#[test]
fn test_execute_until_cancelled_preserves_total() {
    let config = small_config(500);
    let harness = Harness::new(&config);

    run_for(&harness, &config, Duration::from_millis(400));

    assert_eq!(harness.sum(0), expected_total(500));
    assert!(harness.record_count() > 0);
    assert!(!harness.run.is_stopped());
}

#[test]
fn test_execute_under_each_policy() {
    for policy in [ConnectionPolicy::Dedicated, ConnectionPolicy::Ephemeral] {
        let mut config = small_config(300);
        config.connection_policy = policy;
        let harness = Harness::new(&config);

        run_for(&harness, &config, Duration::from_millis(300));

        assert_eq!(harness.sum(0), expected_total(300), "policy {}", policy);
        assert!(harness.record_count() > 0, "policy {}", policy);
    }
}

#[test]
fn test_execute_with_long_transactions() {
    let mut config = small_config(300);
    config.enable_long_txn = true;
    config.table_num = 2;
    let harness = Harness::new(&config);

    run_for(&harness, &config, Duration::from_millis(500));

    for shard in 0..2 {
        assert_eq!(harness.sum(shard), expected_total(300), "shard {}", shard);
    }
    assert!(!harness.run.is_stopped());
}

#[test]
fn test_initialize_is_idempotent() {
    let config = small_config(400);
    let harness = Harness::new(&config);
    run_for(&harness, &config, Duration::from_millis(200));
    let records = harness.record_count();

    let Harness { dir, .. } = harness;
    let again = Harness::open(dir, &config);
    let bank = again.bank(&config);
    bank.initialize().unwrap();
    bank.shutdown();

    assert_eq!(again.count(0), 400);
    assert_eq!(again.record_count(), records);
    assert_eq!(again.sum(0), expected_total(400));
}

#[test]
fn test_tampering_stops_the_run() {
    let config = small_config(300);
    let harness = Harness::new(&config);
    let bank = harness.bank(&config);
    bank.initialize().unwrap();

    let result = thread::scope(|scope| {
        let execute = scope.spawn(|| bank.execute());
        thread::sleep(Duration::from_millis(100));
        harness.exec("update accounts set balance = balance + 7 where id = 11");

        let start = Instant::now();
        while !harness.run.is_stopped() && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(10));
        }
        harness.run.cancel_token().cancel();
        execute.join().unwrap()
    });

    assert!(harness.run.is_stopped());
    match result {
        Err(BankError::Inconsistency { expected, actual, .. }) => {
            assert_eq!(expected, 300_000);
            assert_eq!(actual, 300_007);
        }
        other => panic!("expected an inconsistency, got {:?}", other),
    }
}

#[test]
fn test_initialize_reports_tampered_shard() {
    let config = small_config(200);
    let harness = Harness::new(&config);
    let bank = harness.bank(&config);
    harness.seed(&bank);
    harness.set_balance(0, 1, 5);

    let err = bank.initialize().unwrap_err();
    assert!(matches!(err, BankError::Inconsistency { .. }), "got {:?}", err);
    assert!(harness.run.is_stopped());
}

#[test]
fn test_invalid_config_is_rejected() {
    let harness = Harness::new(&small_config(100));
    let mut config = small_config(100);
    config.concurrency = 0;

    let result = Bank::new(config, harness.provider.clone(), Arc::new(RunState::default()));
    assert!(matches!(result, Err(BankError::InvalidConfig(_))));
}
