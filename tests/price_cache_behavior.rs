//! Behavior-driven tests for the price refresh cache.
//!
//! All tests run on paused tokio time, so refresh intervals and batch pacing
//! elapse instantly and deterministically.

use std::time::Duration;

use stockpulse_tests::*;

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_updates_start_reads_see_placeholder_until_first_cycle_lands() {
    // Given: an open market and an upstream quoting 11.0
    let source = RecordingSource::new(11.0);
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), test_config());

    // When: three symbols are registered
    cache.start_updates(symbols("AAPL,MSFT,TSLA"));

    // Then: reads right away see zeroed placeholders
    let placeholder = cache.get_price(&symbol("AAPL")).expect("registered");
    assert!(placeholder.is_placeholder());
    assert_eq!(placeholder.change_percent, 0.0);
    assert!(cache.get_price(&symbol("NVDA")).is_none());

    // And: once the immediate cycle has run, the real snapshot is served
    settle().await;
    let snapshot = cache.get_price(&symbol("AAPL")).expect("registered");
    assert_eq!(snapshot.price, 11.0);
    assert_eq!(snapshot.change, 1.0);
    assert_eq!(source.call_count(), 1);
    assert_eq!(source.batches()[0], symbols("AAPL,MSFT,TSLA"));

    cache.stop_updates();
}

#[tokio::test(start_paused = true)]
async fn when_start_updates_is_called_twice_exactly_one_timer_is_armed() {
    // Given: a cache with a ten minute refresh interval
    let source = RecordingSource::new(11.0);
    let config = test_config();
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), config);

    // When: updates are started twice
    cache.start_updates(symbols("AAPL"));
    cache.start_updates(symbols("MSFT"));
    settle().await;
    let after_start = source.call_count();

    // Then: each interval adds exactly one cycle
    for elapsed in 1..=3 {
        tokio::time::sleep(config.refresh_interval).await;
        assert_eq!(source.call_count(), after_start + elapsed);
    }
    assert!(cache.has_active_timer());

    // And: both registrations are tracked
    assert_eq!(cache.tracked_symbols(), symbols("AAPL,MSFT"));

    cache.stop_updates();
}

#[tokio::test(start_paused = true)]
async fn when_updates_stop_no_further_upstream_calls_are_made() {
    // Given: a running cache that has refreshed once
    let source = RecordingSource::new(11.0);
    let config = test_config();
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), config);
    cache.start_updates(symbols("AAPL,MSFT"));
    settle().await;
    let calls = source.call_count();

    // When: updates are stopped and several intervals pass
    cache.stop_updates();
    tokio::time::sleep(config.refresh_interval * 5).await;

    // Then: upstream saw nothing more and the data is kept
    assert_eq!(source.call_count(), calls);
    assert!(!cache.has_active_timer());
    assert_eq!(cache.get_price(&symbol("MSFT")).map(|s| s.price), Some(11.0));
}

#[tokio::test(start_paused = true)]
async fn when_updates_stop_mid_cycle_the_cycle_still_completes() {
    // Given: an upstream call that is still in flight
    let (source, gate) = RecordingSource::gated(42.0);
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), test_config());
    cache.start_updates(symbols("AAPL"));
    settle().await;
    assert_eq!(source.call_count(), 1);

    // When: updates are stopped and the upstream call then returns
    cache.stop_updates();
    gate.notify_one();
    settle().await;

    // Then: the in-flight cycle still wrote its result
    assert_eq!(cache.get_price(&symbol("AAPL")).map(|s| s.price), Some(42.0));
}

// =============================================================================
// Re-entrancy and market hours
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_a_cycle_is_running_a_second_trigger_makes_no_upstream_call() {
    // Given: a cycle blocked inside its upstream call
    let (source, gate) = RecordingSource::gated(11.0);
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), test_config());
    cache.start_updates(symbols("AAPL"));
    settle().await;
    assert_eq!(source.call_count(), 1);

    // When: another refresh is triggered
    let outcome = cache.refresh_now().await;

    // Then: it is dropped without contacting upstream
    assert_eq!(outcome, CycleOutcome::AlreadyRunning);
    assert_eq!(source.call_count(), 1);

    // And: once the first cycle finishes, triggers run again
    gate.notify_one();
    settle().await;
    let cache_for_next = cache.clone();
    let next = tokio::spawn(async move { cache_for_next.refresh_now().await });
    settle().await;
    gate.notify_one();
    let outcome = next.await.expect("cycle task");
    assert!(matches!(outcome, CycleOutcome::Completed(_)));
    assert_eq!(source.call_count(), 2);

    cache.stop_updates();
}

#[tokio::test(start_paused = true)]
async fn when_market_is_closed_on_saturday_no_upstream_calls_are_made() {
    // Given: the exchange clock reads Saturday morning
    let source = RecordingSource::new(11.0);
    let config = test_config();
    let cache = price_cache(source.clone(), clock_at(SATURDAY), config);

    // When: updates start and several intervals pass
    cache.start_updates(symbols("AAPL,MSFT"));
    tokio::time::sleep(config.refresh_interval * 3).await;

    // Then: upstream was never contacted and placeholders remain
    assert_eq!(source.call_count(), 0);
    assert!(cache.get_price(&symbol("AAPL")).expect("registered").is_placeholder());
    assert_eq!(cache.refresh_now().await, CycleOutcome::MarketClosed);

    cache.stop_updates();
}

#[tokio::test(start_paused = true)]
async fn when_market_has_not_opened_on_a_weekday_no_upstream_calls_are_made() {
    // Given: 08:00 New York time on a Wednesday
    let source = RecordingSource::new(11.0);
    let clock = clock_at(WEDNESDAY_PREMARKET);
    let cache = price_cache(source.clone(), clock.clone(), test_config());
    cache.start_updates(symbols("AAPL"));
    settle().await;

    // Then: nothing was fetched before the open
    assert_eq!(source.call_count(), 0);

    // When: the clock moves into the session
    clock.set(UtcDateTime::from_unix_seconds(WEDNESDAY_OPEN).expect("valid"));

    // Then: the next cycle fetches
    assert!(matches!(cache.refresh_now().await, CycleOutcome::Completed(_)));
    assert_eq!(source.call_count(), 1);

    cache.stop_updates();
}

// =============================================================================
// Batching and failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_one_batch_fails_its_symbols_keep_their_prior_snapshot() {
    // Given: four symbols in batches of two, all refreshed once at 11.0
    let source = RecordingSource::new(11.0);
    let config = PriceCacheConfig {
        batch_size: 2,
        ..test_config()
    };
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), config);
    cache.start_updates(symbols("AAPL,AMZN,MSFT,TSLA"));
    settle().await;
    cache.stop_updates();

    // When: the second batch fails and the price moves to 20.0
    source.fail_batches_containing(symbol("TSLA"));
    source.set_price(20.0);
    let outcome = cache.refresh_now().await;

    // Then: the failing batch is reported and only the first batch updated
    let report = outcome.report().expect("cycle completed");
    assert_eq!(report.batches, 2);
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.failed, symbols("MSFT,TSLA"));
    for (raw, expected) in [("AAPL", 20.0), ("AMZN", 20.0), ("MSFT", 11.0), ("TSLA", 11.0)] {
        assert_eq!(
            cache.get_price(&symbol(raw)).map(|s| s.price),
            Some(expected),
            "{raw}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn when_upstream_omits_a_symbol_it_stays_stale_and_is_reported() {
    // Given: an upstream that never returns MSFT
    let source = RecordingSource::new(11.0);
    source.omit(symbol("MSFT"));
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), test_config());
    cache.start_updates(symbols("AAPL,MSFT"));
    settle().await;
    cache.stop_updates();

    // When: a cycle runs
    let outcome = cache.refresh_now().await;

    // Then: MSFT is reported unmatched and keeps its placeholder
    let report = outcome.report().expect("cycle completed");
    assert_eq!(report.updated, 1);
    assert_eq!(report.unmatched, symbols("MSFT"));
    assert!(cache.get_price(&symbol("MSFT")).expect("registered").is_placeholder());
}

#[tokio::test(start_paused = true)]
async fn when_batches_run_they_are_sequential_and_paced() {
    // Given: five symbols in batches of two with a one second delay
    let source = RecordingSource::new(11.0);
    let config = PriceCacheConfig {
        batch_size: 2,
        batch_delay: Duration::from_secs(1),
        ..test_config()
    };
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), config);
    cache.start_updates(symbols("A,B,C,D,E"));
    settle().await;
    cache.stop_updates();

    // Then: three calls, one second apart, covering every symbol once
    let batches = source.batches();
    assert_eq!(batches, vec![symbols("A,B"), symbols("C,D"), symbols("E")]);
    let times = source.call_times();
    assert_eq!(times[1] - times[0], Duration::from_secs(1));
    assert_eq!(times[2] - times[1], Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn when_a_batch_times_out_it_counts_as_failed() {
    // Given: an upstream call that never returns and a two second timeout
    let (source, _gate) = RecordingSource::gated(11.0);
    let config = PriceCacheConfig {
        batch_timeout: Duration::from_secs(2),
        ..test_config()
    };
    let cache = price_cache(source.clone(), clock_at(WEDNESDAY_OPEN), config);
    cache.start_updates(symbols("AAPL"));
    settle().await;
    cache.stop_updates();

    // When: a cycle runs
    let outcome = cache.refresh_now().await;

    // Then: the batch failed, the guard was released and data is stale
    let report = outcome.report().expect("cycle completed");
    assert_eq!(report.failed_batches, 1);
    assert_eq!(source.call_count(), 2);
    assert!(cache.get_price(&symbol("AAPL")).expect("registered").is_placeholder());
}
