//! Behavior-driven tests for the response TTL cache.

use std::time::Duration;

use stockpulse_tests::*;

#[tokio::test(start_paused = true)]
async fn when_ttl_elapses_the_entry_is_gone_and_evicted() {
    // Given: an entry stored with a one minute TTL
    let cache = CacheStore::new(Duration::from_secs(60));
    cache.set("historical:AAPL:1M", 1_u32, None).await;

    // When: the TTL passes
    tokio::time::advance(Duration::from_secs(61)).await;

    // Then: the read misses and the entry has been dropped
    assert_eq!(cache.get("historical:AAPL:1M").await, None);
    assert_eq!(cache.len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn when_an_expired_key_is_set_again_only_the_new_value_is_served() {
    // Given: an expired entry
    let cache = CacheStore::new(Duration::from_secs(10));
    cache.set("overview:MSFT", "old", None).await;
    tokio::time::advance(Duration::from_secs(11)).await;

    // When: the key is written again
    cache.set("overview:MSFT", "new", None).await;

    // Then: the fresh value is live for a full TTL
    tokio::time::advance(Duration::from_secs(9)).await;
    assert_eq!(cache.get("overview:MSFT").await, Some("new"));
}

#[tokio::test(start_paused = true)]
async fn when_two_writes_hit_the_same_key_the_last_one_wins() {
    let cache = CacheStore::default();

    cache.set("k", 1, None).await;
    cache.set("k", 2, Some(Duration::from_secs(1))).await;

    assert_eq!(cache.get("k").await, Some(2));

    // The second write also replaced the expiry.
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get("k").await, None);
}

#[tokio::test(start_paused = true)]
async fn when_no_ttl_is_given_entries_live_for_five_minutes() {
    // Given: a store with the default TTL
    let cache = CacheStore::default();
    cache.set("k", "v", None).await;

    // Then: the entry is live at exactly five minutes and gone just after
    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(cache.get("k").await, Some("v"));
    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get("k").await, None);
}

#[tokio::test(start_paused = true)]
async fn when_a_fetch_fails_nothing_is_cached_and_the_next_call_retries() {
    // Given: an empty cache and a fetch that fails
    let cache: CacheStore<u32> = CacheStore::default();
    let failed = cache
        .get_or_try_insert_with("quote:AAPL", None, || async {
            Err::<u32, _>(SourceError::unavailable("upstream down"))
        })
        .await;
    assert!(failed.is_err());
    assert!(cache.is_empty().await);

    // When: the next call succeeds
    let value = cache
        .get_or_try_insert_with("quote:AAPL", None, || async { Ok::<_, SourceError>(7) })
        .await
        .expect("fetch succeeds");

    // Then: the value is served and cached
    assert_eq!(value, 7);
    let cached = cache
        .get_or_try_insert_with("quote:AAPL", None, || async {
            Err::<u32, _>(SourceError::unavailable("must not be called"))
        })
        .await;
    assert_eq!(cached.ok(), Some(7));
}

#[tokio::test]
async fn when_the_cache_is_cloned_both_handles_share_entries() {
    let cache = CacheStore::default();
    let handle = cache.clone();

    handle.set("k", 3, None).await;
    assert_eq!(cache.get("k").await, Some(3));

    cache.clear().await;
    assert!(handle.is_empty().await);
}
