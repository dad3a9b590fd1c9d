// ==============================================
// LOADER / SINGLE-FLIGHT TESTS (integration)
// ==============================================
//
// Cache-aside loading through the public facade: miss-triggered loads,
// deduplication of concurrent loads, loader error and panic propagation,
// the non-blocking load kick, refresh, cancellation, and loader-provided
// TTLs.

use polycache::builder::CacheBuilder;
use polycache::clock::FakeClock;
use polycache::context::Context;
use polycache::error::CacheError;
use polycache::prelude::Cache;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn counting_loader(
    invocations: Arc<AtomicUsize>,
    delay: Duration,
) -> impl Fn(&Context, &String) -> Result<String, polycache::error::DynError> + Send + Sync + 'static
{
    move |_ctx, key| {
        invocations.fetch_add(1, Ordering::SeqCst);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(format!("value-for-{key}"))
    }
}

mod basic_loading {
    use super::*;

    #[test]
    fn miss_invokes_loader_and_caches_result() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = CacheBuilder::new(8)
            .lru()
            .loader(counting_loader(Arc::clone(&invocations), Duration::ZERO))
            .build();
        let ctx = Context::background();

        let key = "x".to_string();
        assert_eq!(cache.get(&ctx, &key).unwrap(), "value-for-x");
        assert_eq!(cache.get(&ctx, &key).unwrap(), "value-for-x");
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn loader_reads_do_not_move_counters() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = CacheBuilder::new(8)
            .lfu()
            .loader(counting_loader(Arc::clone(&invocations), Duration::ZERO))
            .build();
        let ctx = Context::background();

        let key = "x".to_string();
        cache.get(&ctx, &key).unwrap(); // miss, then load
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 0);

        cache.get(&ctx, &key).unwrap(); // plain hit
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn loader_errors_propagate_and_do_not_poison() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String, String> = CacheBuilder::new(8)
            .lru()
            .loader({
                let attempts = Arc::clone(&attempts);
                move |_ctx, _key: &String| {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("backend down".into())
                    } else {
                        Ok("recovered".to_string())
                    }
                }
            })
            .build();
        let ctx = Context::background();
        let key = "x".to_string();

        let err = cache.get(&ctx, &key).unwrap_err();
        assert!(matches!(err, CacheError::Loader(_)));
        assert!(err.to_string().contains("backend down"));

        assert_eq!(cache.get(&ctx, &key).unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn loader_panic_is_captured_as_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String, String> = CacheBuilder::new(8)
            .arc()
            .loader({
                let attempts = Arc::clone(&attempts);
                move |_ctx, _key: &String| {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("loader exploded");
                    }
                    Ok("second try".to_string())
                }
            })
            .build();
        let ctx = Context::background();
        let key = "x".to_string();

        let err = cache.get(&ctx, &key).unwrap_err();
        assert!(matches!(err, CacheError::Loader(_)));
        assert!(err.to_string().contains("loader exploded"));

        // the failed flight is retired; the next get loads cleanly
        assert_eq!(cache.get(&ctx, &key).unwrap(), "second try");
    }
}

mod single_flight {
    use super::*;

    #[test]
    fn concurrent_misses_share_one_load() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = CacheBuilder::new(64)
            .lru()
            .loader(counting_loader(
                Arc::clone(&invocations),
                Duration::from_millis(50),
            ))
            .build();

        let start = Instant::now();
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.get(&Context::background(), &"x".to_string()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let elapsed = start.elapsed();

        for result in results {
            assert_eq!(result.unwrap(), "value-for-x");
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert!(
            elapsed < Duration::from_millis(500),
            "callers serialized instead of sharing: {elapsed:?}"
        );
    }

    #[test]
    fn distinct_keys_load_independently() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = CacheBuilder::new(64)
            .lru()
            .loader(counting_loader(
                Arc::clone(&invocations),
                Duration::from_millis(10),
            ))
            .build();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    cache
                        .get(&Context::background(), &format!("key-{i}"))
                        .unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("value-for-key-{i}"));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn waiters_observe_the_shared_error() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String, String> = CacheBuilder::new(8)
            .lru()
            .loader({
                let invocations = Arc::clone(&invocations);
                move |_ctx, _key: &String| {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(40));
                    Err("shared failure".into())
                }
            })
            .build();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.get(&Context::background(), &"x".to_string()))
            })
            .collect();

        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(matches!(err, CacheError::Loader(_)));
            assert!(err.to_string().contains("shared failure"));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }
}

mod non_blocking {
    use super::*;

    #[test]
    fn get_if_present_kicks_a_background_load() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = CacheBuilder::new(8)
            .lru()
            .loader(counting_loader(
                Arc::clone(&invocations),
                Duration::from_millis(20),
            ))
            .build();
        let key = "x".to_string();

        // immediate miss, load kicked off behind the scenes
        let err = cache.get_if_present(&key).unwrap_err();
        assert!(err.is_not_found());

        // the background load eventually fills the entry
        let mut found = None;
        for _ in 0..100 {
            if let Ok(value) = cache.get_if_present(&key) {
                found = Some(value);
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(found.as_deref(), Some("value-for-x"));
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_if_present_without_loader_is_a_plain_miss() {
        let cache: Cache<String, String> = CacheBuilder::new(8).lru().build();
        let err = cache.get_if_present(&"x".to_string()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.miss_count(), 1);
    }
}

mod refresh {
    use super::*;

    #[test]
    fn refresh_always_goes_through_the_loader() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String, usize> = CacheBuilder::new(8)
            .lru()
            .loader({
                let invocations = Arc::clone(&invocations);
                move |_ctx, _key: &String| Ok(invocations.fetch_add(1, Ordering::SeqCst))
            })
            .build();
        let ctx = Context::background();
        let key = "x".to_string();

        assert_eq!(cache.get(&ctx, &key).unwrap(), 0);
        // cached: get does not reload
        assert_eq!(cache.get(&ctx, &key).unwrap(), 0);
        // refresh reloads even though the entry is live
        assert_eq!(cache.refresh(&ctx, &key).unwrap(), 1);
        assert_eq!(cache.get(&ctx, &key).unwrap(), 1);
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn cancelled_context_fails_fast() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = CacheBuilder::new(8)
            .lru()
            .loader(counting_loader(Arc::clone(&invocations), Duration::ZERO))
            .build();

        let (ctx, cancel) = Context::cancellable();
        cancel.cancel();

        let err = cache.get(&ctx, &"x".to_string()).unwrap_err();
        assert!(matches!(err, CacheError::Cancelled));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn loader_observes_mid_flight_cancellation() {
        let cache: Cache<String, String> = CacheBuilder::new(8)
            .lru()
            .loader(|ctx: &Context, _key: &String| {
                for _ in 0..200 {
                    if ctx.is_cancelled() {
                        return Err("cancelled upstream".into());
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Ok("too late".to_string())
            })
            .build();

        let (ctx, cancel) = Context::cancellable();
        let handle = {
            let cache = cache.clone();
            thread::spawn(move || cache.get(&ctx, &"x".to_string()))
        };
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, CacheError::Loader(_)));
        assert!(err.to_string().contains("cancelled upstream"));
    }
}

mod loader_ttl {
    use super::*;

    #[test]
    fn loader_provided_ttl_overrides_default() {
        let clock = Arc::new(FakeClock::new());
        let cache: Cache<String, String> = CacheBuilder::new(8)
            .lru()
            .clock(clock.clone())
            .expiration(Duration::from_secs(3600))
            .loader_with_expire(|_ctx, key: &String| {
                Ok((format!("v-{key}"), Some(Duration::from_secs(5))))
            })
            .build();
        let ctx = Context::background();
        let key = "x".to_string();

        cache.get(&ctx, &key).unwrap();
        clock.advance(Duration::from_secs(6));
        // the loader's 5s TTL won over the 1h default
        assert!(!cache.existed(&key));
    }

    #[test]
    fn loader_without_ttl_falls_back_to_default() {
        let clock = Arc::new(FakeClock::new());
        let cache: Cache<String, String> = CacheBuilder::new(8)
            .lru()
            .clock(clock.clone())
            .expiration(Duration::from_secs(10))
            .loader_with_expire(|_ctx, key: &String| Ok((format!("v-{key}"), None)))
            .build();
        let ctx = Context::background();
        let key = "x".to_string();

        cache.get(&ctx, &key).unwrap();
        clock.advance(Duration::from_secs(5));
        assert!(cache.existed(&key));
        clock.advance(Duration::from_secs(6));
        assert!(!cache.existed(&key));
    }

    #[test]
    fn expired_entry_is_reloaded_on_get() {
        let clock = Arc::new(FakeClock::new());
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache: Cache<String, usize> = CacheBuilder::new(8)
            .lru()
            .clock(clock.clone())
            .expiration(Duration::from_secs(10))
            .loader({
                let invocations = Arc::clone(&invocations);
                move |_ctx, _key: &String| Ok(invocations.fetch_add(1, Ordering::SeqCst))
            })
            .build();
        let ctx = Context::background();
        let key = "x".to_string();

        assert_eq!(cache.get(&ctx, &key).unwrap(), 0);
        clock.advance(Duration::from_secs(11));
        // the expired entry reads as a miss and triggers a fresh load
        assert_eq!(cache.get(&ctx, &key).unwrap(), 1);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }
}
