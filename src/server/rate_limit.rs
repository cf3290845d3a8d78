use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::config::RateLimitSettings;
use crate::{Error, Result};

/// How often buckets that have refilled completely are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Token buckets for the client routes, one per client address.
///
/// A client starts with `burst` tokens and regains `requests_per_minute` tokens per
/// minute up to `burst`. A full bucket carries no state and is pruned.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    buckets: Arc<Mutex<Buckets>>,
    per_second: f64,
    burst: f64,
}

#[derive(Debug)]
struct Buckets {
    per_client: HashMap<IpAddr, Bucket>,
    pruned_at: Instant,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, per_second: f64, burst: f64) {
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(burst);
        self.refilled_at = now;
    }
}

impl RateLimiter {
    pub fn from_config(settings: &RateLimitSettings) -> Self {
        Self::new(settings.requests_per_minute, settings.burst)
    }

    pub fn new(requests_per_minute: u64, burst: u64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(Buckets {
                per_client: HashMap::new(),
                pruned_at: Instant::now(),
            })),
            per_second: requests_per_minute as f64 / 60.0,
            burst: burst as f64,
        }
    }

    /// Takes one token from the bucket of `client`, failing `RateLimited` when it is empty.
    pub async fn check(&self, client: IpAddr) -> Result<()> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        if now.duration_since(buckets.pruned_at) >= PRUNE_INTERVAL {
            self.prune_locked(&mut buckets, now);
        }

        let bucket = buckets.per_client.entry(client).or_insert(Bucket {
            tokens: self.burst,
            refilled_at: now,
        });
        bucket.refill(now, self.per_second, self.burst);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            debug!(%client, "Rate limit exceeded");
            Err(Error::RateLimited)
        }
    }

    /// Number of clients with a partially drained bucket.
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.per_client.len()
    }

    fn prune_locked(&self, buckets: &mut Buckets, now: Instant) {
        let (per_second, burst) = (self.per_second, self.burst);
        buckets.per_client.retain(|_, bucket| {
            bucket.refill(now, per_second, burst);
            bucket.tokens < burst
        });
        buckets.pruned_at = now;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    const ALICE: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const BOB: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);

    #[tokio::test]
    async fn burst_is_per_client() {
        let limiter = RateLimiter::new(60, 3);

        for _ in 0..3 {
            limiter.check(ALICE).await.unwrap();
        }
        assert!(matches!(limiter.check(ALICE).await, Err(Error::RateLimited)));

        // Another address still has its whole burst.
        for _ in 0..3 {
            limiter.check(BOB).await.unwrap();
        }
        assert_eq!(limiter.tracked_clients().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_bucket_refills_over_time() {
        let limiter = RateLimiter::new(120, 2);

        limiter.check(ALICE).await.unwrap();
        limiter.check(ALICE).await.unwrap();
        assert!(limiter.check(ALICE).await.is_err());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(limiter.check(ALICE).await.is_ok());
        assert!(limiter.check(ALICE).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn refilled_buckets_are_pruned() {
        let limiter = RateLimiter::new(60, 5);
        limiter.check(ALICE).await.unwrap();
        limiter.check(BOB).await.unwrap();

        tokio::time::advance(PRUNE_INTERVAL).await;
        limiter.check(ALICE).await.unwrap();

        // Bob refilled and was dropped; Alice was pruned too, then drew again.
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn built_from_settings() {
        let limiter = RateLimiter::from_config(&RateLimitSettings {
            requests_per_minute: 120,
            burst: 10,
        });
        assert_eq!(limiter.per_second, 2.0);
        assert_eq!(limiter.burst, 10.0);
    }
}
