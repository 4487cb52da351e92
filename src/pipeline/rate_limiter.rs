use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub requests_per_min: Option<u64>,
}

/// Token-bucket limiter shared by the spiders' fetch helpers. Crawling is
/// single-threaded and sequential, so this only has to smooth out bursts.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // token bucket modeled by the time of last refill and the current tokens
    rpm_tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let now = Instant::now();
        let rpm_capacity = limits.requests_per_min.unwrap_or(0) as f64;
        Self {
            inner: Arc::new(Inner {
                limits,
                rpm_tokens: Mutex::new((rpm_capacity, now)),
            }),
        }
    }

    /// Acquire permission for one request. Awaits as needed.
    pub async fn acquire(&self) {
        if let Some(rpm) = self.inner.limits.requests_per_min {
            if rpm > 0 {
                self.consume_token(rpm as f64, 60.0).await;
            }
        }
    }

    async fn consume_token(&self, capacity: f64, period_secs: f64) {
        // Basic token bucket: refill continuously, wait until a token accumulates
        loop {
            let mut guard = self.inner.rpm_tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            let refill_rate = capacity / period_secs; // tokens per second
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            } else {
                let need = 1.0 - *tokens;
                let secs = need / refill_rate;
                drop(guard);
                tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
            }
        }
    }
}

/// Sleep for a randomized interval around `average_secs`, anywhere between
/// half and one-and-a-half times the average. Sources that ban on download
/// volume notice fixed cadences.
pub async fn random_delay(average_secs: u64) {
    if average_secs == 0 {
        return;
    }
    let half = (average_secs as f64) / 2.0;
    let secs = rand::thread_rng().gen_range(half..=half * 3.0);
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_acquire_is_immediate() {
        let limiter = RateLimiter::new(Limits::default());
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn bucket_delays_once_drained() {
        // 60 rpm -> one token per second, capacity 60 but we drain it first
        let limiter = RateLimiter::new(Limits {
            requests_per_min: Some(60),
        });
        // Drain the initial capacity
        for _ in 0..60 {
            limiter.acquire().await;
        }
        let start = Instant::now();
        limiter.acquire().await;
        // The 61st request must wait roughly one refill period
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn zero_delay_returns_immediately() {
        let start = Instant::now();
        random_delay(0).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
