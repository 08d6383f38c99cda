//! 외부 API 요청 제한기.
//!
//! Token Bucket 알고리즘 기반으로 모든 수집 워커가 하나의 버킷을 공유합니다.
//! 대기 순서(FIFO)는 보장하지 않습니다.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use divtrack_core::RateLimitConfig;

/// Token Bucket 구조체.
#[derive(Debug)]
struct TokenBucket {
    /// 현재 토큰 수
    tokens: f64,
    /// 마지막 리필 시간
    last_refill: Instant,
    /// 최대 토큰 수 (버킷 용량)
    max_tokens: f64,
    /// 초당 리필되는 토큰 수
    refill_rate: f64,
}

impl TokenBucket {
    fn new(per_second: f64, burst: u32) -> Self {
        let max_tokens = f64::from(burst.max(1));

        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate: per_second,
        }
    }

    /// 토큰 소비 시도.
    ///
    /// 성공하면 `true`, 토큰이 없으면 `false` 반환.
    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// 토큰 리필.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// 다음 토큰까지 대기 시간.
    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// 공유 Rate Limiter.
///
/// `Arc<RateLimiter>`로 감싸 모든 클라이언트 생성자에 전달합니다.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// 새 Rate Limiter 생성.
    ///
    /// `per_second`는 0보다 커야 합니다 (설정 검증에서 보장).
    pub fn new(per_second: f64, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(per_second, burst)),
        }
    }

    /// 설정에서 생성.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.per_second, config.burst)
    }

    /// 토큰을 얻을 때까지 대기합니다.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_next_token()
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// 대기 없이 토큰 소비 시도.
    pub async fn try_acquire(&self) -> bool {
        self.bucket.lock().await.try_acquire()
    }
}
