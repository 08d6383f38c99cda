//! 데이터 Provider 모듈.
//!
//! ## Polygon.io
//! - `PolygonClient`: 일봉, 배당, 분할 이력 조회
//! - 모든 요청은 공유 `RateLimiter`에서 토큰을 얻은 뒤 실행됩니다
//!
//! ## 데이터 소스 trait
//! - `MarketDataSource`: 수집 워커가 사용하는 소스 중립 인터페이스

pub mod polygon;
pub mod rate_limit;

use async_trait::async_trait;
use chrono::NaiveDate;

use divtrack_core::{DividendRecord, PriceRecord, SplitRecord};

use crate::Result;

pub use polygon::PolygonClient;
pub use rate_limit::RateLimiter;

/// 심볼별 과거 데이터 소스 trait.
///
/// 반환되는 레코드의 조정값(`close_adj`, `amount_adj`)은 원본 값으로 채워지며,
/// 저장 후 저장소가 분할 이력을 반영해 다시 계산합니다.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// `from` 이후의 일봉 이력 (날짜 오름차순).
    async fn fetch_prices(&self, ticker: &str, from: NaiveDate) -> Result<Vec<PriceRecord>>;

    /// `from` 이후의 배당 이벤트.
    async fn fetch_dividends(&self, ticker: &str, from: NaiveDate)
        -> Result<Vec<DividendRecord>>;

    /// `from` 이후의 분할 이벤트.
    async fn fetch_splits(&self, ticker: &str, from: NaiveDate) -> Result<Vec<SplitRecord>>;
}
