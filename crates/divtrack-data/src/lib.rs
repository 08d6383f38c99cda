//! 시장 데이터 수집 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 외부 데이터 소스 클라이언트 (Polygon.io REST)
//! - 모든 워커가 공유하는 Token Bucket 요청 제한기
//! - 배당 이력 저장소 (PostgreSQL, 인메모리)

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::{MarketDataSource, PolygonClient, RateLimiter};
pub use storage::{
    DividendQuery, DividendStore, MemoryStore, PgDividendStore, WriteMode,
};
