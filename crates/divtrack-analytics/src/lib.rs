//! 배당 성장 통계 및 스크리닝.
//!
//! - `calculator`: 심볼별 배당수익률, Gordon 성장률, 연간 변화율 계산
//! - `stats`: 계산 결과 행과 DGR(n) 중앙값 메모이제이션
//! - `engine`: 심볼별 병렬 계산 및 fail-fast 수집
//! - `filter`: 임계값 기반 필터 파이프라인
//! - `report`: 표 출력 및 JSON 리포트

pub mod calculator;
pub mod engine;
pub mod error;
pub mod filter;
pub mod report;
pub mod stats;

pub use calculator::StatCalculator;
pub use engine::AggregationEngine;
pub use error::{AnalyticsError, Result};
pub use filter::{FilterPipeline, RowFilter};
pub use report::SortKey;
pub use stats::{DividendChange, Stats, StatsRow};
