//! 배당 이력 수집기.
//!
//! 이 crate는 다음을 제공합니다:
//! - 고정 크기 워커 풀 기반 수집 파이프라인 (심볼별 오류 격리)
//! - 심볼 단위 다운로드 → 중복 제거 → 저장 → 조정값 재계산
//! - `divtrack` CLI (fetch, screen, run)

pub mod error;
pub mod modules;
pub mod stats;

pub use error::{CollectorError, Result};
pub use modules::{AcquisitionPipeline, FetchFailure, FetchReport, Stage, SymbolError, SymbolWorker};
pub use stats::CollectionStats;
