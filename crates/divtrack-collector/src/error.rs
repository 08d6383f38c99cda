//! 에러 타입 정의.

use divtrack_data::DataError;
use thiserror::Error;

use crate::modules::SymbolError;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 실행 전체를 중단시키는 저장소 오류
    #[error("{ticker} 처리 중 치명적 오류: {source}")]
    Fatal {
        ticker: String,
        #[source]
        source: SymbolError,
    },

    /// 스키마 초기화 실패
    #[error("Schema initialization failed: {0}")]
    Schema(#[source] DataError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 워커 태스크 종료 실패
    #[error("Worker join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
