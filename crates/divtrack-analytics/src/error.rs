//! 분석 모듈 오류 타입.

use divtrack_data::DataError;
use thiserror::Error;

/// 분석 관련 오류.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// 심볼별 계산 실패
    #[error("{ticker}: {source}")]
    Ticker {
        ticker: String,
        #[source]
        source: DataError,
    },

    /// 계산 작업이 결과를 보내지 못하고 종료됨
    #[error("Task error: {0}")]
    Task(String),

    /// 취소됨
    #[error("Aggregation cancelled")]
    Cancelled,

    /// 리포트 파일 쓰기 오류
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 리포트 직렬화 오류
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// 오류가 발생한 티커 (심볼별 오류인 경우).
    pub fn ticker(&self) -> Option<&str> {
        match self {
            AnalyticsError::Ticker { ticker, .. } => Some(ticker),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
