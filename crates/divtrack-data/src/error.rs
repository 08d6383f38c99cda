//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
///
/// 수집 파이프라인은 `is_fatal()`로 심볼 단위 오류와 실행 전체를 중단해야 하는
/// 오류를 구분합니다.
#[derive(Debug, Error)]
pub enum DataError {
    /// 네트워크 오류 (연결 실패, 타임아웃, 비정상 HTTP 상태)
    #[error("Network error: {0}")]
    Network(String),

    /// 응답 파싱 오류
    #[error("Parse error: {0}")]
    Parse(String),

    /// 트랜잭션 저장 실패 (전체 롤백됨)
    #[error("Persist error: {0}")]
    Persist(String),

    /// 스키마 초기화 실패
    #[error("Schema error: {0}")]
    Schema(String),

    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    Connection(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    Query(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// 실행 전체를 중단해야 하는 오류인지 확인합니다.
    ///
    /// 네트워크/파싱 오류는 해당 심볼에만 영향을 줍니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DataError::Persist(_)
                | DataError::Schema(_)
                | DataError::Connection(_)
                | DataError::Query(_)
        )
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DataError::Connection(err.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => DataError::Connection(err.to_string()),
            sqlx::Error::Database(db_err) => DataError::Query(db_err.message().to_string()),
            _ => DataError::Query(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DataError::Parse(err.to_string())
        } else {
            DataError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!DataError::Network("timeout".to_string()).is_fatal());
        assert!(!DataError::Parse("bad json".to_string()).is_fatal());
        assert!(DataError::Persist("rollback".to_string()).is_fatal());
        assert!(DataError::Schema("no table".to_string()).is_fatal());
    }

    #[test]
    fn test_serde_error_is_parse() {
        let err: DataError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, DataError::Parse(_)));
    }
}
