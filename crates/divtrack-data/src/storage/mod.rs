//! 배당 이력 저장소.
//!
//! - `PgDividendStore`: PostgreSQL 구현 (분할 조정은 저장 함수로 실행)
//! - `MemoryStore`: 인메모리 구현 (테스트, dry-run)
//!
//! 한 심볼의 레코드 유형별 쓰기는 하나의 트랜잭션에서 실행되며
//! 실패 시 전체 롤백됩니다.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use divtrack_core::{DividendRecord, DividendYieldPoint, PriceRecord, SplitRecord};

use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgDividendStore;

/// 쓰기 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// 기존 레코드를 모두 삭제한 뒤 저장
    Reset,
    /// 기존 레코드를 유지하고 새 레코드만 추가
    #[default]
    Append,
}

/// 배당 조회 조건.
#[derive(Debug, Clone, Default)]
pub struct DividendQuery {
    /// 이 날짜 이후(포함)의 배당락일만
    pub from: Option<NaiveDate>,
    /// 현금 지급(cash, both)만
    pub cash_only: bool,
    /// 정기 배당(연/반기/분기/월)만
    pub regular_only: bool,
    /// 최대 개수
    pub limit: Option<usize>,
}

impl DividendQuery {
    /// `from` 이후의 정기 현금 배당 조회 조건.
    pub fn regular_cash_since(from: NaiveDate) -> Self {
        Self {
            from: Some(from),
            cash_only: true,
            regular_only: true,
            limit: None,
        }
    }

    /// 레코드가 조건에 맞는지 확인합니다 (`limit` 제외).
    pub fn matches(&self, dividend: &DividendRecord) -> bool {
        if let Some(from) = self.from {
            if dividend.ex_date < from {
                return false;
            }
        }
        if self.cash_only && !dividend.payment_type.is_cash() {
            return false;
        }
        if self.regular_only && !dividend.frequency.is_regular() {
            return false;
        }
        true
    }
}

/// 배당 이력 저장소 trait.
#[async_trait]
pub trait DividendStore: Send + Sync {
    /// 테이블과 조정 함수를 만들고 심볼을 등록합니다.
    async fn init_schema(&self, tickers: &[String]) -> Result<()>;

    /// 가격 이력 저장. 저장된 행 수를 반환합니다.
    async fn save_prices(&self, ticker: &str, prices: &[PriceRecord], mode: WriteMode)
        -> Result<usize>;

    /// 배당 이벤트 저장. 이미 저장된 `external_id`는 무시합니다.
    async fn save_dividends(
        &self,
        ticker: &str,
        dividends: &[DividendRecord],
        mode: WriteMode,
    ) -> Result<usize>;

    /// 분할 이벤트 저장.
    async fn save_splits(&self, ticker: &str, splits: &[SplitRecord], mode: WriteMode)
        -> Result<usize>;

    /// 분할 이력을 반영해 조정 종가와 조정 배당금을 다시 계산합니다.
    async fn recompute_adjusted(&self, ticker: &str) -> Result<()>;

    /// 배당수익률 시계열 (날짜 내림차순).
    async fn dividend_yield_series(&self, ticker: &str) -> Result<Vec<DividendYieldPoint>>;

    /// 가장 최근 배당수익률 포인트.
    async fn latest_yield_point(&self, ticker: &str) -> Result<Option<DividendYieldPoint>> {
        Ok(self.dividend_yield_series(ticker).await?.into_iter().next())
    }

    /// 조건에 맞는 배당 이벤트 (배당락일 내림차순).
    async fn dividends(&self, ticker: &str, query: &DividendQuery) -> Result<Vec<DividendRecord>>;

    /// 저장된 배당 `external_id` 목록 (중복 확인용).
    async fn dividend_ids(&self, ticker: &str) -> Result<HashSet<String>>;

    /// 마지막으로 저장된 가격 일자.
    async fn last_price_date(&self, ticker: &str) -> Result<Option<NaiveDate>>;
}
