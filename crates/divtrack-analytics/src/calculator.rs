//! 심볼별 배당 통계 계산기.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::debug;

use divtrack_data::{DividendQuery, DividendStore};

use crate::error::{AnalyticsError, Result};
use crate::stats::StatsRow;

/// 배당 이력을 조회하는 기간 (년).
pub const HISTORY_YEARS: i32 = 11;

/// 저장된 이력으로부터 [`StatsRow`]를 계산합니다.
#[derive(Clone)]
pub struct StatCalculator {
    store: Arc<dyn DividendStore>,
    required_return: f64,
    as_of: NaiveDate,
}

impl StatCalculator {
    /// 오늘 날짜 기준 계산기 생성.
    pub fn new(store: Arc<dyn DividendStore>, required_return: f64) -> Self {
        Self::with_as_of(store, required_return, Utc::now().date_naive())
    }

    /// 기준일을 지정해 계산기 생성.
    pub fn with_as_of(store: Arc<dyn DividendStore>, required_return: f64, as_of: NaiveDate) -> Self {
        Self {
            store,
            required_return,
            as_of,
        }
    }

    /// 기준일.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// 배당 이력 조회 시작일 (기준 연도 - 11년의 1월 1일).
    pub fn history_start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.as_of.year() - HISTORY_YEARS, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// 한 심볼의 통계 행 계산.
    pub async fn compute(&self, ticker: &str) -> Result<StatsRow> {
        let wrap = |source| AnalyticsError::Ticker {
            ticker: ticker.to_string(),
            source,
        };

        let latest = self.store.latest_yield_point(ticker).await.map_err(wrap)?;
        let (forward_yield, forward_dividend) = latest
            .map(|p| (p.dividend_yield, p.ttm_dividend_adj))
            .unwrap_or((0.0, 0.0));

        let dividends = self
            .store
            .dividends(ticker, &DividendQuery::regular_cash_since(self.history_start()))
            .await
            .map_err(wrap)?;

        debug!(
            ticker = %ticker,
            forward_yield,
            dividends = dividends.len(),
            "통계 계산"
        );

        Ok(StatsRow::new(
            ticker,
            self.as_of,
            forward_yield,
            forward_dividend,
            self.required_return - forward_yield,
            dividends,
        ))
    }
}
