//! 심볼 단위 수집 작업.
//!
//! 가격/배당/분할 이력을 내려받아 유형별로 저장한 뒤 조정값을 다시 계산합니다.
//! 실패 시 처음 실패한 단계(download, parse, persist)를 오류에 담습니다.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{Months, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info};

use divtrack_core::DividendRecord;
use divtrack_data::{DataError, DividendStore, MarketDataSource, WriteMode};

/// 작업 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Parse,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Parse => "parse",
            Stage::Persist => "persist",
        };
        write!(f, "{}", name)
    }
}

/// 심볼 작업 오류.
#[derive(Debug, Error)]
#[error("{stage} 단계 실패: {source}")]
pub struct SymbolError {
    pub stage: Stage,
    #[source]
    pub source: DataError,
}

impl SymbolError {
    fn fetch(source: DataError) -> Self {
        let stage = match source {
            DataError::Parse(_) => Stage::Parse,
            _ => Stage::Download,
        };
        Self { stage, source }
    }

    fn persist(source: DataError) -> Self {
        Self {
            stage: Stage::Persist,
            source,
        }
    }

    /// 실행 전체를 중단해야 하는 오류인지 여부.
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// 심볼 작업 결과 (저장된 행 수).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolOutcome {
    pub prices: usize,
    pub dividends: usize,
    pub splits: usize,
}

/// 심볼 단위 수집기.
pub struct SymbolWorker {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn DividendStore>,
    mode: WriteMode,
    lookback_years: u32,
    today: NaiveDate,
}

impl SymbolWorker {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn DividendStore>,
        mode: WriteMode,
        lookback_years: u32,
    ) -> Self {
        Self {
            source,
            store,
            mode,
            lookback_years,
            today: Utc::now().date_naive(),
        }
    }

    /// 기준일 지정 (테스트용).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// 저장소 참조.
    pub fn store(&self) -> &Arc<dyn DividendStore> {
        &self.store
    }

    /// 전체 재수집 시작일 (오늘 - lookback_years).
    pub fn reset_start(&self) -> NaiveDate {
        self.today
            .checked_sub_months(Months::new(self.lookback_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// 조회 시작일.
    ///
    /// Append 모드에서는 마지막 저장 가격 다음 날부터, 저장된 가격이 없으면
    /// 전체 재수집 시작일부터 조회합니다.
    pub async fn lookback_start(&self, ticker: &str) -> Result<NaiveDate, SymbolError> {
        if self.mode == WriteMode::Reset {
            return Ok(self.reset_start());
        }

        let last = self
            .store
            .last_price_date(ticker)
            .await
            .map_err(SymbolError::persist)?;

        Ok(last
            .and_then(|d| d.succ_opt())
            .unwrap_or_else(|| self.reset_start()))
    }

    /// 한 심볼 처리.
    pub async fn process(&self, ticker: &str) -> Result<SymbolOutcome, SymbolError> {
        let from = self.lookback_start(ticker).await?;
        debug!(from = %from, mode = ?self.mode, "수집 시작");

        let prices = self
            .source
            .fetch_prices(ticker, from)
            .await
            .map_err(SymbolError::fetch)?;
        let dividends = self
            .source
            .fetch_dividends(ticker, from)
            .await
            .map_err(SymbolError::fetch)?;
        let splits = self
            .source
            .fetch_splits(ticker, from)
            .await
            .map_err(SymbolError::fetch)?;

        let stored_ids = self
            .store
            .dividend_ids(ticker)
            .await
            .map_err(SymbolError::persist)?;
        let new_dividends = dedup_dividends(dividends, &stored_ids);

        let outcome = SymbolOutcome {
            prices: self
                .store
                .save_prices(ticker, &prices, self.mode)
                .await
                .map_err(SymbolError::persist)?,
            dividends: self
                .store
                .save_dividends(ticker, &new_dividends, WriteMode::Append)
                .await
                .map_err(SymbolError::persist)?,
            splits: self
                .store
                .save_splits(ticker, &splits, self.mode)
                .await
                .map_err(SymbolError::persist)?,
        };

        self.store
            .recompute_adjusted(ticker)
            .await
            .map_err(SymbolError::persist)?;

        info!(
            prices = outcome.prices,
            dividends = outcome.dividends,
            splits = outcome.splits,
            "수집 및 저장 완료"
        );

        Ok(outcome)
    }
}

/// 이미 저장된 id와 배치 내 중복 id를 제거합니다.
fn dedup_dividends(dividends: Vec<DividendRecord>, stored: &HashSet<String>) -> Vec<DividendRecord> {
    let mut seen = HashSet::new();
    dividends
        .into_iter()
        .filter(|d| !stored.contains(&d.external_id) && seen.insert(d.external_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use divtrack_core::{DividendFrequency, PaymentType};

    fn dividend(id: &str) -> DividendRecord {
        DividendRecord {
            external_id: id.to_string(),
            ex_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            amount: 0.5,
            amount_adj: 0.5,
            currency: "USD".to_string(),
            frequency: DividendFrequency::Quarterly,
            payment_type: PaymentType::Cash,
        }
    }

    #[test]
    fn test_dedup_dividends() {
        let stored: HashSet<String> = ["E1".to_string()].into_iter().collect();
        let kept = dedup_dividends(
            vec![dividend("E1"), dividend("E2"), dividend("E2"), dividend("E3")],
            &stored,
        );
        let ids: Vec<&str> = kept.iter().map(|d| d.external_id.as_str()).collect();
        assert_eq!(ids, vec!["E2", "E3"]);
    }

    #[test]
    fn test_stage_classification() {
        assert_eq!(SymbolError::fetch(DataError::Parse("x".into())).stage, Stage::Parse);
        assert_eq!(SymbolError::fetch(DataError::Network("x".into())).stage, Stage::Download);
        let persist = SymbolError::persist(DataError::Persist("x".into()));
        assert_eq!(persist.stage, Stage::Persist);
        assert!(persist.is_fatal());
        assert_eq!(persist.to_string(), "persist 단계 실패: Persist error: x");
    }
}
