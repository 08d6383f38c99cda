//! 심볼별 통계 병렬 계산 엔진.
//!
//! 심볼마다 작업 하나를 띄우고 단일 수집기가 결과를 모읍니다.
//! 하나라도 실패하면 그때까지 모은 행을 버리고 첫 오류를 반환합니다.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use divtrack_data::DividendStore;

use crate::calculator::StatCalculator;
use crate::error::{AnalyticsError, Result};
use crate::stats::{Stats, StatsRow};

/// 통계 집계 엔진.
#[derive(Clone)]
pub struct AggregationEngine {
    calculator: StatCalculator,
}

impl AggregationEngine {
    /// 오늘 날짜 기준 엔진 생성.
    pub fn new(store: Arc<dyn DividendStore>, required_return: f64) -> Self {
        Self::with_calculator(StatCalculator::new(store, required_return))
    }

    /// 계산기를 지정해 엔진 생성.
    pub fn with_calculator(calculator: StatCalculator) -> Self {
        Self { calculator }
    }

    /// 모든 심볼의 통계를 계산합니다.
    ///
    /// 성공 시 티커 오름차순으로 정렬된 결과를 반환합니다. 취소되면 새 작업을
    /// 띄우지 않고, 이미 띄운 작업이 끝난 뒤 [`AnalyticsError::Cancelled`]를 반환합니다.
    /// 모든 작업을 띄운 뒤에 취소된 경우도 같습니다.
    pub async fn generate(&self, cancel: &CancellationToken, tickers: &[String]) -> Result<Stats> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Result<StatsRow>>();

        let mut dispatched = 0usize;
        let mut cancelled = false;

        for ticker in tickers {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let calculator = self.calculator.clone();
            let tx = tx.clone();
            let ticker = ticker.clone();
            tokio::spawn(async move {
                let result = calculator.compute(&ticker).await;
                // 수집기가 이미 실패로 종료했으면 결과는 버려짐
                let _ = tx.send(result);
            });
            dispatched += 1;
        }
        drop(tx);

        let mut rows = Vec::with_capacity(dispatched);
        while let Some(result) = rx.recv().await {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(
                        ticker = e.ticker().unwrap_or("-"),
                        error = %e,
                        discarded = rows.len(),
                        "통계 계산 실패, 집계 중단"
                    );
                    return Err(e);
                }
            }
        }

        if rows.len() < dispatched {
            return Err(AnalyticsError::Task(format!(
                "{}개 작업 중 {}개만 결과를 보냄",
                dispatched,
                rows.len()
            )));
        }

        if cancelled || cancel.is_cancelled() {
            info!(completed = rows.len(), "집계 취소됨");
            return Err(AnalyticsError::Cancelled);
        }

        rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        info!(rows = rows.len(), "통계 집계 완료");

        Ok(Stats::new(rows))
    }
}
