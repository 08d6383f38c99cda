//! 수집 파이프라인.
//!
//! 고정 크기 워커 풀이 공유 작업 큐에서 심볼을 꺼내 [`SymbolWorker`]를 실행합니다.
//!
//! - 네트워크/파싱 오류는 심볼별로 모아 반환하며 배치를 중단하지 않습니다.
//! - 저장소 오류는 제출을 멈추고, 진행 중인 작업이 끝난 뒤 반환됩니다.
//! - 취소되면 새 심볼을 제출하지 않고, 이미 제출된 심볼은 끝까지 처리합니다.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use divtrack_core::ticker_span;

use super::symbol_worker::{SymbolError, SymbolOutcome, SymbolWorker};
use crate::error::{CollectorError, Result};
use crate::stats::CollectionStats;

/// 심볼별 실패.
#[derive(Debug)]
pub struct FetchFailure {
    pub ticker: String,
    pub error: SymbolError,
}

/// 수집 결과.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// 심볼별 실패 목록
    pub failures: Vec<FetchFailure>,
    /// 수집 통계
    pub stats: CollectionStats,
}

/// 워커가 수집기로 보내는 결과.
struct FetchResult {
    ticker: String,
    result: std::result::Result<SymbolOutcome, SymbolError>,
}

/// 결과 누적 상태.
#[derive(Default)]
struct Collected {
    report: FetchReport,
    fatal: Option<(String, SymbolError)>,
}

impl Collected {
    fn record(&mut self, FetchResult { ticker, result }: FetchResult) {
        let stats = &mut self.report.stats;
        match result {
            Ok(outcome) => {
                stats.success += 1;
                stats.prices += outcome.prices;
                stats.dividends += outcome.dividends;
                stats.splits += outcome.splits;
            }
            Err(e) if e.is_fatal() => {
                stats.errors += 1;
                error!(ticker = %ticker, error = %e, "저장소 오류, 수집 중단");
                if self.fatal.is_none() {
                    self.fatal = Some((ticker, e));
                }
            }
            Err(e) => {
                stats.errors += 1;
                warn!(ticker = %ticker, error = %e, "수집 실패");
                self.report.failures.push(FetchFailure { ticker, error: e });
            }
        }
    }
}

/// 수집 파이프라인.
pub struct AcquisitionPipeline {
    worker: Arc<SymbolWorker>,
    workers: usize,
}

impl AcquisitionPipeline {
    /// 새 파이프라인 생성. 워커 수는 최소 1입니다.
    pub fn new(worker: SymbolWorker, workers: usize) -> Self {
        Self {
            worker: Arc::new(worker),
            workers: workers.max(1),
        }
    }

    /// 심볼 목록 수집.
    ///
    /// 스키마를 초기화한 뒤 모든 심볼을 처리합니다. 심볼별 실패는
    /// [`FetchReport::failures`]에 담기고, 저장소 오류는 `Err`로 반환됩니다.
    pub async fn fetch(&self, cancel: &CancellationToken, tickers: &[String]) -> Result<FetchReport> {
        let start = Instant::now();

        self.worker
            .store()
            .init_schema(tickers)
            .await
            .map_err(CollectorError::Schema)?;

        info!(symbols = tickers.len(), workers = self.workers, "수집 시작");

        let (job_tx, job_rx) = mpsc::channel::<String>(self.workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<FetchResult>();

        let handles: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|_| {
                let worker = self.worker.clone();
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    loop {
                        let job = job_rx.lock().await.recv().await;
                        let Some(ticker) = job else { break };

                        let result = worker
                            .process(&ticker)
                            .instrument(ticker_span!("symbol", ticker))
                            .await;
                        if result_tx.send(FetchResult { ticker, result }).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(result_tx);

        let mut collected = Collected {
            report: FetchReport {
                stats: CollectionStats::new(tickers.len()),
                ..Default::default()
            },
            ..Default::default()
        };

        let mut pending = 0usize;
        let mut submitted = 0usize;

        for ticker in tickers {
            while let Ok(result) = result_rx.try_recv() {
                pending -= 1;
                collected.record(result);
            }
            if collected.fatal.is_some() || cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = job_tx.send(ticker.clone()) => {
                    if sent.is_err() {
                        break;
                    }
                    pending += 1;
                    submitted += 1;
                }
            }
        }
        drop(job_tx);

        if cancel.is_cancelled() {
            info!(submitted, pending, "취소 요청, 제출된 작업만 완료");
        }

        while pending > 0 {
            match result_rx.recv().await {
                Some(result) => {
                    pending -= 1;
                    collected.record(result);
                }
                None => break,
            }
        }

        for handle in handles {
            handle.await?;
        }

        let Collected { mut report, fatal } = collected;
        report.stats.skipped = tickers.len() - submitted;
        report.stats.elapsed = start.elapsed();

        if let Some((ticker, source)) = fatal {
            return Err(CollectorError::Fatal { ticker, source });
        }

        Ok(report)
    }
}
