//! 스크리닝 필터 파이프라인.
//!
//! 모든 필터를 통과한 행만 남습니다. 임계값이 0 이하이면 해당 경계는
//! 비활성화되고, 활성화된 경계에 대해 NaN/무한대 값은 항상 탈락합니다.

use tracing::debug;

use divtrack_core::ThresholdConfig;

use crate::stats::{Stats, StatsRow};

/// 통계 행 필터.
pub trait RowFilter: Send + Sync {
    /// 필터 이름 (로그용).
    fn name(&self) -> &'static str;

    /// 행을 남길지 여부.
    fn keep(&self, row: &StatsRow) -> bool;
}

/// `value`가 활성화된 경계 안에 있는지 확인합니다.
///
/// `min`/`max`가 0 이하이면 해당 경계는 검사하지 않습니다.
pub fn within_bounds(value: f64, min: f64, max: f64) -> bool {
    if min > 0.0 && !(value.is_finite() && value >= min) {
        return false;
    }
    if max > 0.0 && !(value.is_finite() && value <= max) {
        return false;
    }
    true
}

/// 양수 항목만 남긴 뒤 인접한 두 값이 엄격히 증가하는 구간이 있는지 확인합니다.
pub fn is_accelerating(sequence: &[f64]) -> bool {
    let positive: Vec<f64> = sequence.iter().copied().filter(|v| *v > 0.0).collect();
    positive.windows(2).any(|w| w[0] < w[1])
}

/// 배당수익률 범위.
#[derive(Debug, Clone, Copy)]
pub struct YieldRange {
    pub min: f64,
    pub max: f64,
}

impl RowFilter for YieldRange {
    fn name(&self) -> &'static str {
        "yield_range"
    }

    fn keep(&self, row: &StatsRow) -> bool {
        within_bounds(row.forward_yield, self.min, self.max)
    }
}

/// 최소 총수익률 (배당수익률 + DGR5).
#[derive(Debug, Clone, Copy)]
pub struct MinTotalYield(pub f64);

impl RowFilter for MinTotalYield {
    fn name(&self) -> &'static str {
        "min_total_yield"
    }

    fn keep(&self, row: &StatsRow) -> bool {
        within_bounds(row.total_yield(), self.0, 0.0)
    }
}

/// Gordon 성장률 범위.
#[derive(Debug, Clone, Copy)]
pub struct GordonRange {
    pub min: f64,
    pub max: f64,
}

impl RowFilter for GordonRange {
    fn name(&self) -> &'static str {
        "gordon_range"
    }

    fn keep(&self, row: &StatsRow) -> bool {
        within_bounds(row.gordon_growth_rate, self.min, self.max)
    }
}

/// 배당 삭감 이력 제외.
#[derive(Debug, Clone, Copy)]
pub struct NoCutDividend;

impl RowFilter for NoCutDividend {
    fn name(&self) -> &'static str {
        "no_cut_dividend"
    }

    fn keep(&self, row: &StatsRow) -> bool {
        !row.has_dividend_cut()
    }
}

/// [DGR5, DGR4, DGR3, DGR2, DGR1, MR%] 중 가속 구간이 없는 종목 제외.
#[derive(Debug, Clone, Copy)]
pub struct NoDecliningDgr;

impl RowFilter for NoDecliningDgr {
    fn name(&self) -> &'static str {
        "no_declining_dgr"
    }

    fn keep(&self, row: &StatsRow) -> bool {
        let sequence = [
            row.dgr(5),
            row.dgr(4),
            row.dgr(3),
            row.dgr(2),
            row.dgr(1),
            row.mr_pct(),
        ];
        is_accelerating(&sequence)
    }
}

/// 순서가 있는 필터 목록.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn RowFilter>>,
}

impl FilterPipeline {
    /// 빈 파이프라인 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 필터 추가.
    pub fn with(mut self, filter: impl RowFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// 임계값 설정으로부터 파이프라인 구성.
    pub fn from_thresholds(thresholds: &ThresholdConfig) -> Self {
        let mut pipeline = Self::new()
            .with(YieldRange {
                min: thresholds.min_yield,
                max: thresholds.max_yield,
            })
            .with(MinTotalYield(thresholds.min_total_yield))
            .with(GordonRange {
                min: thresholds.min_ggr,
                max: thresholds.max_ggr,
            });

        if thresholds.no_cut_dividend {
            pipeline = pipeline.with(NoCutDividend);
        }
        if thresholds.no_declining_dgr {
            pipeline = pipeline.with(NoDecliningDgr);
        }
        pipeline
    }

    /// 등록된 필터 수.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// 필터가 없는지 여부.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// 행이 모든 필터를 통과하는지 확인합니다.
    pub fn keep(&self, row: &StatsRow) -> bool {
        match self.filters.iter().find(|f| !f.keep(row)) {
            Some(filter) => {
                debug!(ticker = %row.ticker, filter = filter.name(), "필터 탈락");
                false
            }
            None => true,
        }
    }

    /// 통과한 행만 남긴 결과를 반환합니다.
    pub fn apply(&self, stats: Stats) -> Stats {
        let rows = stats.into_rows().into_iter().filter(|row| self.keep(row)).collect();
        Stats::new(rows)
    }
}
