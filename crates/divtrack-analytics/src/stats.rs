//! 심볼별 배당 통계 행.
//!
//! # 연간 변화율 (Change)
//!
//! 배당락일 내림차순으로 정렬된 인접 배당 `a`(최근), `b`(이전)에 대해
//! `(a.amount_adj / b.amount_adj - 1) * 100`. 통화가 다르거나 이전 배당이 없으면 NaN.
//!
//! # DGR(n)
//!
//! (Y-n)년 1월 1일과 (Y-1)년 12월 31일 사이(양 끝 제외)의 양수 Change 중앙값.
//! 삭감/동결은 음의 성장으로 세지 않고 제외합니다. 해당 값이 없으면 0.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::OnceCell;

use divtrack_core::DividendRecord;

use crate::report::SortKey;

/// DGR 메모이제이션 대상 최대 기간 (년).
pub const DGR_CACHE_YEARS: usize = 10;

/// Change가 부여된 배당 이벤트.
#[derive(Debug, Clone)]
pub struct DividendChange {
    /// 배당 이벤트
    pub dividend: DividendRecord,
    /// 직전 배당 대비 변화율 (%)
    pub change: f64,
}

/// DGR(n) 캐시. 기간별로 한 번만 기록됩니다.
#[derive(Debug, Default)]
struct DgrCache {
    cells: [OnceCell<f64>; DGR_CACHE_YEARS],
}

impl DgrCache {
    fn get_or_compute(&self, years: u32, compute: impl FnOnce() -> f64) -> f64 {
        match (years as usize).checked_sub(1).and_then(|i| self.cells.get(i)) {
            Some(cell) => *cell.get_or_init(compute),
            None => compute(),
        }
    }
}

/// 심볼별 통계 행.
///
/// Aggregation Engine이 심볼당 한 번 생성하며, Change는 생성 시 한 번 계산된 뒤
/// 변경되지 않습니다.
#[derive(Debug)]
pub struct StatsRow {
    /// 티커
    pub ticker: String,
    /// 기준일 (DGR 기간 계산용)
    pub as_of: NaiveDate,
    /// 배당수익률 (%)
    pub forward_yield: f64,
    /// 최근 12개월 조정 배당금 합계
    pub forward_dividend: f64,
    /// Gordon 성장률 (요구수익률 - 배당수익률)
    pub gordon_growth_rate: f64,
    changes: Vec<DividendChange>,
    dgr_cache: DgrCache,
}

impl StatsRow {
    /// 새 통계 행 생성.
    ///
    /// `dividends`는 (배당락일, `external_id`) 내림차순으로 정렬된 뒤 Change가 계산됩니다.
    pub fn new(
        ticker: impl Into<String>,
        as_of: NaiveDate,
        forward_yield: f64,
        forward_dividend: f64,
        gordon_growth_rate: f64,
        mut dividends: Vec<DividendRecord>,
    ) -> Self {
        dividends.sort_by(|a, b| {
            b.ex_date
                .cmp(&a.ex_date)
                .then_with(|| b.external_id.cmp(&a.external_id))
        });

        Self {
            ticker: ticker.into(),
            as_of,
            forward_yield,
            forward_dividend,
            gordon_growth_rate,
            changes: annotate_changes(dividends),
            dgr_cache: DgrCache::default(),
        }
    }

    /// Change가 부여된 배당 이벤트 (배당락일 내림차순).
    pub fn changes(&self) -> &[DividendChange] {
        &self.changes
    }

    /// n년 배당 성장률 (양수 Change의 중앙값).
    pub fn dgr(&self, years: u32) -> f64 {
        self.dgr_cache
            .get_or_compute(years, || compute_dgr(&self.changes, self.as_of, years))
    }

    /// 가장 최근 양수 Change와 그 배당락일.
    pub fn most_recent_increase(&self) -> Option<(f64, NaiveDate)> {
        self.changes
            .iter()
            .find(|c| c.change > 0.0)
            .map(|c| (c.change, c.dividend.ex_date))
    }

    /// MR%: 가장 최근 양수 Change (없으면 0).
    pub fn mr_pct(&self) -> f64 {
        self.most_recent_increase().map(|(c, _)| c).unwrap_or(0.0)
    }

    /// MR-date: 가장 최근 양수 Change의 배당락일.
    pub fn mr_date(&self) -> Option<NaiveDate> {
        self.most_recent_increase().map(|(_, d)| d)
    }

    /// 총수익률 = 배당수익률 + DGR(5).
    pub fn total_yield(&self) -> f64 {
        self.forward_yield + self.dgr(5)
    }

    /// 배당 삭감 이력 여부 (음수 Change 존재).
    pub fn has_dividend_cut(&self) -> bool {
        self.changes.iter().any(|c| c.change < 0.0)
    }
}

/// 인접 배당 간 Change 계산. 입력은 배당락일 내림차순이어야 합니다.
fn annotate_changes(dividends: Vec<DividendRecord>) -> Vec<DividendChange> {
    let changes: Vec<f64> = dividends
        .iter()
        .enumerate()
        .map(|(i, current)| match dividends.get(i + 1) {
            Some(previous) if previous.currency == current.currency => {
                (current.amount_adj / previous.amount_adj - 1.0) * 100.0
            }
            _ => f64::NAN,
        })
        .collect();

    dividends
        .into_iter()
        .zip(changes)
        .map(|(dividend, change)| DividendChange { dividend, change })
        .collect()
}

/// DGR(n) 계산.
fn compute_dgr(changes: &[DividendChange], as_of: NaiveDate, years: u32) -> f64 {
    let year = as_of.year();
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year - years as i32, 1, 1),
        NaiveDate::from_ymd_opt(year - 1, 12, 31),
    ) else {
        return 0.0;
    };

    let mut values: Vec<f64> = changes
        .iter()
        .filter(|c| c.dividend.ex_date > start && c.dividend.ex_date < end)
        .map(|c| c.change)
        .filter(|change| change.is_finite() && *change > 0.0)
        .collect();

    median(&mut values)
}

/// 중앙값 (짝수 개면 가운데 두 값의 평균, 비어 있으면 0).
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// 통계 결과 집합.
#[derive(Debug, Default)]
pub struct Stats {
    rows: Vec<StatsRow>,
}

impl Stats {
    /// 행 목록으로 생성.
    pub fn new(rows: Vec<StatsRow>) -> Self {
        Self { rows }
    }

    /// 행 목록.
    pub fn rows(&self) -> &[StatsRow] {
        &self.rows
    }

    /// 행 수.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 행 목록을 꺼냅니다.
    pub fn into_rows(self) -> Vec<StatsRow> {
        self.rows
    }

    /// 정렬 기준에 따라 행을 정렬합니다.
    pub fn sort(&mut self, key: SortKey) {
        key.sort(&mut self.rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use divtrack_core::{DividendFrequency, PaymentType};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dividend(ex_date: NaiveDate, amount: f64, currency: &str) -> DividendRecord {
        DividendRecord {
            external_id: format!("{}-{}", ex_date, currency),
            ex_date,
            amount,
            amount_adj: amount,
            currency: currency.to_string(),
            frequency: DividendFrequency::Annual,
            payment_type: PaymentType::Cash,
        }
    }

    /// 2019~2022 연간 배당: +10%, +2%, +30%
    fn growth_row() -> StatsRow {
        StatsRow::new(
            "GROW",
            date(2023, 6, 1),
            3.0,
            1.4586,
            7.0,
            vec![
                dividend(date(2019, 6, 1), 100.0, "USD"),
                dividend(date(2020, 6, 1), 110.0, "USD"),
                dividend(date(2021, 6, 1), 112.2, "USD"),
                dividend(date(2022, 6, 1), 145.86, "USD"),
            ],
        )
    }

    #[test]
    fn test_changes_sorted_descending_with_formula() {
        let row = growth_row();
        let changes = row.changes();

        assert_eq!(changes[0].dividend.ex_date, date(2022, 6, 1));
        for pair in changes.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let expected = (a.dividend.amount_adj / b.dividend.amount_adj - 1.0) * 100.0;
            assert_eq!(a.change, expected);
        }
        assert!(changes.last().unwrap().change.is_nan());
    }

    #[test]
    fn test_currency_mismatch_is_nan() {
        let row = StatsRow::new(
            "MIX",
            date(2024, 1, 1),
            0.0,
            0.0,
            0.0,
            vec![
                dividend(date(2022, 6, 1), 1.0, "CAD"),
                dividend(date(2023, 6, 1), 1.0, "USD"),
            ],
        );
        assert!(row.changes()[0].change.is_nan());
    }

    #[test]
    fn test_dgr_is_median_not_mean() {
        let row = growth_row();
        assert!((row.dgr(5) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_dgr_zero_when_no_events_in_window() {
        let row = growth_row();
        // 2022-01-01 ~ 2022-12-31 구간에는 +30% 하나
        assert!((row.dgr(1) - 30.0).abs() < 1e-9);

        let empty = StatsRow::new("NONE", date(2023, 6, 1), 0.0, 0.0, 0.0, Vec::new());
        assert_eq!(empty.dgr(5), 0.0);
        assert_eq!(empty.dgr(25), 0.0);
    }

    #[test]
    fn test_dgr_excludes_cuts() {
        let row = StatsRow::new(
            "CUT",
            date(2024, 3, 1),
            0.0,
            0.0,
            0.0,
            vec![
                dividend(date(2020, 6, 1), 1.0, "USD"),
                dividend(date(2021, 6, 1), 1.2, "USD"),
                dividend(date(2022, 6, 1), 0.6, "USD"),
                dividend(date(2023, 6, 1), 0.66, "USD"),
            ],
        );
        // +20%, -50%, +10% → 양수만: {10, 20} → 15
        assert!((row.dgr(5) - 15.0).abs() < 1e-9);
        assert!(row.has_dividend_cut());
    }

    #[test]
    fn test_dgr_window_excludes_boundary_dates() {
        let row = StatsRow::new(
            "EDGE",
            date(2024, 3, 1),
            0.0,
            0.0,
            0.0,
            vec![
                dividend(date(2018, 6, 1), 1.0, "USD"),
                // (Y-5)년 1월 1일: +100%
                dividend(date(2019, 1, 1), 2.0, "USD"),
                dividend(date(2021, 6, 1), 2.2, "USD"),
                // (Y-1)년 12월 31일: +100%
                dividend(date(2023, 12, 31), 4.4, "USD"),
            ],
        );
        assert!((row.changes()[0].change - 100.0).abs() < 1e-9);
        assert!((row.changes()[2].change - 100.0).abs() < 1e-9);

        assert!((row.dgr(5) - 10.0).abs() < 1e-9);
        assert_eq!(row.dgr(1), 0.0);
    }

    #[test]
    fn test_same_ex_date_order_is_deterministic() {
        let record = |id: &str, ex_date: NaiveDate, amount: f64| DividendRecord {
            external_id: id.to_string(),
            ..dividend(ex_date, amount, "USD")
        };
        let events = vec![
            record("Y", date(2022, 6, 1), 1.0),
            record("X1", date(2023, 6, 1), 1.0),
            record("X2", date(2023, 6, 1), 2.0),
        ];
        let mut reversed = events.clone();
        reversed.reverse();

        for input in [events, reversed] {
            let row = StatsRow::new("TIE", date(2024, 3, 1), 0.0, 0.0, 0.0, input);
            let ids: Vec<&str> = row
                .changes()
                .iter()
                .map(|c| c.dividend.external_id.as_str())
                .collect();
            assert_eq!(ids, vec!["X2", "X1", "Y"]);
            assert!((row.changes()[0].change - 100.0).abs() < 1e-9);
            assert_eq!(row.changes()[1].change, 0.0);
        }
    }

    #[test]
    fn test_dgr_memoized_value_is_stable() {
        let row = growth_row();
        let first = row.dgr(3);
        assert_eq!(row.dgr(3), first);
        assert_eq!(row.dgr_cache.cells[2].get(), Some(&first));
        assert!(row.dgr_cache.cells[0].get().is_none());
    }

    #[test]
    fn test_most_recent_increase() {
        let row = StatsRow::new(
            "MR",
            date(2024, 3, 1),
            0.0,
            0.0,
            0.0,
            vec![
                dividend(date(2021, 6, 1), 1.0, "USD"),
                dividend(date(2022, 6, 1), 1.1, "USD"),
                dividend(date(2023, 6, 1), 1.1, "USD"),
            ],
        );
        assert!((row.mr_pct() - 10.0).abs() < 1e-9);
        assert_eq!(row.mr_date(), Some(date(2022, 6, 1)));

        let none = StatsRow::new("NONE", date(2024, 3, 1), 0.0, 0.0, 0.0, Vec::new());
        assert_eq!(none.mr_pct(), 0.0);
        assert_eq!(none.mr_date(), None);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&mut [10.0, 2.0, 30.0]), 10.0);
        assert_eq!(median(&mut []), 0.0);
    }

    proptest! {
        #[test]
        fn prop_median_within_bounds(values in prop::collection::vec(0.001f64..1000.0, 1..50)) {
            let mut sorted = values.clone();
            let m = median(&mut sorted);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(m >= min && m <= max);
        }

        #[test]
        fn prop_median_order_independent(mut values in prop::collection::vec(0.001f64..1000.0, 1..50)) {
            let mut reversed: Vec<f64> = values.iter().rev().cloned().collect();
            prop_assert_eq!(median(&mut values), median(&mut reversed));
        }
    }
}
