//! 스크리닝 결과 출력.
//!
//! 터미널용 고정폭 표와 `<output_dir>/screen-<date>.json` 리포트를 만듭니다.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::stats::{Stats, StatsRow};

/// 결과 정렬 기준.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// 티커 오름차순
    #[default]
    Ticker,
    /// 배당수익률 내림차순
    Yield,
    /// 총수익률 내림차순
    TotalYield,
    /// DGR5 내림차순
    Dgr5,
}

impl SortKey {
    fn metric(&self, row: &StatsRow) -> f64 {
        let value = match self {
            SortKey::Ticker => 0.0,
            SortKey::Yield => row.forward_yield,
            SortKey::TotalYield => row.total_yield(),
            SortKey::Dgr5 => row.dgr(5),
        };
        // NaN은 맨 뒤로
        if value.is_nan() {
            f64::NEG_INFINITY
        } else {
            value
        }
    }

    /// 행 정렬. 값이 같으면 티커 오름차순.
    pub fn sort(&self, rows: &mut [StatsRow]) {
        rows.sort_by(|a, b| {
            let by_metric = match self {
                SortKey::Ticker => Ordering::Equal,
                _ => self.metric(b).total_cmp(&self.metric(a)),
            };
            by_metric.then_with(|| a.ticker.cmp(&b.ticker))
        });
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ticker" => Ok(SortKey::Ticker),
            "yield" => Ok(SortKey::Yield),
            "total_yield" | "total-yield" => Ok(SortKey::TotalYield),
            "dgr5" => Ok(SortKey::Dgr5),
            _ => Err(format!("알 수 없는 정렬 기준: {}", s)),
        }
    }
}

/// 리포트 행.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub ticker: String,
    pub forward_yield: f64,
    pub forward_dividend: f64,
    pub total_yield: f64,
    pub dgr1: f64,
    pub dgr3: f64,
    pub dgr5: f64,
    pub dgr10: f64,
    pub mr_pct: f64,
    pub mr_date: Option<NaiveDate>,
    pub gordon_growth_rate: f64,
    pub dividend_cut: bool,
}

impl From<&StatsRow> for ReportRow {
    fn from(row: &StatsRow) -> Self {
        Self {
            ticker: row.ticker.clone(),
            forward_yield: row.forward_yield,
            forward_dividend: row.forward_dividend,
            total_yield: row.total_yield(),
            dgr1: row.dgr(1),
            dgr3: row.dgr(3),
            dgr5: row.dgr(5),
            dgr10: row.dgr(10),
            mr_pct: row.mr_pct(),
            mr_date: row.mr_date(),
            gordon_growth_rate: row.gordon_growth_rate,
            dividend_cut: row.has_dividend_cut(),
        }
    }
}

/// JSON 리포트.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub date: NaiveDate,
    pub count: usize,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn new(stats: &Stats, date: NaiveDate) -> Self {
        let rows: Vec<ReportRow> = stats.rows().iter().map(ReportRow::from).collect();
        Self {
            date,
            count: rows.len(),
            rows,
        }
    }
}

/// 고정폭 표 문자열 생성.
pub fn render_table(stats: &Stats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>10} {:>7}",
        "TICKER", "YIELD", "DGR1", "DGR3", "DGR5", "DGR10", "MR%", "MR-DATE", "GGR"
    );
    let _ = writeln!(out, "{}", "-".repeat(76));

    for row in stats.rows() {
        let mr_date = row
            .mr_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<8} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>10} {:>7.2}",
            row.ticker,
            row.forward_yield,
            row.dgr(1),
            row.dgr(3),
            row.dgr(5),
            row.dgr(10),
            row.mr_pct(),
            mr_date,
            row.gordon_growth_rate,
        );
    }
    out
}

/// `dir/screen-<date>.json`에 리포트를 저장하고 경로를 반환합니다.
pub fn write_json(stats: &Stats, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!("screen-{}.json", date.format("%Y-%m-%d")));
    let json = serde_json::to_string_pretty(&Report::new(stats, date))?;
    std::fs::write(&path, json)?;

    info!(path = %path.display(), rows = stats.len(), "스크리닝 리포트 저장");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use divtrack_core::{DividendFrequency, DividendRecord, PaymentType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(ticker: &str, forward_yield: f64, growth: f64) -> StatsRow {
        let dividends = vec![
            DividendRecord {
                external_id: format!("{}-1", ticker),
                ex_date: date(2022, 6, 1),
                amount: 1.0,
                amount_adj: 1.0,
                currency: "USD".to_string(),
                frequency: DividendFrequency::Annual,
                payment_type: PaymentType::Cash,
            },
            DividendRecord {
                external_id: format!("{}-2", ticker),
                ex_date: date(2023, 6, 1),
                amount: 1.0 + growth / 100.0,
                amount_adj: 1.0 + growth / 100.0,
                currency: "USD".to_string(),
                frequency: DividendFrequency::Annual,
                payment_type: PaymentType::Cash,
            },
        ];
        StatsRow::new(ticker, date(2024, 3, 1), forward_yield, 1.0, 10.0 - forward_yield, dividends)
    }

    fn tickers(stats: &Stats) -> Vec<&str> {
        stats.rows().iter().map(|r| r.ticker.as_str()).collect()
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("yield".parse::<SortKey>().unwrap(), SortKey::Yield);
        assert_eq!("TOTAL_YIELD".parse::<SortKey>().unwrap(), SortKey::TotalYield);
        assert_eq!("dgr5".parse::<SortKey>().unwrap(), SortKey::Dgr5);
        assert!("pe".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_sort_by_yield_descending() {
        let mut stats = Stats::new(vec![
            row("A", 2.0, 5.0),
            row("B", f64::NAN, 5.0),
            row("C", 4.0, 5.0),
            row("D", 4.0, 1.0),
        ]);
        stats.sort(SortKey::Yield);
        assert_eq!(tickers(&stats), vec!["C", "D", "A", "B"]);

        stats.sort(SortKey::Dgr5);
        assert_eq!(tickers(&stats), vec!["A", "B", "C", "D"]);

        stats.sort(SortKey::Ticker);
        assert_eq!(tickers(&stats), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_render_table_lists_rows() {
        let stats = Stats::new(vec![row("KO", 3.1, 5.0)]);
        let table = render_table(&stats);

        assert!(table.starts_with("TICKER"));
        assert!(table.contains("KO"));
        assert!(table.contains("3.10"));
        assert!(table.contains("2023-06-01"));
    }

    #[test]
    fn test_write_json_report() {
        let dir = std::env::temp_dir().join(format!("divtrack-report-{}", std::process::id()));
        let stats = Stats::new(vec![row("KO", 3.1, 5.0), row("PEP", 2.8, 7.0)]);

        let path = write_json(&stats, &dir, date(2024, 3, 1)).unwrap();
        assert_eq!(path.file_name().unwrap(), "screen-2024-03-01.json");

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["rows"][0]["ticker"], "KO");
        assert_eq!(value["rows"][1]["mr_date"], "2023-06-01");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
