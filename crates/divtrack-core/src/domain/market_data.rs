//! 가격, 분할, 배당수익률 시계열 타입.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DividendFrequency;

/// 일별 가격 레코드.
///
/// 저장소가 소유하며 날짜 내림차순으로 정렬되어 반환됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// 거래일
    pub date: NaiveDate,
    /// 종가
    pub close: f64,
    /// 분할 조정 종가
    pub close_adj: f64,
    /// 고가
    pub high: f64,
    /// 저가
    pub low: f64,
    /// 시가
    pub open: f64,
    /// 거래량
    pub volume: i64,
    /// 통화 (예: "USD")
    pub currency: String,
}

/// 주식 분할 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    /// 분할 기준일
    pub ex_date: NaiveDate,
    /// 분할 전 주식 수
    pub from_factor: f64,
    /// 분할 후 주식 수
    pub to_factor: f64,
}

impl SplitRecord {
    /// 분할 이전 값에 곱해야 하는 조정 비율 (from / to).
    ///
    /// 2:1 분할(1 → 2)이면 0.5를 반환합니다. 잘못된 팩터는 1.0으로 취급합니다.
    pub fn ratio(&self) -> f64 {
        if self.from_factor > 0.0 && self.to_factor > 0.0 {
            self.from_factor / self.to_factor
        } else {
            1.0
        }
    }
}

/// 배당수익률 시계열 포인트.
///
/// 저장소가 가격과 과거 배당 이력을 조인하여 만드는 읽기 모델입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendYieldPoint {
    /// 거래일
    pub date: NaiveDate,
    /// 종가
    pub close: f64,
    /// 분할 조정 종가
    pub close_adj: f64,
    /// 해당 일자 기준 가장 최근 조정 배당금
    pub dividend_adj: f64,
    /// 해당 일자 기준 배당 주기
    pub frequency: DividendFrequency,
    /// 최근 12개월 조정 배당금 합계 (TTM)
    pub ttm_dividend_adj: f64,
    /// 배당수익률 (%)
    pub dividend_yield: f64,
}

impl DividendYieldPoint {
    /// TTM 배당 합계와 조정 종가로 배당수익률(%)을 계산합니다.
    pub fn yield_pct(ttm_dividend_adj: f64, close_adj: f64) -> f64 {
        if close_adj > 0.0 {
            ttm_dividend_adj / close_adj * 100.0
        } else {
            0.0
        }
    }
}
