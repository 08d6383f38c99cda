//! 배당 이벤트 도메인 타입.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 배당 지급 주기.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendFrequency {
    /// 연 1회
    Annual,
    /// 연 2회
    SemiAnnual,
    /// 분기
    Quarterly,
    /// 월간
    Monthly,
    /// 비정기 (특별배당 등)
    Irregular,
    /// 미지정
    #[default]
    Unspecified,
}

impl DividendFrequency {
    /// 연간 지급 횟수로부터 주기를 추정합니다.
    pub fn from_per_year(per_year: u32) -> Self {
        match per_year {
            0 => Self::Irregular,
            1 => Self::Annual,
            2 => Self::SemiAnnual,
            4 => Self::Quarterly,
            12 => Self::Monthly,
            _ => Self::Unspecified,
        }
    }

    /// 정기 배당 여부 (연/반기/분기/월).
    pub fn is_regular(&self) -> bool {
        matches!(
            self,
            Self::Annual | Self::SemiAnnual | Self::Quarterly | Self::Monthly
        )
    }

    /// DB 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::SemiAnnual => "semi_annual",
            Self::Quarterly => "quarterly",
            Self::Monthly => "monthly",
            Self::Irregular => "irregular",
            Self::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for DividendFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DividendFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "annual" => Ok(Self::Annual),
            "semi_annual" | "semiannual" => Ok(Self::SemiAnnual),
            "quarterly" => Ok(Self::Quarterly),
            "monthly" => Ok(Self::Monthly),
            "irregular" => Ok(Self::Irregular),
            "unspecified" | "" => Ok(Self::Unspecified),
            _ => Err(format!("Unknown dividend frequency: {}", s)),
        }
    }
}

/// 배당 지급 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// 현금 배당
    #[default]
    Cash,
    /// 주식 배당
    Stock,
    /// 현금 + 주식
    Both,
}

impl PaymentType {
    /// 현금 지급이 포함되는지 확인합니다.
    pub fn is_cash(&self) -> bool {
        matches!(self, Self::Cash | Self::Both)
    }

    /// DB 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Stock => "stock",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "stock" => Ok(Self::Stock),
            "both" => Ok(Self::Both),
            _ => Err(format!("Unknown payment type: {}", s)),
        }
    }
}

/// 배당 이벤트 레코드.
///
/// `external_id`는 데이터 소스가 부여한 전역 고유 ID이며,
/// 같은 ID를 다시 저장해도 레코드는 하나만 유지됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    /// 외부 고유 ID
    pub external_id: String,
    /// 배당락일
    pub ex_date: NaiveDate,
    /// 배당금
    pub amount: f64,
    /// 분할 조정 배당금
    pub amount_adj: f64,
    /// 통화
    pub currency: String,
    /// 지급 주기
    pub frequency: DividendFrequency,
    /// 지급 방식
    pub payment_type: PaymentType,
}

impl DividendRecord {
    /// 정기 현금 배당인지 확인합니다.
    pub fn is_regular_cash(&self) -> bool {
        self.frequency.is_regular() && self.payment_type.is_cash()
    }
}
