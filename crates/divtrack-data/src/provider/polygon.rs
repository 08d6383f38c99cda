//! Polygon.io REST 클라이언트.
//!
//! 배당 수집에 필요한 세 가지 이력을 조회합니다.
//!
//! # 사용 엔드포인트
//!
//! - `/v3/reference/tickers/{ticker}`: 거래 통화
//! - `/v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}`: 일봉 (비조정)
//! - `/v3/reference/dividends`: 배당 이벤트 (전역 고유 `id` 포함)
//! - `/v3/reference/splits`: 분할 이벤트
//!
//! 목록 응답은 `next_url`로 페이지를 이어가며, 페이지마다 토큰을 소비합니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use divtrack_data::{PolygonClient, RateLimiter};
//!
//! let limiter = Arc::new(RateLimiter::new(5.0, 5));
//! let client = PolygonClient::new("https://api.polygon.io", "KEY", timeout, limiter)?;
//! let dividends = client.fetch_dividends("KO", from).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use divtrack_core::{DividendFrequency, DividendRecord, PaymentType, PriceRecord, SplitRecord};

use super::{MarketDataSource, RateLimiter};
use crate::error::{DataError, Result};

/// 목록 조회 페이지 크기.
const PAGE_LIMIT: &str = "1000";

/// 일봉 조회 최대 개수.
const AGGS_LIMIT: &str = "50000";

/// Polygon.io 클라이언트.
#[derive(Clone)]
pub struct PolygonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

/// 목록 응답 래퍼.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    next_url: Option<String>,
}

/// 종목 상세 응답.
#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    currency_name: Option<String>,
}

/// 일봉 집계.
#[derive(Debug, Deserialize)]
struct AggBar {
    /// 시작 시각 (Unix ms)
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

/// 배당 이벤트.
#[derive(Debug, Deserialize)]
struct PolygonDividend {
    id: String,
    cash_amount: f64,
    #[serde(default)]
    currency: Option<String>,
    /// CD: 정기 현금, SC: 특별 현금, LT/ST: 자본이득 분배
    #[serde(default)]
    dividend_type: Option<String>,
    ex_dividend_date: NaiveDate,
    /// 연간 지급 횟수 (0: 1회성)
    #[serde(default)]
    frequency: Option<u32>,
}

/// 분할 이벤트.
#[derive(Debug, Deserialize)]
struct PolygonSplit {
    execution_date: NaiveDate,
    split_from: f64,
    split_to: f64,
}

impl PolygonClient {
    /// 새 클라이언트 생성.
    ///
    /// # Arguments
    /// * `base_url` - API 기본 URL (테스트에서는 mock 서버 주소)
    /// * `api_key` - Polygon API 키
    /// * `timeout` - 요청 타임아웃
    /// * `limiter` - 모든 워커가 공유하는 요청 제한기
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            limiter,
        })
    }

    /// 토큰을 얻은 뒤 GET 요청을 실행하고 JSON으로 파싱합니다.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, params: &[(&str, &str)]) -> Result<T> {
        self.limiter.acquire().await;

        debug!(url = %url, "Polygon API 요청");

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("apiKey", self.api_key.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Network(format!(
                "Polygon API 오류 [{}]: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| DataError::Parse(format!("Polygon 응답 파싱 실패 ({}): {}", url, e)))
    }

    /// `next_url`을 따라가며 모든 페이지를 수집합니다.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let first_url = format!("{}{}", self.base_url, path);
        let mut page: ListResponse<T> = self.get_json(&first_url, params).await?;
        let mut items = std::mem::take(&mut page.results);

        while let Some(next_url) = page.next_url.take() {
            page = self.get_json(&next_url, &[]).await?;
            items.append(&mut page.results);
        }

        Ok(items)
    }

    /// 종목의 거래 통화 조회 (없으면 USD).
    async fn fetch_currency(&self, ticker: &str) -> Result<String> {
        let url = format!("{}/v3/reference/tickers/{}", self.base_url, ticker);
        let details: TickerDetailsResponse = self.get_json(&url, &[]).await?;

        Ok(details
            .results
            .currency_name
            .filter(|c| !c.is_empty())
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| "USD".to_string()))
    }
}

#[async_trait]
impl MarketDataSource for PolygonClient {
    async fn fetch_prices(&self, ticker: &str, from: NaiveDate) -> Result<Vec<PriceRecord>> {
        let currency = self.fetch_currency(ticker).await?;
        let to = Utc::now().date_naive();
        let path = format!(
            "/v2/aggs/ticker/{}/range/1/day/{}/{}",
            ticker,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let bars: Vec<AggBar> = self
            .get_all_pages(
                &path,
                &[("adjusted", "false"), ("sort", "asc"), ("limit", AGGS_LIMIT)],
            )
            .await?;

        bars.into_iter()
            .map(|bar| {
                let date = DateTime::<Utc>::from_timestamp_millis(bar.t)
                    .ok_or_else(|| DataError::Parse(format!("잘못된 타임스탬프: {}", bar.t)))?
                    .date_naive();
                Ok(PriceRecord {
                    date,
                    close: bar.c,
                    close_adj: bar.c,
                    high: bar.h,
                    low: bar.l,
                    open: bar.o,
                    volume: bar.v as i64,
                    currency: currency.clone(),
                })
            })
            .collect()
    }

    async fn fetch_dividends(
        &self,
        ticker: &str,
        from: NaiveDate,
    ) -> Result<Vec<DividendRecord>> {
        let from = from.format("%Y-%m-%d").to_string();
        let items: Vec<PolygonDividend> = self
            .get_all_pages(
                "/v3/reference/dividends",
                &[
                    ("ticker", ticker),
                    ("ex_dividend_date.gte", from.as_str()),
                    ("order", "asc"),
                    ("limit", PAGE_LIMIT),
                ],
            )
            .await?;

        Ok(items.into_iter().map(to_dividend_record).collect())
    }

    async fn fetch_splits(&self, ticker: &str, from: NaiveDate) -> Result<Vec<SplitRecord>> {
        let from = from.format("%Y-%m-%d").to_string();
        let items: Vec<PolygonSplit> = self
            .get_all_pages(
                "/v3/reference/splits",
                &[
                    ("ticker", ticker),
                    ("execution_date.gte", from.as_str()),
                    ("order", "asc"),
                    ("limit", PAGE_LIMIT),
                ],
            )
            .await?;

        Ok(items
            .into_iter()
            .map(|s| SplitRecord {
                ex_date: s.execution_date,
                from_factor: s.split_from,
                to_factor: s.split_to,
            })
            .collect())
    }
}

/// Polygon 배당 이벤트를 도메인 레코드로 변환.
fn to_dividend_record(div: PolygonDividend) -> DividendRecord {
    let frequency = match div.dividend_type.as_deref() {
        Some("CD") | None => div
            .frequency
            .map(DividendFrequency::from_per_year)
            .unwrap_or_default(),
        // 특별배당, 자본이득 분배는 성장률 계산에서 제외
        _ => DividendFrequency::Irregular,
    };

    DividendRecord {
        external_id: div.id,
        ex_date: div.ex_dividend_date,
        amount: div.cash_amount,
        amount_adj: div.cash_amount,
        currency: div
            .currency
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| "USD".to_string()),
        frequency,
        payment_type: PaymentType::Cash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> PolygonClient {
        PolygonClient::new(
            server.url(),
            "test-key",
            Duration::from_secs(5),
            Arc::new(RateLimiter::new(1000.0, 100)),
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dividend_type_mapping() {
        let regular = to_dividend_record(PolygonDividend {
            id: "E1".to_string(),
            cash_amount: 0.46,
            currency: Some("usd".to_string()),
            dividend_type: Some("CD".to_string()),
            ex_dividend_date: date(2024, 3, 14),
            frequency: Some(4),
        });
        assert_eq!(regular.frequency, DividendFrequency::Quarterly);
        assert_eq!(regular.currency, "USD");
        assert!(regular.is_regular_cash());

        let special = to_dividend_record(PolygonDividend {
            id: "E2".to_string(),
            cash_amount: 1.0,
            currency: None,
            dividend_type: Some("SC".to_string()),
            ex_dividend_date: date(2024, 3, 14),
            frequency: Some(4),
        });
        assert_eq!(special.frequency, DividendFrequency::Irregular);
        assert!(!special.is_regular_cash());
    }

    #[tokio::test]
    async fn test_fetch_dividends_follows_next_url() {
        let mut server = mockito::Server::new_async().await;
        let next_url = format!("{}/v3/reference/dividends/page2", server.url());

        let first = server
            .mock("GET", "/v3/reference/dividends")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ticker".into(), "KO".into()),
                Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"results":[{{"id":"E1","cash_amount":0.46,"currency":"USD","dividend_type":"CD","ex_dividend_date":"2023-03-14","frequency":4}}],"next_url":"{}"}}"#,
                next_url
            ))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v3/reference/dividends/page2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"results":[{"id":"E2","cash_amount":0.485,"currency":"USD","dividend_type":"CD","ex_dividend_date":"2024-03-14","frequency":4}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let dividends = client.fetch_dividends("KO", date(2023, 1, 1)).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(dividends.len(), 2);
        assert_eq!(dividends[0].external_id, "E1");
        assert_eq!(dividends[1].amount, 0.485);
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v3/reference/splits")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.fetch_splits("KO", date(2000, 1, 1)).await.unwrap_err();
        assert!(matches!(err, DataError::Network(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v3/reference/splits")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results":[{"execution_date":"not-a-date"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.fetch_splits("KO", date(2000, 1, 1)).await.unwrap_err();
        assert!(matches!(err, DataError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_prices_uses_ticker_currency() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v3/reference/tickers/SHEL")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results":{"ticker":"SHEL","currency_name":"gbp"}}"#)
            .create_async()
            .await;
        server
            .mock(
                "GET",
                Matcher::Regex(r"^/v2/aggs/ticker/SHEL/range/1/day/2024-01-01/.*$".to_string()),
            )
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"results":[{"t":1704171600000,"o":10.0,"h":11.0,"l":9.5,"c":10.5,"v":12345.0}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let prices = client.fetch_prices("SHEL", date(2024, 1, 1)).await.unwrap();

        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].date, date(2024, 1, 2));
        assert_eq!(prices[0].currency, "GBP");
        assert_eq!(prices[0].close_adj, 10.5);
        assert_eq!(prices[0].volume, 12345);
    }
}
