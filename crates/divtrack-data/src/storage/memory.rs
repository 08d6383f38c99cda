//! 인메모리 배당 이력 저장소.
//!
//! PostgreSQL 구현과 같은 계약을 따릅니다:
//! - 등록되지 않은 심볼에 쓰면 `Persist` 오류
//! - 같은 `external_id`의 배당은 한 번만 저장
//! - 조정값 재계산과 배당수익률 시계열을 같은 규칙으로 계산

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use tokio::sync::RwLock;

use divtrack_core::{
    DividendFrequency, DividendRecord, DividendYieldPoint, PriceRecord, SplitRecord,
};

use super::{DividendQuery, DividendStore, WriteMode};
use crate::error::{DataError, Result};

/// 심볼별 저장 데이터.
#[derive(Debug, Default)]
struct TickerData {
    prices: BTreeMap<NaiveDate, PriceRecord>,
    dividends: HashMap<String, DividendRecord>,
    splits: BTreeMap<NaiveDate, SplitRecord>,
}

impl TickerData {
    /// `date` 이후 분할의 누적 조정 비율.
    fn split_factor_after(&self, date: NaiveDate) -> f64 {
        self.splits
            .range(date.succ_opt().unwrap_or(date)..)
            .map(|(_, split)| split.ratio())
            .product()
    }

    /// 배당락일 오름차순으로 정렬된 현금 배당.
    fn cash_dividends_asc(&self) -> Vec<&DividendRecord> {
        let mut dividends: Vec<&DividendRecord> = self
            .dividends
            .values()
            .filter(|d| d.payment_type.is_cash())
            .collect();
        dividends.sort_by(|a, b| (a.ex_date, &a.external_id).cmp(&(b.ex_date, &b.external_id)));
        dividends
    }
}

/// 인메모리 저장소.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, TickerData>>,
}

impl MemoryStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown_symbol(ticker: &str) -> DataError {
    DataError::Persist(format!("등록되지 않은 심볼: {}", ticker))
}

#[async_trait]
impl DividendStore for MemoryStore {
    async fn init_schema(&self, tickers: &[String]) -> Result<()> {
        let mut data = self.data.write().await;
        for ticker in tickers {
            data.entry(ticker.clone()).or_default();
        }
        Ok(())
    }

    async fn save_prices(
        &self,
        ticker: &str,
        prices: &[PriceRecord],
        mode: WriteMode,
    ) -> Result<usize> {
        let mut data = self.data.write().await;
        let entry = data.get_mut(ticker).ok_or_else(|| unknown_symbol(ticker))?;

        if mode == WriteMode::Reset {
            entry.prices.clear();
        }

        let mut inserted = 0;
        for price in prices {
            if !entry.prices.contains_key(&price.date) {
                entry.prices.insert(price.date, price.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn save_dividends(
        &self,
        ticker: &str,
        dividends: &[DividendRecord],
        mode: WriteMode,
    ) -> Result<usize> {
        let mut data = self.data.write().await;
        let entry = data.get_mut(ticker).ok_or_else(|| unknown_symbol(ticker))?;

        if mode == WriteMode::Reset {
            entry.dividends.clear();
        }

        let mut inserted = 0;
        for dividend in dividends {
            if !entry.dividends.contains_key(&dividend.external_id) {
                entry
                    .dividends
                    .insert(dividend.external_id.clone(), dividend.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn save_splits(
        &self,
        ticker: &str,
        splits: &[SplitRecord],
        mode: WriteMode,
    ) -> Result<usize> {
        let mut data = self.data.write().await;
        let entry = data.get_mut(ticker).ok_or_else(|| unknown_symbol(ticker))?;

        if mode == WriteMode::Reset {
            entry.splits.clear();
        }

        let mut inserted = 0;
        for split in splits {
            if !entry.splits.contains_key(&split.ex_date) {
                entry.splits.insert(split.ex_date, split.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn recompute_adjusted(&self, ticker: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let entry = data.get_mut(ticker).ok_or_else(|| unknown_symbol(ticker))?;

        let price_factors: Vec<(NaiveDate, f64)> = entry
            .prices
            .keys()
            .map(|date| (*date, entry.split_factor_after(*date)))
            .collect();
        for (date, factor) in price_factors {
            if let Some(price) = entry.prices.get_mut(&date) {
                price.close_adj = price.close * factor;
            }
        }

        let dividend_factors: Vec<(String, f64)> = entry
            .dividends
            .values()
            .map(|d| (d.external_id.clone(), entry.split_factor_after(d.ex_date)))
            .collect();
        for (id, factor) in dividend_factors {
            if let Some(dividend) = entry.dividends.get_mut(&id) {
                dividend.amount_adj = dividend.amount * factor;
            }
        }

        Ok(())
    }

    async fn dividend_yield_series(&self, ticker: &str) -> Result<Vec<DividendYieldPoint>> {
        let data = self.data.read().await;
        let Some(entry) = data.get(ticker) else {
            return Ok(Vec::new());
        };

        let dividends = entry.cash_dividends_asc();

        let points = entry
            .prices
            .values()
            .rev()
            .map(|price| {
                let window_start = price
                    .date
                    .checked_sub_months(Months::new(12))
                    .unwrap_or(NaiveDate::MIN);

                let last = dividends.iter().rev().find(|d| d.ex_date <= price.date);
                let ttm_dividend_adj: f64 = dividends
                    .iter()
                    .filter(|d| d.ex_date > window_start && d.ex_date <= price.date)
                    .map(|d| d.amount_adj)
                    .sum();

                DividendYieldPoint {
                    date: price.date,
                    close: price.close,
                    close_adj: price.close_adj,
                    dividend_adj: last.map(|d| d.amount_adj).unwrap_or(0.0),
                    frequency: last
                        .map(|d| d.frequency)
                        .unwrap_or(DividendFrequency::Unspecified),
                    ttm_dividend_adj,
                    dividend_yield: DividendYieldPoint::yield_pct(
                        ttm_dividend_adj,
                        price.close_adj,
                    ),
                }
            })
            .collect();

        Ok(points)
    }

    async fn dividends(&self, ticker: &str, query: &DividendQuery) -> Result<Vec<DividendRecord>> {
        let data = self.data.read().await;
        let Some(entry) = data.get(ticker) else {
            return Ok(Vec::new());
        };

        let mut dividends: Vec<DividendRecord> = entry
            .dividends
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        dividends.sort_by(|a, b| {
            b.ex_date
                .cmp(&a.ex_date)
                .then_with(|| b.external_id.cmp(&a.external_id))
        });
        if let Some(limit) = query.limit {
            dividends.truncate(limit);
        }
        Ok(dividends)
    }

    async fn dividend_ids(&self, ticker: &str) -> Result<HashSet<String>> {
        let data = self.data.read().await;
        Ok(data
            .get(ticker)
            .map(|entry| entry.dividends.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn last_price_date(&self, ticker: &str) -> Result<Option<NaiveDate>> {
        let data = self.data.read().await;
        Ok(data
            .get(ticker)
            .and_then(|entry| entry.prices.keys().next_back().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use divtrack_core::PaymentType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(date: NaiveDate, close: f64) -> PriceRecord {
        PriceRecord {
            date,
            close,
            close_adj: close,
            high: close,
            low: close,
            open: close,
            volume: 1000,
            currency: "USD".to_string(),
        }
    }

    fn dividend(id: &str, ex_date: NaiveDate, amount: f64) -> DividendRecord {
        DividendRecord {
            external_id: id.to_string(),
            ex_date,
            amount,
            amount_adj: amount,
            currency: "USD".to_string(),
            frequency: DividendFrequency::Quarterly,
            payment_type: PaymentType::Cash,
        }
    }

    async fn store_with(ticker: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.init_schema(&[ticker.to_string()]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_write_to_unknown_symbol_fails() {
        let store = MemoryStore::new();
        let err = store
            .save_prices("AAA", &[price(date(2024, 1, 2), 10.0)], WriteMode::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Persist(_)));
    }

    #[tokio::test]
    async fn test_duplicate_dividend_id_is_noop() {
        let store = store_with("KO").await;
        let div = dividend("E1", date(2024, 3, 14), 0.485);

        assert_eq!(
            store.save_dividends("KO", &[div.clone()], WriteMode::Append).await.unwrap(),
            1
        );
        assert_eq!(
            store.save_dividends("KO", &[div], WriteMode::Append).await.unwrap(),
            0
        );
        let all = store.dividends("KO", &DividendQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_replaces_prices() {
        let store = store_with("KO").await;
        store
            .save_prices("KO", &[price(date(2024, 1, 2), 10.0)], WriteMode::Append)
            .await
            .unwrap();
        store
            .save_prices("KO", &[price(date(2024, 1, 3), 11.0)], WriteMode::Reset)
            .await
            .unwrap();

        let series = store.dividend_yield_series("KO").await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].date, date(2024, 1, 3));
        assert_eq!(store.last_price_date("KO").await.unwrap(), Some(date(2024, 1, 3)));
    }

    #[tokio::test]
    async fn test_recompute_adjusted_applies_later_splits() {
        let store = store_with("AAPL").await;
        store
            .save_prices(
                "AAPL",
                &[price(date(2020, 8, 28), 400.0), price(date(2020, 9, 1), 130.0)],
                WriteMode::Append,
            )
            .await
            .unwrap();
        store
            .save_dividends("AAPL", &[dividend("E1", date(2020, 8, 7), 0.82)], WriteMode::Append)
            .await
            .unwrap();
        store
            .save_splits(
                "AAPL",
                &[SplitRecord {
                    ex_date: date(2020, 8, 31),
                    from_factor: 1.0,
                    to_factor: 4.0,
                }],
                WriteMode::Append,
            )
            .await
            .unwrap();

        store.recompute_adjusted("AAPL").await.unwrap();

        let series = store.dividend_yield_series("AAPL").await.unwrap();
        assert_eq!(series[0].close_adj, 130.0);
        assert_eq!(series[1].close_adj, 100.0);

        let divs = store.dividends("AAPL", &DividendQuery::default()).await.unwrap();
        assert!((divs[0].amount_adj - 0.205).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_yield_series_trailing_sum() {
        let store = store_with("KO").await;
        store
            .save_prices("KO", &[price(date(2024, 6, 3), 60.0)], WriteMode::Append)
            .await
            .unwrap();
        store
            .save_dividends(
                "KO",
                &[
                    dividend("E0", date(2023, 6, 1), 0.46),
                    dividend("E1", date(2023, 9, 14), 0.46),
                    dividend("E2", date(2023, 11, 30), 0.46),
                    dividend("E3", date(2024, 3, 14), 0.485),
                    dividend("E4", date(2024, 6, 14), 0.485),
                ],
                WriteMode::Append,
            )
            .await
            .unwrap();

        let point = store.latest_yield_point("KO").await.unwrap().unwrap();
        assert!((point.ttm_dividend_adj - 1.405).abs() < 1e-9);
        assert!((point.dividend_adj - 0.485).abs() < 1e-12);
        assert_eq!(point.frequency, DividendFrequency::Quarterly);
        assert!((point.dividend_yield - 1.405 / 60.0 * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dividend_query_filters() {
        let store = store_with("KO").await;
        let mut special = dividend("S1", date(2024, 1, 5), 1.0);
        special.frequency = DividendFrequency::Irregular;
        let mut stock = dividend("K1", date(2024, 2, 5), 1.0);
        stock.payment_type = PaymentType::Stock;

        store
            .save_dividends(
                "KO",
                &[
                    dividend("E1", date(2012, 3, 1), 0.25),
                    dividend("E2", date(2024, 3, 14), 0.485),
                    special,
                    stock,
                ],
                WriteMode::Append,
            )
            .await
            .unwrap();

        let regular = store
            .dividends("KO", &DividendQuery::regular_cash_since(date(2013, 1, 1)))
            .await
            .unwrap();
        assert_eq!(regular.len(), 1);
        assert_eq!(regular[0].external_id, "E2");

        let limited = store
            .dividends(
                "KO",
                &DividendQuery {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].external_id, "E2");
    }

    #[tokio::test]
    async fn test_same_ex_date_ordered_by_id() {
        let store = store_with("KO").await;
        let same_day = date(2024, 3, 14);
        store
            .save_dividends(
                "KO",
                &[
                    dividend("B", same_day, 0.2),
                    dividend("D", same_day, 0.4),
                    dividend("A", same_day, 0.1),
                    dividend("C", same_day, 0.3),
                ],
                WriteMode::Append,
            )
            .await
            .unwrap();

        let ids: Vec<String> = store
            .dividends("KO", &DividendQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.external_id)
            .collect();
        assert_eq!(ids, vec!["D", "C", "B", "A"]);
    }
}
