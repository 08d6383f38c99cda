//! PostgreSQL 배당 이력 저장소.
//!
//! 스키마와 분할 조정 함수(`recompute_adjusted`)는 `schema.sql`에 정의되며
//! `init_schema` 호출 시 적용됩니다.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, instrument};

use divtrack_core::{DatabaseConfig, DividendRecord, DividendYieldPoint, PriceRecord, SplitRecord};

use super::{DividendQuery, DividendStore, WriteMode};
use crate::error::{DataError, Result};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// 일괄 삽입 청크 크기.
const CHUNK_SIZE: usize = 500;

/// 배당 레코드 DB 행.
#[derive(Debug, Clone, FromRow)]
struct DividendRow {
    external_id: String,
    ex_date: NaiveDate,
    amount: f64,
    amount_adj: f64,
    currency: String,
    frequency: String,
    payment_type: String,
}

impl TryFrom<DividendRow> for DividendRecord {
    type Error = DataError;

    fn try_from(row: DividendRow) -> Result<Self> {
        Ok(DividendRecord {
            external_id: row.external_id,
            ex_date: row.ex_date,
            amount: row.amount,
            amount_adj: row.amount_adj,
            currency: row.currency,
            frequency: row.frequency.parse().map_err(DataError::Parse)?,
            payment_type: row.payment_type.parse().map_err(DataError::Parse)?,
        })
    }
}

/// 배당수익률 시계열 DB 행.
#[derive(Debug, Clone, FromRow)]
struct YieldPointRow {
    date: NaiveDate,
    close: f64,
    close_adj: f64,
    dividend_adj: f64,
    frequency: String,
    ttm_dividend_adj: f64,
}

impl TryFrom<YieldPointRow> for DividendYieldPoint {
    type Error = DataError;

    fn try_from(row: YieldPointRow) -> Result<Self> {
        Ok(DividendYieldPoint {
            date: row.date,
            close: row.close,
            close_adj: row.close_adj,
            dividend_adj: row.dividend_adj,
            frequency: row.frequency.parse().map_err(DataError::Parse)?,
            ttm_dividend_adj: row.ttm_dividend_adj,
            dividend_yield: DividendYieldPoint::yield_pct(row.ttm_dividend_adj, row.close_adj),
        })
    }
}

fn persist_err(err: sqlx::Error) -> DataError {
    DataError::Persist(err.to_string())
}

/// PostgreSQL 저장소.
#[derive(Clone)]
pub struct PgDividendStore {
    pool: PgPool,
}

impl PgDividendStore {
    /// 새 연결 풀을 생성합니다.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| DataError::Connection(e.to_string()))?;

        info!("Database connection established");
        Ok(Self { pool })
    }

    /// 연결 풀을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DividendStore for PgDividendStore {
    #[instrument(skip(self, tickers), fields(count = tickers.len()))]
    async fn init_schema(&self, tickers: &[String]) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::Schema(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO symbols (ticker)
            SELECT * FROM UNNEST($1::text[])
            ON CONFLICT (ticker) DO NOTHING
            "#,
        )
        .bind(tickers)
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::Schema(e.to_string()))?;

        info!(symbols = tickers.len(), "스키마 초기화 완료");
        Ok(())
    }

    #[instrument(skip(self, prices), fields(count = prices.len()))]
    async fn save_prices(
        &self,
        ticker: &str,
        prices: &[PriceRecord],
        mode: WriteMode,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(persist_err)?;

        if mode == WriteMode::Reset {
            sqlx::query("DELETE FROM prices WHERE ticker = $1")
                .bind(ticker)
                .execute(&mut *tx)
                .await
                .map_err(persist_err)?;
        }

        let mut inserted = 0;
        for chunk in prices.chunks(CHUNK_SIZE) {
            let dates: Vec<NaiveDate> = chunk.iter().map(|p| p.date).collect();
            let opens: Vec<f64> = chunk.iter().map(|p| p.open).collect();
            let highs: Vec<f64> = chunk.iter().map(|p| p.high).collect();
            let lows: Vec<f64> = chunk.iter().map(|p| p.low).collect();
            let closes: Vec<f64> = chunk.iter().map(|p| p.close).collect();
            let closes_adj: Vec<f64> = chunk.iter().map(|p| p.close_adj).collect();
            let volumes: Vec<i64> = chunk.iter().map(|p| p.volume).collect();
            let currencies: Vec<&str> = chunk.iter().map(|p| p.currency.as_str()).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO prices
                    (ticker, date, open, high, low, close, close_adj, volume, currency)
                SELECT $1, * FROM UNNEST(
                    $2::date[], $3::float8[], $4::float8[], $5::float8[],
                    $6::float8[], $7::float8[], $8::int8[], $9::text[]
                )
                ON CONFLICT (ticker, date) DO NOTHING
                "#,
            )
            .bind(ticker)
            .bind(&dates)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&closes_adj)
            .bind(&volumes)
            .bind(&currencies)
            .execute(&mut *tx)
            .await
            .map_err(persist_err)?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(persist_err)?;

        debug!(ticker = ticker, inserted = inserted, mode = ?mode, "가격 저장");
        Ok(inserted)
    }

    #[instrument(skip(self, dividends), fields(count = dividends.len()))]
    async fn save_dividends(
        &self,
        ticker: &str,
        dividends: &[DividendRecord],
        mode: WriteMode,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(persist_err)?;

        if mode == WriteMode::Reset {
            sqlx::query("DELETE FROM dividends WHERE ticker = $1")
                .bind(ticker)
                .execute(&mut *tx)
                .await
                .map_err(persist_err)?;
        }

        let mut inserted = 0;
        for chunk in dividends.chunks(CHUNK_SIZE) {
            let ids: Vec<&str> = chunk.iter().map(|d| d.external_id.as_str()).collect();
            let ex_dates: Vec<NaiveDate> = chunk.iter().map(|d| d.ex_date).collect();
            let amounts: Vec<f64> = chunk.iter().map(|d| d.amount).collect();
            let amounts_adj: Vec<f64> = chunk.iter().map(|d| d.amount_adj).collect();
            let currencies: Vec<&str> = chunk.iter().map(|d| d.currency.as_str()).collect();
            let frequencies: Vec<&str> = chunk.iter().map(|d| d.frequency.as_str()).collect();
            let payments: Vec<&str> = chunk.iter().map(|d| d.payment_type.as_str()).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO dividends
                    (external_id, ticker, ex_date, amount, amount_adj, currency, frequency, payment_type)
                SELECT u.external_id, $1, u.ex_date, u.amount, u.amount_adj,
                       u.currency, u.frequency, u.payment_type
                FROM UNNEST(
                    $2::text[], $3::date[], $4::float8[], $5::float8[],
                    $6::text[], $7::text[], $8::text[]
                ) AS u(external_id, ex_date, amount, amount_adj, currency, frequency, payment_type)
                ON CONFLICT (external_id) DO NOTHING
                "#,
            )
            .bind(ticker)
            .bind(&ids)
            .bind(&ex_dates)
            .bind(&amounts)
            .bind(&amounts_adj)
            .bind(&currencies)
            .bind(&frequencies)
            .bind(&payments)
            .execute(&mut *tx)
            .await
            .map_err(persist_err)?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(persist_err)?;

        debug!(ticker = ticker, inserted = inserted, "배당 저장");
        Ok(inserted)
    }

    #[instrument(skip(self, splits), fields(count = splits.len()))]
    async fn save_splits(
        &self,
        ticker: &str,
        splits: &[SplitRecord],
        mode: WriteMode,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(persist_err)?;

        if mode == WriteMode::Reset {
            sqlx::query("DELETE FROM splits WHERE ticker = $1")
                .bind(ticker)
                .execute(&mut *tx)
                .await
                .map_err(persist_err)?;
        }

        let ex_dates: Vec<NaiveDate> = splits.iter().map(|s| s.ex_date).collect();
        let froms: Vec<f64> = splits.iter().map(|s| s.from_factor).collect();
        let tos: Vec<f64> = splits.iter().map(|s| s.to_factor).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO splits (ticker, ex_date, from_factor, to_factor)
            SELECT $1, * FROM UNNEST($2::date[], $3::float8[], $4::float8[])
            ON CONFLICT (ticker, ex_date) DO NOTHING
            "#,
        )
        .bind(ticker)
        .bind(&ex_dates)
        .bind(&froms)
        .bind(&tos)
        .execute(&mut *tx)
        .await
        .map_err(persist_err)?;

        tx.commit().await.map_err(persist_err)?;

        Ok(result.rows_affected() as usize)
    }

    #[instrument(skip(self))]
    async fn recompute_adjusted(&self, ticker: &str) -> Result<()> {
        sqlx::query("SELECT recompute_adjusted($1)")
            .bind(ticker)
            .execute(&self.pool)
            .await
            .map_err(persist_err)?;
        Ok(())
    }

    async fn dividend_yield_series(&self, ticker: &str) -> Result<Vec<DividendYieldPoint>> {
        fetch_yield_points(&self.pool, ticker, None).await
    }

    async fn latest_yield_point(&self, ticker: &str) -> Result<Option<DividendYieldPoint>> {
        Ok(fetch_yield_points(&self.pool, ticker, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn dividends(&self, ticker: &str, query: &DividendQuery) -> Result<Vec<DividendRecord>> {
        let rows: Vec<DividendRow> = sqlx::query_as(
            r#"
            SELECT external_id, ex_date, amount, amount_adj, currency, frequency, payment_type
            FROM dividends
            WHERE ticker = $1
              AND ($2::date IS NULL OR ex_date >= $2)
              AND (NOT $3 OR payment_type IN ('cash', 'both'))
              AND (NOT $4 OR frequency IN ('annual', 'semi_annual', 'quarterly', 'monthly'))
            ORDER BY ex_date DESC, external_id DESC
            LIMIT $5
            "#,
        )
        .bind(ticker)
        .bind(query.from)
        .bind(query.cash_only)
        .bind(query.regular_only)
        .bind(query.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DividendRecord::try_from).collect()
    }

    async fn dividend_ids(&self, ticker: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT external_id FROM dividends WHERE ticker = $1")
                .bind(ticker)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn last_price_date(&self, ticker: &str) -> Result<Option<NaiveDate>> {
        let row: (Option<NaiveDate>,) =
            sqlx::query_as("SELECT MAX(date) FROM prices WHERE ticker = $1")
                .bind(ticker)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.0)
    }
}

/// 가격과 배당 이력을 조인한 배당수익률 시계열 조회.
///
/// TTM 합계는 (기준일 - 1년, 기준일] 구간의 현금 배당 조정액 합계입니다.
async fn fetch_yield_points(
    pool: &PgPool,
    ticker: &str,
    limit: Option<i64>,
) -> Result<Vec<DividendYieldPoint>> {
    let rows: Vec<YieldPointRow> = sqlx::query_as(
        r#"
        SELECT p.date,
               p.close,
               p.close_adj,
               COALESCE(last_div.amount_adj, 0)::float8 AS dividend_adj,
               COALESCE(last_div.frequency, 'unspecified') AS frequency,
               COALESCE(ttm.total, 0)::float8 AS ttm_dividend_adj
        FROM prices p
        LEFT JOIN LATERAL (
            SELECT d.amount_adj, d.frequency
            FROM dividends d
            WHERE d.ticker = p.ticker
              AND d.payment_type <> 'stock'
              AND d.ex_date <= p.date
            ORDER BY d.ex_date DESC, d.external_id DESC
            LIMIT 1
        ) last_div ON TRUE
        LEFT JOIN LATERAL (
            SELECT SUM(d.amount_adj) AS total
            FROM dividends d
            WHERE d.ticker = p.ticker
              AND d.payment_type <> 'stock'
              AND d.ex_date > (p.date - INTERVAL '1 year')::date
              AND d.ex_date <= p.date
        ) ttm ON TRUE
        WHERE p.ticker = $1
        ORDER BY p.date DESC
        LIMIT $2
        "#,
    )
    .bind(ticker)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DividendYieldPoint::try_from).collect()
}
