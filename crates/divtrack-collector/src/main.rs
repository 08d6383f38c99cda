//! divtrack CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use divtrack_analytics::{report, AggregationEngine, FilterPipeline, SortKey};
use divtrack_collector::{AcquisitionPipeline, CollectorError, SymbolWorker};
use divtrack_core::{init_logging, DivtrackConfig, LogConfig};
use divtrack_data::{DividendStore, MemoryStore, PgDividendStore, PolygonClient, RateLimiter, WriteMode};

#[derive(Parser)]
#[command(name = "divtrack")]
#[command(about = "Dividend history collector and screener", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// PostgreSQL 대신 인메모리 저장소 사용
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Args, Clone)]
struct FetchArgs {
    /// 수집할 심볼 (쉼표로 구분, 예: "KO,PEP,JNJ")
    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    /// 가격/분할 이력을 전체 교체
    #[arg(long)]
    reset: bool,
}

#[derive(Args, Clone)]
struct ScreenArgs {
    /// JSON 리포트 저장
    #[arg(long)]
    json: bool,

    /// 정렬 기준 (ticker, yield, total_yield, dgr5)
    #[arg(long, default_value = "ticker")]
    sort: SortKey,
}

#[derive(Subcommand)]
enum Commands {
    /// 배당/가격/분할 이력 수집
    Fetch(FetchArgs),

    /// 통계 계산 및 스크리닝
    Screen {
        /// 대상 심볼 (쉼표로 구분)
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        #[command(flatten)]
        screen: ScreenArgs,
    },

    /// 수집 후 스크리닝
    Run {
        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        screen: ScreenArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = DivtrackConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("divtrack 시작");

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut pg: Option<Arc<PgDividendStore>> = None;
    let store: Arc<dyn DividendStore> = if cli.dry_run {
        tracing::info!("dry-run: 인메모리 저장소 사용");
        Arc::new(MemoryStore::new())
    } else {
        let url = config
            .database
            .url
            .as_deref()
            .ok_or_else(|| CollectorError::Config("database.url이 필요합니다".to_string()))?;
        let connected = Arc::new(PgDividendStore::connect(url, &config.database).await?);
        tracing::info!("데이터베이스 연결 성공");
        pg = Some(connected.clone());
        connected
    };

    let result = match cli.command {
        Commands::Fetch(args) => fetch(&config, store, &cancel, args).await,
        Commands::Screen { symbols, screen: args } => {
            screen(&config, store, &cancel, &symbols, args).await
        }
        Commands::Run { fetch: fetch_args, screen: screen_args } => {
            tracing::info!("=== 전체 워크플로우 시작 ===");
            let symbols = fetch_args.symbols.clone();
            tracing::info!("Step 1/2: 이력 수집");
            match fetch(&config, store.clone(), &cancel, fetch_args).await {
                Ok(()) => {
                    tracing::info!("Step 2/2: 스크리닝");
                    screen(&config, store, &cancel, &symbols, screen_args).await
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Some(pg) = pg {
        pg.close().await;
    }
    tracing::info!("divtrack 종료");

    result
}

/// 이력 수집 실행.
async fn fetch(
    config: &DivtrackConfig,
    store: Arc<dyn DividendStore>,
    cancel: &CancellationToken,
    args: FetchArgs,
) -> anyhow::Result<()> {
    let collector = &config.collector;
    let api_key = collector
        .api_key
        .clone()
        .ok_or_else(|| CollectorError::Config("collector.api_key가 필요합니다".to_string()))?;

    let limiter = Arc::new(RateLimiter::from_config(&collector.rate_limit));
    let source = Arc::new(PolygonClient::new(
        collector.base_url.clone(),
        api_key,
        collector.timeout(),
        limiter,
    )?);

    let mode = if args.reset || collector.reset {
        WriteMode::Reset
    } else {
        WriteMode::Append
    };

    let worker = SymbolWorker::new(source, store, mode, collector.lookback_years);
    let pipeline = AcquisitionPipeline::new(worker, collector.workers);

    let report = pipeline.fetch(cancel, &args.symbols).await?;
    report.stats.log_summary("배당 이력 수집");

    if !report.failures.is_empty() {
        println!("\n수집 실패 {}건:", report.failures.len());
        for failure in &report.failures {
            println!("  {:<8} {}", failure.ticker, failure.error);
        }
    }

    Ok(())
}

/// 스크리닝 실행.
async fn screen(
    config: &DivtrackConfig,
    store: Arc<dyn DividendStore>,
    cancel: &CancellationToken,
    symbols: &[String],
    args: ScreenArgs,
) -> anyhow::Result<()> {
    let engine = AggregationEngine::new(store, config.analytics.required_return);
    let stats = engine.generate(cancel, symbols).await?;

    let pipeline = FilterPipeline::from_thresholds(&config.thresholds);
    let mut screened = pipeline.apply(stats);
    screened.sort(args.sort);

    tracing::info!(
        symbols = symbols.len(),
        passed = screened.len(),
        "스크리닝 완료"
    );

    println!("\n{}", report::render_table(&screened));

    if args.json {
        let path = report::write_json(
            &screened,
            &config.analytics.output_dir,
            Utc::now().date_naive(),
        )?;
        println!("📁 리포트 저장됨: {}", path.display());
    }

    Ok(())
}

/// Ctrl+C 수신 시 취소 토큰을 취소합니다.
async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Ctrl+C 수신, 진행 중인 작업만 완료 후 종료합니다");
            cancel.cancel();
        }
        Err(e) => tracing::error!("Ctrl+C 핸들러 설치 실패: {}", e),
    }
}
