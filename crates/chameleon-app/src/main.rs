//! # chameleon-app
//!
//! Chameleon 실행 파일 진입점.
//! 설정 로드, 어댑터 와이어링, 추적 서비스 기동, 종료 처리.

mod lifecycle;
mod overlay_log;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chameleon_core::config::AppConfig;
use chameleon_core::config_manager::ConfigManager;
use chameleon_core::models::window::ProcessId;
use chameleon_core::ports::figure_store::FigureStore;
use chameleon_monitor::XcapWindowSystem;
use chameleon_storage::SqliteFigureStore;
use chameleon_tracker::TrackerService;
use clap::Parser;
use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;
use crate::overlay_log::TracingOverlaySurface;

/// 종료 시 백그라운드 태스크 대기 시간
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Chameleon 피규어 추적기
///
/// 열린 문서 창에서 등록된 피규어를 찾아 그 위에 오버레이를 맞춘다.
#[derive(Parser, Debug)]
#[command(name = "chameleon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 폴링 간격 (밀리초). 설정 파일 값을 덮어쓴다.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// 피규어 DB 디렉토리
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 최전면 창만 분석
    #[arg(long)]
    front_most_only: bool,

    /// 시작하면서 열린 것으로 처리할 문서 파일
    #[arg(long, requires = "pid")]
    open_file: Option<PathBuf>,

    /// `--open-file`을 연 프로세스 ID
    #[arg(long)]
    pid: Option<u32>,
}

/// 피규어 DB 경로 결정 (CLI → 설정 파일 → 플랫폼 기본 경로)
///
/// # 플랫폼별 기본 경로:
/// - macOS: `~/Library/Application Support/org.chameleon.chameleon/figures.db`
/// - Windows: `%APPDATA%\chameleon\chameleon\data\figures.db`
/// - Linux: `~/.local/share/chameleon/figures.db`
fn resolve_db_path(cli_dir: Option<&Path>, config: &AppConfig) -> PathBuf {
    let file = &config.storage.database_file;
    cli_dir
        .map(Path::to_path_buf)
        .or_else(|| config.storage.data_dir.clone())
        .or_else(|| {
            ProjectDirs::from("org", "chameleon", "chameleon").map(|p| p.data_dir().to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("."))
        .join(file)
}

fn init_tracing(log_level: &str) {
    let log_filter = [
        "chameleon",
        "chameleon_app",
        "chameleon_core",
        "chameleon_vision",
        "chameleon_tracker",
        "chameleon_monitor",
        "chameleon_storage",
    ]
    .iter()
    .map(|target| format!("{target}={log_level}"))
    .collect::<Vec<_>>()
    .join(",");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();
}

fn load_config(args: &Args) -> Result<ConfigManager> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("설정 로드 실패")?;

    if args.poll_interval.is_some() || args.front_most_only {
        manager
            .update_with(|config| {
                if let Some(ms) = args.poll_interval {
                    config.tracker.poll_interval_ms = ms;
                }
                if args.front_most_only {
                    config.tracker.only_analyze_front_most = true;
                }
            })
            .context("CLI 설정 적용 실패")?;
    }
    Ok(manager)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("Chameleon 시작");

    let config_manager = load_config(&args)?;
    if let Some(path) = config_manager.config_path() {
        info!("설정 파일: {}", path.display());
    }
    let config = config_manager.get();

    // ── 어댑터 생성 (DI 와이어링) ──

    let db_path = resolve_db_path(args.data_dir.as_deref(), &config);
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("데이터 디렉토리 생성 실패: {}", dir.display()))?;
    }
    let store: Arc<dyn FigureStore> = Arc::new(SqliteFigureStore::open(&db_path)?);
    info!(
        "피규어 저장소: {} ({}개)",
        db_path.display(),
        store.list_figures().await?.len()
    );

    let window_system = Arc::new(XcapWindowSystem::new());
    let surface = Arc::new(TracingOverlaySurface::new());
    let service = TrackerService::new(
        window_system,
        surface,
        Arc::clone(&store),
        config_manager.subscribe(),
    );
    info!(
        "추적 설정: 간격 {}ms, 워커 {}개, 검출기 {:?}",
        config.tracker.poll_interval_ms, config.tracker.max_workers, config.detector.algorithm
    );

    // ── 태스크 시작 ──

    let mut lifecycle = LifecycleManager::new();
    lifecycle.track(service.spawn(lifecycle.subscribe()));

    if let (Some(path), Some(pid)) = (&args.open_file, args.pid) {
        match service.on_file_opened(path, ProcessId(pid)).await {
            Ok(count) => info!("{}: 오버레이 {count}개 생성", path.display()),
            Err(e) => warn!("문서 피규어 로드 실패: {}: {e}", path.display()),
        }
    }

    info!("Chameleon 실행 중 (Ctrl+C로 종료)");
    lifecycle
        .wait_for_signal()
        .await
        .context("시그널 핸들러 등록 실패")?;

    let finished = lifecycle.join(SHUTDOWN_GRACE).await;
    info!("Chameleon 종료 (태스크 {finished}개 정리)");
    Ok(())
}
