//! 폴링 스케줄러.
//!
//! 타이머 틱마다 창 목록을 갱신하고, 오버레이가 있는 적격 창마다 분석 작업을
//! 하나씩 워커 풀(세마포어로 제한된 블로킹 스레드)에 올린다. 풀이 가득 차면
//! 그 창은 이번 틱을 건너뛴다(대기열에 쌓지 않음).

use std::sync::Arc;

use chameleon_core::config::AppConfig;
use chameleon_core::models::event::{NotFoundReason, OverlayEvent, TaskOutcome};
use chameleon_core::ports::window_system::WindowSystem;
use chameleon_vision::FeatureMatchingAlgorithm;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::analysis::{run_analysis, AnalysisConfig, AnalysisContext};
use crate::registry::WindowRegistry;

/// 틱 1회 결과
#[derive(Debug, Default)]
pub struct TickReport {
    pub scheduled: usize,
    pub not_eligible: usize,
    pub skipped_background: usize,
    pub saturated: usize,
    pub tasks: Vec<JoinHandle<TaskOutcome>>,
}

impl TickReport {
    /// 이번 틱에 올린 작업이 모두 끝날 때까지 기다린다
    pub async fn join(self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("분석 작업 합류 실패: {e}"),
            }
        }
        outcomes
    }
}

pub struct TrackerScheduler {
    registry: Arc<WindowRegistry>,
    window_system: Arc<dyn WindowSystem>,
    algorithm: Arc<dyn FeatureMatchingAlgorithm>,
    events: mpsc::UnboundedSender<OverlayEvent>,
    config: watch::Receiver<AppConfig>,
    workers: Arc<Semaphore>,
}

impl TrackerScheduler {
    /// 워커 수는 생성 시점 설정으로 고정된다
    pub fn new(
        registry: Arc<WindowRegistry>,
        window_system: Arc<dyn WindowSystem>,
        algorithm: Arc<dyn FeatureMatchingAlgorithm>,
        events: mpsc::UnboundedSender<OverlayEvent>,
        config: watch::Receiver<AppConfig>,
    ) -> Self {
        let max_workers = config.borrow().tracker.max_workers.max(1);
        Self {
            registry,
            window_system,
            algorithm,
            events,
            config,
            workers: Arc::new(Semaphore::new(max_workers)),
        }
    }

    /// 틱 1회. 창 목록 조회는 블로킹 스레드에서 수행한다.
    pub async fn refresh(&self) -> TickReport {
        let registry = Arc::clone(&self.registry);
        match tokio::task::spawn_blocking(move || registry.update_opened_windows()).await {
            Ok(Err(e)) => warn!("창 목록 갱신 실패: {e}"),
            Err(e) => warn!("창 목록 갱신 작업 실패: {e}"),
            Ok(Ok(_)) => {}
        }

        let (analysis_config, front_most_only) = {
            let config = self.config.borrow();
            (
                AnalysisConfig::from_app(&config),
                config.tracker.only_analyze_front_most,
            )
        };

        let mut report = TickReport::default();
        for window in self.registry.windows() {
            if !window.has_overlays() {
                continue;
            }
            let visible = window.refresh_visibility(self.window_system.as_ref());

            let info = window.info();
            if !visible && info.title.is_empty() {
                report.not_eligible += 1;
                for (overlay, _) in window.overlay_targets() {
                    let _ = self.events.send(OverlayEvent::FigureNotFound {
                        overlay,
                        reason: NotFoundReason::WindowNotEligible,
                    });
                }
                continue;
            }
            if front_most_only && !info.front_most {
                report.skipped_background += 1;
                continue;
            }

            let Ok(permit) = Arc::clone(&self.workers).try_acquire_owned() else {
                debug!(window = %window.handle(), "워커 풀 포화, 이번 틱 건너뜀");
                report.saturated += 1;
                continue;
            };

            let ctx = AnalysisContext {
                window,
                window_system: Arc::clone(&self.window_system),
                algorithm: Arc::clone(&self.algorithm),
                events: self.events.clone(),
                config: analysis_config.clone(),
            };
            report.tasks.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run_analysis(&ctx)
            }));
            report.scheduled += 1;
        }
        report
    }

    /// 폴링 루프. 설정 변경(폴링 주기, 접근성)에 반응하고 종료 신호로 빠져나간다.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut config_rx = self.config.clone();
        let mut current = config_rx.borrow_and_update().clone();
        let mut interval = new_interval(&current);
        let mut config_open = true;

        info!(
            "추적 스케줄러 시작: 폴링={}ms, 워커={}",
            current.tracker.poll_interval_ms,
            self.workers.available_permits()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.refresh().await;
                    debug!(
                        scheduled = report.scheduled,
                        not_eligible = report.not_eligible,
                        saturated = report.saturated,
                        "틱"
                    );
                }
                changed = config_rx.changed(), if config_open => {
                    if changed.is_err() {
                        config_open = false;
                        continue;
                    }
                    let next = config_rx.borrow_and_update().clone();
                    if next.tracker.poll_interval_ms != current.tracker.poll_interval_ms {
                        info!("폴링 주기 변경: {}ms", next.tracker.poll_interval_ms);
                        interval = new_interval(&next);
                    }
                    if next.tracker.use_accessibility != current.tracker.use_accessibility {
                        self.registry.set_accessibility(next.tracker.use_accessibility);
                    }
                    current = next;
                }
                _ = shutdown_rx.changed() => {
                    info!("추적 스케줄러 종료");
                    break;
                }
            }
        }
    }
}

fn new_interval(config: &AppConfig) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(config.poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
