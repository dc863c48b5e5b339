//! 추적 서비스: 레지스트리/스케줄러/프레젠터를 묶는 외부 진입점.
//!
//! 파일 열림, 피규어 등록/삭제 같은 바깥 이벤트를 받아 저장소와 레지스트리에
//! 전달하고, `spawn`으로 백그라운드 루프를 띄운다.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chameleon_core::config::AppConfig;
use chameleon_core::error::CoreError;
use chameleon_core::models::event::OverlayEvent;
use chameleon_core::models::figure::{Figure, FigureId};
use chameleon_core::models::window::ProcessId;
use chameleon_core::ports::figure_store::FigureStore;
use chameleon_core::ports::overlay_surface::OverlaySurface;
use chameleon_core::ports::window_system::WindowSystem;
use chameleon_vision::{algorithm_from_config, capture, FeatureMatchingAlgorithm};
use image::DynamicImage;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::presenter::OverlayPresenter;
use crate::registry::WindowRegistry;
use crate::scheduler::TrackerScheduler;

pub struct TrackerService {
    registry: Arc<WindowRegistry>,
    store: Arc<dyn FigureStore>,
    algorithm: Arc<dyn FeatureMatchingAlgorithm>,
    scheduler: Arc<TrackerScheduler>,
    presenter: Arc<OverlayPresenter>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<OverlayEvent>>>,
}

impl TrackerService {
    /// 설정의 검출기 전략으로 서비스 구성
    pub fn new(
        window_system: Arc<dyn WindowSystem>,
        surface: Arc<dyn OverlaySurface>,
        store: Arc<dyn FigureStore>,
        config: watch::Receiver<AppConfig>,
    ) -> Self {
        let algorithm = algorithm_from_config(&config.borrow().detector);
        Self::with_algorithm(window_system, surface, store, algorithm, config)
    }

    pub fn with_algorithm(
        window_system: Arc<dyn WindowSystem>,
        surface: Arc<dyn OverlaySurface>,
        store: Arc<dyn FigureStore>,
        algorithm: Arc<dyn FeatureMatchingAlgorithm>,
        config: watch::Receiver<AppConfig>,
    ) -> Self {
        let use_accessibility = config.borrow().tracker.use_accessibility;
        let registry = Arc::new(WindowRegistry::new(
            Arc::clone(&window_system),
            surface,
            use_accessibility,
        ));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(TrackerScheduler::new(
            Arc::clone(&registry),
            window_system,
            Arc::clone(&algorithm),
            events_tx,
            config,
        ));
        let presenter = Arc::new(OverlayPresenter::new(Arc::clone(&registry)));

        Self {
            registry,
            store,
            algorithm,
            scheduler,
            presenter,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<TrackerScheduler> {
        &self.scheduler
    }

    pub fn presenter(&self) -> &Arc<OverlayPresenter> {
        &self.presenter
    }

    /// 결과 큐 수신단을 가져간다. `spawn` 대신 직접 구동할 때 사용.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<OverlayEvent>> {
        self.events_rx.lock().take()
    }

    /// 프로세스가 파일을 열었을 때: 파일의 피규어를 로드해 그 프로세스에 배포
    pub async fn on_file_opened(&self, path: &Path, pid: ProcessId) -> Result<usize, CoreError> {
        let figures = self.store.load_figures_for_file(path).await?;
        if figures.is_empty() {
            debug!(path = %path.display(), "등록된 피규어 없음");
            return Ok(0);
        }
        info!(path = %path.display(), pid = %pid, count = figures.len(), "파일 피규어 로드");
        Ok(self.registry.on_new_figures_detected(pid, figures))
    }

    /// 이미지 영역을 새 피규어로 등록: 서명 계산 → 저장 → 프로세스에 배포
    pub async fn register_figure(
        &self,
        path: &Path,
        pid: ProcessId,
        image: &DynamicImage,
        source_url: &str,
    ) -> Result<Arc<Figure>, CoreError> {
        let gray = capture::image_to_gray(image);
        let algorithm = Arc::clone(&self.algorithm);
        let signature = tokio::task::spawn_blocking(move || algorithm.compute_signature(&gray))
            .await
            .map_err(|e| CoreError::Internal(format!("서명 계산 작업 실패: {e}")))??;

        if signature.is_empty() {
            return Err(CoreError::Validation {
                field: "image".to_string(),
                message: "특징점을 찾을 수 없는 이미지".to_string(),
            });
        }

        let figure = self
            .store
            .save_figure(path, image.width(), image.height(), signature, source_url)
            .await?;
        info!(figure_id = %figure.id, keypoints = figure.keypoints().len(), "피규어 저장");
        self.registry
            .on_new_figures_detected(pid, vec![Arc::clone(&figure)]);
        Ok(figure)
    }

    /// 피규어 삭제. 오버레이는 즉시 정리하고, 다른 구독자에게는 저장소 알림이 전달된다.
    pub async fn delete_figure(&self, id: FigureId) -> Result<bool, CoreError> {
        let deleted = self.store.delete_figure(id).await?;
        if deleted {
            self.registry.on_figure_deleted(id);
        }
        Ok(deleted)
    }

    /// 저장소에 없는 피규어를 레지스트리에서 걷어낸다. 걷어낸 피규어 수를 돌려준다.
    pub async fn reconcile_figures(&self) -> Result<usize, CoreError> {
        reconcile_figures(&self.registry, self.store.as_ref()).await
    }

    /// 스케줄러, 프레젠터, 삭제 알림 리스너를 띄운다
    pub fn spawn(&self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = Arc::clone(&self.scheduler);
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { scheduler.run(shutdown).await }));

        match self.take_events() {
            Some(events_rx) => {
                let presenter = Arc::clone(&self.presenter);
                let shutdown = shutdown_rx.clone();
                handles.push(tokio::spawn(async move {
                    presenter.run(events_rx, shutdown).await
                }));
            }
            None => warn!("결과 큐가 이미 사용 중, 프레젠터를 띄우지 않음"),
        }

        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let deletions = self.store.subscribe_deletions();
        handles.push(tokio::spawn(listen_deletions(
            registry,
            store,
            deletions,
            shutdown_rx,
        )));

        handles
    }
}

/// 저장소 목록과 레지스트리를 비교해 사라진 피규어의 삭제를 반영
async fn reconcile_figures(
    registry: &WindowRegistry,
    store: &dyn FigureStore,
) -> Result<usize, CoreError> {
    let live: HashSet<FigureId> = store
        .list_figures()
        .await?
        .into_iter()
        .map(|summary| summary.id)
        .collect();
    let stale: Vec<FigureId> = registry
        .figure_ids()
        .into_iter()
        .filter(|id| !live.contains(id))
        .collect();
    for id in &stale {
        registry.on_figure_deleted(*id);
    }
    Ok(stale.len())
}

/// 저장소 삭제 알림을 레지스트리에 반영. 알림이 유실되면 저장소 목록으로 맞춘다.
async fn listen_deletions(
    registry: Arc<WindowRegistry>,
    store: Arc<dyn FigureStore>,
    mut deletions: broadcast::Receiver<FigureId>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = deletions.recv() => match received {
                Ok(id) => {
                    registry.on_figure_deleted(id);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("피규어 삭제 알림 {skipped}건 유실, 저장소와 재동기화");
                    match reconcile_figures(&registry, store.as_ref()).await {
                        Ok(removed) => info!("재동기화로 피규어 {removed}개 정리"),
                        Err(e) => warn!("피규어 재동기화 실패: {e}"),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown_rx.changed() => break,
        }
    }
}
