//! 추적 파이프라인 통합 테스트.
//!
//! 창 목록 → 스케줄러 틱 → 분석 작업 → 결과 큐 → 프레젠터 → 오버레이 표면,
//! 그리고 피규어 저장소를 거치는 등록/삭제 흐름.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use assert_matches::assert_matches;
use chameleon_core::config::AppConfig;
use chameleon_core::config_manager::ConfigManager;
use chameleon_core::error::CoreError;
use chameleon_core::models::event::{
    MatchFailure, NotFoundReason, OverlayEvent, OverlayId, SkipReason, TaskOutcome,
};
use chameleon_core::models::figure::{
    DescriptorMatrix, FeatureSignature, Figure, FigureId, Keypoint,
};
use chameleon_core::models::geometry::Rect;
use chameleon_core::models::window::{
    ProcessId, Screenshot, ScrollPosition, WindowEvent, WindowId, WindowInfo,
};
use chameleon_core::ports::figure_store::FigureStore;
use chameleon_core::ports::overlay_surface::{OverlayCommand, OverlaySurface};
use chameleon_core::ports::window_system::WindowSystem;
use chameleon_storage::SqliteFigureStore;
use chameleon_tracker::window::Admission;
use chameleon_tracker::{TrackerService, WindowRegistry};
use chameleon_vision::{Correspondence, FeatureMatchingAlgorithm, MatchLimits};
use image::{DynamicImage, GrayImage};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

const PID: ProcessId = ProcessId(100);

// ============================================================
// 가짜 포트
// ============================================================

#[derive(Default)]
struct FakeWindowSystem {
    pending_events: Mutex<Vec<WindowEvent>>,
    screenshot: Mutex<Option<Screenshot>>,
    captures: AtomicUsize,
    /// 캡처 도중 이 창이 스크롤된 것으로 보고한다
    scroll_during_capture: OnceLock<(Weak<WindowRegistry>, ScrollPosition)>,
}

impl FakeWindowSystem {
    fn with_scene() -> Self {
        let ws = Self::default();
        *ws.screenshot.lock() = Some(Screenshot {
            width: 64,
            height: 48,
            bits_per_pixel: 32,
            pixels: vec![90; 64 * 48 * 4],
        });
        ws
    }

    fn push_event(&self, event: WindowEvent) {
        self.pending_events.lock().push(event);
    }
}

impl WindowSystem for FakeWindowSystem {
    fn capture_screenshot(&self, wid: WindowId) -> Result<Option<Screenshot>, CoreError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if let Some((registry, position)) = self.scroll_during_capture.get() {
            if let Some(registry) = registry.upgrade() {
                registry.on_window_scrolled(wid, *position);
            }
        }
        Ok(self.screenshot.lock().clone())
    }

    fn update_opened_windows(&self) -> Result<Vec<WindowEvent>, CoreError> {
        Ok(std::mem::take(&mut *self.pending_events.lock()))
    }

    fn is_window_rect_hidden(&self, _wid: WindowId, _rect: Rect) -> bool {
        false
    }

    fn is_window_part_hidden(&self, _wid: WindowId, _rect: Rect) -> bool {
        false
    }

    fn register_scroll_callback(&self, _pid: ProcessId, _wid: WindowId) -> bool {
        true
    }

    fn free_registered_scroll_callbacks(&self) {}
}

#[derive(Default)]
struct RecordingSurface {
    commands: Mutex<Vec<(OverlayId, OverlayCommand)>>,
}

impl RecordingSurface {
    fn commands_for(&self, id: OverlayId) -> Vec<OverlayCommand> {
        self.commands
            .lock()
            .iter()
            .filter(|(o, _)| *o == id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn is_shown(&self, id: OverlayId) -> bool {
        self.commands_for(id)
            .iter()
            .rev()
            .find_map(|c| match c {
                OverlayCommand::SetVisible(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl OverlaySurface for RecordingSurface {
    fn apply(&self, overlay: OverlayId, command: OverlayCommand) {
        self.commands.lock().push((overlay, command));
    }
}

/// 이미지 크기별로 정해 둔 서명을 돌려준다. 모르는 크기는 장면으로 본다.
struct KeyedAlgorithm {
    scene: FeatureSignature,
    by_size: HashMap<(u32, u32), FeatureSignature>,
    detect_calls: AtomicUsize,
}

impl KeyedAlgorithm {
    fn new(scene: FeatureSignature) -> Self {
        Self {
            scene,
            by_size: HashMap::new(),
            detect_calls: AtomicUsize::new(0),
        }
    }

    fn with_image(mut self, size: (u32, u32), signature: FeatureSignature) -> Self {
        self.by_size.insert(size, signature);
        self
    }

    fn signature_for(&self, image: &GrayImage) -> &FeatureSignature {
        self.by_size.get(&image.dimensions()).unwrap_or(&self.scene)
    }
}

impl FeatureMatchingAlgorithm for KeyedAlgorithm {
    fn name(&self) -> &'static str {
        "keyed"
    }

    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        self.signature_for(image).keypoints.clone()
    }

    fn describe(
        &self,
        image: &GrayImage,
        keypoints: Vec<Keypoint>,
    ) -> Result<FeatureSignature, CoreError> {
        FeatureSignature::new(keypoints, self.signature_for(image).descriptors.clone())
    }

    fn match_signatures(
        &self,
        object: &FeatureSignature,
        scene: &FeatureSignature,
        limits: &MatchLimits,
    ) -> Vec<Correspondence> {
        chameleon_vision::matcher::match_descriptors(&object.descriptors, &scene.descriptors, limits)
    }
}

// ============================================================
// 픽스처
// ============================================================

/// `(w, h)` 영역의 키포인트 `n`개와, 그것을 `scale`배 후 `offset`만큼 옮긴 장면
fn signature_pair(
    width: u32,
    height: u32,
    n: usize,
    scale: f32,
    offset: (f32, f32),
) -> (FeatureSignature, FeatureSignature) {
    let object: Vec<Keypoint> = (0..n)
        .map(|i| {
            let fx = ((i * 37) % 97) as f32 / 97.0;
            let fy = ((i * 61) % 89) as f32 / 89.0;
            Keypoint::new(fx * width as f32, fy * height as f32, 9.0)
        })
        .collect();
    let scene: Vec<Keypoint> = object
        .iter()
        .map(|k| Keypoint::new(k.x * scale + offset.0, k.y * scale + offset.1, 9.0))
        .collect();
    let descriptors: Vec<f32> = (0..n).flat_map(|i| [i as f32, (i * i) as f32]).collect();

    let object =
        FeatureSignature::new(object, DescriptorMatrix::float(2, descriptors.clone()).unwrap())
            .unwrap();
    let scene =
        FeatureSignature::new(scene, DescriptorMatrix::float(2, descriptors).unwrap()).unwrap();
    (object, scene)
}

fn figure(id: i64, width: u32, height: u32, signature: FeatureSignature) -> Arc<Figure> {
    Arc::new(Figure {
        id: FigureId(id),
        width,
        height,
        signature,
        source_url: format!("https://figures.test/{id}"),
    })
}

fn window_info(wid: u32, pid: ProcessId) -> WindowInfo {
    WindowInfo {
        wid: WindowId(wid),
        pid,
        x: 0,
        y: 0,
        width: 800,
        height: 600,
        on_screen: true,
        front_most: true,
        title: format!("document {wid}"),
    }
}

struct Pipeline {
    service: TrackerService,
    ws: Arc<FakeWindowSystem>,
    surface: Arc<RecordingSurface>,
    algorithm: Arc<KeyedAlgorithm>,
    store: Arc<SqliteFigureStore>,
    _config: ConfigManager,
    events: Option<mpsc::UnboundedReceiver<OverlayEvent>>,
}

impl Pipeline {
    /// 결과 큐를 테스트가 직접 소비하는 파이프라인
    fn new(algorithm: KeyedAlgorithm, config: AppConfig) -> Self {
        let mut pipeline = Self::unstarted(algorithm, config);
        pipeline.events = pipeline.service.take_events();
        pipeline
    }

    /// 결과 큐를 `spawn`에 맡기는 파이프라인
    fn unstarted(algorithm: KeyedAlgorithm, config: AppConfig) -> Self {
        let ws = Arc::new(FakeWindowSystem::with_scene());
        let surface = Arc::new(RecordingSurface::default());
        let algorithm = Arc::new(algorithm);
        let store = Arc::new(SqliteFigureStore::open_in_memory().unwrap());
        let config = ConfigManager::in_memory(config);
        let service = TrackerService::with_algorithm(
            ws.clone(),
            surface.clone(),
            store.clone(),
            algorithm.clone(),
            config.subscribe(),
        );
        Self {
            service,
            ws,
            surface,
            algorithm,
            store,
            _config: config,
            events: None,
        }
    }

    fn open_window(&self, wid: u32) {
        self.ws.push_event(WindowEvent::Updated(window_info(wid, PID)));
    }

    fn overlay(&self, wid: u32, figure: i64) -> OverlayId {
        OverlayId {
            window: self.service.registry().window(WindowId(wid)).unwrap().handle(),
            figure: FigureId(figure),
        }
    }

    /// 틱 1회 실행 후 작업 완료까지 기다린다
    async fn tick(&self) -> Vec<TaskOutcome> {
        self.service.scheduler().refresh().await.join().await
    }

    fn present(&mut self) -> usize {
        let events = self.events.as_mut().unwrap();
        self.service.presenter().drain(events)
    }

    fn placement(&self, wid: u32, figure: i64) -> Option<Rect> {
        self.service
            .registry()
            .window(WindowId(wid))?
            .with_overlay(FigureId(figure), |o| o.placement())
            .flatten()
            .map(|p| p.rect)
    }
}

fn close_to(actual: Rect, expected: Rect, tolerance: i32) -> bool {
    (actual.x - expected.x).abs() <= tolerance
        && (actual.y - expected.y).abs() <= tolerance
        && (actual.width - expected.width).abs() <= tolerance
        && (actual.height - expected.height).abs() <= tolerance
}

// ============================================================
// 테스트
// ============================================================

#[tokio::test]
async fn scaled_figure_is_found_and_overlay_shown() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let mut p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    assert_eq!(
        p.tick().await,
        vec![TaskOutcome::Analyzed {
            found: 1,
            not_found: 0
        }]
    );
    assert_eq!(p.present(), 1);

    let overlay = p.overlay(1, 1);
    assert!(p.surface.is_shown(overlay));
    let rect = p.placement(1, 1).unwrap();
    assert!(close_to(rect, Rect::new(120, 80, 200, 150), 1), "{rect:?}");
    let ratio = rect.width as f64 / rect.height as f64;
    assert!((ratio - 4.0 / 3.0).abs() / (4.0 / 3.0) <= 0.1);
}

#[tokio::test]
async fn unchanged_scene_skips_detection_and_matching() {
    let (object, scene) = signature_pair(400, 300, 30, 0.5, (10.0, 10.0));
    let mut p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    p.tick().await;
    p.present();
    assert_eq!(p.algorithm.detect_calls.load(Ordering::SeqCst), 1);

    assert_eq!(p.tick().await, vec![TaskOutcome::Unchanged { reshown: 0 }]);
    assert_eq!(p.algorithm.detect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(p.present(), 0);
    assert!(p.surface.is_shown(p.overlay(1, 1)));
}

#[tokio::test]
async fn single_keypoint_scene_never_shows_overlay() {
    let (object, _) = signature_pair(400, 300, 30, 1.0, (0.0, 0.0));
    let scene = FeatureSignature::new(
        vec![Keypoint::new(5.0, 5.0, 9.0)],
        DescriptorMatrix::float(2, vec![0.0, 0.0]).unwrap(),
    )
    .unwrap();
    let mut p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    assert_eq!(
        p.tick().await,
        vec![TaskOutcome::Analyzed {
            found: 0,
            not_found: 1
        }]
    );
    let events = p.events.as_mut().unwrap();
    assert_matches!(
        events.try_recv(),
        Ok(OverlayEvent::FigureNotFound {
            reason: NotFoundReason::Match(MatchFailure::InsufficientSceneKeypoints),
            ..
        })
    );
    assert!(!p.surface.is_shown(p.overlay(1, 1)));
}

#[tokio::test]
async fn busy_window_is_skipped_without_capture() {
    let (object, scene) = signature_pair(400, 300, 30, 0.5, (0.0, 0.0));
    let mut config = AppConfig::default();
    config.tracker.analysis_lock_timeout_ms = 100;
    let p = Pipeline::new(KeyedAlgorithm::new(scene), config);
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);
    p.service.registry().update_opened_windows().unwrap();

    let window = p.service.registry().window(WindowId(1)).unwrap();
    let Admission::Acquired(_guard) = window.try_begin_analysis(Duration::ZERO) else {
        panic!("idle window must admit");
    };

    let started = std::time::Instant::now();
    assert_eq!(
        p.tick().await,
        vec![TaskOutcome::Skipped(SkipReason::Busy)]
    );
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(p.ws.captures.load(Ordering::SeqCst), 0);
    assert_eq!(p.algorithm.detect_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn saturated_pool_skips_instead_of_queueing() {
    let (object, scene) = signature_pair(400, 300, 30, 0.5, (0.0, 0.0));
    let mut config = AppConfig::default();
    config.tracker.max_workers = 1;
    config.tracker.analysis_lock_timeout_ms = 200;
    let p = Pipeline::new(KeyedAlgorithm::new(scene), config);
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);
    p.open_window(2);
    p.service.registry().update_opened_windows().unwrap();

    // 어느 창이 먼저 돌든 첫 작업이 워커를 붙잡고 있게 한다
    let first = p.service.registry().window(WindowId(1)).unwrap();
    let second = p.service.registry().window(WindowId(2)).unwrap();
    let Admission::Acquired(_g1) = first.try_begin_analysis(Duration::ZERO) else {
        panic!("idle window must admit");
    };
    let Admission::Acquired(_g2) = second.try_begin_analysis(Duration::ZERO) else {
        panic!("idle window must admit");
    };

    let report = p.service.scheduler().refresh().await;
    assert_eq!(report.scheduled, 1);
    assert_eq!(report.saturated, 1);
    assert_eq!(report.join().await, vec![TaskOutcome::Skipped(SkipReason::Busy)]);
}

#[tokio::test]
async fn scroll_during_capture_discards_results() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let mut p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    let position = ScrollPosition {
        rect: Rect::new(0, 0, 800, 600),
        horizontal: 0.0,
        vertical: 40.0,
    };
    assert!(p
        .ws
        .scroll_during_capture
        .set((Arc::downgrade(p.service.registry()), position))
        .is_ok());

    assert_eq!(p.tick().await, vec![TaskOutcome::Discarded]);
    assert_eq!(p.present(), 0);
    assert!(!p.surface.is_shown(p.overlay(1, 1)));
}

#[tokio::test]
async fn results_for_destroyed_window_are_dropped() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let mut p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    p.tick().await;
    let overlay = p.overlay(1, 1);

    // 결과가 큐에 있는 동안 창이 닫힌다
    p.ws.push_event(WindowEvent::Destroyed(WindowId(1)));
    p.service.registry().update_opened_windows().unwrap();
    assert_eq!(p.service.registry().quarantined_count(), 1);

    assert_eq!(p.present(), 0);
    assert!(!p.surface.is_shown(overlay));

    // 분석이 끝난 격리 창은 다음 갱신 때 정리된다
    p.service.registry().update_opened_windows().unwrap();
    assert_eq!(p.service.registry().quarantined_count(), 0);
    assert!(p.surface.commands_for(overlay).contains(&OverlayCommand::Destroy));
}

#[tokio::test]
async fn reused_window_id_starts_a_new_generation() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let mut p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    p.tick().await;
    let old = p.overlay(1, 1);

    // 같은 창 id를 다른 프로세스가 받는다
    p.ws.push_event(WindowEvent::Updated(window_info(1, ProcessId(200))));
    p.service.registry().update_opened_windows().unwrap();

    let window = p.service.registry().window(WindowId(1)).unwrap();
    assert_ne!(window.handle(), old.window);
    assert!(!window.has_overlays());
    assert_eq!(p.present(), 0);
}

#[tokio::test]
async fn registered_figure_is_tracked_and_deletion_removes_it() {
    let (object, scene) = signature_pair(40, 30, 50, 2.0, (100.0, 60.0));
    let algorithm = KeyedAlgorithm::new(scene).with_image((40, 30), object);
    let mut p = Pipeline::new(algorithm, AppConfig::default());
    p.open_window(1);
    p.service.registry().update_opened_windows().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("paper.pdf");
    std::fs::write(&document, b"%PDF-1.7 figures").unwrap();
    let image = DynamicImage::ImageLuma8(GrayImage::new(40, 30));

    let figure = p
        .service
        .register_figure(&document, PID, &image, "https://figures.test/new")
        .await
        .unwrap();
    assert_eq!((figure.width, figure.height), (40, 30));
    assert_eq!(p.store.list_figures().await.unwrap().len(), 1);

    p.tick().await;
    assert_eq!(p.present(), 1);
    let overlay = p.overlay(1, figure.id.0);
    assert!(p.surface.is_shown(overlay));
    let rect = p.placement(1, figure.id.0).unwrap();
    assert!(close_to(rect, Rect::new(100, 60, 80, 60), 1), "{rect:?}");

    assert!(p.service.delete_figure(figure.id).await.unwrap());
    let window = p.service.registry().window(WindowId(1)).unwrap();
    assert!(!window.has_figure(figure.id));
    assert!(p.surface.commands_for(overlay).contains(&OverlayCommand::Destroy));
    assert!(p.store.list_figures().await.unwrap().is_empty());
}

#[tokio::test]
async fn lost_deletion_notices_are_reconciled_from_store() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let p = Pipeline::unstarted(KeyedAlgorithm::new(scene), AppConfig::default());
    p.open_window(1);
    p.service.registry().update_opened_windows().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("atlas.pdf");
    std::fs::write(&document, b"%PDF-1.7 atlas").unwrap();
    let mut figures = Vec::new();
    for i in 0..70 {
        let url = format!("https://figures.test/atlas/{i}");
        figures.push(
            p.store
                .save_figure(&document, 400, 300, object.clone(), &url)
                .await
                .unwrap(),
        );
    }
    p.service
        .registry()
        .on_new_figures_detected(PID, figures.clone());
    let kept = figures.pop().unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = p.service.spawn(shutdown_rx);
    // 리스너가 돌기 전에 알림 채널 용량보다 많이 삭제한다
    for figure in &figures {
        assert!(p.store.delete_figure(figure.id).await.unwrap());
    }

    let window = p.service.registry().window(WindowId(1)).unwrap();
    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        while window.overlay_count() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "{} overlays left", window.overlay_count());
    assert!(window.has_figure(kept.id));
    assert_eq!(p.service.registry().figures_for_process(PID).len(), 1);

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn reconcile_drops_figures_missing_from_store() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());
    p.open_window(1);
    p.service.registry().update_opened_windows().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("paper.pdf");
    std::fs::write(&document, b"%PDF-1.7 reconcile").unwrap();
    let stored = p
        .store
        .save_figure(&document, 400, 300, object.clone(), "https://figures.test/kept")
        .await
        .unwrap();
    let orphan = figure(9_000, 400, 300, object);
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![stored.clone(), orphan]);

    assert_eq!(p.service.reconcile_figures().await.unwrap(), 1);
    let window = p.service.registry().window(WindowId(1)).unwrap();
    assert!(window.has_figure(stored.id));
    assert!(!window.has_figure(FigureId(9_000)));
    assert_eq!(p.service.reconcile_figures().await.unwrap(), 0);
}

#[tokio::test]
async fn featureless_image_is_rejected() {
    let empty = FeatureSignature::new(Vec::new(), DescriptorMatrix::float(2, Vec::new()).unwrap())
        .unwrap();
    let (_, scene) = signature_pair(40, 30, 10, 1.0, (0.0, 0.0));
    let p = Pipeline::new(
        KeyedAlgorithm::new(scene).with_image((40, 30), empty),
        AppConfig::default(),
    );

    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("paper.pdf");
    std::fs::write(&document, b"content").unwrap();
    let image = DynamicImage::ImageLuma8(GrayImage::new(40, 30));

    let result = p.service.register_figure(&document, PID, &image, "u").await;
    assert_matches!(result, Err(CoreError::Validation { .. }));
    assert!(p.store.list_figures().await.unwrap().is_empty());
}

#[tokio::test]
async fn opened_file_loads_stored_figures_into_process_windows() {
    let (object, scene) = signature_pair(400, 300, 30, 0.5, (0.0, 0.0));
    let p = Pipeline::new(KeyedAlgorithm::new(scene), AppConfig::default());

    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("paper.pdf");
    std::fs::write(&document, b"stored figures").unwrap();
    p.store
        .save_figure(&document, 400, 300, object, "https://figures.test/stored")
        .await
        .unwrap();

    let other = ProcessId(300);
    p.ws.push_event(WindowEvent::Updated(window_info(5, other)));
    p.service.registry().update_opened_windows().unwrap();

    assert_eq!(p.service.on_file_opened(&document, other).await.unwrap(), 1);
    assert_eq!(p.service.registry().figures_for_process(other).len(), 1);
    assert!(p.service.registry().window(WindowId(5)).unwrap().has_overlays());

    // 같은 파일을 다시 열어도 중복 생성하지 않는다
    assert_eq!(p.service.on_file_opened(&document, other).await.unwrap(), 0);
}

#[tokio::test]
async fn spawned_service_tracks_until_shutdown() {
    let (object, scene) = signature_pair(400, 300, 50, 0.5, (120.0, 80.0));
    let mut config = AppConfig::default();
    config.tracker.poll_interval_ms = 10;
    let p = Pipeline::unstarted(KeyedAlgorithm::new(scene), config);
    p.service
        .registry()
        .on_new_figures_detected(PID, vec![figure(1, 400, 300, object)]);
    p.open_window(1);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = p.service.spawn(shutdown_rx);

    let shown = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(window) = p.service.registry().window(WindowId(1)) {
                let overlay = OverlayId {
                    window: window.handle(),
                    figure: FigureId(1),
                };
                if p.surface.is_shown(overlay) {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(shown.is_ok(), "overlay never shown");

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
