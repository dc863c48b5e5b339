//! 창별 분석 작업.
//!
//! 워커 풀의 블로킹 스레드에서 실행된다. 오버레이 상태는 건드리지 않고
//! 결과를 `OverlayEvent`로 큐에 게시할 뿐이며, 모든 실패는 `TaskOutcome`
//! 또는 `MatchFailure` 값으로 끝난다.
//!
//! 순서: 분석 락 → 캡처/변경 판정 → (변경 시) 장면 서명 1회 계산 →
//! 오버레이별 위치 추정 → 스크롤 신선도 확인 → 게시.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chameleon_core::config::{AppConfig, MatchingConfig};
use chameleon_core::models::event::{MatchFailure, OverlayEvent, SkipReason, TaskOutcome};
use chameleon_core::models::figure::{FeatureSignature, Figure};
use chameleon_core::models::geometry::Rect;
use chameleon_core::ports::window_system::WindowSystem;
use chameleon_vision::{capture, FeatureMatchingAlgorithm, MatchLimits};
use tokio::sync::mpsc;
use tracing::debug;

use crate::window::{Admission, ObservedWindow, SceneChange, ScrollSnapshot};

/// 작업 디스패치 시점의 설정 스냅샷
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub lock_timeout: Duration,
    pub scroll_settle: Duration,
    pub matching: MatchingConfig,
}

impl AnalysisConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            lock_timeout: config.analysis_lock_timeout(),
            scroll_settle: Duration::from_millis(config.tracker.scroll_settle_ms),
            matching: config.matching.clone(),
        }
    }

    pub fn limits(&self) -> MatchLimits {
        MatchLimits {
            distance_threshold: self.matching.distance_threshold,
            max_correspondences: self.matching.max_correspondences,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

/// 작업 하나에 필요한 모든 것
pub struct AnalysisContext {
    pub window: Arc<ObservedWindow>,
    pub window_system: Arc<dyn WindowSystem>,
    pub algorithm: Arc<dyn FeatureMatchingAlgorithm>,
    pub events: mpsc::UnboundedSender<OverlayEvent>,
    pub config: AnalysisConfig,
}

/// 분석 작업 1회 실행
pub fn run_analysis(ctx: &AnalysisContext) -> TaskOutcome {
    let handle = ctx.window.handle();
    let _guard = match ctx.window.try_begin_analysis(ctx.config.lock_timeout) {
        Admission::Acquired(guard) => guard,
        Admission::Busy => {
            debug!(window = %handle, "분석 락 대기 시간 초과, 이번 틱 건너뜀");
            return TaskOutcome::Skipped(SkipReason::Busy);
        }
        Admission::Gone => return TaskOutcome::Skipped(SkipReason::WindowGone),
    };

    let scroll_before = ctx.window.scroll_snapshot();
    let was_visible = ctx.window.was_visible();

    let shot = match ctx
        .window
        .update_screenshot(ctx.window_system.as_ref(), ctx.config.matching.change_threshold)
    {
        SceneChange::Empty => {
            debug!(window = %handle, "빈 장면");
            return TaskOutcome::Skipped(SkipReason::NoScene);
        }
        SceneChange::Unchanged if was_visible => return TaskOutcome::Unchanged { reshown: 0 },
        SceneChange::Unchanged => return reshow(ctx),
        SceneChange::Changed(shot) => shot,
    };

    let Some(gray) = capture::screenshot_to_gray(&shot) else {
        return TaskOutcome::Skipped(SkipReason::NoScene);
    };
    let scene = match ctx.algorithm.compute_signature(&gray) {
        Ok(scene) => scene,
        Err(e) => {
            debug!(window = %handle, "장면 서명 계산 실패: {e}");
            return TaskOutcome::Skipped(SkipReason::NoScene);
        }
    };

    let (origin_x, origin_y) = ctx.window.origin();
    let limits = ctx.config.limits();
    let mut events = Vec::new();
    let (mut found, mut not_found) = (0, 0);
    for (overlay, figure) in ctx.window.overlay_targets() {
        match locate_figure(
            ctx.algorithm.as_ref(),
            &figure,
            &scene,
            &ctx.config.matching,
            &limits,
        ) {
            Ok(rect) => {
                found += 1;
                events.push(OverlayEvent::FigureFound {
                    overlay,
                    rect: rect.translated(origin_x, origin_y),
                });
            }
            Err(failure) => {
                not_found += 1;
                debug!(overlay = %overlay, ?failure, "피규어 미검출");
                events.push(OverlayEvent::FigureNotFound {
                    overlay,
                    reason: failure.into(),
                });
            }
        }
    }

    if is_stale(&ctx.window, &scroll_before, ctx.config.scroll_settle, Instant::now()) {
        debug!(window = %handle, "분석 중 스크롤 발생, 결과 폐기");
        return TaskOutcome::Discarded;
    }

    post(ctx, events);
    TaskOutcome::Analyzed { found, not_found }
}

/// 장면이 그대로인데 창이 다시 보이게 된 경우: 찾았지만 숨겨진 오버레이를
/// 마지막 위치로 다시 알린다. 현재 창 경계로 다시 클램핑되는 것은 프레젠터 몫이다.
fn reshow(ctx: &AnalysisContext) -> TaskOutcome {
    let events: Vec<OverlayEvent> = ctx
        .window
        .reshow_targets()
        .into_iter()
        .map(|(overlay, rect)| OverlayEvent::FigureFound { overlay, rect })
        .collect();
    let reshown = events.len();
    post(ctx, events);
    TaskOutcome::Unchanged { reshown }
}

fn post(ctx: &AnalysisContext, events: Vec<OverlayEvent>) {
    for event in events {
        if ctx.events.send(event).is_err() {
            debug!("프레젠터 큐가 닫혀 결과를 버림");
            return;
        }
    }
}

/// 캡처 이후 스크롤 상태가 바뀌었거나 아직 스크롤이 가라앉지 않았으면 true
fn is_stale(
    window: &ObservedWindow,
    before: &ScrollSnapshot,
    settle: Duration,
    now: Instant,
) -> bool {
    let after = window.scroll_snapshot();
    if after != *before {
        return true;
    }
    after
        .last_scrolled_at
        .is_some_and(|at| now.saturating_duration_since(at) < settle)
}

/// 장면에서 피규어 위치 추정 (창 기준 사각형)
pub fn locate_figure(
    algorithm: &dyn FeatureMatchingAlgorithm,
    figure: &Figure,
    scene: &FeatureSignature,
    matching: &MatchingConfig,
    limits: &MatchLimits,
) -> Result<Rect, MatchFailure> {
    if scene.keypoints.len() < matching.min_scene_keypoints {
        return Err(MatchFailure::InsufficientSceneKeypoints);
    }

    let correspondences = algorithm.match_signatures(&figure.signature, scene, limits);
    if correspondences.len() < matching.min_correspondences {
        return Err(MatchFailure::InsufficientCorrespondences);
    }

    let rect = algorithm
        .estimate_region(
            figure.width,
            figure.height,
            &correspondences,
            figure.keypoints(),
            &scene.keypoints,
        )
        .ok_or(MatchFailure::NoHomography)?;

    if rect.width <= matching.min_region_size || rect.height <= matching.min_region_size {
        return Err(MatchFailure::RegionTooSmall);
    }

    let expected = figure.aspect_ratio();
    let actual = rect.aspect_ratio().unwrap_or(0.0);
    if expected <= 0.0 || ((actual - expected) / expected).abs() > matching.aspect_ratio_tolerance {
        return Err(MatchFailure::AspectRatioMismatch);
    }

    Ok(rect)
}
