//! 관찰 중인 창 하나의 상태.
//!
//! 기하/가시성/스크린샷 캐시/스크롤/오버레이 집합을 각각 별도 락으로 보호한다.
//! 분석 락은 단일 비행(single-flight) 보장용이며 다른 락과 독립이다.
//! 락 순서: scroll → overlays. geometry/visibility/screenshot 락은 짧게만 잡는다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chameleon_core::models::event::OverlayId;
use chameleon_core::models::figure::{Figure, FigureId};
use chameleon_core::models::geometry::Rect;
use chameleon_core::models::window::{ScrollPosition, Screenshot, WindowHandle, WindowInfo};
use chameleon_core::ports::overlay_surface::OverlaySurface;
use chameleon_core::ports::window_system::WindowSystem;
use chameleon_vision::delta;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::overlay::{Overlay, OverlayEnv};

/// 분석 락 획득 결과
#[derive(Debug)]
pub enum Admission<'a> {
    /// 락 획득. 가드가 살아 있는 동안 이 창의 다른 분석은 들어오지 못한다.
    Acquired(MutexGuard<'a, ()>),
    /// 시간 안에 락을 얻지 못함
    Busy,
    /// 파괴되어 격리된 창
    Gone,
}

/// 캡처 후 장면 판정
#[derive(Debug, Clone)]
pub enum SceneChange {
    Unchanged,
    Changed(Arc<Screenshot>),
    /// 캡처 실패 또는 빈 화면
    Empty,
}

/// 분석 시작 시점의 스크롤 상태
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSnapshot {
    pub position: Option<ScrollPosition>,
    pub last_scrolled_at: Option<Instant>,
}

struct Geometry {
    info: WindowInfo,
    /// 마지막 캡처 이후 창이 이동했는지
    moved: bool,
}

#[derive(Default)]
struct Visibility {
    visible: bool,
    last_visible: bool,
}

#[derive(Default)]
struct ScrollState {
    position: Option<ScrollPosition>,
    last_scrolled_at: Option<Instant>,
}

pub struct ObservedWindow {
    handle: WindowHandle,
    geometry: Mutex<Geometry>,
    visibility: Mutex<Visibility>,
    screenshot: Mutex<Option<Arc<Screenshot>>>,
    scroll: Mutex<ScrollState>,
    overlays: Mutex<Vec<Overlay>>,
    analysis: Mutex<()>,
    tombstoned: AtomicBool,
}

impl ObservedWindow {
    pub fn new(handle: WindowHandle, info: WindowInfo) -> Self {
        Self {
            handle,
            geometry: Mutex::new(Geometry { info, moved: false }),
            visibility: Mutex::new(Visibility::default()),
            screenshot: Mutex::new(None),
            scroll: Mutex::new(ScrollState::default()),
            overlays: Mutex::new(Vec::new()),
            analysis: Mutex::new(()),
            tombstoned: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    pub fn info(&self) -> WindowInfo {
        self.geometry.lock().info.clone()
    }

    pub fn rect(&self) -> Rect {
        self.geometry.lock().info.rect()
    }

    pub fn origin(&self) -> (i32, i32) {
        let geometry = self.geometry.lock();
        (geometry.info.x, geometry.info.y)
    }

    // ============================================================
    // 분석 락 / 격리
    // ============================================================

    /// 분석 락을 `timeout` 동안 시도한다
    pub fn try_begin_analysis(&self, timeout: Duration) -> Admission<'_> {
        if self.is_tombstoned() {
            return Admission::Gone;
        }
        match self.analysis.try_lock_for(timeout) {
            // 대기 중에 파괴되었을 수 있다
            Some(_) if self.is_tombstoned() => Admission::Gone,
            Some(guard) => Admission::Acquired(guard),
            None => Admission::Busy,
        }
    }

    /// 진행 중인 분석이 없는지 (격리 해제 판정)
    pub fn is_analysis_idle(&self) -> bool {
        self.analysis.try_lock().is_some()
    }

    pub fn tombstone(&self) {
        self.tombstoned.store(true, Ordering::SeqCst);
    }

    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned.load(Ordering::SeqCst)
    }

    // ============================================================
    // 기하 / 가시성
    // ============================================================

    /// OS가 보고한 최신 기하 반영. 위치가 바뀌면 다음 캡처는 무조건 변경으로 본다.
    pub fn update_geometry(&self, info: &WindowInfo) {
        let mut geometry = self.geometry.lock();
        if geometry.info.x != info.x || geometry.info.y != info.y {
            geometry.moved = true;
        }
        geometry.info = info.clone();
    }

    /// 가시성 재계산: 화면에 있고 다른 창에 완전히 가려지지 않음
    pub fn refresh_visibility(&self, window_system: &dyn WindowSystem) -> bool {
        let info = self.info();
        let visible =
            info.on_screen && !window_system.is_window_rect_hidden(info.wid, info.rect());
        let mut visibility = self.visibility.lock();
        visibility.last_visible = visibility.visible;
        visibility.visible = visible;
        visible
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.lock().visible
    }

    /// 직전 가시성 갱신 이전의 값
    pub fn was_visible(&self) -> bool {
        self.visibility.lock().last_visible
    }

    // ============================================================
    // 스크린샷
    // ============================================================

    /// 새로 캡처해 캐시를 교체하고 이전 장면과 비교한다
    pub fn update_screenshot(
        &self,
        window_system: &dyn WindowSystem,
        change_threshold: f64,
    ) -> SceneChange {
        let shot = match window_system.capture_screenshot(self.handle.wid) {
            Ok(Some(shot)) if !shot.is_empty() => Arc::new(shot),
            Ok(_) => return SceneChange::Empty,
            Err(e) => {
                debug!(window = %self.handle, "캡처 실패, 장면 없음으로 처리: {e}");
                return SceneChange::Empty;
            }
        };

        let moved = std::mem::take(&mut self.geometry.lock().moved);
        let mut cached = self.screenshot.lock();
        let changed = moved || delta::has_changed(cached.as_deref(), &shot, change_threshold);
        *cached = Some(Arc::clone(&shot));

        if changed {
            SceneChange::Changed(shot)
        } else {
            SceneChange::Unchanged
        }
    }

    // ============================================================
    // 스크롤
    // ============================================================

    pub fn scroll_snapshot(&self) -> ScrollSnapshot {
        let scroll = self.scroll.lock();
        ScrollSnapshot {
            position: scroll.position,
            last_scrolled_at: scroll.last_scrolled_at,
        }
    }

    /// 스크롤 보고 반영. 스크롤 오프셋 변화에서 캔버스 원점 이동을 뺀 만큼
    /// 모든 오버레이를 거슬러 옮긴다. 옮긴 오버레이 수를 돌려준다.
    pub fn on_scrolled(&self, position: ScrollPosition, env: OverlayEnv<'_>) -> usize {
        let origin = self.origin();
        let mut scroll = self.scroll.lock();

        let mut moved = 0;
        if let Some(previous) = scroll.position {
            let dx = (position.horizontal - previous.horizontal)
                - f64::from(position.rect.x - previous.rect.x);
            let dy = (position.vertical - previous.vertical)
                - f64::from(position.rect.y - previous.rect.y);
            if dx != 0.0 || dy != 0.0 {
                let mut overlays = self.overlays.lock();
                for overlay in overlays.iter_mut() {
                    overlay.scroll_by(origin, position.rect, dx, dy, env);
                }
                moved = overlays.len();
            }
        }

        scroll.position = Some(position);
        scroll.last_scrolled_at = Some(Instant::now());
        moved
    }

    // ============================================================
    // 오버레이 집합
    // ============================================================

    /// 피규어 등록. 이미 있으면 아무것도 하지 않고 false.
    pub fn add_overlay(&self, figure: Arc<Figure>, surface: &dyn OverlaySurface) -> bool {
        let mut overlays = self.overlays.lock();
        if overlays.iter().any(|o| o.figure().id == figure.id) {
            return false;
        }
        let id = OverlayId {
            window: self.handle,
            figure: figure.id,
        };
        overlays.push(Overlay::new(id, figure, surface));
        true
    }

    /// 피규어의 오버레이를 파기한다
    pub fn remove_figure(&self, figure: FigureId, surface: &dyn OverlaySurface) -> bool {
        let mut overlays = self.overlays.lock();
        let Some(index) = overlays.iter().position(|o| o.figure().id == figure) else {
            return false;
        };
        let mut overlay = overlays.remove(index);
        overlay.destroy(surface);
        true
    }

    pub fn has_overlays(&self) -> bool {
        !self.overlays.lock().is_empty()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.lock().len()
    }

    pub fn has_figure(&self, figure: FigureId) -> bool {
        self.overlays.lock().iter().any(|o| o.figure().id == figure)
    }

    /// 분석 대상 목록 (락을 오래 잡지 않도록 복사)
    pub fn overlay_targets(&self) -> Vec<(OverlayId, Arc<Figure>)> {
        self.overlays
            .lock()
            .iter()
            .map(|o| (o.id(), Arc::clone(o.figure())))
            .collect()
    }

    /// 찾았지만 화면에 없는 오버레이의 마지막 가상 사각형
    pub fn reshow_targets(&self) -> Vec<(OverlayId, Rect)> {
        let origin = self.origin();
        self.overlays
            .lock()
            .iter()
            .filter(|o| o.is_found() && !o.is_shown())
            .map(|o| (o.id(), o.virtual_rect(origin)))
            .collect()
    }

    /// 피규어의 오버레이에 클로저 적용
    pub fn with_overlay<R>(&self, figure: FigureId, f: impl FnOnce(&mut Overlay) -> R) -> Option<R> {
        let mut overlays = self.overlays.lock();
        overlays.iter_mut().find(|o| o.figure().id == figure).map(f)
    }

    pub fn hide_overlays(&self, surface: &dyn OverlaySurface) {
        for overlay in self.overlays.lock().iter_mut() {
            overlay.hide(surface);
        }
    }

    pub fn destroy_overlays(&self, surface: &dyn OverlaySurface) {
        for mut overlay in self.overlays.lock().drain(..) {
            overlay.destroy(surface);
        }
    }

    /// 포인터 위치를 덮는 보이는 오버레이에 합성 이벤트 전달
    pub fn inject_pointer(&self, x: i32, y: i32, surface: &dyn OverlaySurface) -> usize {
        self.overlays
            .lock()
            .iter()
            .filter(|o| o.inject_pointer(x, y, surface))
            .count()
    }
}
