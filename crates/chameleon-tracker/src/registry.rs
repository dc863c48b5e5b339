//! 창 레지스트리: 살아 있는 창 집합, 격리 집합, 프로세스별 피규어 목록.
//!
//! OS 이벤트(창 갱신/파괴/스크롤, 마우스 이동)와 피규어 이벤트(새 피규어, 삭제)를
//! 알맞은 창과 오버레이로 보낸다. 파괴된 창은 바로 버리지 않고 격리했다가
//! 진행 중인 분석이 끝난 뒤(분석 락이 비었을 때) 정리한다.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chameleon_core::error::CoreError;
use chameleon_core::models::event::OverlayId;
use chameleon_core::models::figure::{Figure, FigureId};
use chameleon_core::models::window::{
    ProcessId, ScrollPosition, WindowEvent, WindowHandle, WindowId, WindowInfo,
};
use chameleon_core::ports::overlay_surface::OverlaySurface;
use chameleon_core::ports::window_system::WindowSystem;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::overlay::OverlayEnv;
use crate::window::ObservedWindow;

#[derive(Default)]
struct RegistryState {
    windows: HashMap<WindowId, Arc<ObservedWindow>>,
    quarantine: Vec<Arc<ObservedWindow>>,
    figures_by_process: HashMap<ProcessId, Vec<Arc<Figure>>>,
}

pub struct WindowRegistry {
    window_system: Arc<dyn WindowSystem>,
    surface: Arc<dyn OverlaySurface>,
    state: Mutex<RegistryState>,
    next_generation: AtomicU64,
    use_accessibility: AtomicBool,
}

impl WindowRegistry {
    pub fn new(
        window_system: Arc<dyn WindowSystem>,
        surface: Arc<dyn OverlaySurface>,
        use_accessibility: bool,
    ) -> Self {
        Self {
            window_system,
            surface,
            state: Mutex::new(RegistryState::default()),
            next_generation: AtomicU64::new(1),
            use_accessibility: AtomicBool::new(use_accessibility),
        }
    }

    pub fn env(&self) -> OverlayEnv<'_> {
        OverlayEnv {
            window_system: self.window_system.as_ref(),
            surface: self.surface.as_ref(),
        }
    }

    // ============================================================
    // 창 이벤트
    // ============================================================

    /// OS에 창 목록 변경을 묻고 반영한다. 먼저 격리된 창을 정리한다.
    pub fn update_opened_windows(&self) -> Result<usize, CoreError> {
        self.reap_quarantine();
        let events = self.window_system.update_opened_windows()?;
        let count = events.len();
        self.apply_window_events(events);
        Ok(count)
    }

    pub fn apply_window_events(&self, events: Vec<WindowEvent>) {
        for event in events {
            match event {
                WindowEvent::Updated(info) => self.on_window_updated(&info),
                WindowEvent::Destroyed(wid) => self.on_window_destroyed(wid),
            }
        }
    }

    /// 창 생성/갱신. 같은 id가 다른 프로세스로 재사용되면 이전 창은 파괴로 처리한다.
    pub fn on_window_updated(&self, info: &WindowInfo) {
        let existing = self.state.lock().windows.get(&info.wid).cloned();
        match existing {
            Some(window) if window.handle().pid == info.pid => {
                window.update_geometry(info);
                return;
            }
            Some(_) => self.on_window_destroyed(info.wid),
            None => {}
        }

        let handle = WindowHandle {
            wid: info.wid,
            pid: info.pid,
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
        };
        let window = Arc::new(ObservedWindow::new(handle, info.clone()));
        let figures = {
            let mut state = self.state.lock();
            state.windows.insert(info.wid, Arc::clone(&window));
            state
                .figures_by_process
                .get(&info.pid)
                .cloned()
                .unwrap_or_default()
        };
        debug!(window = %handle, title = %info.title, "새 창 관찰 시작");

        for figure in figures {
            self.add_figure_to_window(&window, figure);
        }
    }

    /// 창 파괴: 오버레이를 즉시 숨기고 격리한다
    pub fn on_window_destroyed(&self, wid: WindowId) {
        let Some(window) = self.state.lock().windows.remove(&wid) else {
            return;
        };
        window.tombstone();
        window.hide_overlays(self.surface.as_ref());
        info!(window = %window.handle(), "창 파괴, 격리");
        self.state.lock().quarantine.push(window);
    }

    /// 분석이 끝난 격리 창의 오버레이를 파기한다. 정리한 창 수를 돌려준다.
    pub fn reap_quarantine(&self) -> usize {
        let idle: Vec<Arc<ObservedWindow>> = {
            let mut state = self.state.lock();
            let (idle, busy): (Vec<_>, Vec<_>) = std::mem::take(&mut state.quarantine)
                .into_iter()
                .partition(|w| w.is_analysis_idle());
            state.quarantine = busy;
            idle
        };
        for window in &idle {
            window.destroy_overlays(self.surface.as_ref());
            debug!(window = %window.handle(), "격리 창 정리");
        }
        idle.len()
    }

    pub fn on_window_scrolled(&self, wid: WindowId, position: ScrollPosition) -> usize {
        match self.window(wid) {
            Some(window) => window.on_scrolled(position, self.env()),
            None => 0,
        }
    }

    /// 포인터를 덮는 보이는 오버레이에 합성 이벤트 전달
    pub fn on_mouse_moved(&self, x: i32, y: i32) -> usize {
        self.windows()
            .iter()
            .map(|w| w.inject_pointer(x, y, self.surface.as_ref()))
            .sum()
    }

    // ============================================================
    // 피규어
    // ============================================================

    /// 프로세스에 새 피규어 등록 후 그 프로세스의 모든 창에 배포한다.
    /// 새로 만들어진 오버레이 수를 돌려준다.
    pub fn on_new_figures_detected(&self, pid: ProcessId, figures: Vec<Arc<Figure>>) -> usize {
        let windows: Vec<Arc<ObservedWindow>> = {
            let mut state = self.state.lock();
            let known = state.figures_by_process.entry(pid).or_default();
            for figure in &figures {
                if !known.iter().any(|f| f.id == figure.id) {
                    known.push(Arc::clone(figure));
                }
            }
            state
                .windows
                .values()
                .filter(|w| w.handle().pid == pid)
                .cloned()
                .collect()
        };

        let mut created = 0;
        for window in &windows {
            for figure in &figures {
                if self.add_figure_to_window(window, Arc::clone(figure)) {
                    created += 1;
                }
            }
        }
        if created > 0 {
            info!(pid = %pid, figures = figures.len(), overlays = created, "피규어 등록");
        }
        created
    }

    /// 창에 피규어 연결 (중복이면 false)
    pub fn add_figure_to_window(&self, window: &ObservedWindow, figure: Arc<Figure>) -> bool {
        if !window.add_overlay(figure, self.surface.as_ref()) {
            return false;
        }
        if self.use_accessibility.load(Ordering::SeqCst) {
            let handle = window.handle();
            if !self
                .window_system
                .register_scroll_callback(handle.pid, handle.wid)
            {
                debug!(window = %handle, "스크롤 콜백 등록 불가");
            }
        }
        true
    }

    /// 피규어 삭제: 프로세스 목록에서 빼고 모든 오버레이를 파기한다
    pub fn on_figure_deleted(&self, figure: FigureId) -> usize {
        let windows: Vec<Arc<ObservedWindow>> = {
            let mut state = self.state.lock();
            for figures in state.figures_by_process.values_mut() {
                figures.retain(|f| f.id != figure);
            }
            state
                .windows
                .values()
                .chain(state.quarantine.iter())
                .cloned()
                .collect()
        };
        let removed = windows
            .iter()
            .filter(|w| w.remove_figure(figure, self.surface.as_ref()))
            .count();
        info!(figure_id = %figure, overlays = removed, "피규어 삭제 반영");
        removed
    }

    /// 레지스트리가 알고 있는 모든 피규어 (프로세스 목록 + 창 오버레이)
    pub fn figure_ids(&self) -> HashSet<FigureId> {
        let (mut ids, windows): (HashSet<FigureId>, Vec<Arc<ObservedWindow>>) = {
            let state = self.state.lock();
            let ids = state
                .figures_by_process
                .values()
                .flatten()
                .map(|f| f.id)
                .collect();
            let windows = state
                .windows
                .values()
                .chain(state.quarantine.iter())
                .cloned()
                .collect();
            (ids, windows)
        };
        for window in &windows {
            ids.extend(window.overlay_targets().into_iter().map(|(id, _)| id.figure));
        }
        ids
    }

    pub fn figures_for_process(&self, pid: ProcessId) -> Vec<Arc<Figure>> {
        self.state
            .lock()
            .figures_by_process
            .get(&pid)
            .cloned()
            .unwrap_or_default()
    }

    // ============================================================
    // 설정 / 조회
    // ============================================================

    /// 접근성 스크롤 추적 전환
    pub fn set_accessibility(&self, enabled: bool) {
        if self.use_accessibility.swap(enabled, Ordering::SeqCst) == enabled {
            return;
        }
        if enabled {
            for window in self.windows().iter().filter(|w| w.has_overlays()) {
                let handle = window.handle();
                self.window_system
                    .register_scroll_callback(handle.pid, handle.wid);
            }
        } else {
            self.window_system.free_registered_scroll_callbacks();
        }
        info!(enabled, "접근성 스크롤 추적 변경");
    }

    pub fn windows(&self) -> Vec<Arc<ObservedWindow>> {
        self.state.lock().windows.values().cloned().collect()
    }

    pub fn window(&self, wid: WindowId) -> Option<Arc<ObservedWindow>> {
        self.state.lock().windows.get(&wid).cloned()
    }

    /// 세대까지 일치하는 살아 있는 창
    pub fn find_window(&self, handle: WindowHandle) -> Option<Arc<ObservedWindow>> {
        self.window(handle.wid)
            .filter(|w| w.handle() == handle && !w.is_tombstoned())
    }

    pub fn quarantined_count(&self) -> usize {
        self.state.lock().quarantine.len()
    }

    /// 오버레이 독립 창 모드 전환
    pub fn toggle_floating(&self, overlay: OverlayId) -> bool {
        let Some(window) = self.find_window(overlay.window) else {
            return false;
        };
        let origin = window.origin();
        window
            .with_overlay(overlay.figure, |o| o.toggle_floating(origin, self.env()))
            .is_some()
    }

    /// 오버레이 사용자 숨김 전환
    pub fn toggle_hidden(&self, overlay: OverlayId) -> bool {
        let Some(window) = self.find_window(overlay.window) else {
            return false;
        };
        let origin = window.origin();
        window
            .with_overlay(overlay.figure, |o| o.toggle_hidden(origin, self.env()))
            .is_some()
    }
}
