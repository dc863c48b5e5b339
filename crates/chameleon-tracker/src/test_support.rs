//! 단위 테스트용 가짜 포트.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chameleon_core::error::CoreError;
use chameleon_core::models::event::OverlayId;
use chameleon_core::models::figure::{
    DescriptorMatrix, FeatureSignature, Figure, FigureId, Keypoint,
};
use chameleon_core::models::geometry::Rect;
use chameleon_core::models::window::{
    ProcessId, Screenshot, WindowEvent, WindowHandle, WindowId, WindowInfo,
};
use chameleon_core::ports::overlay_surface::{OverlayCommand, OverlaySurface};
use chameleon_core::ports::window_system::WindowSystem;
use chameleon_vision::FeatureMatchingAlgorithm;
use image::GrayImage;
use parking_lot::Mutex;

pub fn handle(wid: u32) -> WindowHandle {
    WindowHandle {
        wid: WindowId(wid),
        pid: ProcessId(100),
        generation: 1,
    }
}

pub fn overlay_id(wid: u32, figure: i64) -> OverlayId {
    OverlayId {
        window: handle(wid),
        figure: FigureId(figure),
    }
}

pub fn window_info(wid: u32, pid: u32) -> WindowInfo {
    WindowInfo {
        wid: WindowId(wid),
        pid: ProcessId(pid),
        x: 0,
        y: 0,
        width: 800,
        height: 600,
        on_screen: true,
        front_most: true,
        title: format!("window {wid}"),
    }
}

/// 키포인트 없는 피규어
pub fn figure(id: i64, width: u32, height: u32) -> Arc<Figure> {
    Arc::new(Figure {
        id: FigureId(id),
        width,
        height,
        signature: FeatureSignature {
            keypoints: Vec::new(),
            descriptors: DescriptorMatrix::Float {
                cols: 2,
                data: Vec::new(),
            },
        },
        source_url: format!("https://figures.test/{id}"),
    })
}

pub fn solid_screenshot(value: u8) -> Screenshot {
    Screenshot {
        width: 64,
        height: 48,
        bits_per_pixel: 32,
        pixels: vec![value; 64 * 48 * 4],
    }
}

// ============================================================
// 가짜 창 시스템
// ============================================================

#[derive(Default)]
pub struct FakeWindowSystem {
    occluders: Mutex<Vec<Rect>>,
    hidden_windows: Mutex<Vec<WindowId>>,
    screenshots: Mutex<HashMap<WindowId, VecDeque<Screenshot>>>,
    pending_events: Mutex<Vec<WindowEvent>>,
    pub scroll_registrations: Mutex<Vec<(ProcessId, WindowId)>>,
    pub scroll_frees: AtomicUsize,
    pub captures: AtomicUsize,
}

impl FakeWindowSystem {
    /// 이 영역과 겹치는 오버레이는 가려진 것으로 본다
    pub fn occlude_part(&self, rect: Rect) {
        self.occluders.lock().push(rect);
    }

    pub fn hide_window(&self, wid: WindowId) {
        self.hidden_windows.lock().push(wid);
    }

    /// 캡처 결과 예약. 마지막 하나는 계속 반복된다.
    pub fn push_screenshot(&self, wid: WindowId, shot: Screenshot) {
        self.screenshots.lock().entry(wid).or_default().push_back(shot);
    }

    pub fn push_event(&self, event: WindowEvent) {
        self.pending_events.lock().push(event);
    }
}

impl WindowSystem for FakeWindowSystem {
    fn capture_screenshot(&self, wid: WindowId) -> Result<Option<Screenshot>, CoreError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let mut shots = self.screenshots.lock();
        let Some(queue) = shots.get_mut(&wid) else {
            return Err(CoreError::Capture(format!("창 {wid} 캡처 불가")));
        };
        if queue.len() > 1 {
            Ok(queue.pop_front())
        } else {
            Ok(queue.front().cloned())
        }
    }

    fn update_opened_windows(&self) -> Result<Vec<WindowEvent>, CoreError> {
        Ok(std::mem::take(&mut *self.pending_events.lock()))
    }

    fn is_window_rect_hidden(&self, wid: WindowId, _rect: Rect) -> bool {
        self.hidden_windows.lock().contains(&wid)
    }

    fn is_window_part_hidden(&self, _wid: WindowId, rect: Rect) -> bool {
        self.occluders.lock().iter().any(|o| o.intersects(&rect))
    }

    fn register_scroll_callback(&self, pid: ProcessId, wid: WindowId) -> bool {
        self.scroll_registrations.lock().push((pid, wid));
        true
    }

    fn free_registered_scroll_callbacks(&self) {
        self.scroll_frees.fetch_add(1, Ordering::SeqCst);
        self.scroll_registrations.lock().clear();
    }
}

// ============================================================
// 기록용 표면
// ============================================================

#[derive(Default)]
pub struct RecordingSurface {
    commands: Mutex<Vec<(OverlayId, OverlayCommand)>>,
}

impl RecordingSurface {
    pub fn contains(&self, command: OverlayCommand) -> bool {
        self.commands.lock().iter().any(|(_, c)| *c == command)
    }

    pub fn commands_for(&self, id: OverlayId) -> Vec<OverlayCommand> {
        self.commands
            .lock()
            .iter()
            .filter(|(o, _)| *o == id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn count(&self, command: &OverlayCommand) -> usize {
        self.commands.lock().iter().filter(|(_, c)| c == command).count()
    }
}

impl OverlaySurface for RecordingSurface {
    fn apply(&self, overlay: OverlayId, command: OverlayCommand) {
        self.commands.lock().push((overlay, command));
    }
}

// ============================================================
// 가짜 매칭 전략
// ============================================================

/// 고정된 장면 서명을 돌려주고 호출 횟수를 센다
pub struct ScriptedAlgorithm {
    pub scene: FeatureSignature,
    pub detect_calls: AtomicUsize,
    pub match_calls: AtomicUsize,
}

impl ScriptedAlgorithm {
    pub fn new(scene: FeatureSignature) -> Self {
        Self {
            scene,
            detect_calls: AtomicUsize::new(0),
            match_calls: AtomicUsize::new(0),
        }
    }
}

impl FeatureMatchingAlgorithm for ScriptedAlgorithm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&self, _image: &GrayImage) -> Vec<Keypoint> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        self.scene.keypoints.clone()
    }

    fn describe(
        &self,
        _image: &GrayImage,
        keypoints: Vec<Keypoint>,
    ) -> Result<FeatureSignature, CoreError> {
        FeatureSignature::new(keypoints, self.scene.descriptors.clone())
    }

    fn match_signatures(
        &self,
        object: &FeatureSignature,
        scene: &FeatureSignature,
        limits: &chameleon_vision::MatchLimits,
    ) -> Vec<chameleon_vision::Correspondence> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        chameleon_vision::matcher::match_descriptors(&object.descriptors, &scene.descriptors, limits)
    }
}

/// 피규어 `(w, h)`에 격자 키포인트 `n`개, 장면은 `scale`배 + `(tx, ty)` 이동한 사본.
/// 기술자는 키포인트마다 고유한 실수 벡터라 매칭이 1:1로 맞는다.
pub fn scaled_pair(
    id: i64,
    width: u32,
    height: u32,
    n: usize,
    scale: f32,
    offset: (f32, f32),
) -> (Arc<Figure>, FeatureSignature) {
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

    let figure = Arc::new(Figure {
        id: FigureId(id),
        width,
        height,
        signature: FeatureSignature {
            keypoints: object,
            descriptors: DescriptorMatrix::Float {
                cols: 2,
                data: descriptors.clone(),
            },
        },
        source_url: format!("https://figures.test/{id}"),
    });
    let scene = FeatureSignature {
        keypoints: scene,
        descriptors: DescriptorMatrix::Float {
            cols: 2,
            data: descriptors,
        },
    };
    (figure, scene)
}
