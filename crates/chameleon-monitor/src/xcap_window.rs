//! xcap 기반 `WindowSystem` 구현.

use std::sync::Mutex;

use chameleon_core::error::CoreError;
use chameleon_core::models::geometry::Rect;
use chameleon_core::models::window::{ProcessId, Screenshot, WindowEvent, WindowId, WindowInfo};
use chameleon_core::ports::window_system::WindowSystem;
use tracing::{debug, warn};
use xcap::Window;

use crate::window_table::WindowTable;

/// xcap 창 어댑터
///
/// 창 목록 순서를 앞 → 뒤 z-order로 본다.
pub struct XcapWindowSystem {
    table: Mutex<WindowTable>,
}

impl XcapWindowSystem {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(WindowTable::default()),
        }
    }

    /// 현재 창 목록 (앞 → 뒤). 속성을 읽을 수 없는 창은 건너뛴다.
    fn snapshot() -> Result<Vec<WindowInfo>, CoreError> {
        let windows = Window::all()
            .map_err(|e| CoreError::Capture(format!("창 목록 조회 실패: {e}")))?;
        Ok(windows.iter().filter_map(read_window).collect())
    }
}

impl Default for XcapWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn read_window(window: &Window) -> Option<WindowInfo> {
    let info = (|| -> Result<WindowInfo, xcap::XCapError> {
        Ok(WindowInfo {
            wid: WindowId(window.id()?),
            pid: ProcessId(window.pid()?),
            x: window.x()?,
            y: window.y()?,
            width: window.width()? as i32,
            height: window.height()? as i32,
            on_screen: !window.is_minimized()?,
            front_most: window.is_focused().unwrap_or(false),
            title: window.title().unwrap_or_default(),
        })
    })();
    match info {
        Ok(info) => Some(info),
        Err(e) => {
            debug!("창 속성 조회 실패, 건너뜀: {e}");
            None
        }
    }
}

impl WindowSystem for XcapWindowSystem {
    fn capture_screenshot(&self, wid: WindowId) -> Result<Option<Screenshot>, CoreError> {
        let windows = Window::all()
            .map_err(|e| CoreError::Capture(format!("창 목록 조회 실패: {e}")))?;
        let Some(window) = windows
            .into_iter()
            .find(|w| w.id().ok() == Some(wid.0))
        else {
            return Ok(None);
        };

        let image = window
            .capture_image()
            .map_err(|e| CoreError::Capture(format!("창 {wid} 캡처 실패: {e}")))?;
        let (width, height) = image.dimensions();
        Ok(Some(Screenshot {
            width,
            height,
            bits_per_pixel: 32,
            pixels: image.into_raw(),
        }))
    }

    fn update_opened_windows(&self) -> Result<Vec<WindowEvent>, CoreError> {
        let snapshot = Self::snapshot()?;
        let mut table = self
            .table
            .lock()
            .map_err(|e| CoreError::Internal(format!("창 테이블 잠금 실패: {e}")))?;
        Ok(table.apply_snapshot(snapshot))
    }

    fn is_window_rect_hidden(&self, wid: WindowId, rect: Rect) -> bool {
        match self.table.lock() {
            Ok(table) => table.z_order().is_rect_hidden(wid, rect),
            Err(e) => {
                warn!("창 테이블 잠금 실패: {e}");
                false
            }
        }
    }

    fn is_window_part_hidden(&self, wid: WindowId, rect: Rect) -> bool {
        match self.table.lock() {
            Ok(table) => table.z_order().is_part_hidden(wid, rect),
            Err(e) => {
                warn!("창 테이블 잠금 실패: {e}");
                false
            }
        }
    }

    fn register_scroll_callback(&self, pid: ProcessId, wid: WindowId) -> bool {
        debug!(pid = %pid, wid = %wid, "스크롤 콜백 미지원");
        false
    }

    fn free_registered_scroll_callbacks(&self) {}
}
