//! tracing 기반 오버레이 표면.
//!
//! 렌더러 없이 실행할 때 오버레이 명령을 로그로 남기고, 오버레이별 마지막
//! 상태(위치, 크기, 표시 여부)를 보관한다.

use std::collections::HashMap;

use chameleon_core::models::event::OverlayId;
use chameleon_core::models::geometry::Rect;
use chameleon_core::ports::overlay_surface::{OverlayCommand, OverlaySurface};
use parking_lot::Mutex;
use tracing::{debug, info};

/// 오버레이 하나의 마지막 상태
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    pub source_url: String,
    pub rect: Rect,
    pub visible: bool,
    pub floating: bool,
}

#[derive(Default)]
pub struct TracingOverlaySurface {
    overlays: Mutex<HashMap<OverlayId, OverlayState>>,
}

impl TracingOverlaySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, overlay: OverlayId) -> Option<OverlayState> {
        self.overlays.lock().get(&overlay).cloned()
    }

    /// 현재 보이는 오버레이 수
    pub fn visible_count(&self) -> usize {
        self.overlays.lock().values().filter(|s| s.visible).count()
    }
}

impl OverlaySurface for TracingOverlaySurface {
    fn apply(&self, overlay: OverlayId, command: OverlayCommand) {
        let mut overlays = self.overlays.lock();
        match command {
            OverlayCommand::Create { source_url } => {
                debug!(overlay = %overlay, url = %source_url, "오버레이 생성");
                overlays.insert(
                    overlay,
                    OverlayState {
                        source_url,
                        ..OverlayState::default()
                    },
                );
            }
            OverlayCommand::Destroy => {
                debug!(overlay = %overlay, "오버레이 파기");
                overlays.remove(&overlay);
            }
            command => {
                let Some(state) = overlays.get_mut(&overlay) else {
                    debug!(overlay = %overlay, ?command, "알 수 없는 오버레이 명령 무시");
                    return;
                };
                match command {
                    OverlayCommand::Place { x, y } => {
                        state.rect.x = x;
                        state.rect.y = y;
                    }
                    OverlayCommand::Resize { width, height } => {
                        state.rect.width = width;
                        state.rect.height = height;
                    }
                    OverlayCommand::SetVisible(visible) => {
                        if visible != state.visible {
                            info!(
                                overlay = %overlay,
                                x = state.rect.x,
                                y = state.rect.y,
                                width = state.rect.width,
                                height = state.rect.height,
                                url = %state.source_url,
                                "오버레이 {}",
                                if visible { "표시" } else { "숨김" }
                            );
                        }
                        state.visible = visible;
                    }
                    OverlayCommand::SetFloating(floating) => state.floating = floating,
                    other => debug!(overlay = %overlay, command = ?other, "오버레이 명령"),
                }
            }
        }
    }
}
