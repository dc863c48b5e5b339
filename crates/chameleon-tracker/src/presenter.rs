//! 오버레이 프레젠터: 분석 결과 큐의 유일한 소비자.
//!
//! 결과를 받을 때마다 창 핸들(세대 포함)로 창을 다시 찾는다.
//! 그 사이 파괴되었거나 재사용된 창, 삭제된 피규어의 결과는 버린다.

use std::sync::Arc;

use chameleon_core::models::event::OverlayEvent;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::registry::WindowRegistry;

pub struct OverlayPresenter {
    registry: Arc<WindowRegistry>,
}

impl OverlayPresenter {
    pub fn new(registry: Arc<WindowRegistry>) -> Self {
        Self { registry }
    }

    /// 결과 하나 적용. 대상 오버레이가 없으면 false.
    pub fn apply(&self, event: OverlayEvent) -> bool {
        let id = event.overlay();
        let Some(window) = self.registry.find_window(id.window) else {
            debug!(overlay = %id, "사라진 창의 결과 무시");
            return false;
        };
        let env = self.registry.env();

        let applied = match event {
            OverlayEvent::FigureFound { rect, .. } => {
                // 현재 창 경계로 다시 클램핑
                let bounds = window.rect();
                window.with_overlay(id.figure, |o| o.on_found(bounds, rect, env))
            }
            OverlayEvent::FigureNotFound { .. } => {
                window.with_overlay(id.figure, |o| o.on_not_found(env.surface))
            }
        };
        applied.is_some()
    }

    /// 큐에 쌓인 결과를 모두 적용하고 적용된 수를 돌려준다
    pub fn drain(&self, rx: &mut mpsc::UnboundedReceiver<OverlayEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    pub async fn run(
        &self,
        mut rx: mpsc::UnboundedReceiver<OverlayEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        debug!("결과 큐 닫힘");
                        break;
                    };
                    self.apply(event);
                }
                _ = shutdown_rx.changed() => {
                    info!("오버레이 프레젠터 종료");
                    break;
                }
            }
        }
    }
}
