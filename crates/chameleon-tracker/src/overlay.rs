//! 오버레이: 창 안의 피규어 하나를 따라다니는 표면의 상태.
//!
//! 가상 위치(마지막으로 알려진 좌상단)는 창 기준 좌표로 보관한다.
//! 화면에 놓을 때는 경계 사각형 안으로 클램핑하고, 클램핑된 만큼
//! 내부 콘텐츠를 반대로 밀어서 보이는 픽셀이 가상 위치에 맞도록 한다.

use std::sync::Arc;

use chameleon_core::models::event::OverlayId;
use chameleon_core::models::figure::Figure;
use chameleon_core::models::geometry::Rect;
use chameleon_core::ports::overlay_surface::{OverlayCommand, OverlaySurface};
use chameleon_core::ports::window_system::WindowSystem;

/// 오버레이 조작에 필요한 외부 협력자
#[derive(Clone, Copy)]
pub struct OverlayEnv<'a> {
    pub window_system: &'a dyn WindowSystem,
    pub surface: &'a dyn OverlaySurface,
}

/// 클램핑 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// 실제 표면 위치/크기 (화면 좌표)
    pub rect: Rect,
    /// 내부 콘텐츠 이동량 (가상 위치 − 실제 위치)
    pub content_offset: (i32, i32),
    /// 콘텐츠가 밀려 있으면 입력 투과
    pub input_transparent: bool,
    pub visible: bool,
}

/// 창 하나 × 피규어 하나
#[derive(Debug)]
pub struct Overlay {
    id: OverlayId,
    figure: Arc<Figure>,
    /// 가상 좌상단 (창 기준)
    local_x: f64,
    local_y: f64,
    /// 마지막 배치 경계 (창 기준)
    local_bounds: Option<Rect>,
    width: i32,
    height: i32,
    found: bool,
    floating: bool,
    hidden: bool,
    shown: bool,
    placement: Option<Placement>,
}

impl Overlay {
    /// 오버레이 생성 후 표면에 알린다. 처음에는 숨김 상태다.
    pub fn new(id: OverlayId, figure: Arc<Figure>, surface: &dyn OverlaySurface) -> Self {
        surface.apply(
            id,
            OverlayCommand::Create {
                source_url: figure.source_url.clone(),
            },
        );
        Self {
            id,
            width: figure.width as i32,
            height: figure.height as i32,
            figure,
            local_x: 0.0,
            local_y: 0.0,
            local_bounds: None,
            found: false,
            floating: false,
            hidden: false,
            shown: false,
            placement: None,
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn figure(&self) -> &Arc<Figure> {
        &self.figure
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn is_floating(&self) -> bool {
        self.floating
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 표면이 현재 화면에 보이는지
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    /// 가상 위치의 화면 사각형
    pub fn virtual_rect(&self, origin: (i32, i32)) -> Rect {
        Rect::new(
            (self.local_x + f64::from(origin.0)).round() as i32,
            (self.local_y + f64::from(origin.1)).round() as i32,
            self.width,
            self.height,
        )
    }

    /// 화면 좌표 `(x, y)`를 가상 위치로 삼고 `bounds` 안으로 클램핑해 배치한다.
    ///
    /// 떠 있는(floating) 동안에는 가상 위치만 기록하고 표면은 건드리지 않는다.
    pub fn move_inside_rect(
        &mut self,
        origin: (i32, i32),
        bounds: Rect,
        x: f64,
        y: f64,
        env: OverlayEnv<'_>,
    ) -> Option<Placement> {
        self.local_x = x - f64::from(origin.0);
        self.local_y = y - f64::from(origin.1);
        self.local_bounds = Some(bounds.translated(-origin.0, -origin.1));

        if self.floating {
            return None;
        }

        let rx = x.round() as i32;
        let ry = y.round() as i32;
        let max_x = bounds.right() - self.width;
        let max_y = bounds.bottom() - self.height;
        let new_x = rx.max(bounds.x).min(max_x);
        let new_y = ry.max(bounds.y).min(max_y);

        let offset = (rx - new_x, ry - new_y);
        let rect = Rect::new(new_x, new_y, self.width, self.height);
        let input_transparent = offset != (0, 0);
        let visible = !self.hidden
            && offset == (0, 0)
            && self.found
            && !env.window_system.is_window_part_hidden(self.id.window.wid, rect);

        let placement = Placement {
            rect,
            content_offset: offset,
            input_transparent,
            visible,
        };

        env.surface.apply(
            self.id,
            OverlayCommand::SetContentOffset {
                dx: offset.0,
                dy: offset.1,
            },
        );
        env.surface
            .apply(self.id, OverlayCommand::SetInputTransparent(input_transparent));
        env.surface.apply(
            self.id,
            OverlayCommand::Place {
                x: new_x,
                y: new_y,
            },
        );
        self.set_shown(visible, env.surface);

        self.placement = Some(placement);
        Some(placement)
    }

    /// 검출 결과 적용 (`rect`는 화면 좌표)
    pub fn on_found(&mut self, window_rect: Rect, rect: Rect, env: OverlayEnv<'_>) {
        self.found = true;
        if (rect.width, rect.height) != (self.width, self.height) {
            self.width = rect.width;
            self.height = rect.height;
            env.surface.apply(
                self.id,
                OverlayCommand::Resize {
                    width: rect.width,
                    height: rect.height,
                },
            );
        }
        self.move_inside_rect(
            (window_rect.x, window_rect.y),
            window_rect,
            f64::from(rect.x),
            f64::from(rect.y),
            env,
        );
    }

    /// 미검출 적용. 떠 있는 오버레이는 계속 보인다.
    pub fn on_not_found(&mut self, surface: &dyn OverlaySurface) {
        if self.found {
            if !self.floating {
                self.set_shown(false, surface);
            }
            self.found = false;
        }
    }

    /// 스크롤 보정: 가상 위치를 `(dx, dy)`만큼 거슬러 옮기고 스크롤 영역 안에 다시 배치
    pub fn scroll_by(
        &mut self,
        origin: (i32, i32),
        scroll_bounds: Rect,
        dx: f64,
        dy: f64,
        env: OverlayEnv<'_>,
    ) {
        let x = self.local_x + f64::from(origin.0) - dx;
        let y = self.local_y + f64::from(origin.1) - dy;
        self.move_inside_rect(origin, scroll_bounds, x, y, env);
    }

    /// 독립 창 모드 전환. 복귀 시 마지막 가상 위치/경계로 다시 배치한다.
    pub fn toggle_floating(&mut self, origin: (i32, i32), env: OverlayEnv<'_>) {
        self.floating = !self.floating;
        env.surface
            .apply(self.id, OverlayCommand::SetFloating(self.floating));

        if self.floating {
            env.surface
                .apply(self.id, OverlayCommand::SetContentOffset { dx: 0, dy: 0 });
            env.surface
                .apply(self.id, OverlayCommand::SetInputTransparent(false));
            self.set_shown(true, env.surface);
        } else {
            self.replace(origin, env);
        }
    }

    /// 사용자 숨김 전환
    pub fn toggle_hidden(&mut self, origin: (i32, i32), env: OverlayEnv<'_>) {
        self.hidden = !self.hidden;
        env.surface
            .apply(self.id, OverlayCommand::SetContentHidden(self.hidden));
        if !self.floating {
            self.replace(origin, env);
        }
    }

    /// 즉시 숨김 (창 파괴 등)
    pub fn hide(&mut self, surface: &dyn OverlaySurface) {
        self.set_shown(false, surface);
    }

    /// 보이는 오버레이가 화면 좌표 `(x, y)`를 덮으면 합성 포인터 이벤트 전달
    pub fn inject_pointer(&self, x: i32, y: i32, surface: &dyn OverlaySurface) -> bool {
        let Some(placement) = self.placement.filter(|_| self.shown && !self.floating) else {
            return false;
        };
        if !placement.rect.contains_point(x, y) {
            return false;
        }
        surface.apply(
            self.id,
            OverlayCommand::InjectPointer {
                local_x: x - placement.rect.x + placement.content_offset.0,
                local_y: y - placement.rect.y + placement.content_offset.1,
                global_x: x,
                global_y: y,
            },
        );
        true
    }

    /// 표면 파기
    pub fn destroy(&mut self, surface: &dyn OverlaySurface) {
        self.shown = false;
        surface.apply(self.id, OverlayCommand::Destroy);
    }

    fn replace(&mut self, origin: (i32, i32), env: OverlayEnv<'_>) {
        let Some(bounds) = self.local_bounds else {
            return;
        };
        let x = self.local_x + f64::from(origin.0);
        let y = self.local_y + f64::from(origin.1);
        self.move_inside_rect(origin, bounds.translated(origin.0, origin.1), x, y, env);
    }

    fn set_shown(&mut self, shown: bool, surface: &dyn OverlaySurface) {
        if self.shown != shown {
            self.shown = shown;
            surface.apply(self.id, OverlayCommand::SetVisible(shown));
        }
    }
}
