//! z-order 기반 가림 판정.
//!
//! 창 목록은 앞(최상단) → 뒤 순서로 보관한다. 어떤 창보다 앞에 있는 창들이
//! 사각형을 모두 덮으면 "가려짐", 조금이라도 겹치면 "일부 가려짐"이다.

use chameleon_core::models::geometry::Rect;
use chameleon_core::models::window::WindowId;

#[derive(Debug, Clone, Default)]
pub struct ZOrder {
    /// 앞 → 뒤
    layers: Vec<(WindowId, Rect)>,
}

impl ZOrder {
    pub fn from_front_to_back(layers: Vec<(WindowId, Rect)>) -> Self {
        Self { layers }
    }

    /// `wid`보다 앞에 있는 창들의 사각형. 모르는 창이면 비어 있다.
    pub fn above(&self, wid: WindowId) -> &[(WindowId, Rect)] {
        match self.layers.iter().position(|(id, _)| *id == wid) {
            Some(index) => &self.layers[..index],
            None => &[],
        }
    }

    /// 앞 창들이 `rect`를 완전히 덮는지
    pub fn is_rect_hidden(&self, wid: WindowId, rect: Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        let mut uncovered = vec![rect];
        for (_, cover) in self.above(wid) {
            uncovered = uncovered
                .into_iter()
                .flat_map(|piece| subtract(piece, *cover))
                .collect();
            if uncovered.is_empty() {
                return true;
            }
        }
        false
    }

    /// 앞 창 하나라도 `rect`와 겹치는지
    pub fn is_part_hidden(&self, wid: WindowId, rect: Rect) -> bool {
        self.above(wid).iter().any(|(_, cover)| cover.intersects(&rect))
    }
}

/// `rect`에서 `cut`을 뺀 나머지 (최대 4조각)
fn subtract(rect: Rect, cut: Rect) -> Vec<Rect> {
    if !rect.intersects(&cut) {
        return vec![rect];
    }
    let mut pieces = Vec::with_capacity(4);
    let top = cut.y.max(rect.y);
    let bottom = cut.bottom().min(rect.bottom());

    if rect.y < top {
        pieces.push(Rect::new(rect.x, rect.y, rect.width, top - rect.y));
    }
    if bottom < rect.bottom() {
        pieces.push(Rect::new(rect.x, bottom, rect.width, rect.bottom() - bottom));
    }
    if rect.x < cut.x {
        pieces.push(Rect::new(rect.x, top, cut.x - rect.x, bottom - top));
    }
    if cut.right() < rect.right() {
        pieces.push(Rect::new(
            cut.right(),
            top,
            rect.right() - cut.right(),
            bottom - top,
        ));
    }
    pieces
}
