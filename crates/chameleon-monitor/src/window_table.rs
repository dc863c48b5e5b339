//! 창 목록 스냅샷 비교.
//!
//! OS는 현재 창 목록만 알려준다. 직전 스냅샷과 비교해 새로 생겼거나 바뀐 창은
//! `Updated`, 사라진 창은 `Destroyed` 이벤트로 만든다.

use std::collections::HashMap;

use chameleon_core::models::window::{WindowEvent, WindowId, WindowInfo};

use crate::zorder::ZOrder;

#[derive(Debug, Default)]
pub struct WindowTable {
    known: HashMap<WindowId, WindowInfo>,
    z_order: ZOrder,
}

impl WindowTable {
    /// 새 스냅샷(앞 → 뒤 순서) 반영 후 변경 이벤트 반환
    pub fn apply_snapshot(&mut self, snapshot: Vec<WindowInfo>) -> Vec<WindowEvent> {
        let mut events = Vec::new();
        let mut next = HashMap::with_capacity(snapshot.len());
        let mut layers = Vec::with_capacity(snapshot.len());

        for info in snapshot {
            if info.on_screen {
                layers.push((info.wid, info.rect()));
            }
            if self.known.get(&info.wid) != Some(&info) {
                events.push(WindowEvent::Updated(info.clone()));
            }
            next.insert(info.wid, info);
        }

        let mut gone: Vec<WindowId> = self
            .known
            .keys()
            .filter(|wid| !next.contains_key(*wid))
            .copied()
            .collect();
        gone.sort();
        events.extend(gone.into_iter().map(WindowEvent::Destroyed));

        self.known = next;
        self.z_order = ZOrder::from_front_to_back(layers);
        events
    }

    pub fn z_order(&self) -> &ZOrder {
        &self.z_order
    }

    pub fn get(&self, wid: WindowId) -> Option<&WindowInfo> {
        self.known.get(&wid)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
