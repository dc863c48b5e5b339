//! 창/캡처/접근성 OS 레이어 포트.
//!
//! 구현: `chameleon-monitor` crate (xcap)

use crate::error::CoreError;
use crate::models::geometry::Rect;
use crate::models::window::{ProcessId, Screenshot, WindowEvent, WindowId};

/// OS 창 시스템
///
/// 분석 워커 스레드와 스케줄러 양쪽에서 호출되므로 모든 메서드는
/// 짧게 반환해야 하며 내부 상태는 구현체가 동기화한다.
pub trait WindowSystem: Send + Sync {
    /// 창 캡처.
    ///
    /// 창이 사라졌거나 캡처할 내용이 없으면 `Ok(None)`,
    /// 권한/OS 실패는 `Err`. 호출자는 둘 다 "장면 없음"으로 취급한다.
    fn capture_screenshot(&self, wid: WindowId) -> Result<Option<Screenshot>, CoreError>;

    /// 현재 열린 창 목록을 조회하여 변경/파괴 이벤트로 반환
    fn update_opened_windows(&self) -> Result<Vec<WindowEvent>, CoreError>;

    /// `rect`(화면 좌표) 전체가 `wid`보다 위에 있는 창에 의해 가려졌는지
    fn is_window_rect_hidden(&self, wid: WindowId, rect: Rect) -> bool;

    /// `rect`(화면 좌표)의 일부라도 `wid`보다 위에 있는 창에 의해 가려졌는지
    fn is_window_part_hidden(&self, wid: WindowId, rect: Rect) -> bool;

    /// 스크롤 알림 콜백 등록. 지원하지 않거나 실패하면 `false`.
    fn register_scroll_callback(&self, pid: ProcessId, wid: WindowId) -> bool;

    /// 등록된 스크롤 콜백 전부 해제
    fn free_registered_scroll_callbacks(&self);
}
