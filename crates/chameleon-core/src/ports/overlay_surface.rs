//! 오버레이 표면(렌더링/입력) 포트.
//!
//! 엔진은 위치/크기/표시 명령만 내리며, 실제 렌더링은 표면 구현체 몫이다.
//! 구현: `chameleon-app` (tracing 기반 표면), 테스트의 기록용 표면

use crate::models::event::OverlayId;

/// 오버레이 표면 명령
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    /// 표면 생성 (표시할 콘텐츠 URL)
    Create { source_url: String },
    /// 화면 좌표로 이동
    Place { x: i32, y: i32 },
    /// 크기 변경
    Resize { width: i32, height: i32 },
    /// 내부 콘텐츠 이동 (클램핑 보정량)
    SetContentOffset { dx: i32, dy: i32 },
    /// 표시/숨김
    SetVisible(bool),
    /// 입력 투과
    SetInputTransparent(bool),
    /// 독립 최상위 창 모드
    SetFloating(bool),
    /// 사용자 숨김 토글
    SetContentHidden(bool),
    /// 합성 포인터 이벤트 (로컬 + 화면 좌표)
    InjectPointer {
        local_x: i32,
        local_y: i32,
        global_x: i32,
        global_y: i32,
    },
    /// 표면 파기
    Destroy,
}

/// 오버레이 표면
pub trait OverlaySurface: Send + Sync {
    /// 명령 적용. 표면 쪽 실패는 엔진에 영향을 주지 않는다.
    fn apply(&self, overlay: OverlayId, command: OverlayCommand);
}
