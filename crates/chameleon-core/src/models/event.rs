//! 분석 결과 이벤트와 실패/스킵 사유.
//!
//! 분석 작업은 오버레이 상태를 직접 건드리지 않고 `OverlayEvent`를
//! 큐에 게시한다. 실패는 모두 값으로 표현되며 사용자에게 노출되지 않는다.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::figure::FigureId;
use crate::models::geometry::Rect;
use crate::models::window::WindowHandle;

/// 오버레이 식별자: (창, 피규어) 쌍은 유일하다
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId {
    pub window: WindowHandle,
    pub figure: FigureId,
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.window, self.figure)
    }
}

/// 한 오버레이에 대한 매칭 실패 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFailure {
    /// 장면 키포인트 부족
    InsufficientSceneKeypoints,
    /// 매칭 후 대응점 부족
    InsufficientCorrespondences,
    /// 호모그래피 없음/퇴화
    NoHomography,
    /// 검출 영역이 최소 크기 이하
    RegionTooSmall,
    /// 종횡비 불일치
    AspectRatioMismatch,
}

/// "미발견" 이벤트 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// 매칭 파이프라인 실패
    Match(MatchFailure),
    /// 창이 화면에 없고 제목도 없어 분석 대상이 아님
    WindowNotEligible,
}

impl From<MatchFailure> for NotFoundReason {
    fn from(failure: MatchFailure) -> Self {
        Self::Match(failure)
    }
}

/// 분석 작업 → 프레젠터로 전달되는 불변 결과 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    /// 피규어 발견 (화면 좌표 사각형)
    FigureFound { overlay: OverlayId, rect: Rect },
    /// 피규어 미발견
    FigureNotFound {
        overlay: OverlayId,
        reason: NotFoundReason,
    },
}

impl OverlayEvent {
    pub fn overlay(&self) -> OverlayId {
        match self {
            Self::FigureFound { overlay, .. } | Self::FigureNotFound { overlay, .. } => *overlay,
        }
    }
}

/// 틱 전체를 건너뛴 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// 분석 잠금 획득 타임아웃 (이전 작업 진행 중)
    Busy,
    /// 창이 파괴되어 격리됨
    WindowGone,
    /// 워커 풀 포화
    PoolSaturated,
    /// 캡처 불가 또는 빈 장면
    NoScene,
}

/// 분석 작업 하나의 최종 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 장면 변경 없음, 재표시 이벤트만 게시
    Unchanged { reshown: usize },
    /// 매칭 수행 후 결과 게시
    Analyzed { found: usize, not_found: usize },
    /// 캡처 이후 스크롤 변경: 결과 전부 폐기
    Discarded,
    /// 작업 미실행
    Skipped(SkipReason),
}
