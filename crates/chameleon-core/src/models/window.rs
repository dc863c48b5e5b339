//! OS 창 관련 모델: 식별자, 기하 보고, 스크린샷, 스크롤.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::geometry::Rect;

/// OS 창 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OS 프로세스 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 세대 번호가 찍힌 창 핸들
///
/// 같은 `WindowId`가 재사용되더라도 세대가 다르면 다른 창이다.
/// 파괴된 창에 대한 지연 결과는 세대 비교로 걸러진다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle {
    pub wid: WindowId,
    pub pid: ProcessId,
    pub generation: u64,
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.pid, self.wid, self.generation)
    }
}

/// OS 레이어가 보고하는 창 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub wid: WindowId,
    pub pid: ProcessId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// 현재 화면에 표시 중 (최소화/다른 Space 아님)
    pub on_screen: bool,
    /// 최전면 창
    pub front_most: bool,
    pub title: String,
}

impl WindowInfo {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// `update_opened_windows` 결과로 전달되는 창 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// 창 생성 또는 기하/표시/제목 변경
    Updated(WindowInfo),
    /// 창 닫힘
    Destroyed(WindowId),
}

/// 창 캡처 결과 (원시 픽셀 버퍼)
///
/// `bits_per_pixel`이 24 초과이면 4채널(BGRA/RGBA), 아니면 3채널로 해석한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u8,
    pub pixels: Vec<u8>,
}

impl Screenshot {
    pub fn channels(&self) -> usize {
        if self.bits_per_pixel > 24 {
            4
        } else {
            3
        }
    }

    /// 크기와 버퍼 길이가 맞는 유효 픽셀 수
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 장면으로 쓸 수 없는 (크기 0 또는 버퍼 부족) 스크린샷
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0 || self.pixels.len() < self.pixel_count() * self.channels()
    }
}

/// 스크롤 영역 위치 (스크롤 영역 사각형 + 가로/세로 스크롤 위치)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub rect: Rect,
    pub horizontal: f64,
    pub vertical: f64,
}
