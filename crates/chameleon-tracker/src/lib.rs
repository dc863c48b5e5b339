//! # chameleon-tracker
//!
//! 창 추적 엔진. 창마다 주기적으로 장면을 캡처해 등록된 피규어를 다시 찾고,
//! 찾은 위치에 오버레이를 맞춘다.
//!
//! ## 구조
//!
//! - [`overlay`]: 가상 위치 클램핑, 가시성 판정, 독립 창/숨김 전환
//! - [`window`]: 창별 상태: 기하, 스크린샷 캐시, 스크롤, 오버레이 집합, 분석 락
//! - [`analysis`]: 창별 분석 작업 (단일 비행, 결과는 큐로 게시)
//! - [`registry`]: 창 집합, 격리, 프로세스별 피규어, OS/피규어 이벤트 라우팅
//! - [`scheduler`]: 폴링 타이머 + 세마포어 워커 풀
//! - [`presenter`]: 결과 큐 소비, 오버레이에 적용
//! - [`service`]: 외부 진입점 (파일 열림, 피규어 등록/삭제, 루프 기동)

pub mod analysis;
pub mod overlay;
pub mod presenter;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod window;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{run_analysis, AnalysisConfig, AnalysisContext};
pub use registry::WindowRegistry;
pub use scheduler::{TickReport, TrackerScheduler};
pub use service::TrackerService;
