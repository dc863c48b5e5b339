//! # chameleon-monitor
//!
//! OS 창 어댑터. `WindowSystem` 포트를 xcap으로 구현한다.
//! 창 목록을 주기적으로 다시 읽어 생성/갱신/파괴 이벤트로 바꾸고,
//! 목록 순서(앞 → 뒤)로 가림 여부를 판정한다.
//! 접근성 기반 스크롤 추적은 지원하지 않는다.

pub mod window_table;
pub mod xcap_window;
pub mod zorder;

pub use xcap_window::XcapWindowSystem;
