//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 각 어댑터 crate가 이 trait들을 구현하며,
//! `chameleon-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 분석 작업은 블로킹 워커 스레드에서 실행되므로 OS 레이어 포트는 동기 trait,
//! 저장소 포트는 `async_trait`을 사용한다.

pub mod figure_store;
pub mod overlay_surface;
pub mod window_system;
