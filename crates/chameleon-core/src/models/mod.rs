//! Chameleon 도메인 모델.
//!
//! 엔진 전반에서 공유하는 값 타입을 정의한다.
//! 영속/설정에 쓰이는 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod event;
pub mod figure;
pub mod geometry;
pub mod window;
