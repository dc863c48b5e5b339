//! # chameleon-vision
//!
//! 피규어 매칭 파이프라인과 장면 변경 감지.
//!
//! ## 구조
//!
//! - [`capture`]: 원시 스크린샷 → 그레이스케일 변환
//! - [`delta`]: 정규화 픽셀 차이 기반 장면 변경 판정
//! - [`integral`]: 적분 영상 (박스 필터 합)
//! - [`blob`]: Fast-Hessian 블롭 검출 + 64차원 실수 기술자
//! - [`brief`]: FAST 코너 검출 + 256비트 이진 기술자
//! - [`matcher`]: 최근접 기술자 매칭, 거리순 정렬 + 상한 적용
//! - [`homography`]: DLT + RANSAC 호모그래피, 영역 추정
//! - [`algorithm`]: 검출/기술/매칭/영역 추정 전략 trait

pub mod algorithm;
pub mod blob;
pub mod brief;
pub mod capture;
pub mod delta;
pub mod homography;
pub mod integral;
pub mod matcher;

pub use algorithm::{algorithm_from_config, FeatureMatchingAlgorithm};
pub use matcher::{Correspondence, MatchLimits};
