//! Chameleon 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 외부 에러를 `CoreError`로 매핑한다.
//! 분석 틱 단위의 실패(키포인트 부족, 호모그래피 실패 등)는 에러가 아니라
//! 값(`NotFoundReason`, `SkipReason`)으로 표현된다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Figure", "Window")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 스크린 캡처 실패 (OS 레이어)
    #[error("캡처 에러: {0}")]
    Capture(String),

    /// 화면 기록/접근성 권한 없음
    #[error("권한 없음: {0}")]
    PermissionDenied(String),

    /// 피규어 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}
