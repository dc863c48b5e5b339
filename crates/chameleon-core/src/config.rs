//! 애플리케이션 설정 구조체.
//!
//! 폴링 주기, 매칭 임계값, 검출기 파라미터, 저장소 경로 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드되며
//! 일부 값(폴링 주기, 매칭 임계값, 접근성 스크롤 추적)은 실행 중 변경된다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 스케줄러/창 추적 설정
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// 매칭 판정 설정
    #[serde(default)]
    pub matching: MatchingConfig,
    /// 특징점 검출기 설정
    #[serde(default)]
    pub detector: DetectorConfig,
    /// 피규어 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
}

// ============================================================
// 추적 설정
// ============================================================

/// 스케줄러/창 추적 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 폴링 간격 (밀리초)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 창별 분석 잠금 획득 타임아웃 (밀리초)
    #[serde(default = "default_analysis_lock_timeout_ms")]
    pub analysis_lock_timeout_ms: u64,
    /// 동시에 실행 가능한 분석 작업 수 (워커 풀 크기)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// 접근성 API 기반 스크롤 추적
    #[serde(default = "default_true")]
    pub use_accessibility: bool,
    /// 최전면 창만 분석
    #[serde(default)]
    pub only_analyze_front_most: bool,
    /// 마지막 스크롤 이후 결과를 신뢰하기까지의 대기 시간 (밀리초)
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            analysis_lock_timeout_ms: default_analysis_lock_timeout_ms(),
            max_workers: default_max_workers(),
            use_accessibility: true,
            only_analyze_front_most: false,
            scroll_settle_ms: default_scroll_settle_ms(),
        }
    }
}

// ============================================================
// 매칭 설정
// ============================================================

/// 매칭 판정 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// 대응점 거리 임계값 (None이면 비활성)
    #[serde(default)]
    pub distance_threshold: Option<f32>,
    /// 고려할 최대 대응점 수 (None이면 무제한)
    #[serde(default)]
    pub max_correspondences: Option<usize>,
    /// 매칭을 시도하기 위한 최소 장면 키포인트 수
    #[serde(default = "default_min_scene_keypoints")]
    pub min_scene_keypoints: usize,
    /// 영역 추정을 시도하기 위한 최소 대응점 수
    #[serde(default = "default_min_correspondences")]
    pub min_correspondences: usize,
    /// 검출 영역의 최소 너비/높이 (픽셀, 초과해야 함)
    #[serde(default = "default_min_region_size")]
    pub min_region_size: i32,
    /// 종횡비 허용 상대 오차 (0.1 = 10%)
    #[serde(default = "default_aspect_ratio_tolerance")]
    pub aspect_ratio_tolerance: f64,
    /// 스크린샷 변경 판정 임계값 (정규화 픽셀 차이)
    #[serde(default = "default_change_threshold")]
    pub change_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance_threshold: None,
            max_correspondences: None,
            min_scene_keypoints: default_min_scene_keypoints(),
            min_correspondences: default_min_correspondences(),
            min_region_size: default_min_region_size(),
            aspect_ratio_tolerance: default_aspect_ratio_tolerance(),
            change_threshold: default_change_threshold(),
        }
    }
}

// ============================================================
// 검출기 설정
// ============================================================

/// 특징점 검출/기술 전략
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Fast-Hessian 블롭 + 64차원 실수 기술자
    #[default]
    Blob,
    /// FAST 코너 + 256비트 이진 기술자
    FastBrief,
}

/// 블롭 검출기 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobConfig {
    /// 헤시안 행렬식 임계값
    #[serde(default = "default_hessian_threshold")]
    pub hessian_threshold: f64,
    /// 옥타브 수
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    /// 옥타브당 레이어 수
    #[serde(default = "default_octave_layers")]
    pub octave_layers: u32,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            hessian_threshold: default_hessian_threshold(),
            octaves: default_octaves(),
            octave_layers: default_octave_layers(),
        }
    }
}

/// FAST 코너 검출기 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastConfig {
    /// 밝기 차이 임계값
    #[serde(default = "default_fast_threshold")]
    pub threshold: u8,
    /// 유지할 최대 키포인트 수 (응답 강도 순)
    #[serde(default = "default_fast_max_keypoints")]
    pub max_keypoints: usize,
}

impl Default for FastConfig {
    fn default() -> Self {
        Self {
            threshold: default_fast_threshold(),
            max_keypoints: default_fast_max_keypoints(),
        }
    }
}

/// 특징점 검출기 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// 사용할 전략
    #[serde(default)]
    pub algorithm: AlgorithmKind,
    /// 블롭 검출기 파라미터
    #[serde(default)]
    pub blob: BlobConfig,
    /// FAST 검출기 파라미터
    #[serde(default)]
    pub fast: FastConfig,
}

// ============================================================
// 저장소 설정
// ============================================================

/// 피규어 저장소 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 데이터 디렉토리 (None이면 플랫폼 기본 경로)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// SQLite 파일 이름
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: default_database_file(),
        }
    }
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            matching: MatchingConfig::default(),
            detector: DetectorConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// 폴링 간격
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.tracker.poll_interval_ms)
    }

    /// 분석 잠금 타임아웃
    pub fn analysis_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.tracker.analysis_lock_timeout_ms)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tracker.poll_interval_ms == 0 {
            return Err(invalid("tracker.poll_interval_ms", "0보다 커야 합니다"));
        }
        if self.tracker.max_workers == 0 {
            return Err(invalid("tracker.max_workers", "0보다 커야 합니다"));
        }
        if !(0.0..1.0).contains(&self.matching.aspect_ratio_tolerance) {
            return Err(invalid(
                "matching.aspect_ratio_tolerance",
                "0 이상 1 미만이어야 합니다",
            ));
        }
        if self.matching.max_correspondences == Some(0) {
            return Err(invalid(
                "matching.max_correspondences",
                "0 대신 null로 비활성화하세요",
            ));
        }
        if self.detector.blob.octaves == 0 || self.detector.blob.octave_layers == 0 {
            return Err(invalid(
                "detector.blob",
                "옥타브/레이어 수는 1 이상이어야 합니다",
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

fn invalid(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn default_true() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_analysis_lock_timeout_ms() -> u64 {
    100
}
fn default_max_workers() -> usize {
    4
}
fn default_scroll_settle_ms() -> u64 {
    500
}
fn default_min_scene_keypoints() -> usize {
    2
}
fn default_min_correspondences() -> usize {
    3
}
fn default_min_region_size() -> i32 {
    10
}
fn default_aspect_ratio_tolerance() -> f64 {
    0.1
}
fn default_change_threshold() -> f64 {
    0.001
}
fn default_hessian_threshold() -> f64 {
    300.0
}
fn default_octaves() -> u32 {
    2
}
fn default_octave_layers() -> u32 {
    3
}
fn default_fast_threshold() -> u8 {
    20
}
fn default_fast_max_keypoints() -> usize {
    500
}
fn default_database_file() -> String {
    "figures.db".to_string()
}
