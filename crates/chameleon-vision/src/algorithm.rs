//! 특징 매칭 전략.
//!
//! `detect → describe → match → estimate_region` 파이프라인을 trait 하나로 묶는다.
//! 검출기/기술자 조합만 구현체마다 다르고, 매칭과 영역 추정은
//! 기술자 원소 타입과 호모그래피에만 의존하므로 기본 구현을 공유한다.

use std::sync::Arc;

use chameleon_core::config::{AlgorithmKind, BlobConfig, DetectorConfig, FastConfig};
use chameleon_core::error::CoreError;
use chameleon_core::models::figure::{DescriptorMatrix, FeatureSignature, Keypoint};
use chameleon_core::models::geometry::{Point2, Rect};
use image::GrayImage;
use tracing::debug;

use crate::blob::{BlobDetector, DESCRIPTOR_LEN};
use crate::brief::{FastBrief, DESCRIPTOR_BYTES};
use crate::homography::{self, RansacHomographyConfig};
use crate::matcher::{self, Correspondence, MatchLimits};

/// 검출/기술/매칭/영역 추정 전략
pub trait FeatureMatchingAlgorithm: Send + Sync {
    /// 전략 이름 (로그용)
    fn name(&self) -> &'static str;

    /// 키포인트 검출
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint>;

    /// 키포인트 기술.
    ///
    /// 기술할 수 없는 키포인트(경계 등)는 버려질 수 있으므로
    /// 살아남은 키포인트와 기술자를 함께 서명으로 돌려준다.
    fn describe(
        &self,
        image: &GrayImage,
        keypoints: Vec<Keypoint>,
    ) -> Result<FeatureSignature, CoreError>;

    /// 검출 + 기술
    fn compute_signature(&self, image: &GrayImage) -> Result<FeatureSignature, CoreError> {
        let keypoints = self.detect(image);
        self.describe(image, keypoints)
    }

    /// 피규어 서명 ↔ 장면 서명 매칭 (거리 오름차순, 상한 적용)
    fn match_signatures(
        &self,
        object: &FeatureSignature,
        scene: &FeatureSignature,
        limits: &MatchLimits,
    ) -> Vec<Correspondence> {
        matcher::match_descriptors(&object.descriptors, &scene.descriptors, limits)
    }

    /// 대응점으로 장면 내 피규어 영역 추정
    fn estimate_region(
        &self,
        object_width: u32,
        object_height: u32,
        correspondences: &[Correspondence],
        object_keypoints: &[Keypoint],
        scene_keypoints: &[Keypoint],
    ) -> Option<Rect> {
        let (object, scene): (Vec<Point2>, Vec<Point2>) = correspondences
            .iter()
            .filter_map(|c| {
                let o = object_keypoints.get(c.query_idx)?;
                let s = scene_keypoints.get(c.train_idx)?;
                Some((o.position(), s.position()))
            })
            .unzip();
        homography::estimate_region(
            object_width,
            object_height,
            &object,
            &scene,
            &RansacHomographyConfig::default(),
        )
    }
}

/// 블롭 검출 + 64차원 실수 기술자 (기본 전략)
#[derive(Debug, Clone)]
pub struct BlobAlgorithm {
    detector: BlobDetector,
}

impl BlobAlgorithm {
    pub fn new(config: BlobConfig) -> Self {
        Self {
            detector: BlobDetector::new(config),
        }
    }
}

impl FeatureMatchingAlgorithm for BlobAlgorithm {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        self.detector.detect(image)
    }

    fn describe(
        &self,
        image: &GrayImage,
        keypoints: Vec<Keypoint>,
    ) -> Result<FeatureSignature, CoreError> {
        let data = self.detector.describe(image, &keypoints);
        FeatureSignature::new(keypoints, DescriptorMatrix::float(DESCRIPTOR_LEN, data)?)
    }
}

/// FAST 코너 + 256비트 이진 기술자
#[derive(Debug, Clone)]
pub struct FastBriefAlgorithm {
    inner: FastBrief,
}

impl FastBriefAlgorithm {
    pub fn new(config: FastConfig) -> Self {
        Self {
            inner: FastBrief::new(config),
        }
    }
}

impl FeatureMatchingAlgorithm for FastBriefAlgorithm {
    fn name(&self) -> &'static str {
        "fast_brief"
    }

    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        self.inner.detect(image)
    }

    fn describe(
        &self,
        image: &GrayImage,
        keypoints: Vec<Keypoint>,
    ) -> Result<FeatureSignature, CoreError> {
        let (kept, data) = self.inner.describe(image, &keypoints);
        FeatureSignature::new(kept, DescriptorMatrix::binary(DESCRIPTOR_BYTES, data)?)
    }
}

/// 설정에 맞는 전략 생성
pub fn algorithm_from_config(config: &DetectorConfig) -> Arc<dyn FeatureMatchingAlgorithm> {
    let algorithm: Arc<dyn FeatureMatchingAlgorithm> = match config.algorithm {
        AlgorithmKind::Blob => Arc::new(BlobAlgorithm::new(config.blob.clone())),
        AlgorithmKind::FastBrief => Arc::new(FastBriefAlgorithm::new(config.fast.clone())),
    };
    debug!(algorithm = algorithm.name(), "특징 매칭 전략 선택");
    algorithm
}
