//! 피규어와 특징 서명(키포인트 + 기술자 행렬).
//!
//! 피규어는 등록 시점에 한 번 계산된 서명을 가지며, 삭제 외에는 불변이다.
//! 엔진은 `Arc<Figure>`로 공유 뷰만 보유한다.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::models::geometry::Point2;

/// 전역 고유 피규어 식별자 (저장소 row id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FigureId(pub i64);

impl fmt::Display for FigureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "figure#{}", self.0)
    }
}

/// 이미지 내 특징점 (위치, 스케일, 방향, 응답 강도)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// 특징 지름 (픽셀)
    pub size: f32,
    /// 방향 (도, 미지정이면 -1)
    pub angle: f32,
    /// 검출기 응답 강도
    pub response: f32,
    /// 검출된 옥타브
    pub octave: i32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: -1.0,
            response: 0.0,
            octave: 0,
        }
    }

    pub fn with_response(mut self, response: f32) -> Self {
        self.response = response;
        self
    }

    pub fn with_octave(mut self, octave: i32) -> Self {
        self.octave = octave;
        self
    }

    pub fn position(&self) -> Point2 {
        Point2::new(f64::from(self.x), f64::from(self.y))
    }
}

/// 기술자 거리 척도. 기술자 원소 타입에서 자동 결정된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// 실수 기술자: L2 거리
    Euclidean,
    /// 이진 기술자: 서로 다른 비트 수
    Hamming,
}

/// 기술자 행렬 (키포인트당 한 행, 고정 폭)
///
/// 원소 타입이 곧 거리 척도를 결정하므로 두 종류를 한 행렬에 섞을 수 없다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorMatrix {
    /// 실수 기술자 (행 우선, `cols`개씩)
    Float { cols: usize, data: Vec<f32> },
    /// 이진 기술자 (행 우선, `cols` 바이트씩)
    Binary { cols: usize, data: Vec<u8> },
}

impl DescriptorMatrix {
    /// 실수 기술자 행렬 생성
    pub fn float(cols: usize, data: Vec<f32>) -> Result<Self, CoreError> {
        check_shape(cols, data.len())?;
        Ok(Self::Float { cols, data })
    }

    /// 이진 기술자 행렬 생성
    pub fn binary(cols: usize, data: Vec<u8>) -> Result<Self, CoreError> {
        check_shape(cols, data.len())?;
        Ok(Self::Binary { cols, data })
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Float { cols, .. } | Self::Binary { cols, .. } => *cols,
        }
    }

    pub fn rows(&self) -> usize {
        let (cols, len) = match self {
            Self::Float { cols, data } => (*cols, data.len()),
            Self::Binary { cols, data } => (*cols, data.len()),
        };
        if cols == 0 {
            0
        } else {
            len / cols
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// 원소 타입에 따른 거리 척도
    pub fn metric(&self) -> DistanceMetric {
        match self {
            Self::Float { .. } => DistanceMetric::Euclidean,
            Self::Binary { .. } => DistanceMetric::Hamming,
        }
    }

    /// 실수 행 (이진 행렬이거나 범위 밖이면 None)
    pub fn float_row(&self, row: usize) -> Option<&[f32]> {
        match self {
            Self::Float { cols, data } => data.get(row * cols..(row + 1) * cols),
            Self::Binary { .. } => None,
        }
    }

    /// 이진 행 (실수 행렬이거나 범위 밖이면 None)
    pub fn binary_row(&self, row: usize) -> Option<&[u8]> {
        match self {
            Self::Binary { cols, data } => data.get(row * cols..(row + 1) * cols),
            Self::Float { .. } => None,
        }
    }
}

fn check_shape(cols: usize, len: usize) -> Result<(), CoreError> {
    if cols == 0 && len > 0 {
        return Err(CoreError::Validation {
            field: "descriptors.cols".to_string(),
            message: "열 수가 0인데 데이터가 있습니다".to_string(),
        });
    }
    if cols > 0 && len % cols != 0 {
        return Err(CoreError::Validation {
            field: "descriptors.data".to_string(),
            message: format!("데이터 길이 {len}이(가) 열 수 {cols}의 배수가 아닙니다"),
        });
    }
    Ok(())
}

/// 이미지 영역의 특징 서명 (불변 값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSignature {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: DescriptorMatrix,
}

impl FeatureSignature {
    /// 서명 생성. 키포인트 수와 기술자 행 수가 같아야 한다.
    pub fn new(keypoints: Vec<Keypoint>, descriptors: DescriptorMatrix) -> Result<Self, CoreError> {
        if keypoints.len() != descriptors.rows() {
            return Err(CoreError::Validation {
                field: "signature".to_string(),
                message: format!(
                    "키포인트 {}개, 기술자 {}행 불일치",
                    keypoints.len(),
                    descriptors.rows()
                ),
            });
        }
        Ok(Self {
            keypoints,
            descriptors,
        })
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// 등록된 참조 이미지 영역
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub id: FigureId,
    /// 참조 이미지 너비 (픽셀)
    pub width: u32,
    /// 참조 이미지 높이 (픽셀)
    pub height: u32,
    pub signature: FeatureSignature,
    /// 검출 시 오버레이에 표시할 콘텐츠
    pub source_url: String,
}

impl Figure {
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.signature.keypoints
    }

    pub fn descriptors(&self) -> &DescriptorMatrix {
        &self.signature.descriptors
    }

    /// 너비/높이 비율
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }
}

/// 피규어 목록 항목 (목록 조회용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureSummary {
    pub id: FigureId,
    pub source_url: String,
}

/// 파일 내용 식별자 (경로와 무관)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    pub size: u64,
    /// 16진수 소문자 MD5
    pub md5: String,
}
