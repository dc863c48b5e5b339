//! FAST-9 코너 검출기 + 256비트 BRIEF 기술자.
//!
//! 반경 3 원 위 16픽셀 중 연속 9개 이상이 중심보다 모두 밝거나 모두 어두우면
//! 코너로 본다. 3×3 비최대 억제 후 응답 강도 상위 N개를 남긴다.
//! 기술자는 31×31 패치 안에서 고정 시드로 뽑은 256개 점 쌍의
//! 5×5 평균 밝기 비교 결과다.

use chameleon_core::config::FastConfig;
use chameleon_core::models::figure::Keypoint;
use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::integral::IntegralImage;

/// 기술자 바이트 수 (256비트)
pub const DESCRIPTOR_BYTES: usize = 32;

/// 패치 반경
const PATCH_RADIUS: i32 = 15;
/// 평활화 반경 (5×5)
const SMOOTH_RADIUS: i64 = 2;
/// 검출 경계 (패치 + 평활화 + 여유)
const BORDER: u32 = 18;
/// 점 쌍 생성 시드 (등록 시점과 매칭 시점이 같은 패턴을 써야 함)
const PATTERN_SEED: u64 = 0x0C4A_3E1E;

const FAST_KEYPOINT_SIZE: f32 = 31.0;

/// 반경 3 Bresenham 원 (시계 방향)
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC_LENGTH: usize = 9;

/// FAST 코너 + BRIEF 기술자
#[derive(Debug, Clone)]
pub struct FastBrief {
    config: FastConfig,
    pairs: Vec<((i32, i32), (i32, i32))>,
}

impl FastBrief {
    pub fn new(config: FastConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let pairs = (0..DESCRIPTOR_BYTES * 8)
            .map(|_| {
                let a = (
                    rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                    rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                );
                let b = (
                    rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                    rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                );
                (a, b)
            })
            .collect();
        Self { config, pairs }
    }

    /// 코너 검출
    pub fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let (width, height) = image.dimensions();
        if width <= 2 * BORDER || height <= 2 * BORDER {
            return Vec::new();
        }

        let w = width as usize;
        let mut scores = vec![0u32; w * height as usize];
        for y in BORDER..height - BORDER {
            for x in BORDER..width - BORDER {
                if let Some(score) = self.corner_score(image, x, y) {
                    scores[y as usize * w + x as usize] = score;
                }
            }
        }

        let mut keypoints = Vec::new();
        for y in BORDER..height - BORDER {
            for x in BORDER..width - BORDER {
                let score = scores[y as usize * w + x as usize];
                if score == 0 {
                    continue;
                }
                let dominated = (-1i32..=1).any(|dy| {
                    (-1i32..=1).any(|dx| {
                        if dx == 0 && dy == 0 {
                            return false;
                        }
                        let nx = (x as i32 + dx) as usize;
                        let ny = (y as i32 + dy) as usize;
                        let other = scores[ny * w + nx];
                        // 동점이면 먼저 스캔된 쪽만 남긴다
                        other > score || (other == score && (dy < 0 || (dy == 0 && dx < 0)))
                    })
                });
                if !dominated {
                    keypoints.push(
                        Keypoint::new(x as f32, y as f32, FAST_KEYPOINT_SIZE)
                            .with_response(score as f32),
                    );
                }
            }
        }

        // 응답 강도 내림차순, 동점은 스캔 순서 유지
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(self.config.max_keypoints);
        keypoints
    }

    /// FAST 판정. 코너이면 임계값을 넘는 차이의 합을 점수로 반환.
    fn corner_score(&self, image: &GrayImage, x: u32, y: u32) -> Option<u32> {
        let center = i32::from(image.get_pixel(x, y)[0]);
        let threshold = i32::from(self.config.threshold);

        let mut states = [0i8; 16];
        for (state, &(dx, dy)) in states.iter_mut().zip(CIRCLE.iter()) {
            let p = i32::from(image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0]);
            *state = if p > center + threshold {
                1
            } else if p < center - threshold {
                -1
            } else {
                0
            };
        }

        let has_arc = |target: i8| {
            let mut run = 0;
            for i in 0..CIRCLE.len() + ARC_LENGTH {
                if states[i % CIRCLE.len()] == target {
                    run += 1;
                    if run >= ARC_LENGTH {
                        return true;
                    }
                } else {
                    run = 0;
                }
            }
            false
        };

        if !has_arc(1) && !has_arc(-1) {
            return None;
        }

        let score = CIRCLE
            .iter()
            .map(|&(dx, dy)| {
                let p = i32::from(
                    image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0],
                );
                ((p - center).abs() - threshold).max(0) as u32
            })
            .sum::<u32>()
            .max(1);
        Some(score)
    }

    /// 키포인트별 32바이트 기술자 (행 우선).
    ///
    /// 패치가 영상을 벗어나는 키포인트는 버린다.
    pub fn describe(&self, image: &GrayImage, keypoints: &[Keypoint]) -> (Vec<Keypoint>, Vec<u8>) {
        let integral = IntegralImage::new(image);
        let margin = (PATCH_RADIUS as i64) + SMOOTH_RADIUS;
        let (width, height) = (image.width() as i64, image.height() as i64);

        let mut kept = Vec::with_capacity(keypoints.len());
        let mut data = Vec::with_capacity(keypoints.len() * DESCRIPTOR_BYTES);

        for keypoint in keypoints {
            let cx = keypoint.x.round() as i64;
            let cy = keypoint.y.round() as i64;
            if cx < margin || cy < margin || cx >= width - margin || cy >= height - margin {
                continue;
            }

            let mut descriptor = [0u8; DESCRIPTOR_BYTES];
            for (bit, &((ax, ay), (bx, by))) in self.pairs.iter().enumerate() {
                let a = integral.mean_around(cx + i64::from(ax), cy + i64::from(ay), SMOOTH_RADIUS);
                let b = integral.mean_around(cx + i64::from(bx), cy + i64::from(by), SMOOTH_RADIUS);
                if a < b {
                    descriptor[bit / 8] |= 1 << (bit % 8);
                }
            }
            kept.push(*keypoint);
            data.extend_from_slice(&descriptor);
        }

        (kept, data)
    }
}
