//! Fast-Hessian 블롭 검출기 + 64차원 Haar 기술자.
//!
//! 옥타브 `o`, 레이어 `l`의 박스 필터 크기는 `(9 + 6l) · 2^o`,
//! 샘플링 간격은 `2^o`이다. 헤시안 행렬식 `Dxx·Dyy − (0.9·Dxy)²`가
//! 임계값 이상이면서 3×3×3 이웃 중 최대인 점을 키포인트로 취한다.
//! 기술자는 방향 없는(upright) 20σ 창을 4×4 하위 영역으로 나눠
//! `(Σdx, Σdy, Σ|dx|, Σ|dy|)`를 모은 뒤 단위 길이로 정규화한다.

use chameleon_core::config::BlobConfig;
use chameleon_core::models::figure::Keypoint;
use image::GrayImage;

use crate::integral::IntegralImage;

/// 기술자 차원
pub const DESCRIPTOR_LEN: usize = 64;

const BASE_FILTER: usize = 9;
const FILTER_STEP: usize = 6;

/// 한 필터 크기의 응답 맵
struct ResponseLayer {
    filter: usize,
    step: usize,
    rows: usize,
    cols: usize,
    responses: Vec<f64>,
}

impl ResponseLayer {
    fn build(integral: &IntegralImage, filter: usize, step: usize) -> Self {
        let rows = integral.height() / step;
        let cols = integral.width() / step;
        let mut responses = vec![0.0; rows * cols];

        let b = ((filter - 1) / 2) as i64;
        let l = (filter / 3) as i64;
        let w = filter as i64;
        let inverse_area = 1.0 / (w * w) as f64;

        for i in 0..rows {
            for j in 0..cols {
                let r = (i * step) as i64;
                let c = (j * step) as i64;

                let dxx = integral.box_sum(r - l + 1, c - b, 2 * l - 1, w)
                    - 3.0 * integral.box_sum(r - l + 1, c - l / 2, 2 * l - 1, l);
                let dyy = integral.box_sum(r - b, c - l + 1, w, 2 * l - 1)
                    - 3.0 * integral.box_sum(r - l / 2, c - l + 1, l, 2 * l - 1);
                let dxy = integral.box_sum(r - l, c + 1, l, l)
                    + integral.box_sum(r + 1, c - l, l, l)
                    - integral.box_sum(r - l, c - l, l, l)
                    - integral.box_sum(r + 1, c + 1, l, l);

                let (dxx, dyy, dxy) = (dxx * inverse_area, dyy * inverse_area, dxy * inverse_area);
                responses[i * cols + j] = dxx * dyy - 0.81 * dxy * dxy;
            }
        }

        Self {
            filter,
            step,
            rows,
            cols,
            responses,
        }
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.responses[i * self.cols + j]
    }
}

/// Fast-Hessian 블롭 검출기
#[derive(Debug, Clone)]
pub struct BlobDetector {
    config: BlobConfig,
}

impl BlobDetector {
    pub fn new(config: BlobConfig) -> Self {
        Self { config }
    }

    /// 키포인트 검출
    pub fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let integral = IntegralImage::new(image);
        let mut keypoints = Vec::new();
        let layers_per_octave = self.config.octave_layers as usize + 2;

        for octave in 0..self.config.octaves as usize {
            let step = 1usize << octave;
            if integral.width() / step < 3 || integral.height() / step < 3 {
                break;
            }

            let layers: Vec<ResponseLayer> = (0..layers_per_octave)
                .map(|layer| {
                    let filter = (BASE_FILTER + FILTER_STEP * layer) << octave;
                    ResponseLayer::build(&integral, filter, step)
                })
                .collect();

            for middle in 1..layers_per_octave - 1 {
                self.extract_extrema(
                    &layers[middle - 1],
                    &layers[middle],
                    &layers[middle + 1],
                    octave as i32,
                    &mut keypoints,
                );
            }
        }

        keypoints
    }

    fn extract_extrema(
        &self,
        below: &ResponseLayer,
        middle: &ResponseLayer,
        above: &ResponseLayer,
        octave: i32,
        out: &mut Vec<Keypoint>,
    ) {
        // 가장 큰 필터가 영상 안에 들어오는 영역만
        let border = (above.filter + 1) / (2 * above.step);
        if middle.rows <= 2 * border + 1 || middle.cols <= 2 * border + 1 {
            return;
        }

        for i in border + 1..middle.rows - border - 1 {
            for j in border + 1..middle.cols - border - 1 {
                let value = middle.at(i, j);
                if value < self.config.hessian_threshold {
                    continue;
                }
                if !is_local_maximum(value, i, j, [below, middle, above]) {
                    continue;
                }
                out.push(
                    Keypoint::new(
                        (j * middle.step) as f32,
                        (i * middle.step) as f32,
                        middle.filter as f32,
                    )
                    .with_response(value as f32)
                    .with_octave(octave),
                );
            }
        }
    }

    /// 키포인트별 64차원 기술자 (행 우선)
    pub fn describe(&self, image: &GrayImage, keypoints: &[Keypoint]) -> Vec<f32> {
        let integral = IntegralImage::new(image);
        let mut data = Vec::with_capacity(keypoints.len() * DESCRIPTOR_LEN);
        for keypoint in keypoints {
            data.extend_from_slice(&describe_one(&integral, keypoint));
        }
        data
    }
}

fn is_local_maximum(value: f64, i: usize, j: usize, layers: [&ResponseLayer; 3]) -> bool {
    for (index, layer) in layers.iter().enumerate() {
        for di in 0..3 {
            for dj in 0..3 {
                if index == 1 && di == 1 && dj == 1 {
                    continue;
                }
                if layer.at(i + di - 1, j + dj - 1) >= value {
                    return false;
                }
            }
        }
    }
    true
}

fn describe_one(integral: &IntegralImage, keypoint: &Keypoint) -> [f32; DESCRIPTOR_LEN] {
    let sigma = f64::from(keypoint.size) * 1.2 / 9.0;
    let cx = f64::from(keypoint.x);
    let cy = f64::from(keypoint.y);
    let haar_size = ((2.0 * sigma).round() as i64).max(2);
    let gauss_sigma = 3.3 * sigma;
    let gauss_denom = 2.0 * gauss_sigma * gauss_sigma;

    let mut descriptor = [0f32; DESCRIPTOR_LEN];
    let mut index = 0;

    for sub_y in [-10.0, -5.0, 0.0, 5.0] {
        for sub_x in [-10.0, -5.0, 0.0, 5.0] {
            let (mut dx, mut dy, mut mdx, mut mdy) = (0.0, 0.0, 0.0, 0.0);
            for k in 0..5 {
                for l in 0..5 {
                    let ox = (sub_x + f64::from(l) + 0.5) * sigma;
                    let oy = (sub_y + f64::from(k) + 0.5) * sigma;
                    let sx = (cx + ox).round() as i64;
                    let sy = (cy + oy).round() as i64;
                    let weight = (-(ox * ox + oy * oy) / gauss_denom).exp();

                    let rx = weight * haar_x(integral, sy, sx, haar_size);
                    let ry = weight * haar_y(integral, sy, sx, haar_size);
                    dx += rx;
                    dy += ry;
                    mdx += rx.abs();
                    mdy += ry.abs();
                }
            }
            descriptor[index] = dx as f32;
            descriptor[index + 1] = dy as f32;
            descriptor[index + 2] = mdx as f32;
            descriptor[index + 3] = mdy as f32;
            index += 4;
        }
    }

    let norm = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut descriptor {
            *v /= norm;
        }
    }
    descriptor
}

fn haar_x(integral: &IntegralImage, row: i64, col: i64, size: i64) -> f64 {
    let half = size / 2;
    integral.box_sum(row - half, col, size, half) - integral.box_sum(row - half, col - half, size, half)
}

fn haar_y(integral: &IntegralImage, row: i64, col: i64, size: i64) -> f64 {
    let half = size / 2;
    integral.box_sum(row, col - half, half, size) - integral.box_sum(row - half, col - half, half, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn disc_image(size: u32, centers: &[(i32, i32)], radius: i32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = centers.iter().any(|&(cx, cy)| {
                let (dx, dy) = (x as i32 - cx, y as i32 - cy);
                dx * dx + dy * dy <= radius * radius
            });
            Luma([if inside { 0 } else { 255 }])
        })
    }

    #[test]
    fn flat_image_has_no_blobs() {
        let image = GrayImage::from_pixel(96, 96, Luma([200]));
        let detector = BlobDetector::new(BlobConfig::default());
        assert!(detector.detect(&image).is_empty());
    }

    #[test]
    fn dark_disc_is_detected_near_its_center() {
        let image = disc_image(128, &[(64, 64)], 4);
        let detector = BlobDetector::new(BlobConfig::default());
        let keypoints = detector.detect(&image);

        assert!(!keypoints.is_empty());
        assert!(keypoints
            .iter()
            .any(|k| (k.x - 64.0).abs() <= 4.0 && (k.y - 64.0).abs() <= 4.0));
    }

    #[test]
    fn descriptors_are_unit_length_and_one_row_per_keypoint() {
        let image = disc_image(160, &[(50, 50), (110, 100)], 4);
        let detector = BlobDetector::new(BlobConfig::default());
        let keypoints = detector.detect(&image);
        let data = detector.describe(&image, &keypoints);

        assert_eq!(data.len(), keypoints.len() * DESCRIPTOR_LEN);
        for row in data.chunks(DESCRIPTOR_LEN) {
            let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn filter_sizes_follow_octave_layout() {
        // 옥타브 1, 레이어 2 → (9 + 12) · 2 = 42
        assert_eq!((BASE_FILTER + FILTER_STEP * 2) << 1, 42);
    }
}
