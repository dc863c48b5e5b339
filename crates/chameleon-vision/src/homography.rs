//! 호모그래피 추정 (정규화 DLT + RANSAC).
//!
//! 피규어 좌표계 → 장면 좌표계 사영 변환을 대응점에서 추정하고,
//! 피규어 네 모서리를 변환해 장면 영역 사각형을 구한다.

use chameleon_core::models::geometry::{Point2, Rect};
use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

/// 영역 추정에 필요한 최소 대응점 수
pub const MIN_REGION_CORRESPONDENCES: usize = 5;

const SAMPLE_SIZE: usize = 4;
const DEGENERATE_EPS: f64 = 1e-9;
/// 투영된 모서리가 피규어/장면 크기의 이 배수를 넘으면 영역 없음
const MAX_REGION_SPAN: f64 = 4.0;

/// RANSAC 설정
#[derive(Debug, Clone, PartialEq)]
pub struct RansacHomographyConfig {
    /// 최대 반복 수
    pub max_iters: usize,
    /// 재투영 오차 인라이어 임계값 (픽셀)
    pub inlier_threshold: f64,
    /// 모델 채택에 필요한 최소 인라이어 수
    pub min_inliers: usize,
    /// 조기 종료 신뢰도
    pub confidence: f64,
    /// 샘플링 시드 (결과 재현성)
    pub seed: u64,
}

impl Default for RansacHomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 3.0,
            min_inliers: SAMPLE_SIZE,
            confidence: 0.995,
            seed: 0x5EED,
        }
    }
}

/// 3×3 사영 변환
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    /// 점 변환. 무한원점으로 가면 None.
    pub fn project(&self, p: Point2) -> Option<Point2> {
        let v = self.0 * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < DEGENERATE_EPS {
            return None;
        }
        let out = Point2::new(v.x / v.z, v.y / v.z);
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }
}

/// RANSAC 결과
#[derive(Debug, Clone)]
pub struct RansacHomographyResult {
    pub homography: Homography,
    /// 인라이어 대응점 인덱스
    pub inliers: Vec<usize>,
}

/// 정규화 DLT. 대응점 4개 이상 필요.
pub fn fit_homography_dlt(src: &[Point2], dst: &[Point2]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < SAMPLE_SIZE {
        return None;
    }
    let t_src = normalizing_transform(src)?;
    let t_dst = normalizing_transform(dst)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let s = apply(&t_src, *s);
        let d = apply(&t_dst, *d);
        let r1 = SVector::<f64, 9>::from_column_slice(&[
            -s.x,
            -s.y,
            -1.0,
            0.0,
            0.0,
            0.0,
            d.x * s.x,
            d.x * s.y,
            d.x,
        ]);
        let r2 = SVector::<f64, 9>::from_column_slice(&[
            0.0,
            0.0,
            0.0,
            -s.x,
            -s.y,
            -1.0,
            d.y * s.x,
            d.y * s.y,
            d.y,
        ]);
        ata += r1 * r1.transpose() + r2 * r2.transpose();
    }

    // AᵀA의 최소 고유값 고유벡터 = A의 최소 특이값 우특이벡터
    let eigen = SymmetricEigen::new(ata);
    let (min_index, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = eigen.eigenvectors.column(min_index);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse()?;
    let mut m = t_dst_inv * h_norm * t_src;
    let scale = m[(2, 2)];
    if scale.abs() > DEGENERATE_EPS {
        m /= scale;
    }
    if !m.iter().all(|v| v.is_finite()) || m.determinant().abs() < DEGENERATE_EPS {
        return None;
    }
    Some(Homography(m))
}

/// RANSAC 호모그래피. 인라이어가 부족하면 None.
pub fn fit_homography_ransac(
    src: &[Point2],
    dst: &[Point2],
    config: &RansacHomographyConfig,
) -> Option<RansacHomographyResult> {
    let n = src.len();
    if n != dst.len() || n < SAMPLE_SIZE {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(Homography, Vec<usize>)> = None;
    let mut required_iters = config.max_iters;
    let mut iter = 0;

    while iter < required_iters.min(config.max_iters) {
        iter += 1;
        let sample = rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE).into_vec();
        let s: Vec<Point2> = sample.iter().map(|&i| src[i]).collect();
        let d: Vec<Point2> = sample.iter().map(|&i| dst[i]).collect();
        if is_degenerate(&s) || is_degenerate(&d) {
            continue;
        }
        let Some(candidate) = fit_homography_dlt(&s, &d) else {
            continue;
        };

        let inliers = collect_inliers(&candidate, src, dst, config.inlier_threshold);
        if best.as_ref().map_or(true, |(_, b)| inliers.len() > b.len()) {
            required_iters = adaptive_iterations(inliers.len(), n, config.confidence);
            best = Some((candidate, inliers));
        }
        if n == SAMPLE_SIZE {
            break;
        }
    }

    let (model, inliers) = best?;
    if inliers.len() < config.min_inliers.max(SAMPLE_SIZE) {
        trace!(inliers = inliers.len(), "RANSAC 인라이어 부족");
        return None;
    }

    // 전체 인라이어로 재추정, 실패하면 최소 샘플 모델 유지
    let s: Vec<Point2> = inliers.iter().map(|&i| src[i]).collect();
    let d: Vec<Point2> = inliers.iter().map(|&i| dst[i]).collect();
    let homography = fit_homography_dlt(&s, &d).unwrap_or(model);
    let inliers = collect_inliers(&homography, src, dst, config.inlier_threshold);
    if inliers.len() < config.min_inliers.max(SAMPLE_SIZE) {
        return None;
    }

    Some(RansacHomographyResult {
        homography,
        inliers,
    })
}

/// 피규어 영역 추정.
///
/// 대응점이 5개 미만이거나 변환을 찾지 못하면 None. 강한 원근으로 모서리가
/// 장면 밖 멀리 투영되는 경우도 None. 피규어 네 모서리
/// `(0,0) (w,0) (w,h) (0,h)`를 변환한 뒤 좌상단·우하단 모서리로 사각형을 만든다.
pub fn estimate_region(
    width: u32,
    height: u32,
    object: &[Point2],
    scene: &[Point2],
    config: &RansacHomographyConfig,
) -> Option<Rect> {
    if object.len() < MIN_REGION_CORRESPONDENCES || object.len() != scene.len() {
        return None;
    }
    let result = fit_homography_ransac(object, scene, config)?;

    let (w, h) = (f64::from(width), f64::from(height));
    let top_left = result.homography.project(Point2::new(0.0, 0.0))?;
    let bottom_right = result.homography.project(Point2::new(w, h))?;

    let scene_extent = scene
        .iter()
        .map(|p| p.x.abs().max(p.y.abs()))
        .fold(0.0_f64, f64::max);
    let limit = MAX_REGION_SPAN * w.max(h).max(scene_extent);
    let within = |p: Point2| p.x.abs() <= limit && p.y.abs() <= limit;
    if !within(top_left) || !within(bottom_right) {
        return None;
    }

    let x = top_left.x as i32;
    let y = top_left.y as i32;
    Some(Rect::new(
        x,
        y,
        (bottom_right.x - f64::from(x)) as i32,
        (bottom_right.y - f64::from(y)) as i32,
    ))
}

/// 중심 원점, 평균 거리 √2가 되도록 하는 정규화 변환
fn normalizing_transform(points: &[Point2]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < DEGENERATE_EPS {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn apply(t: &Matrix3<f64>, p: Point2) -> Point2 {
    let v = t * Vector3::new(p.x, p.y, 1.0);
    Point2::new(v.x / v.z, v.y / v.z)
}

/// 샘플 중 세 점이 한 직선 위에 있으면 퇴화
fn is_degenerate(points: &[Point2]) -> bool {
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            for k in j + 1..points.len() {
                let (a, b, c) = (points[i], points[j], points[k]);
                let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
                if area.abs() < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}

fn collect_inliers(h: &Homography, src: &[Point2], dst: &[Point2], threshold: f64) -> Vec<usize> {
    src.iter()
        .zip(dst)
        .enumerate()
        .filter_map(|(i, (s, d))| {
            let p = h.project(*s)?;
            let err = ((p.x - d.x).powi(2) + (p.y - d.y).powi(2)).sqrt();
            (err <= threshold).then_some(i)
        })
        .collect()
}

fn adaptive_iterations(inliers: usize, total: usize, confidence: f64) -> usize {
    let ratio = inliers as f64 / total as f64;
    let p_good = ratio.powi(SAMPLE_SIZE as i32);
    if p_good <= f64::EPSILON {
        return usize::MAX;
    }
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    let iters = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if iters.is_finite() {
        iters.ceil().max(1.0) as usize
    } else {
        usize::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Point2> {
        (0..n)
            .map(|i| {
                let x = (i % 7) as f64 * 53.0 + (i as f64 * 0.37).sin() * 9.0 + 10.0;
                let y = (i / 7) as f64 * 41.0 + (i as f64 * 0.71).cos() * 7.0 + 10.0;
                Point2::new(x, y)
            })
            .collect()
    }

    fn scale_translate(points: &[Point2], s: f64, tx: f64, ty: f64) -> Vec<Point2> {
        points
            .iter()
            .map(|p| Point2::new(p.x * s + tx, p.y * s + ty))
            .collect()
    }

    #[test]
    fn dlt_recovers_similarity() {
        let src = grid(12);
        let dst = scale_translate(&src, 0.5, 100.0, 40.0);
        let h = fit_homography_dlt(&src, &dst).unwrap();
        let p = h.project(Point2::new(400.0, 300.0)).unwrap();
        assert!((p.x - 300.0).abs() < 1e-6);
        assert!((p.y - 190.0).abs() < 1e-6);
    }

    #[test]
    fn fewer_than_five_correspondences_yield_no_region() {
        let src = grid(MIN_REGION_CORRESPONDENCES);
        let dst = scale_translate(&src, 1.0, 0.0, 0.0);
        let config = RansacHomographyConfig::default();
        for n in 0..MIN_REGION_CORRESPONDENCES {
            assert!(estimate_region(100, 100, &src[..n], &dst[..n], &config).is_none());
        }
        assert!(estimate_region(100, 100, &src, &dst, &config).is_some());
    }

    #[test]
    fn region_of_scaled_copy() {
        let src = grid(40);
        let dst = scale_translate(&src, 0.5, 120.0, 80.0);
        let rect =
            estimate_region(400, 300, &src, &dst, &RansacHomographyConfig::default()).unwrap();
        // 정수 절삭 때문에 ±1 허용
        assert!((rect.x - 120).abs() <= 1 && (rect.y - 80).abs() <= 1);
        assert!((rect.width - 200).abs() <= 1 && (rect.height - 150).abs() <= 1);
    }

    #[test]
    fn ransac_ignores_outliers() {
        let src = grid(35);
        let mut dst = scale_translate(&src, 0.5, 120.0, 80.0);
        // 20%를 엉뚱한 위치로
        for (i, p) in dst.iter_mut().enumerate().filter(|(i, _)| i % 5 == 0) {
            p.x = 900.0 - i as f64 * 13.0;
            p.y = 20.0 + i as f64 * 29.0;
        }
        let rect =
            estimate_region(400, 300, &src, &dst, &RansacHomographyConfig::default()).unwrap();
        assert!((rect.x - 120).abs() <= 1 && (rect.y - 80).abs() <= 1);
        assert!((rect.width - 200).abs() <= 2 && (rect.height - 150).abs() <= 2);
    }

    #[test]
    fn far_projected_corners_yield_no_region() {
        // x = 410 에서 분모가 0이 되는 원근 변환. 모서리 (400,300)은 수만 픽셀 밖으로 간다.
        let src = grid(21);
        let dst: Vec<Point2> = src
            .iter()
            .map(|p| {
                let d = 1.0 - p.x / 410.0;
                Point2::new(p.x / d, p.y / d)
            })
            .collect();
        let config = RansacHomographyConfig::default();
        let h = fit_homography_ransac(&src, &dst, &config).unwrap().homography;
        let corner = h.project(Point2::new(400.0, 300.0)).unwrap();
        assert!(corner.x > 10_000.0);

        assert!(estimate_region(400, 300, &src, &dst, &config).is_none());
    }

    #[test]
    fn collinear_points_have_no_homography() {
        let src: Vec<Point2> = (0..10).map(|i| Point2::new(i as f64, i as f64 * 2.0)).collect();
        let dst = src.clone();
        assert!(estimate_region(50, 50, &src, &dst, &RansacHomographyConfig::default()).is_none());
    }
}
