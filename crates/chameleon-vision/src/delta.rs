//! 장면 변경 감지.
//!
//! 직전 스크린샷과의 L2 픽셀 차이를 픽셀 수로 나눈 값으로 변경 여부를 판단한다.

use chameleon_core::models::window::Screenshot;
use tracing::trace;

/// 정규화 픽셀 차이 (L2 노름 / (행 × 열)).
///
/// 크기나 비트 깊이가 다르면 비교 불가로 None.
pub fn normalized_difference(prev: &Screenshot, curr: &Screenshot) -> Option<f64> {
    if prev.width != curr.width
        || prev.height != curr.height
        || prev.bits_per_pixel != curr.bits_per_pixel
    {
        return None;
    }
    let pixels = prev.pixel_count();
    if pixels == 0 {
        return None;
    }
    let len = pixels * prev.channels();
    let (a, b) = (prev.pixels.get(..len)?, curr.pixels.get(..len)?);

    let sum_sq: f64 = a
        .iter()
        .zip(b)
        .map(|(&p, &c)| {
            let d = f64::from(p) - f64::from(c);
            d * d
        })
        .sum();

    Some(sum_sq.sqrt() / pixels as f64)
}

/// 장면 변경 여부.
///
/// 이전 스크린샷이 없거나 비교할 수 없으면 변경으로 본다.
pub fn has_changed(prev: Option<&Screenshot>, curr: &Screenshot, threshold: f64) -> bool {
    match prev.and_then(|p| normalized_difference(p, curr)) {
        Some(diff) => {
            trace!(diff, threshold, "장면 차이");
            diff > threshold
        }
        None => true,
    }
}
