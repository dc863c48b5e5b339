//! 원시 스크린샷 → 그레이스케일 변환.
//!
//! OS 레이어가 넘겨준 픽셀 버퍼를 매칭용 `GrayImage`로 바꾼다.
//! 채널 순서는 R, G, B(, A)로 해석하고 휘도 변환은 `image`에 맡긴다.

use chameleon_core::models::window::Screenshot;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

/// 스크린샷을 그레이스케일로 변환. 빈 스크린샷이면 None.
pub fn screenshot_to_gray(shot: &Screenshot) -> Option<GrayImage> {
    if shot.is_empty() {
        return None;
    }
    let raw = shot.pixels[..shot.pixel_count() * shot.channels()].to_vec();
    let image = match shot.channels() {
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(shot.width, shot.height, raw)?),
        _ => DynamicImage::ImageRgb8(RgbImage::from_raw(shot.width, shot.height, raw)?),
    };
    Some(image.to_luma8())
}

/// 등록용 이미지(임의 포맷) → 그레이스케일
pub fn image_to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// RGBA 이미지 → 스크린샷 (캡처 어댑터, 테스트용)
pub fn rgba_to_screenshot(image: &RgbaImage) -> Screenshot {
    Screenshot {
        width: image.width(),
        height: image.height(),
        bits_per_pixel: 32,
        pixels: image.as_raw().clone(),
    }
}
