//! 적분 영상.
//!
//! 박스 필터 합을 O(1)에 계산한다. 범위를 벗어난 영역은 영상 경계로 잘린다.

use image::GrayImage;

/// (w+1)×(h+1) 누적합 테이블 (0..255 밝기)
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<f64>,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        let raw = image.as_raw();

        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += f64::from(raw[y * width + x]);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }

        Self {
            width,
            height,
            sums,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(row, col)`에서 시작하는 `rows × cols` 박스 합 (경계에서 잘림)
    pub fn box_sum(&self, row: i64, col: i64, rows: i64, cols: i64) -> f64 {
        let r0 = row.clamp(0, self.height as i64) as usize;
        let c0 = col.clamp(0, self.width as i64) as usize;
        let r1 = (row + rows).clamp(0, self.height as i64) as usize;
        let c1 = (col + cols).clamp(0, self.width as i64) as usize;
        if r1 <= r0 || c1 <= c0 {
            return 0.0;
        }
        let stride = self.width + 1;
        self.sums[r1 * stride + c1] - self.sums[r0 * stride + c1] - self.sums[r1 * stride + c0]
            + self.sums[r0 * stride + c0]
    }

    /// 중심 `(x, y)`, 반경 `radius` 정사각형의 평균 밝기
    pub fn mean_around(&self, x: i64, y: i64, radius: i64) -> f64 {
        let side = 2 * radius + 1;
        let r0 = (y - radius).max(0);
        let c0 = (x - radius).max(0);
        let r1 = (y - radius + side).min(self.height as i64);
        let c1 = (x - radius + side).min(self.width as i64);
        let area = (r1 - r0) * (c1 - c0);
        if area <= 0 {
            return 0.0;
        }
        self.box_sum(r0, c0, r1 - r0, c1 - c0) / area as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn box_sum_matches_naive_sum() {
        let image = GrayImage::from_fn(7, 5, |x, y| Luma([(x * 10 + y) as u8]));
        let integral = IntegralImage::new(&image);

        let naive: f64 = (1..4)
            .flat_map(|y| (2..6).map(move |x| (x, y)))
            .map(|(x, y)| f64::from(image.get_pixel(x, y)[0]))
            .sum();
        assert_eq!(integral.box_sum(1, 2, 3, 4), naive);
    }

    #[test]
    fn out_of_range_boxes_are_clipped() {
        let image = GrayImage::from_pixel(4, 4, Luma([1]));
        let integral = IntegralImage::new(&image);
        assert_eq!(integral.box_sum(-2, -2, 4, 4), 4.0);
        assert_eq!(integral.box_sum(10, 10, 3, 3), 0.0);
        assert_eq!(integral.mean_around(0, 0, 2), 1.0);
    }
}
