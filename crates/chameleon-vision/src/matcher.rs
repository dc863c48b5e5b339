//! 기술자 매칭.
//!
//! 피규어 기술자 각 행에 대해 장면에서 가장 가까운 행을 찾고,
//! 거리 오름차순으로 안정 정렬한 뒤 개수 상한과 거리 임계값을 적용한다.
//! 결과는 항상 정렬된 전체 목록의 접두사다.

use chameleon_core::models::figure::{DescriptorMatrix, DistanceMetric};

/// 대응점 (피규어 키포인트 ↔ 장면 키포인트)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// 피규어(객체) 쪽 키포인트 인덱스
    pub query_idx: usize,
    /// 장면 쪽 키포인트 인덱스
    pub train_idx: usize,
    pub distance: f32,
}

/// 매칭 결과 상한 (둘 다 None이면 무제한)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchLimits {
    /// 이 거리를 넘는 첫 대응점에서 목록을 자른다
    pub distance_threshold: Option<f32>,
    /// 최대 대응점 수
    pub max_correspondences: Option<usize>,
}

/// 최근접 매칭.
///
/// 두 행렬의 원소 타입이 다르면 비교할 척도가 없으므로 빈 목록을 반환한다.
pub fn match_descriptors(
    query: &DescriptorMatrix,
    train: &DescriptorMatrix,
    limits: &MatchLimits,
) -> Vec<Correspondence> {
    if query.metric() != train.metric() || query.cols() != train.cols() {
        return Vec::new();
    }

    let mut matches: Vec<Correspondence> = (0..query.rows())
        .filter_map(|q| nearest(query, train, q))
        .collect();

    // sort_by는 안정 정렬: 같은 거리는 피규어 인덱스 순서 유지
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    apply_limits(matches, limits)
}

/// 정렬된 목록에 상한 적용
pub fn apply_limits(sorted: Vec<Correspondence>, limits: &MatchLimits) -> Vec<Correspondence> {
    let count_cap = limits.max_correspondences.unwrap_or(usize::MAX);
    let mut kept = Vec::with_capacity(sorted.len().min(count_cap));
    for correspondence in sorted {
        if kept.len() >= count_cap {
            break;
        }
        if limits
            .distance_threshold
            .is_some_and(|threshold| correspondence.distance > threshold)
        {
            break;
        }
        kept.push(correspondence);
    }
    kept
}

fn nearest(query: &DescriptorMatrix, train: &DescriptorMatrix, q: usize) -> Option<Correspondence> {
    let mut best: Option<Correspondence> = None;
    for t in 0..train.rows() {
        let Some(distance) = distance(query, train, q, t) else {
            continue;
        };
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(Correspondence {
                query_idx: q,
                train_idx: t,
                distance,
            });
        }
    }
    best
}

fn distance(query: &DescriptorMatrix, train: &DescriptorMatrix, q: usize, t: usize) -> Option<f32> {
    match query.metric() {
        DistanceMetric::Euclidean => {
            let (a, b) = (query.float_row(q)?, train.float_row(t)?);
            Some(euclidean(a, b))
        }
        DistanceMetric::Hamming => {
            let (a, b) = (query.binary_row(q)?, train.binary_row(t)?);
            Some(hamming(a, b) as f32)
        }
    }
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}
