//! 闭合环的 Douglas-Peucker 简化.
//!
//! 简化只删除顶点, 不移动顶点, 因此整数坐标保持为整数.
//! 如果简化后不足 3 个顶点, 则保留原环, 不让多边形退化.

use super::{CornerRing, Polygon};
use std::iter;

/// 点 `p` 到线段 `ab` 的距离.
fn seg_dist(p: (i64, i64), a: (i64, i64), b: (i64, i64)) -> f64 {
    let (px, py) = (p.1 as f64, p.0 as f64);
    let (ax, ay) = (a.1 as f64, a.0 as f64);
    let (bx, by) = (b.1 as f64, b.0 as f64);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    };
    let (qx, qy) = (ax + t * dx, ay + t * dy);
    ((px - qx).powi(2) + (py - qy).powi(2)).sqrt()
}

/// 对顶点序列 `seq` (环上的下标) 做开折线简化, 标记需要保留的顶点.
fn mark(ring: &[(i64, i64)], seq: &[usize], tolerance: f64, keep: &mut [bool]) {
    let mut stack = vec![(0, seq.len() - 1)];
    while let Some((lo, hi)) = stack.pop() {
        if hi <= lo + 1 {
            continue;
        }
        let (a, b) = (ring[seq[lo]], ring[seq[hi]]);
        let (best, best_d) = (lo + 1..hi)
            .map(|k| (k, seg_dist(ring[seq[k]], a, b)))
            .fold((lo, -1.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        if best_d > tolerance {
            keep[seq[best]] = true;
            stack.push((lo, best));
            stack.push((best, hi));
        }
    }
}

/// 简化闭合环 (首点不重复).
pub(crate) fn simplify_ring(ring: &[(i64, i64)], tolerance: f64) -> CornerRing {
    let n = ring.len();
    if n <= 3 || tolerance <= 0.0 {
        return ring.to_vec();
    }
    // 以首点和离首点最远的点把环切成两条折线
    let d0 = |i: usize| seg_dist(ring[i], ring[0], ring[0]);
    let far = (1..n).fold(1, |acc, i| if d0(i) > d0(acc) { i } else { acc });

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[far] = true;
    let first: Vec<usize> = (0..=far).collect();
    let second: Vec<usize> = (far..n).chain(iter::once(0)).collect();
    mark(ring, &first, tolerance, &mut keep);
    mark(ring, &second, tolerance, &mut keep);

    let kept: CornerRing = (0..n).filter(|&i| keep[i]).map(|i| ring[i]).collect();
    if kept.len() < 3 {
        ring.to_vec()
    } else {
        kept
    }
}

/// 简化一个已输出的多边形 (`[x, y]` 闭合环, 首尾相同).
///
/// 用于在编辑前按用户给定的容差重新简化图谱多边形; 容差为 0 时原样返回.
pub fn simplify_polygon(poly: &Polygon, tolerance: f64) -> Polygon {
    let open = match (poly.first(), poly.last()) {
        (Some(a), Some(b)) if poly.len() > 1 && a == b => &poly[..poly.len() - 1],
        _ => &poly[..],
    };
    let ring: CornerRing = open
        .iter()
        .map(|&[x, y]| (y as i64, x as i64))
        .collect();
    super::emit(&simplify_ring(&ring, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 边上的小锯齿在容差内被抹平, 四个角保留.
    #[test]
    fn test_simplify_jagged_square() {
        let ring = vec![(0, 0), (0, 5), (1, 5), (1, 6), (0, 6), (0, 10), (10, 10), (10, 0)];
        let s = simplify_ring(&ring, 2.0);
        assert_eq!(s, vec![(0, 0), (0, 10), (10, 10), (10, 0)]);
        assert_eq!(simplify_ring(&ring, 0.0), ring);
    }

    /// 容差过大时保留原环.
    #[test]
    fn test_simplify_never_degenerates() {
        let ring = vec![(0, 0), (0, 2), (1, 2), (1, 0)];
        assert_eq!(simplify_ring(&ring, 100.0), ring);
    }

    #[test]
    fn test_simplify_polygon_closed() {
        let poly = vec![[0, 0], [5, 0], [5, 1], [6, 1], [6, 0], [10, 0], [10, 10], [0, 10], [0, 0]];
        let s = simplify_polygon(&poly, 2.0);
        assert_eq!(s, vec![[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]);
    }
}
