//! 像素边界 (crack) 追踪.
//!
//! 像素 `(r, c)` 覆盖角点 `(r, c)` 到 `(r + 1, c + 1)` 的方格. 每条前景/背景交界边
//! 都是一条有向单位边, 前景总在行进方向的右侧 (y 轴向下). 因此外环的
//! 有向面积 (按 `(x, y)` 计算) 为正, 洞为负.

use super::CornerRing;
use ndarray::{Array2, ArrayView2};

/// 方向: 右, 下, 左, 上. 依次右转 90 度.
const RIGHT: u8 = 0;
const DOWN: u8 = 1;
const LEFT: u8 = 2;
const UP: u8 = 3;

#[inline]
const fn turn_right(dir: u8) -> u8 {
    (dir + 1) % 4
}

#[inline]
fn step((r, c): (usize, usize), dir: u8) -> (usize, usize) {
    match dir {
        RIGHT => (r, c + 1),
        DOWN => (r + 1, c),
        LEFT => (r, c - 1),
        _ => (r - 1, c),
    }
}

/// 构造每个角点的出边集合 (按方向的位掩码).
fn boundary_edges(mask: ArrayView2<bool>) -> Array2<u8> {
    let (h, w) = mask.dim();
    let bg = |r: Option<usize>, c: Option<usize>| match (r, c) {
        (Some(r), Some(c)) if r < h && c < w => !mask[(r, c)],
        _ => true,
    };
    let mut out = Array2::<u8>::zeros((h + 1, w + 1));
    for ((r, c), _) in mask.indexed_iter().filter(|&(_, &fg)| fg) {
        if bg(r.checked_sub(1), Some(c)) {
            out[(r, c)] |= 1 << RIGHT;
        }
        if bg(Some(r), Some(c + 1)) {
            out[(r, c + 1)] |= 1 << DOWN;
        }
        if bg(Some(r + 1), Some(c)) {
            out[(r + 1, c + 1)] |= 1 << LEFT;
        }
        if bg(Some(r), c.checked_sub(1)) {
            out[(r + 1, c)] |= 1 << UP;
        }
    }
    out
}

/// 去掉环上的共线点 (循环意义下).
fn drop_collinear(ring: Vec<(i64, i64)>) -> CornerRing {
    let n = ring.len();
    if n < 3 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let (a, b, c) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
            let cross = (b.0 - a.0) * (c.1 - b.1) - (b.1 - a.1) * (c.0 - b.0);
            cross != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// 追踪掩膜的全部边界环, 角点坐标为 `(行, 列)`, 首点不重复.
///
/// 在两个前景像素仅以对角相接的鞍点处总是右转, 即紧贴当前像素,
/// 因此不同的 4-连通域不会被追踪进同一个环. 同一个环仍可能两次经过同一角点
/// (自接触), 由后续修复步骤处理.
///
/// 环按起点的行优先顺序排列.
pub(crate) fn trace_rings(mask: ArrayView2<bool>) -> Vec<CornerRing> {
    let edges = boundary_edges(mask);
    let mut remaining = edges.clone();
    let mut rings = Vec::new();

    for (start, _) in edges.indexed_iter().filter(|&(_, &bits)| bits != 0) {
        while remaining[start] != 0 {
            let mut dir = remaining[start].trailing_zeros() as u8;
            let mut pos = start;
            let mut ring = Vec::with_capacity(16);
            loop {
                ring.push((pos.0 as i64, pos.1 as i64));
                remaining[pos] &= !(1 << dir);
                pos = step(pos, dir);
                // 后继由原始出边决定, 与已访问状态无关
                let bits = edges[pos];
                dir = if bits.count_ones() >= 2 {
                    turn_right(dir)
                } else {
                    bits.trailing_zeros() as u8
                };
                if remaining[pos] & (1 << dir) == 0 {
                    break;
                }
            }
            rings.push(drop_collinear(ring));
        }
    }
    rings
}

/// 环的有向面积, 按 `(x, y) = (列, 行)` 的鞋带公式计算.
pub(crate) fn signed_area(ring: &[(i64, i64)]) -> f64 {
    let n = ring.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (r0, c0) = ring[i];
            let (r1, c1) = ring[(i + 1) % n];
            c0 * r1 - c1 * r0
        })
        .sum();
    twice as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_pixel() {
        let m = array![[false, false], [false, true]];
        let rings = trace_rings(m.view());
        assert_eq!(rings, vec![vec![(1, 1), (1, 2), (2, 2), (2, 1)]]);
        assert_eq!(signed_area(&rings[0]), 1.0);
    }

    /// 外环为正, 洞为负, 面积之和等于前景像素数.
    #[test]
    fn test_ring_with_hole() {
        let mut m = Array2::from_elem((5, 5), true);
        m[(2, 2)] = false;
        let rings = trace_rings(m.view());
        assert_eq!(rings.len(), 2);
        let areas: Vec<f64> = rings.iter().map(|r| signed_area(r)).collect();
        assert_eq!(areas, vec![25.0, -1.0]);
        assert_eq!(rings[0].len(), 4);
    }

    /// 对角相接的两个像素被追踪为两个独立的环.
    #[test]
    fn test_diagonal_pixels_split() {
        let m = array![[true, false], [false, true]];
        let rings = trace_rings(m.view());
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.len() == 4 && signed_area(r) == 1.0));
    }

    /// 同一连通域在鞍点处自接触: 两个对角相接的背景像素被同一个洞环包围,
    /// 洞环两次经过鞍点.
    #[test]
    fn test_pinched_hole() {
        let mut m = Array2::from_elem((4, 4), true);
        m[(1, 2)] = false;
        m[(2, 1)] = false;
        let rings = trace_rings(m.view());
        assert_eq!(rings.len(), 2);
        let hole = &rings[1];
        assert_eq!(hole.iter().filter(|&&v| v == (2, 2)).count(), 2);
        let total: f64 = rings.iter().map(|r| signed_area(r)).sum();
        assert_eq!(total, 14.0);
    }
}
