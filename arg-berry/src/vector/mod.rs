//! 栅格转矢量.
//!
//! 将二值掩膜的 4-连通前景追踪为像素边界多边形 (恒等仿射变换, 像素坐标 1:1 保留),
//! 修复自接触, 按容差简化, 最后把 `(行, 列)` 翻转为 `(x, y)` 并取整输出.
//!
//! 每个多边形只输出外环. 图谱区域掩膜在栅格化时已经填洞, 因此正常情况下没有洞.

mod repair;
mod simplify;
mod trace;

use crate::BinaryMask;
use ndarray::ArrayView2;
use thiserror::Error;

pub use simplify::simplify_polygon;

/// 画布上的闭合多边形: `[x, y]` 整数坐标, 首尾相同.
pub type Polygon = Vec<[i32; 2]>;

/// 追踪时使用的环, 角点坐标为 `(行, 列)`, 首点不重复.
type CornerRing = Vec<(i64, i64)>;

/// 无法修复的几何错误. 对正常的二值掩膜不应出现.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// 某个洞不被任何外环包含.
    #[error("hole probed at {probe:?} lies outside every shell")]
    OrphanHole {
        /// 洞边界上的探测点 `(行, 列)`.
        probe: (f64, f64),
    },
}

/// `(行, 列)` 角点环转为闭合的 `[x, y]` 多边形.
fn emit(ring: &[(i64, i64)]) -> Polygon {
    let mut poly: Polygon = ring.iter().map(|&(r, c)| [c as i32, r as i32]).collect();
    if let Some(&first) = poly.first() {
        poly.push(first);
    }
    poly
}

/// 将二值掩膜转换为多边形序列 (可能为空).
///
/// 追踪出的所有外环组成一个多重多边形; 若存在自接触的环则先修复.
/// 修复后即使只剩一个多边形, 也仍以单元素序列返回.
/// 每个外环以 `tolerance` 做 Douglas-Peucker 简化.
pub fn vectorize(mask: ArrayView2<bool>, tolerance: f64) -> Result<Vec<Polygon>, GeometryError> {
    let rings = trace::trace_rings(mask);
    let shapes = repair::assemble(rings)?;
    Ok(shapes
        .iter()
        .map(|s| emit(&simplify::simplify_ring(&s.exterior, tolerance)))
        .collect())
}

/// 按偶奇规则, 以像素中心 `(c + 0.5, r + 0.5)` 是否在多边形内来栅格化.
///
/// 对整数角点的像素边界多边形, 该规则能精确还原原始像素.
pub fn rasterize_polygon(poly: &Polygon, shape: (usize, usize)) -> BinaryMask {
    let mut mask = BinaryMask::from_elem(shape, false);
    fill_polygon(poly, shape, |p| mask[p] = true);
    mask
}

/// 扫描线填充: 对多边形内部的每个像素调用 `put`.
pub(crate) fn fill_polygon(poly: &Polygon, (h, w): (usize, usize), mut put: impl FnMut((usize, usize))) {
    if poly.len() < 3 || h == 0 || w == 0 {
        return;
    }
    let (min_y, max_y) = poly
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), p| (lo.min(p[1]), hi.max(p[1])));
    let r_lo = min_y.max(0) as usize;
    let r_hi = (max_y.max(0) as usize).min(h);

    let mut xs = Vec::with_capacity(8);
    for r in r_lo..r_hi {
        let y = r as f64 + 0.5;
        xs.clear();
        for (a, b) in poly.iter().zip(poly.iter().cycle().skip(1)) {
            let (x0, y0, x1, y1) = (a[0] as f64, a[1] as f64, b[0] as f64, b[1] as f64);
            if (y0 > y) != (y1 > y) {
                xs.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        xs.sort_by(f64::total_cmp);
        for pair in xs.chunks_exact(2) {
            // 像素中心 c + 0.5 落在 [x_in, x_out) 内
            let c_lo = (pair[0] - 0.5).ceil().max(0.0) as usize;
            let c_hi = ((pair[1] - 0.5).ceil().max(0.0) as usize).min(w);
            (c_lo..c_hi).for_each(|c| put((r, c)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph;
    use ndarray::Array2;

    fn count(m: &BinaryMask) -> usize {
        m.iter().filter(|&&v| v).count()
    }

    /// 不简化时, 矢量化后再栅格化可精确还原掩膜.
    #[test]
    fn test_roundtrip_exact() {
        let mask = Array2::from_shape_fn((40, 50), |(r, c)| {
            let (dr, dc) = (r as f64 - 20.0, c as f64 - 22.0);
            dr * dr / 200.0 + dc * dc / 300.0 < 1.0 || (r > 30 && c > 40 && c < 48)
        });
        let polys = vectorize(mask.view(), 0.0).unwrap();
        let mut back = BinaryMask::from_elem(mask.raw_dim(), false);
        for p in &polys {
            back.zip_mut_with(&rasterize_polygon(p, mask.dim()), |a, &b| *a ^= b);
        }
        assert_eq!(back, mask);
    }

    /// 面积守恒: 简化后面积误差有界, 凸形状的连通域个数不变.
    #[test]
    fn test_area_conservation_with_tolerance() {
        let mask = Array2::from_shape_fn((120, 160), |(r, c)| {
            let d1 = (r as f64 - 40.0).powi(2) + (c as f64 - 40.0).powi(2);
            let d2 = (r as f64 - 70.0).powi(2) + (c as f64 - 115.0).powi(2);
            d1 < 30.0f64.powi(2) || d2 < 35.0f64.powi(2)
        });
        let area = count(&mask);
        let polys = vectorize(mask.view(), 1.0).unwrap();
        assert_eq!(polys.len(), 2);

        let mut back = BinaryMask::from_elem(mask.raw_dim(), false);
        for p in &polys {
            back.zip_mut_with(&rasterize_polygon(p, mask.dim()), |a, &b| *a |= b);
        }
        let back_area = count(&back);
        let diff = back_area.abs_diff(area) as f64;
        assert!(diff / (area as f64) < 0.08, "{area} vs {back_area}");
        assert_eq!(morph::areas(back.view()).len(), 2);
    }

    #[test]
    fn test_empty_mask() {
        let mask = BinaryMask::from_elem((10, 10), false);
        assert!(vectorize(mask.view(), 4.0).unwrap().is_empty());
    }

    /// 输出为 `[x, y]`, 首尾闭合.
    #[test]
    fn test_axis_flip() {
        let mut mask = BinaryMask::from_elem((10, 10), false);
        mask.slice_mut(ndarray::s![1..3, 5..9]).fill(true);
        let polys = vectorize(mask.view(), 0.0).unwrap();
        assert_eq!(polys, vec![vec![[5, 1], [9, 1], [9, 3], [5, 3], [5, 1]]]);
    }

    #[test]
    fn test_rasterize_rectangle_area() {
        let poly = vec![[2, 3], [7, 3], [7, 5], [2, 5], [2, 3]];
        let m = rasterize_polygon(&poly, (10, 10));
        assert_eq!(count(&m), 10);
        assert!(m[(3, 2)] && m[(4, 6)] && !m[(5, 2)] && !m[(3, 7)]);
    }
}
