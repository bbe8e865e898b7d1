use crate::consts::segment::OTSU_BINS;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 计算第 `r` 行的中值滤波结果.
fn median_row(img: &ArrayView2<f32>, r: usize, size: usize, mut row: ArrayViewMut1<f32>) {
    let &[h, w] = img.shape() else {
        unreachable!()
    };
    let half = size / 2;
    let mut buf = Vec::with_capacity(size * size);
    for c in 0..w {
        buf.clear();
        // 越界部分取最近的边缘像素
        for dr in 0..size {
            let rr = (r + dr).saturating_sub(half).min(h - 1);
            for dc in 0..size {
                let cc = (c + dc).saturating_sub(half).min(w - 1);
                buf.push(img[(rr, cc)]);
            }
        }
        let mid = buf.len() / 2;
        let (_, m, _) = buf.select_nth_unstable_by(mid, f32::total_cmp);
        row[c] = *m;
    }
}

/// `size * size` 方形窗口中值滤波. 图像外部按最近边缘像素延拓.
///
/// 开启 `rayon` feature 时按行并行.
pub fn median_filter(img: ArrayView2<f32>, size: usize) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros(img.raw_dim());
    if img.is_empty() {
        return out;
    }
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(r, row)| median_row(&img, r, size, row));
        } else {
            out.axis_iter_mut(Axis(0))
                .enumerate()
                .for_each(|(r, row)| median_row(&img, r, size, row));
        }
    }
    out
}

/// Otsu 全局阈值.
///
/// 在数据的 `[min, max]` 范围上建立 256 箱直方图, 返回使类间方差最大的箱中心.
/// 前景应取 `> threshold` 的像素. 图像为常数时直接返回该常数; 空图像返回 `None`.
pub fn otsu_threshold(img: ArrayView2<f32>) -> Option<f32> {
    let (lo, hi) = img.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(a, b), &v| {
        (a.min(v), b.max(v))
    });
    if img.is_empty() {
        return None;
    }
    if lo == hi {
        return Some(lo);
    }

    let (lo, hi) = (lo as f64, hi as f64);
    let width = (hi - lo) / OTSU_BINS as f64;
    let mut hist = [0f64; OTSU_BINS];
    for &v in img.iter() {
        let bin = (((v as f64 - lo) / width) as usize).min(OTSU_BINS - 1);
        hist[bin] += 1.0;
    }
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| lo + width * (i as f64 + 0.5))
        .collect();

    // 前缀 (背景类) 与后缀 (前景类) 的权重和均值
    let mut w1 = [0f64; OTSU_BINS];
    let mut m1 = [0f64; OTSU_BINS];
    let (mut acc_w, mut acc_m) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        acc_w += hist[i];
        acc_m += hist[i] * centers[i];
        w1[i] = acc_w;
        m1[i] = if acc_w > 0.0 { acc_m / acc_w } else { 0.0 };
    }
    let mut w2 = [0f64; OTSU_BINS];
    let mut m2 = [0f64; OTSU_BINS];
    let (mut acc_w, mut acc_m) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        acc_w += hist[i];
        acc_m += hist[i] * centers[i];
        w2[i] = acc_w;
        m2[i] = if acc_w > 0.0 { acc_m / acc_w } else { 0.0 };
    }

    let best = (0..OTSU_BINS - 1)
        .map(|i| (i, w1[i] * w2[i + 1] * (m1[i] - m2[i + 1]).powi(2)))
        .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    Some(centers[best.0] as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// 孤立噪点被中值滤波抹去, 平坦区域保持不变.
    #[test]
    fn test_median_removes_salt() {
        let mut img = Array2::<f32>::from_elem((9, 9), 10.0);
        img[(4, 4)] = 1000.0;
        img[(0, 0)] = -50.0;
        let out = median_filter(img.view(), 3);
        assert!(out.iter().all(|&v| v == 10.0));
    }

    /// 边缘按最近像素延拓.
    #[test]
    fn test_median_edge_nearest() {
        let img = array![[1.0f32, 2.0, 3.0]];
        let out = median_filter(img.view(), 3);
        assert_eq!(out, array![[1.0f32, 2.0, 3.0]]);
    }

    /// 双峰分布的阈值落在两峰之间.
    #[test]
    fn test_otsu_bimodal() {
        let img = Array2::from_shape_fn((20, 20), |(r, _)| if r < 10 { 5.0f32 } else { 200.0 });
        let t = otsu_threshold(img.view()).unwrap();
        assert!(t > 5.0 && t < 200.0, "threshold = {t}");
        let fg = img.iter().filter(|&&v| v > t).count();
        assert_eq!(fg, 200);
    }

    #[test]
    fn test_otsu_constant() {
        let img = Array2::<f32>::from_elem((3, 3), 7.0);
        assert_eq!(otsu_threshold(img.view()), Some(7.0));
        let empty = Array2::<f32>::zeros((0, 3));
        assert_eq!(otsu_threshold(empty.view()), None);
    }
}
