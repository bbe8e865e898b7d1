//! 精确欧氏距离变换 (Felzenszwalb & Huttenlocher 的可分离下包络算法).

use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

/// 代替无穷大, 避免 `inf - inf` 产生 NaN.
const FAR: f64 = 1e20;

/// 对一条线做一维平方距离变换, 结果写回原处.
fn dt_1d(mut line: ArrayViewMut1<f64>, v: &mut Vec<usize>, z: &mut Vec<f64>) {
    let n = line.len();
    if n == 0 {
        return;
    }
    let f: Vec<f64> = line.to_vec();
    v.clear();
    z.clear();
    v.resize(n, 0);
    z.resize(n + 1, 0.0);

    let mut k = 0usize;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let fq = f[q] + (q * q) as f64;
        let mut s;
        loop {
            let p = v[k];
            s = (fq - (f[p] + (p * p) as f64)) / (2.0 * q as f64 - 2.0 * p as f64);
            if s <= z[k] {
                // z[0] 为负无穷, 因此 k 不会下溢
                k -= 1;
            } else {
                break;
            }
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for q in 0..n {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let p = v[k];
        line[q] = (q.abs_diff(p) * q.abs_diff(p)) as f64 + f[p];
    }
}

/// 前景像素到最近背景像素的欧氏距离; 背景像素为 0.
///
/// 没有任何背景像素时, 返回值为一个极大的数.
pub fn distance_transform_edt(mask: ArrayView2<bool>) -> Array2<f64> {
    let mut d = mask.map(|&fg| if fg { FAR } else { 0.0 });
    let (mut v, mut z) = (Vec::new(), Vec::new());
    for axis in [Axis(1), Axis(0)] {
        for lane in d.lanes_mut(axis) {
            dt_1d(lane, &mut v, &mut z);
        }
    }
    d.mapv_inplace(f64::sqrt);
    d
}
