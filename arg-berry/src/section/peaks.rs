//! 局部极大值检测, 用作分水岭的种子.

use crate::Idx2d;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::VecDeque;

/// 一维滑动最大值. 窗口为 `[i - before, i + after]`, 越界部分按边缘值延拓.
fn sliding_max(lane: ArrayView1<f64>, before: usize, after: usize, mut out: ArrayViewMut1<f64>) {
    let n = lane.len();
    // 单调递减队列, 存下标
    let mut window: VecDeque<usize> = VecDeque::with_capacity(before + after + 1);
    let mut next = 0;
    for i in 0..n {
        let hi = (i + after).min(n - 1);
        while next <= hi {
            while window.back().is_some_and(|&j| lane[j] <= lane[next]) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(before);
        while window.front().is_some_and(|&j| j < lo) {
            window.pop_front();
        }
        if let Some(&j) = window.front() {
            out[i] = lane[j];
        }
    }
}

/// `size * size` 方形窗口最大值滤波.
///
/// 偶数边长时窗口中心偏向右下, 即覆盖 `[i - size / 2, i + size - 1 - size / 2]`.
pub fn max_filter(img: ArrayView2<f64>, size: usize) -> Array2<f64> {
    let (before, after) = (size / 2, size.saturating_sub(1) - size / 2);
    if img.is_empty() {
        return img.to_owned();
    }
    let mut rows = Array2::<f64>::zeros(img.raw_dim());
    Zip::from(img.lanes(Axis(1)))
        .and(rows.lanes_mut(Axis(1)))
        .for_each(|src, dst| sliding_max(src, before, after, dst));
    let mut out = Array2::<f64>::zeros(img.raw_dim());
    Zip::from(rows.lanes(Axis(0)))
        .and(out.lanes_mut(Axis(0)))
        .for_each(|src, dst| sliding_max(src, before, after, dst));
    out
}

/// 查找局部极大值.
///
/// 候选点: 等于 `footprint` 邻域内的最大值, 且严格大于全图最小值;
/// 距离图像边界小于 `min_distance` 的点被排除.
/// 候选点按值降序 (值相同时按行优先顺序) 依次接受, 与已接受点的切比雪夫距离
/// 不超过 `min_distance` 的候选点被丢弃.
///
/// 返回按接受顺序排列的坐标.
pub fn peak_local_max(img: ArrayView2<f64>, footprint: usize, min_distance: usize) -> Vec<Idx2d> {
    let (h, w) = img.dim();
    let Some(floor) = img.iter().copied().reduce(f64::min) else {
        return vec![];
    };
    let maxed = max_filter(img, footprint);
    let border = min_distance;
    let inside = |r: usize, c: usize| r >= border && c >= border && r + border < h && c + border < w;

    let mut candidates: Vec<(Idx2d, f64)> = img
        .indexed_iter()
        .filter(|&((r, c), &v)| v > floor && v == maxed[(r, c)] && inside(r, c))
        .map(|(p, &v)| (p, v))
        .collect();
    // 稳定排序保留行优先顺序
    candidates.sort_by_key(|&(_, v)| Reverse(OrderedFloat(v)));

    let mut peaks: Vec<Idx2d> = Vec::new();
    for ((r, c), _) in candidates {
        let close = peaks
            .iter()
            .any(|&(pr, pc)| r.abs_diff(pr).max(c.abs_diff(pc)) <= min_distance);
        if !close {
            peaks.push((r, c));
        }
    }
    peaks
}
