use super::{areas, n4_positions};
use crate::BinaryMask;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};
use std::collections::VecDeque;

/// 二值化: 大于零的像素为前景.
pub fn binarize<T: num::Zero + PartialOrd>(img: ArrayView2<T>) -> BinaryMask {
    img.map(|v| *v > T::zero())
}

/// 填洞. 不与图像边缘 4-相连的背景区域被填充为前景.
pub fn fill_holes(mask: ArrayView2<bool>) -> BinaryMask {
    let &[h, w] = mask.shape() else {
        unreachable!()
    };
    // 从边缘出发可达的背景
    let mut outside = Array2::<bool>::from_elem((h, w), false);
    let mut q: VecDeque<_> = mask
        .indexed_iter()
        .filter_map(|((r, c), &fg)| {
            let at_border = r == 0 || c == 0 || r + 1 == h || c + 1 == w;
            (at_border && !fg).then_some((r, c))
        })
        .collect();
    q.iter().for_each(|&p| outside[p] = true);

    while let Some(cur) = q.pop_front() {
        for neigh in n4_positions(cur, (h, w)) {
            if !mask[neigh] && !outside[neigh] {
                outside[neigh] = true;
                q.push_back(neigh);
            }
        }
    }
    outside.mapv(|o| !o)
}

/// 去除面积 (像素个数) 小于 `min_size` 的 4-连通前景区域.
pub fn remove_small_objects(mask: ArrayView2<bool>, min_size: usize) -> BinaryMask {
    let mut ans = Array2::<bool>::from_elem(mask.raw_dim(), false);
    for area in areas(mask).into_iter().filter(|a| a.len() >= min_size) {
        area.into_iter().for_each(|p| ans[p] = true);
    }
    ans
}

/// 以 3x3 十字为结构元腐蚀一次. 图像外部视为背景.
pub fn erode_cross(mask: ArrayView2<bool>) -> BinaryMask {
    let &[h, w] = mask.shape() else {
        unreachable!()
    };
    Array2::from_shape_fn((h, w), |(r, c)| {
        mask[(r, c)]
            && r > 0
            && c > 0
            && r + 1 < h
            && c + 1 < w
            && n4_positions((r, c), (h, w)).all(|p| mask[p])
    })
}

/// 一维窗口 `[i - size / 2, i + size / 2]` 内的逐元素与/或.
///
/// `all` 为 `true` 时做腐蚀 (窗口全为前景), 否则做膨胀 (窗口存在前景).
/// 越界部分取 `border`.
fn sweep_1d(mut line: ArrayViewMut1<bool>, size: usize, all: bool, border: bool) {
    let n = line.len();
    let r = size / 2;
    // prefix[i] = line[..i] 中前景的个数
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for &v in line.iter() {
        prefix.push(prefix[prefix.len() - 1] + v as usize);
    }
    for i in 0..n {
        let lo = i.saturating_sub(r);
        let hi = (i + r + 1).min(n);
        let clipped = i < r || i + r + 1 > n;
        let fg = prefix[hi] - prefix[lo];
        line[i] = if all {
            fg == hi - lo && (!clipped || border)
        } else {
            fg > 0 || (clipped && border)
        };
    }
}

/// 以 `size * size` 方形结构元腐蚀. `size` 应为奇数.
///
/// `border` 指定图像外部是否视为前景.
pub fn erode_square(mask: ArrayView2<bool>, size: usize, border: bool) -> BinaryMask {
    debug_assert_eq!(size % 2, 1);
    let mut ans = mask.to_owned();
    for axis in [Axis(1), Axis(0)] {
        ans.lanes_mut(axis)
            .into_iter()
            .for_each(|lane| sweep_1d(lane, size, true, border));
    }
    ans
}

/// 以 `size * size` 方形结构元膨胀. 图像外部视为背景. `size` 应为奇数.
pub fn dilate_square(mask: ArrayView2<bool>, size: usize) -> BinaryMask {
    debug_assert_eq!(size % 2, 1);
    let mut ans = mask.to_owned();
    for axis in [Axis(1), Axis(0)] {
        ans.lanes_mut(axis)
            .into_iter()
            .for_each(|lane| sweep_1d(lane, size, false, false));
    }
    ans
}

/// 方形结构元开运算 (先腐蚀后膨胀), 用于断开细小的桥接.
///
/// 腐蚀时图像外部视为前景, 因此贴边的组织不会被额外削去.
#[inline]
pub fn opening_square(mask: ArrayView2<bool>, size: usize) -> BinaryMask {
    dilate_square(erode_square(mask, size, true).view(), size)
}
