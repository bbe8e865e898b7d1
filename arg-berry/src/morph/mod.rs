//! 二维形态学算子与图像滤波.
//!
//! 所有算子都接受 `ndarray` 视图并返回新数组, 不会就地修改输入.
//! 连通性一律为 4-邻接.

mod binary;
mod edt;
mod filter;
mod label;

pub use binary::{
    binarize, dilate_square, erode_cross, erode_square, fill_holes, opening_square,
    remove_small_objects,
};
pub use edt::distance_transform_edt;
pub use filter::{median_filter, otsu_threshold};
pub use label::{areas, centroid, label, mask_centroid};

use crate::Idx2d;

/// 获得 `(h, w)` 的 4-邻域像素索引, 保证不越界. 顺序为上, 下, 左, 右.
#[inline]
pub(crate) fn n4_positions((h, w): Idx2d, (h_len, w_len): Idx2d) -> impl Iterator<Item = Idx2d> {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
    .into_iter()
    .filter(move |&(a, b)| a < h_len && b < w_len && (a, b) != (h, w))
}
