//! 图谱区域的栅格化: 从单层区域掩膜得到画布上的二值掩膜.

use super::CanvasSpec;
use crate::{morph, BinaryMask};
use ndarray::{s, Array2, ArrayView2, Axis};
use thiserror::Error;

/// 放大后的切片放不进画布.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("image of {height}x{width} does not fit the {size}x{size} canvas")]
pub struct CanvasError {
    /// 图像高.
    pub height: usize,
    /// 图像宽.
    pub width: usize,
    /// 画布边长.
    pub size: usize,
}

/// 面内最近邻放大: 每个像素复制为 `factor * factor` 的方块.
pub fn upscale_nearest<T: Clone>(img: ArrayView2<T>, factor: usize) -> Array2<T> {
    let (h, w) = img.dim();
    Array2::from_shape_fn((h * factor, w * factor), |(r, c)| {
        img[(r / factor, c / factor)].clone()
    })
}

/// 以默认值对称填充到 `size * size`. 奇数余量放在下方/右方.
pub fn pad_to_canvas<T: Clone + Default>(
    img: ArrayView2<T>,
    size: usize,
) -> Result<Array2<T>, CanvasError> {
    let (h, w) = img.dim();
    if h > size || w > size {
        return Err(CanvasError {
            height: h,
            width: w,
            size,
        });
    }
    let (top, left) = ((size - h) / 2, (size - w) / 2);
    let mut out = Array2::from_elem((size, size), T::default());
    out.slice_mut(s![top..top + h, left..left + w]).assign(&img);
    Ok(out)
}

/// 栅格化一个区域在某层上的掩膜.
///
/// 依次: 二值化 (`> 0`), 填洞, 移除面积小于 `min_object_size` 的 4-连通域,
/// 用 3x3 十字结构元腐蚀一次 (图像外视为背景), 最近邻放大, 对称填充到画布.
/// `bilateral` 为真时, 将中线列清零, 把区域切成左右两半.
///
/// 全零的结果不是错误.
pub fn rasterize_region<T: num::Zero + PartialOrd>(
    slice: ArrayView2<T>,
    canvas: &CanvasSpec,
    min_object_size: usize,
    bilateral: bool,
) -> Result<BinaryMask, CanvasError> {
    let mask = morph::binarize(slice);
    let mask = morph::fill_holes(mask.view());
    let mask = morph::remove_small_objects(mask.view(), min_object_size);
    let mask = morph::erode_cross(mask.view());
    let mask = upscale_nearest(mask.view(), canvas.upscale);
    let mut mask = pad_to_canvas(mask.view(), canvas.size)?;
    if bilateral {
        mask.index_axis_mut(Axis(1), canvas.midline_x).fill(false);
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_canvas() -> CanvasSpec {
        CanvasSpec {
            upscale: 2,
            size: 40,
            midline_x: 20,
        }
    }

    #[test]
    fn test_pad_odd_remainder() {
        let img = Array2::from_elem((3, 4), 1u8);
        let out = pad_to_canvas(img.view(), 8).unwrap();
        // 上 2 下 3, 左 2 右 2
        assert_eq!(out.slice(s![2..5, 2..6]).sum(), 12);
        assert_eq!(out.sum(), 12);
        assert_eq!(out[(1, 2)], 0);
        assert_eq!(out[(5, 2)], 0);

        let err = pad_to_canvas(Array2::from_elem((9, 2), 1u8).view(), 8).unwrap_err();
        assert_eq!(err.height, 9);
    }

    #[test]
    fn test_upscale_nearest() {
        let img = ndarray::array![[1, 2], [3, 4]];
        let up = upscale_nearest(img.view(), 2);
        assert_eq!(up.dim(), (4, 4));
        assert_eq!(up[(1, 1)], 1);
        assert_eq!(up[(2, 3)], 4);
    }

    /// 8x8 的实心方块: 腐蚀后剩 6x6, 放大后 12x12, 位于画布中央.
    #[test]
    fn test_rasterize_block() {
        let mut slice = Array2::<u32>::zeros((20, 20));
        slice.slice_mut(s![6..14, 6..14]).fill(315);
        let mask = rasterize_region(slice.view(), &small_canvas(), 4, false).unwrap();
        assert_eq!(mask.dim(), (40, 40));
        assert_eq!(mask.iter().filter(|&&v| v).count(), 144);
        assert!(mask[(14, 14)] && mask[(25, 25)]);
        assert!(!mask[(13, 14)] && !mask[(26, 26)]);
    }

    /// 双侧区域在中线处被切开, 小连通域被移除, 洞被填上.
    #[test]
    fn test_rasterize_bilateral_cleanup() {
        let mut slice = Array2::<u32>::zeros((20, 20));
        slice.slice_mut(s![4..16, 4..16]).fill(1);
        slice[(9, 9)] = 0;
        slice[(0, 0)] = 1;
        let mask = rasterize_region(slice.view(), &small_canvas(), 4, true).unwrap();
        // 10x10 腐蚀结果放大为 20x20, 再减去中线上的一列
        assert_eq!(mask.iter().filter(|&&v| v).count(), 400 - 20);
        assert!(mask.column(20).iter().all(|&v| !v));
        assert!(mask[(19, 19)]);
        assert_eq!(morph::areas(mask.view()).len(), 2);
    }

    #[test]
    fn test_rasterize_empty_and_oversized() {
        let slice = Array2::<u32>::zeros((20, 20));
        let mask = rasterize_region(slice.view(), &small_canvas(), 4, true).unwrap();
        assert!(mask.iter().all(|&v| !v));

        let slice = Array2::<u32>::zeros((21, 20));
        assert!(rasterize_region(slice.view(), &small_canvas(), 4, false).is_err());
    }
}
