//! 解剖参考体与区域叠加体. 二者都放大到切片像素尺寸并填充到画布, 供显示使用.

use super::rasterize::{pad_to_canvas, upscale_nearest, CanvasError};
use super::CanvasSpec;
use crate::AtlasVolume;
use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Axis};
use std::collections::HashSet;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 面内双线性放大.
///
/// 输出像素中心映射回输入坐标 `(i + 0.5) / factor - 0.5`, 越界部分取边缘值.
pub fn upscale_bilinear(img: ArrayView2<f32>, factor: usize) -> Array2<f32> {
    let (h, w) = img.dim();
    if h == 0 || w == 0 {
        return Array2::zeros((h * factor, w * factor));
    }
    let src = |i: usize, len: usize| {
        let x = ((i as f64 + 0.5) / factor as f64 - 0.5).clamp(0.0, (len - 1) as f64);
        let lo = x.floor() as usize;
        (lo, (lo + 1).min(len - 1), (x - lo as f64) as f32)
    };
    Array2::from_shape_fn((h * factor, w * factor), |(r, c)| {
        let (r0, r1, fr) = src(r, h);
        let (c0, c1, fc) = src(c, w);
        let top = img[(r0, c0)] * (1.0 - fc) + img[(r0, c1)] * fc;
        let bottom = img[(r1, c0)] * (1.0 - fc) + img[(r1, c1)] * fc;
        top * (1.0 - fr) + bottom * fr
    })
}

/// 检查放大后的切片能否放入画布.
fn check_fit(atlas: &AtlasVolume, canvas: &CanvasSpec) -> Result<(), CanvasError> {
    let (_, h, w) = atlas.shape();
    let (height, width) = (h * canvas.upscale, w * canvas.upscale);
    if height > canvas.size || width > canvas.size {
        return Err(CanvasError {
            height,
            width,
            size: canvas.size,
        });
    }
    Ok(())
}

/// 对每一层计算画布平面, 写入 `(切片, size, size)` 的体.
fn build_volume<F>(depth: usize, size: usize, plane: F) -> Array3<f32>
where
    F: Fn(usize, ArrayViewMut2<f32>) + Sync + Send,
{
    let mut out = Array3::<f32>::zeros((depth, size, size));
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(z, v)| plane(z, v));
        } else {
            out.axis_iter_mut(Axis(0))
                .enumerate()
                .for_each(|(z, v)| plane(z, v));
        }
    }
    out
}

/// 解剖参考体: 参考强度逐层双线性放大后填充到画布.
pub fn anatomical_volume(atlas: &AtlasVolume, canvas: &CanvasSpec) -> Result<Array3<f32>, CanvasError> {
    check_fit(atlas, canvas)?;
    let reference = atlas.reference();
    Ok(build_volume(atlas.len_slices(), canvas.size, |z, mut out| {
        let up = upscale_bilinear(reference.index_axis(Axis(0), z), canvas.upscale);
        if let Ok(padded) = pad_to_canvas(up.view(), canvas.size) {
            out.assign(&padded);
        }
    }))
}

/// 区域叠加体: 所有区域的成员掩膜求和, 逐层最近邻放大并填充到画布.
///
/// `regions[k]` 为第 `k` 个区域包含的结构 id 集合.
/// 每个体素的值为包含它的区域个数.
pub fn roi_volume(
    atlas: &AtlasVolume,
    regions: &[HashSet<u32>],
    canvas: &CanvasSpec,
) -> Result<Array3<f32>, CanvasError> {
    check_fit(atlas, canvas)?;
    Ok(build_volume(atlas.len_slices(), canvas.size, |z, mut out| {
        let ann = atlas.annotation_at(z);
        let composite = ann.map(|id| {
            regions.iter().filter(|ids| ids.contains(id)).count() as f32
        });
        let up = upscale_nearest(composite.view(), canvas.upscale);
        if let Ok(padded) = pad_to_canvas(up.view(), canvas.size) {
            out.assign(&padded);
        }
    }))
}
