//! 在原始玻片上测量背景强度.

use super::{QuantError, QuantResult};
use crate::consts::background::{RECT_HEIGHT, RECT_WIDTH};
use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};

/// 轴对齐矩形, 按 `(行, 列)` 组织. 左上角可以为负或越界, 使用时会被裁剪.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// 左上角行.
    pub top: isize,
    /// 左上角列.
    pub left: isize,
    /// 高.
    pub height: usize,
    /// 宽.
    pub width: usize,
}

impl Rect {
    /// 与 `(h, w)` 图像求交, 返回行列范围. 没有交集时为 `None`.
    fn clip(&self, (h, w): (usize, usize)) -> Option<((usize, usize), (usize, usize))> {
        let span = |start: isize, len: usize, limit: usize| {
            let lo = start.max(0) as usize;
            let hi = (start + len as isize).clamp(0, limit as isize) as usize;
            (lo < hi).then_some((lo, hi))
        };
        Some((span(self.top, self.height, h)?, span(self.left, self.width, w)?))
    }
}

/// 默认的背景矩形: 以玻片中心为基准, 左上角为 `(h/2 - 400, w/2 - 200)`, 高 800 宽 400.
pub fn default_rect((h, w): (usize, usize)) -> Rect {
    Rect {
        top: (h / 2) as isize - (RECT_HEIGHT / 2) as isize,
        left: (w / 2) as isize - (RECT_WIDTH / 2) as isize,
        height: RECT_HEIGHT,
        width: RECT_WIDTH,
    }
}

/// 矩形内 (裁剪到图像之后) 的平均强度.
pub fn measure_background(slide: ArrayView2<f32>, rect: &Rect) -> QuantResult<f64> {
    let ((r0, r1), (c0, c1)) = rect
        .clip(slide.dim())
        .ok_or(QuantError::EmptyBackground(*rect, slide.dim()))?;
    let view = slide.slice(s![r0..r1, c0..c1]);
    let sum: f64 = view.iter().map(|&v| v as f64).sum();
    let mean = sum / view.len() as f64;
    log::info!("background mean {mean:.3} over {} pixels", view.len());
    Ok(mean)
}
