//! 组织切片: 玻片切分与质心对齐.

mod align;
mod identity;
mod peaks;
mod segment;
mod watershed;

pub use align::{align, align_to_slice};
pub use identity::{name_sections, Animals, SectionName, SlideLayout};
pub use peaks::{max_filter, peak_local_max};
pub use segment::{read_slide, rot90_ccw, segment_slide, split_and_rotate, tissue_mask, SegmentedSlide};
pub use watershed::watershed;

use crate::atlas::CanvasError;
use crate::consts::canvas;
use crate::consts::segment as defaults;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// 切分与对齐的参数.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// 中值滤波窗口边长.
    pub median_size: usize,
    /// 开运算方形结构元边长.
    pub opening_size: usize,
    /// 组织连通域的最小面积.
    pub min_section_size: usize,
    /// 局部极大值邻域边长.
    pub peak_footprint: usize,
    /// 种子最小间距.
    pub peak_min_distance: usize,
    /// 切片填充后的画布边长.
    pub canvas_size: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            median_size: defaults::MEDIAN_SIZE,
            opening_size: defaults::OPENING_SIZE,
            min_section_size: defaults::MIN_SECTION_SIZE,
            peak_footprint: defaults::PEAK_FOOTPRINT,
            peak_min_distance: defaults::PEAK_MIN_DISTANCE,
            canvas_size: canvas::CANVAS_SIZE,
        }
    }
}

/// 切分与对齐错误.
#[derive(Debug, Error)]
pub enum SectionError {
    /// 输入图像不存在.
    #[error("slide image {0:?} does not exist")]
    Missing(PathBuf),

    /// 输入图像不是 tiff.
    #[error("slide image {0:?} is not a TIFF file")]
    NotTiff(PathBuf),

    /// 切片放不进画布.
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    /// 质心表中没有所选切片.
    #[error("no atlas centroid for slice {0}")]
    MissingCentroid(usize),

    /// 图像编解码错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// 文件系统错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
