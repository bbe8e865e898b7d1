//! 区域定量: ROI 栅格化, 背景校正后的单位面积均值, 以及结果表.

mod background;
mod engine;
mod results;
mod roi;

pub use background::{default_rect, measure_background, Rect};
pub use engine::{per_pixel_metric, quantify};
pub use results::{csv_escape, ResultsRow, ResultsStore};
pub use roi::{rasterize_rois, RoiLabels};

use std::path::PathBuf;
use thiserror::Error;

/// 定量错误.
#[derive(Debug, Error)]
pub enum QuantError {
    /// 强度图与标签图尺寸不一致.
    #[error("intensity image is {intensity:?} but label image is {labels:?}")]
    ShapeMismatch {
        /// 强度图尺寸.
        intensity: (usize, usize),
        /// 标签图尺寸.
        labels: (usize, usize),
    },

    /// 背景矩形与图像没有交集.
    #[error("background rectangle {0:?} does not intersect the {1:?} image")]
    EmptyBackground(Rect, (usize, usize)),

    /// 结果行的区域列与结果表不一致.
    #[error("row {image} has columns {found:?}, expect {expected:?}")]
    SchemaMismatch {
        /// 行的键.
        image: String,
        /// 结果表的区域列.
        expected: Vec<String>,
        /// 行的区域列.
        found: Vec<String>,
    },

    /// 结果文件内容无法解析.
    #[error("{path:?} line {line}: {reason}")]
    Parse {
        /// 文件路径.
        path: PathBuf,
        /// 行号, 从 1 开始.
        line: usize,
        /// 原因.
        reason: String,
    },

    /// 文件系统错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 定量模块的返回类型.
pub type QuantResult<T> = Result<T, QuantError>;
