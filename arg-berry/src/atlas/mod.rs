//! 离线图谱准备: 把 3D 标注图谱转换为分析阶段使用的静态表格与显示用的体数据.
//!
//! 流程只需运行一次, 产物存放在图谱目录中 (见 [`crate::dataset::home_atlas_dir`]).
//! 之后的分析只读取这些产物.

mod config;
mod driver;
mod rasterize;
mod reference;
mod tables;

pub use config::{AtlasConfig, CanvasSpec, ConfigError, DEFAULT_REGIONS};
pub use driver::{prepare_atlas, prepare_atlas_dir, read_volumes, PreparedAtlas};
pub use rasterize::{pad_to_canvas, rasterize_region, upscale_nearest, CanvasError};
pub use reference::{anatomical_volume, roi_volume, upscale_bilinear};
pub use tables::{
    AtlasTables, CentroidTable, PolygonTable, RegionColorTable, RegionDefinition, Rgba,
    SliceCentroid, SlicePolygons, TableError, TableResult,
};

#[cfg(test)]
pub(crate) use tables::tests;

use crate::data::AtlasError;
use crate::vector::GeometryError;
use ndarray_npy::{ReadNpzError, WriteNpzError};
use thiserror::Error;

/// 图谱准备错误. 任何错误发生时都不会留下不完整的表格.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// 配置错误.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 图谱数据错误, 如未知的区域.
    #[error(transparent)]
    Atlas(#[from] AtlasError),

    /// 切片放不进画布.
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    /// 无法修复的多边形.
    #[error("slice {slice}, region `{region}`: {source}")]
    Geometry {
        /// 切片序号.
        slice: usize,
        /// 区域名.
        region: String,
        /// 原始错误.
        #[source]
        source: GeometryError,
    },

    /// 表格读写错误.
    #[error(transparent)]
    Table(#[from] TableError),

    /// 写入体数据归档错误.
    #[error("cannot write volumes: {0}")]
    WriteNpz(#[from] WriteNpzError),

    /// 读取体数据归档错误.
    #[error("cannot read volumes: {0}")]
    ReadNpz(#[from] ReadNpzError),

    /// 文件系统错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
