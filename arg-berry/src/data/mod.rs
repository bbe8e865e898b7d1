//! 基础数据结构: 3D 图谱体, 组织切片图像, 以及图像的读写.

mod atlas_volume;
mod save;
mod section;

pub use atlas_volume::{AtlasError, AtlasVolume, RegionKey, Structure};
pub use save::{read_gray, ImgWriteRaw};
pub use section::{SectionId, SectionImage};

#[cfg(test)]
pub(crate) use atlas_volume::tests;
