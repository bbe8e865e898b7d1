//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{BinaryMask, Idx2d, Idx2dF};

pub use crate::data::{AtlasVolume, ImgWriteRaw, RegionKey, SectionId, SectionImage};

pub use crate::consts::canvas::{CANVAS_SIZE, MIDLINE_X, UPSCALE};

pub use crate::atlas::{prepare_atlas_dir, AtlasConfig, AtlasTables, PrepareError};

pub use crate::section::{align_to_slice, segment_slide, SegmentConfig, SlideLayout};

pub use crate::quant::{ResultsRow, ResultsStore, RoiLabels};

pub use crate::dataset::{self, home_atlas_dir, home_atlas_dir_with, DataDir, SlideManifest};

pub use crate::session::{Command, CommandOutcome, Session};

pub use crate::vector::Polygon;
