//! 图谱准备的运行时配置.

use crate::consts::{atlas, canvas};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// 默认的区域列表, 由 [`atlas::SELECTED_REGIONS`] 生成.
pub static DEFAULT_REGIONS: Lazy<Vec<String>> =
    Lazy::new(|| atlas::SELECTED_REGIONS.iter().map(|s| s.to_string()).collect());

/// 配置错误. 发生时不会写入任何产物.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件格式错误.
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置内容不合法.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 画布几何: 面内放大倍数, 画布边长, 中线列.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    /// 面内最近邻放大倍数.
    pub upscale: usize,
    /// 画布边长.
    pub size: usize,
    /// 双侧区域的切分列.
    pub midline_x: usize,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            upscale: canvas::UPSCALE,
            size: canvas::CANVAS_SIZE,
            midline_x: canvas::MIDLINE_X,
        }
    }
}

/// 图谱准备配置.
///
/// 所有字段都有默认值, JSON 文件中只需要写出想覆盖的字段.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// 区域缩写列表. 顺序即区域序号 (从 1 开始), 会随颜色表一起持久化.
    pub regions: Vec<String>,
    /// 需要中线切分的区域.
    pub bilateral: Vec<String>,
    /// 全脑区域 id, 用于计算切片质心.
    pub brain_region_id: u32,
    /// 画布几何.
    pub canvas: CanvasSpec,
    /// 栅格化时移除的小连通域面积阈值.
    pub min_object_size: usize,
    /// 多边形简化容差.
    pub tolerance: f64,
    /// 区域颜色的透明度.
    pub alpha: f64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            regions: DEFAULT_REGIONS.clone(),
            bilateral: atlas::BILATERAL_REGIONS.iter().map(|s| s.to_string()).collect(),
            brain_region_id: atlas::BRAIN_REGION_ID,
            canvas: CanvasSpec::default(),
            min_object_size: atlas::MIN_OBJECT_SIZE,
            tolerance: atlas::SIMPLIFY_TOLERANCE,
            alpha: atlas::ROI_ALPHA,
        }
    }
}

impl AtlasConfig {
    /// 从 JSON 文件读取并校验.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 区域是否需要中线切分.
    #[inline]
    pub fn is_bilateral(&self, region: &str) -> bool {
        self.bilateral.iter().any(|b| b == region)
    }

    /// 校验配置.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::Invalid("empty region list".into()));
        }
        for (i, r) in self.regions.iter().enumerate() {
            if self.regions[..i].contains(r) {
                return Err(ConfigError::Invalid(format!("duplicated region `{r}`")));
            }
        }
        let c = &self.canvas;
        if c.upscale == 0 || c.size == 0 {
            return Err(ConfigError::Invalid("zero upscale or canvas size".into()));
        }
        if c.midline_x >= c.size {
            return Err(ConfigError::Invalid(format!(
                "midline {} outside canvas {}",
                c.midline_x, c.size
            )));
        }
        if !(0.0..=1.0).contains(&self.alpha) || self.tolerance < 0.0 {
            return Err(ConfigError::Invalid("alpha or tolerance out of range".into()));
        }
        Ok(())
    }
}
