//! 批量切分的玻片清单.

use crate::section::{Animals, SlideLayout};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 清单的默认文件名, 位于输入目录下.
pub const MANIFEST_FILE: &str = "slides.json";

/// 清单错误.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// 文件读取失败.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 格式错误.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// 条目内容不合法.
    #[error("{image}: {reason}")]
    Invalid {
        /// 条目对应的图像文件名.
        image: String,
        /// 原因.
        reason: String,
    },
}

/// 清单中的一张玻片.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// 相对输入目录的图像文件名.
    pub image_filename: String,
    /// 切片排数, 1 或 2.
    pub num_slides: u8,
    /// 动物数, 1 或 2.
    pub num_animals: u8,
    /// 左半部分的动物名.
    #[serde(default)]
    pub animal_left_name: Option<String>,
    /// 右半部分的动物名.
    #[serde(default)]
    pub animal_right_name: Option<String>,
}

impl ManifestEntry {
    fn invalid(&self, reason: &str) -> ManifestError {
        ManifestError::Invalid {
            image: self.image_filename.clone(),
            reason: reason.to_string(),
        }
    }

    /// 转换为玻片布局. 两只动物时左右名字都必须非空.
    pub fn to_layout(&self) -> Result<SlideLayout, ManifestError> {
        let base = Path::new(&self.image_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| self.invalid("empty image file name"))?;
        let two_rows = match self.num_slides {
            1 => false,
            2 => true,
            _ => return Err(self.invalid("num_slides must be 1 or 2")),
        };
        let animals = match self.num_animals {
            1 => Animals::Single,
            2 => {
                if !two_rows {
                    return Err(self.invalid("two animals need two rows of sections"));
                }
                let name = |n: &Option<String>, side: &str| {
                    n.as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(&format!("missing animal_{side}_name")))
                };
                Animals::Pair {
                    left: name(&self.animal_left_name, "left")?,
                    right: name(&self.animal_right_name, "right")?,
                }
            }
            _ => return Err(self.invalid("num_animals must be 1 or 2")),
        };
        Ok(SlideLayout {
            base,
            two_rows,
            animals,
        })
    }
}

/// 玻片清单, 即 [`ManifestEntry`] 的 JSON 列表.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideManifest(pub Vec<ManifestEntry>);

impl SlideManifest {
    /// 读取清单并检查每个条目.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let reader = BufReader::new(File::open(path)?);
        let ans: Self = serde_json::from_reader(reader)?;
        for entry in &ans.0 {
            entry.to_layout()?;
        }
        Ok(ans)
    }

    /// 每个条目的图像全路径与布局.
    pub fn layouts<'a>(
        &'a self,
        input_dir: &'a Path,
    ) -> impl Iterator<Item = Result<(PathBuf, SlideLayout), ManifestError>> + 'a {
        self.0
            .iter()
            .map(move |e| Ok((input_dir.join(&e.image_filename), e.to_layout()?)))
    }

    /// 条目数.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
