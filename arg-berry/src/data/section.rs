use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 组织切片的稳定身份, 即不带扩展名的文件名, 如 `ratA_003`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(String);

impl SectionId {
    /// 直接创建.
    #[inline]
    pub fn new<S: Into<String>>(stem: S) -> Self {
        Self(stem.into())
    }

    /// 身份字符串.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 切分后写入硬盘时使用的文件名.
    #[inline]
    pub fn file_name(&self) -> String {
        format!("{}.tif", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个组织切片图像.
///
/// 由玻片切分产生或从硬盘加载; 对齐会产生带平移量的新副本, 原图保持不变.
#[derive(Debug, Clone)]
pub struct SectionImage {
    id: SectionId,
    file_name: String,
    data: Array2<f32>,
    offset: Option<(isize, isize)>,
}

impl SectionImage {
    /// 直接创建未对齐的切片.
    #[inline]
    pub fn new(id: SectionId, data: Array2<f32>) -> Self {
        Self {
            file_name: id.file_name(),
            id,
            data,
            offset: None,
        }
    }

    /// 从硬盘加载单通道切片图像. 身份取文件名 (不含扩展名), 原文件名保留为结果表的键.
    pub fn open<P: AsRef<Path>>(path: P) -> image::ImageResult<Self> {
        let path = path.as_ref();
        let name = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        Ok(Self {
            id: SectionId::new(name(path.file_stem())),
            file_name: name(path.file_name()),
            data: super::read_gray(path)?,
            offset: None,
        })
    }

    /// 身份.
    #[inline]
    pub fn id(&self) -> &SectionId {
        &self.id
    }

    /// 文件名, 即结果表的键. 从硬盘加载时为原文件名, 否则为 `<身份>.tif`.
    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 强度数据.
    #[inline]
    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 相对图谱画布的平移量 `(行, 列)`. 未对齐时为 `None`.
    #[inline]
    pub fn offset(&self) -> Option<(isize, isize)> {
        self.offset
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// 以新数据和平移量创建对齐后的副本.
    pub(crate) fn aligned(&self, data: Array2<f32>, offset: (isize, isize)) -> Self {
        Self {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            data,
            offset: Some(offset),
        }
    }
}
