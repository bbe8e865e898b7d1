use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpzError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// npz 归档中参考强度体的条目名.
const REFERENCE_ENTRY: &str = "reference.npy";

/// npz 归档中注释体的条目名.
const ANNOTATION_ENTRY: &str = "annotation.npy";

/// 加载或查询图谱时的错误.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// 底层 I/O 错误.
    #[error("atlas I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 读取 npz 条目错误.
    #[error("cannot read atlas volume: {0}")]
    Npz(#[from] ReadNpzError),

    /// 结构层级文件格式错误.
    #[error("malformed structure hierarchy: {0}")]
    Json(#[from] serde_json::Error),

    /// 参考体与注释体形状不一致.
    #[error("reference shape {reference:?} does not match annotation shape {annotation:?}")]
    ShapeMismatch {
        /// 参考体形状.
        reference: (usize, usize, usize),
        /// 注释体形状.
        annotation: (usize, usize, usize),
    },

    /// 层级中不存在该区域.
    #[error("unknown region `{0}`")]
    UnknownRegion(RegionKey),
}

/// 层级结构中的一个脑区.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// 数值 id, 即注释体中的体素值.
    pub id: u32,

    /// 缩写, 如 `CB`, `Isocortex`.
    pub acronym: String,

    /// 全名.
    #[serde(default)]
    pub name: String,

    /// 从根到自身的 id 路径 (包含自身).
    pub structure_id_path: Vec<u32>,
}

/// 区域的查询键: 数值 id 或缩写.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionKey {
    /// 数值 id.
    Id(u32),

    /// 缩写.
    Acronym(String),
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Acronym(s) => f.write_str(s),
        }
    }
}

impl From<u32> for RegionKey {
    #[inline]
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RegionKey {
    #[inline]
    fn from(acronym: &str) -> Self {
        Self::Acronym(acronym.to_owned())
    }
}

/// 3D 标注图谱. 按 `(切片, 高, 宽)` 组织, 加载后不可变.
#[derive(Debug, Clone)]
pub struct AtlasVolume {
    reference: Array3<f32>,
    annotation: Array3<u32>,
    structures: Vec<Structure>,
}

impl AtlasVolume {
    /// 由参考强度体, 注释体和结构层级直接创建.
    pub fn new(
        reference: Array3<f32>,
        annotation: Array3<u32>,
        structures: Vec<Structure>,
    ) -> Result<Self, AtlasError> {
        let shape3 = |s: &[usize]| (s[0], s[1], s[2]);
        if reference.shape() != annotation.shape() {
            return Err(AtlasError::ShapeMismatch {
                reference: shape3(reference.shape()),
                annotation: shape3(annotation.shape()),
            });
        }
        Ok(Self {
            reference,
            annotation,
            structures,
        })
    }

    /// 打开图谱.
    ///
    /// `volumes` 为 npz 归档, 包含 `reference.npy` (`f32`) 与 `annotation.npy` (`u32`);
    /// `structures` 为 BrainGlobe 格式的 `structures.json`.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        volumes: P,
        structures: Q,
    ) -> Result<Self, AtlasError> {
        let mut npz = NpzReader::new(File::open(volumes.as_ref())?)?;
        let reference = npz.by_name::<OwnedRepr<f32>, Ix3>(REFERENCE_ENTRY)?;
        let annotation = npz.by_name::<OwnedRepr<u32>, Ix3>(ANNOTATION_ENTRY)?;
        let structures: Vec<Structure> =
            serde_json::from_reader(std::io::BufReader::new(File::open(structures.as_ref())?))?;
        log::info!(
            "atlas loaded: {:?} voxels, {} structures",
            reference.shape(),
            structures.len()
        );
        Self::new(reference, annotation, structures)
    }

    /// 形状 `(切片, 高, 宽)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        let &[z, h, w] = self.annotation.shape() else {
            unreachable!()
        };
        (z, h, w)
    }

    /// 切片个数.
    #[inline]
    pub fn len_slices(&self) -> usize {
        self.shape().0
    }

    /// 参考强度体.
    #[inline]
    pub fn reference(&self) -> ArrayView3<'_, f32> {
        self.reference.view()
    }

    /// 注释体.
    #[inline]
    pub fn annotation(&self) -> ArrayView3<'_, u32> {
        self.annotation.view()
    }

    /// 第 `z_index` 层注释切片. 越界时 panic.
    #[inline]
    pub fn annotation_at(&self, z_index: usize) -> ArrayView2<'_, u32> {
        self.annotation.index_axis(Axis(0), z_index)
    }

    /// 结构层级.
    #[inline]
    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    /// 按键查找结构.
    pub fn structure(&self, key: &RegionKey) -> Option<&Structure> {
        self.structures.iter().find(|s| match key {
            RegionKey::Id(id) => s.id == *id,
            RegionKey::Acronym(a) => s.acronym == *a,
        })
    }

    /// 区域自身及其所有后代的 id 集合.
    pub fn descendant_ids(&self, key: &RegionKey) -> Result<HashSet<u32>, AtlasError> {
        let root = self
            .structure(key)
            .ok_or_else(|| AtlasError::UnknownRegion(key.clone()))?
            .id;
        Ok(self
            .structures
            .iter()
            .filter(|s| s.id == root || s.structure_id_path.contains(&root))
            .map(|s| s.id)
            .collect())
    }

    /// 区域在第 `z_index` 层上的成员掩膜.
    pub fn structure_mask_at(
        &self,
        key: &RegionKey,
        z_index: usize,
    ) -> Result<Array2<bool>, AtlasError> {
        let ids = self.descendant_ids(key)?;
        Ok(self.annotation_at(z_index).map(|id| ids.contains(id)))
    }

    /// 区域在整个图谱上的成员掩膜.
    pub fn structure_mask(&self, key: &RegionKey) -> Result<Array3<bool>, AtlasError> {
        let ids = self.descendant_ids(key)?;
        Ok(self.annotation.map(|id| ids.contains(id)))
    }
}
