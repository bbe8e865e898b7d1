//! 图谱准备产出的静态表格.
//!
//! 三张表都以 JSON 保存, 带有版本号, 读取时校验:
//!
//! 1. 区域颜色表 `{ "version": 1, "regions": { name: [id, [r, g, b, a]] } }`,
//!   对象键的顺序即区域顺序, `id` 必须依次为 `1..=n`.
//! 2. 切片质心表 `{ "version": 1, "centroids": [{ slice_index, centroid_y, centroid_x }] }`,
//!   `slice_index` 严格递增.
//! 3. 区域多边形表 `{ "version": 1, "slices": { "<slice>": { name: [polygon, ...] } } }`,
//!   每层的区域键必须与颜色表的区域顺序完全一致.
//!
//! `serde_json` 默认的 `Map` 不保序, 因此对象都经由 [`ordered_map`] 按流顺序读写.

use crate::consts::atlas::{ROI_COLORS_FILE, ROI_SHAPES_FILE, SLICE_CENTROIDS_FILE, TABLE_VERSION};
use crate::vector::Polygon;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// 表格读写错误.
#[derive(Debug, Error)]
pub enum TableError {
    /// 文件读写失败.
    #[error("table io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 格式错误.
    #[error("malformed table: {0}")]
    Json(#[from] serde_json::Error),

    /// 版本号不匹配.
    #[error("{file}: expect version {}, found {found}", TABLE_VERSION)]
    Version {
        /// 表格文件名.
        file: &'static str,
        /// 文件中的版本号.
        found: u32,
    },

    /// 内容不合法.
    #[error("{file}: {reason}")]
    Invalid {
        /// 表格文件名.
        file: &'static str,
        /// 原因.
        reason: String,
    },
}

/// 表格操作的结果.
pub type TableResult<T> = Result<T, TableError>;

/// 保序的 JSON 对象读写, 用于 `Vec<(String, V)>` 字段.
pub(crate) mod ordered_map {
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S: Serializer, V: Serialize>(
        entries: &[(String, V)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    out.push(entry);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> TableResult<T> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

/// 先写入同目录下的临时文件, 完成后再替换目标. 失败时原文件不变.
fn write_json<T: Serialize>(value: &T, path: &Path) -> TableResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(parent)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut w, value)?;
        w.write_all(b"\n")?;
        w.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn check_version(file: &'static str, found: u32) -> TableResult<()> {
    if found == TABLE_VERSION {
        Ok(())
    } else {
        Err(TableError::Version { file, found })
    }
}

/// 颜色, 序列化为 `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub f64);

/// 区域定义. `numeric_id` 是区域在配置列表中从 1 开始的位置.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDefinition {
    /// 区域缩写.
    pub name: String,
    /// 区域序号, 从 1 开始.
    pub numeric_id: u32,
    /// 显示颜色.
    pub color: Rgba,
}

mod region_entries {
    use super::{ordered_map, RegionDefinition, Rgba};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(defs: &[RegionDefinition], s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(defs.iter().map(|d| (&d.name, (d.numeric_id, d.color))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RegionDefinition>, D::Error> {
        Ok(ordered_map::deserialize::<D, (u32, Rgba)>(d)?
            .into_iter()
            .map(|(name, (numeric_id, color))| RegionDefinition {
                name,
                numeric_id,
                color,
            })
            .collect())
    }
}

/// 区域颜色表.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionColorTable {
    version: u32,
    #[serde(with = "region_entries")]
    regions: Vec<RegionDefinition>,
}

impl RegionColorTable {
    /// 按给定顺序为每个区域分配序号与颜色.
    pub fn new<S: AsRef<str>>(names: &[S], mut color: impl FnMut() -> Rgba) -> Self {
        let regions = names
            .iter()
            .zip(1..)
            .map(|(n, numeric_id)| RegionDefinition {
                name: n.as_ref().to_owned(),
                numeric_id,
                color: color(),
            })
            .collect();
        Self {
            version: TABLE_VERSION,
            regions,
        }
    }

    /// 全部区域, 按序号排列.
    #[inline]
    pub fn regions(&self) -> &[RegionDefinition] {
        &self.regions
    }

    /// 区域名称, 按序号排列.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.name.as_str())
    }

    /// 按名称查找.
    pub fn get(&self, name: &str) -> Option<&RegionDefinition> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// 校验版本与序号.
    pub fn validate(&self) -> TableResult<()> {
        check_version(ROI_COLORS_FILE, self.version)?;
        for (i, r) in self.regions.iter().enumerate() {
            if r.numeric_id as usize != i + 1 {
                return Err(TableError::Invalid {
                    file: ROI_COLORS_FILE,
                    reason: format!("region `{}` has id {}, expect {}", r.name, r.numeric_id, i + 1),
                });
            }
            if self.regions[..i].iter().any(|p| p.name == r.name) {
                return Err(TableError::Invalid {
                    file: ROI_COLORS_FILE,
                    reason: format!("duplicated region `{}`", r.name),
                });
            }
        }
        Ok(())
    }

    /// 读取并校验.
    pub fn open<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        let table: Self = read_json(path.as_ref())?;
        table.validate()?;
        Ok(table)
    }

    /// 写入.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TableResult<()> {
        write_json(self, path.as_ref())
    }
}

/// 某层图谱全脑掩膜在画布坐标中的质心.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceCentroid {
    /// 切片序号.
    pub slice_index: usize,
    /// 行坐标.
    #[serde(rename = "centroid_y")]
    pub y: f64,
    /// 列坐标.
    #[serde(rename = "centroid_x")]
    pub x: f64,
}

/// 切片质心表. 空切片没有条目.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidTable {
    version: u32,
    centroids: Vec<SliceCentroid>,
}

impl CentroidTable {
    /// 由按切片序号排列的质心创建.
    pub fn new(centroids: Vec<SliceCentroid>) -> Self {
        Self {
            version: TABLE_VERSION,
            centroids,
        }
    }

    /// 全部质心.
    #[inline]
    pub fn centroids(&self) -> &[SliceCentroid] {
        &self.centroids
    }

    /// 第 `slice_index` 层的质心.
    pub fn get(&self, slice_index: usize) -> Option<&SliceCentroid> {
        self.centroids
            .binary_search_by_key(&slice_index, |c| c.slice_index)
            .ok()
            .map(|i| &self.centroids[i])
    }

    /// 校验版本与顺序.
    pub fn validate(&self) -> TableResult<()> {
        check_version(SLICE_CENTROIDS_FILE, self.version)?;
        if let Some(w) = self
            .centroids
            .windows(2)
            .find(|w| w[0].slice_index >= w[1].slice_index)
        {
            return Err(TableError::Invalid {
                file: SLICE_CENTROIDS_FILE,
                reason: format!("slice {} listed after {}", w[1].slice_index, w[0].slice_index),
            });
        }
        Ok(())
    }

    /// 读取并校验.
    pub fn open<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        let table: Self = read_json(path.as_ref())?;
        table.validate()?;
        Ok(table)
    }

    /// 写入.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TableResult<()> {
        write_json(self, path.as_ref())
    }
}

/// 一层切片上各区域的多边形, 按区域顺序排列.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlicePolygons(#[serde(with = "ordered_map")] pub Vec<(String, Vec<Polygon>)>);

impl SlicePolygons {
    /// 按区域名称查找.
    pub fn get(&self, region: &str) -> Option<&[Polygon]> {
        self.0
            .iter()
            .find(|(name, _)| name == region)
            .map(|(_, p)| p.as_slice())
    }

    /// 按区域顺序遍历.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Polygon])> {
        self.0.iter().map(|(n, p)| (n.as_str(), p.as_slice()))
    }
}

/// 区域多边形表. 键为切片序号的十进制字符串.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonTable {
    version: u32,
    #[serde(with = "ordered_map")]
    slices: Vec<(String, SlicePolygons)>,
}

impl PolygonTable {
    /// 由按切片序号排列的各层多边形创建.
    pub fn new(slices: Vec<SlicePolygons>) -> Self {
        Self {
            version: TABLE_VERSION,
            slices: slices
                .into_iter()
                .enumerate()
                .map(|(i, s)| (i.to_string(), s))
                .collect(),
        }
    }

    /// 切片个数.
    #[inline]
    pub fn len_slices(&self) -> usize {
        self.slices.len()
    }

    /// 第 `slice_index` 层.
    pub fn slice(&self, slice_index: usize) -> Option<&SlicePolygons> {
        self.slices.get(slice_index).map(|(_, s)| s)
    }

    /// 校验版本, 切片键, 以及每层的区域顺序.
    pub fn validate(&self, colors: &RegionColorTable) -> TableResult<()> {
        check_version(ROI_SHAPES_FILE, self.version)?;
        let invalid = |reason| TableError::Invalid {
            file: ROI_SHAPES_FILE,
            reason,
        };
        for (i, (key, polys)) in self.slices.iter().enumerate() {
            if key.parse::<usize>().ok() != Some(i) {
                return Err(invalid(format!("slice key `{key}` at position {i}")));
            }
            if !polys.0.iter().map(|(n, _)| n.as_str()).eq(colors.names()) {
                return Err(invalid(format!("slice {i}: regions differ from the colour table")));
            }
        }
        Ok(())
    }

    /// 写入.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TableResult<()> {
        write_json(self, path.as_ref())
    }
}

/// 分析阶段使用的三张表, 已相互校验.
#[derive(Debug, Clone)]
pub struct AtlasTables {
    /// 区域颜色表.
    pub colors: RegionColorTable,
    /// 切片质心表.
    pub centroids: CentroidTable,
    /// 区域多边形表.
    pub shapes: PolygonTable,
}

impl AtlasTables {
    /// 从图谱目录读取三张表.
    pub fn open<P: AsRef<Path>>(dir: P) -> TableResult<Self> {
        let dir = dir.as_ref();
        let colors = RegionColorTable::open(dir.join(ROI_COLORS_FILE))?;
        let centroids = CentroidTable::open(dir.join(SLICE_CENTROIDS_FILE))?;
        let shapes: PolygonTable = read_json(&dir.join(ROI_SHAPES_FILE))?;
        shapes.validate(&colors)?;
        log::info!(
            "atlas tables loaded: {} regions, {} slices, {} centroids",
            colors.regions.len(),
            shapes.len_slices(),
            centroids.centroids.len()
        );
        Ok(Self {
            colors,
            centroids,
            shapes,
        })
    }

    /// 写入图谱目录.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> TableResult<()> {
        let dir = dir.as_ref();
        self.colors.save(dir.join(ROI_COLORS_FILE))?;
        self.centroids.save(dir.join(SLICE_CENTROIDS_FILE))?;
        self.shapes.save(dir.join(ROI_SHAPES_FILE))
    }

    /// 三张表是否都已存在.
    pub fn exist_in<P: AsRef<Path>>(dir: P) -> bool {
        let dir = dir.as_ref();
        [ROI_COLORS_FILE, SLICE_CENTROIDS_FILE, ROI_SHAPES_FILE]
            .iter()
            .all(|f| dir.join(f).is_file())
    }
}
