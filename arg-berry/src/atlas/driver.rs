//! 图谱矢量化驱动.
//!
//! 一次处理一层切片: 每个区域是一个独立的任务 (栅格化后矢量化),
//! 开启 `rayon` 时并行执行. 任务结果按区域序号归位, 与完成顺序无关,
//! 因此产出的表格是确定的.

use super::tables::{AtlasTables, CentroidTable, PolygonTable, RegionColorTable, Rgba, SliceCentroid, SlicePolygons};
use super::{anatomical_volume, rasterize_region, roi_volume, AtlasConfig, PrepareError};
use crate::consts::atlas::{ANATOMICAL_ENTRY, ROIS_ENTRY, VOLUMES_FILE};
use crate::data::RegionKey;
use crate::vector::{self, Polygon};
use crate::{morph, AtlasVolume};
use ndarray::{Array3, Ix3, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};
use rand::Rng;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;
use tempfile::NamedTempFile;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 图谱准备的全部产物.
#[derive(Debug, Clone)]
pub struct PreparedAtlas {
    /// 三张静态表格.
    pub tables: AtlasTables,
    /// 解剖参考体, `(切片, 画布, 画布)`.
    pub anatomical: Array3<f32>,
    /// 区域叠加体, `(切片, 画布, 画布)`.
    pub rois: Array3<f32>,
}

impl PreparedAtlas {
    /// 写入图谱目录 (不存在时创建).
    ///
    /// 每个文件都先写入临时文件再替换. 体数据归档最后落盘,
    /// 表格写入失败时目录中不会出现新的归档.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), PrepareError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        let mut npz = NpzWriter::new(tmp.as_file_mut());
        npz.add_array(ANATOMICAL_ENTRY, &self.anatomical)?;
        npz.add_array(ROIS_ENTRY, &self.rois)?;
        npz.finish()?;
        self.tables.save(dir)?;
        tmp.persist(dir.join(VOLUMES_FILE)).map_err(|e| e.error)?;
        log::info!("atlas artifacts written to {}", dir.display());
        Ok(())
    }
}

/// 读取图谱目录中的解剖参考体与区域叠加体.
pub fn read_volumes<P: AsRef<Path>>(dir: P) -> Result<(Array3<f32>, Array3<f32>), PrepareError> {
    let mut npz = NpzReader::new(File::open(dir.as_ref().join(VOLUMES_FILE))?)?;
    let anatomical = npz.by_name::<OwnedRepr<f32>, Ix3>(ANATOMICAL_ENTRY)?;
    let rois = npz.by_name::<OwnedRepr<f32>, Ix3>(ROIS_ENTRY)?;
    Ok((anatomical, rois))
}

/// 单个区域任务的输入.
struct RegionTask<'a> {
    name: &'a str,
    ids: &'a HashSet<u32>,
    bilateral: bool,
}

/// 在第 `z` 层上栅格化并矢量化一个区域.
fn run_task(
    atlas: &AtlasVolume,
    cfg: &AtlasConfig,
    z: usize,
    task: &RegionTask,
) -> Result<Vec<Polygon>, PrepareError> {
    let slice = atlas.annotation_at(z).map(|id| task.ids.contains(id) as u8);
    let mask = rasterize_region(slice.view(), &cfg.canvas, cfg.min_object_size, task.bilateral)?;
    vector::vectorize(mask.view(), cfg.tolerance).map_err(|source| PrepareError::Geometry {
        slice: z,
        region: task.name.to_owned(),
        source,
    })
}

/// 矢量化一层切片. `order` 为任务的提交顺序 (区域下标的排列).
fn vectorize_slice(
    atlas: &AtlasVolume,
    cfg: &AtlasConfig,
    z: usize,
    tasks: &[RegionTask],
    order: &[usize],
) -> Result<SlicePolygons, PrepareError> {
    let run = |k: usize| (k, run_task(atlas, cfg, z, &tasks[k]));
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            let done: Vec<_> = order.to_vec().into_par_iter().map(run).collect();
        } else {
            let done: Vec<_> = order.iter().copied().map(run).collect();
        }
    }

    // 按区域序号归位
    let mut slots: Vec<Option<Vec<Polygon>>> = vec![None; tasks.len()];
    for (k, polys) in done {
        slots[k] = Some(polys?);
    }
    let regions = tasks
        .iter()
        .zip(slots)
        .map(|(t, p)| (t.name.to_owned(), p.unwrap_or_default()))
        .collect();
    Ok(SlicePolygons(regions))
}

/// 每层全脑掩膜的质心. 全脑掩膜不做中线切分; 空切片没有质心.
fn slice_centroids(atlas: &AtlasVolume, cfg: &AtlasConfig) -> Result<Vec<SliceCentroid>, PrepareError> {
    let brain = atlas.descendant_ids(&RegionKey::Id(cfg.brain_region_id))?;
    let mut centroids = Vec::with_capacity(atlas.len_slices());
    for z in 0..atlas.len_slices() {
        let slice = atlas.annotation_at(z).map(|id| brain.contains(id) as u8);
        let mask = rasterize_region(slice.view(), &cfg.canvas, cfg.min_object_size, false)?;
        match morph::mask_centroid(mask.view()) {
            Some((y, x)) => centroids.push(SliceCentroid { slice_index: z, y, x }),
            None => log::debug!("slice {z}: empty brain mask, no centroid"),
        }
    }
    Ok(centroids)
}

fn prepare_with_order<R: Rng>(
    atlas: &AtlasVolume,
    cfg: &AtlasConfig,
    rng: &mut R,
    order: &[usize],
) -> Result<PreparedAtlas, PrepareError> {
    cfg.validate()?;
    let ids = cfg
        .regions
        .iter()
        .map(|r| atlas.descendant_ids(&RegionKey::from(r.as_str())))
        .collect::<Result<Vec<_>, _>>()?;
    let tasks: Vec<RegionTask> = cfg
        .regions
        .iter()
        .zip(&ids)
        .map(|(name, ids)| RegionTask {
            name,
            ids,
            bilateral: cfg.is_bilateral(name),
        })
        .collect();

    let colors = RegionColorTable::new(&cfg.regions, || {
        Rgba(rng.random(), rng.random(), rng.random(), cfg.alpha)
    });

    let mut slices = Vec::with_capacity(atlas.len_slices());
    for z in 0..atlas.len_slices() {
        slices.push(vectorize_slice(atlas, cfg, z, &tasks, order)?);
        log::debug!("slice {z}/{} vectorized", atlas.len_slices());
    }
    let centroids = slice_centroids(atlas, cfg)?;
    log::info!(
        "{} slices vectorized, {} with brain centroid",
        slices.len(),
        centroids.len()
    );

    let anatomical = anatomical_volume(atlas, &cfg.canvas)?;
    let rois = roi_volume(atlas, &ids, &cfg.canvas)?;
    Ok(PreparedAtlas {
        tables: AtlasTables {
            colors,
            centroids: CentroidTable::new(centroids),
            shapes: PolygonTable::new(slices),
        },
        anatomical,
        rois,
    })
}

/// 在内存中完成图谱准备. 区域颜色由 `rng` 随机生成.
pub fn prepare_atlas<R: Rng>(
    atlas: &AtlasVolume,
    cfg: &AtlasConfig,
    rng: &mut R,
) -> Result<PreparedAtlas, PrepareError> {
    let order: Vec<usize> = (0..cfg.regions.len()).collect();
    prepare_with_order(atlas, cfg, rng, &order)
}

/// 准备图谱并写入 `dir`.
///
/// 若产物已全部存在且 `force` 为假, 则跳过并返回 `false`.
/// 所有表格都在内存中算完后才会写入.
pub fn prepare_atlas_dir<P: AsRef<Path>, R: Rng>(
    atlas: &AtlasVolume,
    cfg: &AtlasConfig,
    dir: P,
    force: bool,
    rng: &mut R,
) -> Result<bool, PrepareError> {
    let dir = dir.as_ref();
    if !force && AtlasTables::exist_in(dir) && dir.join(VOLUMES_FILE).is_file() {
        log::info!("atlas artifacts found in {}, skipped", dir.display());
        return Ok(false);
    }
    prepare_atlas(atlas, cfg, rng)?.save(dir)?;
    Ok(true)
}
