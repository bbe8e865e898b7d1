//! 玻片切分: 把一张扫描玻片拆成若干个独立的组织切片.

use super::identity::{name_sections, SectionName, SlideLayout};
use super::peaks::peak_local_max;
use super::watershed::watershed;
use super::{SegmentConfig, SectionError};
use crate::atlas::pad_to_canvas;
use crate::dataset::SlideDirs;
use crate::{morph, BinaryMask, ImgWriteRaw, SectionImage};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use std::fs;
use std::path::{Path, PathBuf};

/// 读取一张扫描玻片. 文件必须存在且扩展名为 `.tif`/`.tiff`.
pub fn read_slide<P: AsRef<Path>>(path: P) -> Result<Array2<f32>, SectionError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SectionError::Missing(path.to_path_buf()));
    }
    let is_tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
    if !is_tiff {
        return Err(SectionError::NotTiff(path.to_path_buf()));
    }
    Ok(crate::data::read_gray(path)?)
}

/// 组织掩膜: 中值滤波, Otsu 阈值, 填洞, 方形开运算, 去除小连通域.
///
/// Otsu 阈值不存在 (空图像) 时返回全背景.
pub fn tissue_mask(img: ArrayView2<f32>, cfg: &SegmentConfig) -> BinaryMask {
    let blurred = morph::median_filter(img, cfg.median_size);
    let Some(t) = morph::otsu_threshold(blurred.view()) else {
        return BinaryMask::from_elem(img.raw_dim(), false);
    };
    let mask = blurred.mapv(|v| v > t);
    let mask = morph::fill_holes(mask.view());
    let mask = morph::opening_square(mask.view(), cfg.opening_size);
    morph::remove_small_objects(mask.view(), cfg.min_section_size)
}

/// 两排玻片的拼接: 左半部分 `[:, ..w / 2]` 旋转 180 度后与右半部分横向拼接.
pub fn split_and_rotate<T: Clone>(img: ArrayView2<T>) -> Array2<T> {
    let half = img.ncols() / 2;
    let left = img.slice(s![..;-1, ..half;-1]);
    let right = img.slice(s![.., half..]);
    // 两半行数相同, 拼接不会失败
    concatenate(Axis(1), &[left, right]).unwrap_or_else(|_| img.to_owned())
}

/// 逆时针旋转 90 度: `out[i, j] = in[j, w - 1 - i]`.
pub fn rot90_ccw<T: Clone>(img: ArrayView2<T>) -> Array2<T> {
    img.slice(s![.., ..;-1]).t().to_owned()
}

/// 标签 `label` 的外接矩形裁剪, 矩形内不属于该标签的像素置零.
fn crop_label(intensity: ArrayView2<f32>, labels: ArrayView2<u32>, label: u32) -> Option<Array2<f32>> {
    let (mut r0, mut c0, mut r1, mut c1) = (usize::MAX, usize::MAX, 0, 0);
    for ((r, c), _) in labels.indexed_iter().filter(|&(_, &l)| l == label) {
        r0 = r0.min(r);
        c0 = c0.min(c);
        r1 = r1.max(r + 1);
        c1 = c1.max(c + 1);
    }
    if r0 == usize::MAX {
        return None;
    }
    let lab = labels.slice(s![r0..r1, c0..c1]);
    let mut out = intensity.slice(s![r0..r1, c0..c1]).to_owned();
    out.zip_mut_with(&lab, |v, &l| {
        if l != label {
            *v = 0.0;
        }
    });
    Some(out)
}

/// 切分结果.
#[derive(Debug, Clone)]
pub struct SegmentedSlide {
    /// 旋转 90 度之前的拼接图, 用于之后的背景测量.
    pub composite: Array2<f32>,
    /// 按标签顺序排列的切片, 已填充到画布.
    pub sections: Vec<(SectionName, SectionImage)>,
}

/// 切分一张玻片.
///
/// 拼接 (两排时) 并逆时针旋转 90 度后, 以组织掩膜的距离变换局部极大值为种子做分水岭,
/// 每个标签按升序裁剪并对称填充到画布. 参数不合适时切片可能被合并或拆散, 此时不报错.
pub fn segment_slide(
    img: ArrayView2<f32>,
    layout: &SlideLayout,
    cfg: &SegmentConfig,
) -> Result<SegmentedSlide, SectionError> {
    // 掩膜在原图上计算, 再与强度图做同样的拼接
    let mask = tissue_mask(img, cfg);
    let (composite, mask) = if layout.two_rows {
        (split_and_rotate(img), split_and_rotate(mask.view()))
    } else {
        (img.to_owned(), mask)
    };
    let mask = rot90_ccw(mask.view());
    let rotated = rot90_ccw(composite.view());

    let distance = morph::distance_transform_edt(mask.view());
    let peaks = peak_local_max(distance.view(), cfg.peak_footprint, cfg.peak_min_distance);
    let mut seeds = BinaryMask::from_elem(mask.raw_dim(), false);
    peaks.iter().for_each(|&p| seeds[p] = true);
    let (markers, n) = morph::label(seeds.view());
    let labels = watershed(distance.mapv(|d| -d).view(), markers.view(), &mask);
    log::debug!("{}: {} seeds", layout.base, n);

    let mut crops = Vec::with_capacity(n);
    let mut rows = Vec::with_capacity(n);
    for label in 1..=n as u32 {
        let Some(crop) = crop_label(rotated.view(), labels.view(), label) else {
            continue;
        };
        let area: Vec<_> = labels
            .indexed_iter()
            .filter(|&(_, &l)| l == label)
            .map(|(p, _)| p)
            .collect();
        let Some((row, _)) = morph::centroid(&area) else {
            continue;
        };
        crops.push(pad_to_canvas(crop.view(), cfg.canvas_size)?);
        rows.push(row);
    }

    let names = name_sections(layout, &rows, composite.ncols() / 2);
    let sections = names
        .into_iter()
        .zip(crops)
        .map(|(name, data)| {
            let image = SectionImage::new(name.id.clone(), data);
            (name, image)
        })
        .collect::<Vec<_>>();
    log::info!("{}: {} sections", layout.base, sections.len());
    Ok(SegmentedSlide {
        composite,
        sections,
    })
}

impl SegmentedSlide {
    /// 按目录布局写入 `out_dir`, 返回写入的切片路径.
    ///
    /// 切片写入 `<out>/<玻片>[/<动物>]/sections/<身份>.tif`,
    /// 拼接图写入每只动物的 `tiff/<玻片>.tif`.
    pub fn save<P: AsRef<Path>>(&self, out_dir: P, layout: &SlideLayout) -> Result<Vec<PathBuf>, SectionError> {
        let dirs = SlideDirs::new(out_dir, layout);
        for data_dir in dirs.data_dirs() {
            fs::create_dir_all(data_dir.sections())?;
            fs::create_dir_all(data_dir.tiff())?;
            self.composite
                .save_raw(data_dir.tiff().join(format!("{}.tif", layout.base)))?;
        }
        let mut written = Vec::with_capacity(self.sections.len());
        for (name, image) in &self.sections {
            let path = dirs
                .data_dir(name.animal.as_deref())
                .sections()
                .join(name.id.file_name());
            image.save_raw(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Animals;
    use ndarray::array;

    #[test]
    fn test_rot90_ccw() {
        let img = array![[1, 2, 3], [4, 5, 6]];
        assert_eq!(rot90_ccw(img.view()), array![[3, 6], [2, 5], [1, 4]]);
    }

    #[test]
    fn test_split_and_rotate() {
        let img = array![[1, 2, 3, 4, 5], [6, 7, 8, 9, 10]];
        assert_eq!(split_and_rotate(img.view()), array![[7, 6, 3, 4, 5], [2, 1, 8, 9, 10]]);
    }

    #[test]
    fn test_crop_label() {
        let intensity = Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f32);
        let labels = array![[0, 0, 0, 0, 0], [0, 2, 2, 1, 0], [0, 2, 1, 1, 0], [0, 0, 0, 0, 0]];
        let crop = crop_label(intensity.view(), labels.view(), 1).unwrap();
        assert_eq!(crop, array![[0.0, 8.0], [12.0, 13.0]]);
        assert!(crop_label(intensity.view(), labels.view(), 3).is_none());
    }

    fn small_config() -> SegmentConfig {
        SegmentConfig {
            median_size: 3,
            opening_size: 3,
            min_section_size: 30,
            peak_footprint: 15,
            peak_min_distance: 10,
            canvas_size: 40,
        }
    }

    /// 一排玻片上的两个矩形切片: 旋转后按标签顺序命名并填充到画布.
    #[test]
    fn test_segment_single_row() {
        let mut img = Array2::<f32>::from_elem((30, 60), 10.0);
        img.slice_mut(s![5..25, 5..20]).fill(200.0);
        img.slice_mut(s![8..22, 35..55]).fill(300.0);
        let layout = SlideLayout {
            base: "slide".into(),
            two_rows: false,
            animals: Animals::Single,
        };
        let seg = segment_slide(img.view(), &layout, &small_config()).unwrap();
        assert_eq!(seg.sections.len(), 2);
        assert_eq!(seg.composite, img);

        // 逆时针旋转后右侧的切片在上方, 先被标记
        let (name0, s0) = &seg.sections[0];
        assert_eq!(name0.id.as_str(), "slide_000");
        assert_eq!(s0.shape(), (40, 40));
        // 中值滤波去掉了四个角
        assert_eq!(s0.data().iter().filter(|&&v| v == 300.0).count(), 14 * 20 - 4);
        let (_, s1) = &seg.sections[1];
        assert_eq!(s1.data().iter().filter(|&&v| v == 200.0).count(), 20 * 15 - 4);
        assert!(s1.data().iter().all(|&v| v == 0.0 || v == 200.0));
    }

    /// 两排两只动物: 左半部分的切片归属左侧动物, 右半部分归属右侧动物.
    #[test]
    fn test_segment_two_rows_and_save() {
        let mut img = Array2::<f32>::from_elem((30, 80), 10.0);
        img.slice_mut(s![5..25, 8..28]).fill(200.0);
        img.slice_mut(s![5..25, 50..70]).fill(300.0);
        let layout = SlideLayout {
            base: "slide2".into(),
            two_rows: true,
            animals: Animals::Pair {
                left: "ratL".into(),
                right: "ratR".into(),
            },
        };
        let seg = segment_slide(img.view(), &layout, &small_config()).unwrap();
        assert_eq!(seg.sections.len(), 2);
        for (name, image) in &seg.sections {
            let v = image.data().iter().copied().fold(0.0, f32::max);
            match name.animal.as_deref() {
                Some("ratR") => assert_eq!(v, 300.0),
                Some("ratL") => assert_eq!(v, 200.0),
                other => panic!("unexpected animal {other:?}"),
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let written = seg.save(dir.path(), &layout).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.is_file()));
        assert!(dir.path().join("slide2/ratL/sections/ratL_000.tif").is_file());
        assert!(dir.path().join("slide2/ratR/tiff/slide2.tif").is_file());
        assert!(dir.path().join("slide2/ratL/tiff/slide2.tif").is_file());
    }

    #[test]
    fn test_read_slide_checks() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.tif");
        assert!(matches!(read_slide(&missing), Err(SectionError::Missing(_))));

        let png = dir.path().join("slide.png");
        Array2::<f32>::from_elem((4, 4), 3.0).save_raw(&png).unwrap();
        assert!(matches!(read_slide(&png), Err(SectionError::NotTiff(_))));

        let tif = dir.path().join("slide.tiff");
        Array2::<f32>::from_elem((4, 4), 3.0).save_raw(&tif).unwrap();
        assert_eq!(read_slide(&tif).unwrap()[(1, 1)], 3.0);
    }

    #[test]
    fn test_oversized_section() {
        let mut img = Array2::<f32>::from_elem((60, 60), 10.0);
        img.slice_mut(s![5..55, 5..55]).fill(200.0);
        let layout = SlideLayout {
            base: "big".into(),
            two_rows: false,
            animals: Animals::Single,
        };
        assert!(matches!(
            segment_slide(img.view(), &layout, &small_config()),
            Err(SectionError::Canvas(_))
        ));
    }
}
