//! 质心对齐: 仅平移, 使切片的组织质心与图谱切片的全脑质心重合.

use super::segment::tissue_mask;
use super::{SectionError, SegmentConfig};
use crate::atlas::{CentroidTable, SliceCentroid};
use crate::{morph, SectionImage};
use ndarray::{s, Array2, ArrayView2, Axis};

/// 沿 `axis` 循环移位 `shift` 个像素 (正数表示向下标增大方向移动).
fn roll(img: ArrayView2<f32>, shift: isize, axis: Axis) -> Array2<f32> {
    let len = img.len_of(axis);
    if len == 0 {
        return img.to_owned();
    }
    let k = shift.rem_euclid(len as isize) as usize;
    let mut out = Array2::<f32>::zeros(img.raw_dim());
    // out[k..] = img[..len - k], out[..k] = img[len - k..]
    match axis {
        Axis(0) => {
            out.slice_mut(s![k.., ..]).assign(&img.slice(s![..len - k, ..]));
            out.slice_mut(s![..k, ..]).assign(&img.slice(s![len - k.., ..]));
        }
        _ => {
            out.slice_mut(s![.., k..]).assign(&img.slice(s![.., ..len - k]));
            out.slice_mut(s![.., ..k]).assign(&img.slice(s![.., len - k..]));
        }
    }
    out
}

/// 把切片平移到图谱切片的质心.
///
/// 组织掩膜与玻片切分的前五步相同; 只使用第一个连通域 (行优先顺序) 的质心.
/// 平移量为四舍五入后的 `图谱质心 - 切片质心`, 两个轴分别做循环移位.
/// 掩膜为空时原样返回 (平移量为零) 并给出警告.
pub fn align(section: &SectionImage, target: &SliceCentroid, cfg: &SegmentConfig) -> SectionImage {
    let mask = tissue_mask(section.data(), cfg);
    let areas = morph::areas(mask.view());
    if areas.len() > 1 {
        log::debug!("{}: {} tissue components, using the first", section.id(), areas.len());
    }
    let Some((cy, cx)) = areas.first().and_then(|a| morph::centroid(a)) else {
        log::warn!("{}: no tissue found, section left unaligned", section.id());
        return section.aligned(section.data().to_owned(), (0, 0));
    };
    let dy = (target.y - cy).round() as isize;
    let dx = (target.x - cx).round() as isize;
    let data = roll(section.data(), dy, Axis(0));
    let data = roll(data.view(), dx, Axis(1));
    log::debug!("{}: shifted by ({dy}, {dx})", section.id());
    section.aligned(data, (dy, dx))
}

/// 按切片序号查找质心后对齐. 质心表中没有该切片时报错.
pub fn align_to_slice(
    section: &SectionImage,
    centroids: &CentroidTable,
    slice_index: usize,
    cfg: &SegmentConfig,
) -> Result<SectionImage, SectionError> {
    let target = centroids
        .get(slice_index)
        .ok_or(SectionError::MissingCentroid(slice_index))?;
    Ok(align(section, target, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SectionId;
    use ndarray::array;

    fn cfg() -> SegmentConfig {
        SegmentConfig {
            median_size: 3,
            opening_size: 3,
            min_section_size: 20,
            ..SegmentConfig::default()
        }
    }

    #[test]
    fn test_roll() {
        let img = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(roll(img.view(), 1, Axis(1)), array![[3.0, 1.0, 2.0], [6.0, 4.0, 5.0]]);
        assert_eq!(roll(img.view(), -1, Axis(1)), array![[2.0, 3.0, 1.0], [5.0, 6.0, 4.0]]);
        assert_eq!(roll(img.view(), 3, Axis(0)), array![[4.0, 5.0, 6.0], [1.0, 2.0, 3.0]]);
    }

    /// 两个轴的平移都生效.
    #[test]
    fn test_align_both_axes() {
        let mut data = Array2::<f32>::from_elem((40, 40), 5.0);
        data.slice_mut(s![4..14, 6..16]).fill(100.0);
        let section = SectionImage::new(SectionId::new("s_000"), data);
        let target = SliceCentroid {
            slice_index: 0,
            y: 20.0,
            x: 25.0,
        };
        let out = align(&section, &target, &cfg());
        // 质心去掉四角后仍为 (8.5, 10.5), 平移量四舍五入
        assert_eq!(out.offset(), Some((12, 15)));
        assert_eq!(out.data()[(16, 21)], 100.0);
        assert_eq!(out.data()[(25, 30)], 100.0);
        assert_eq!(out.data()[(15, 21)], 5.0);
        // 原图不变
        assert_eq!(section.offset(), None);
        assert_eq!(section.data()[(4, 6)], 100.0);
    }

    #[test]
    fn test_align_empty_and_missing() {
        let section = SectionImage::new(SectionId::new("blank"), Array2::zeros((30, 30)));
        let target = SliceCentroid {
            slice_index: 3,
            y: 1.0,
            x: 1.0,
        };
        let out = align(&section, &target, &cfg());
        assert_eq!(out.offset(), Some((0, 0)));
        assert_eq!(out.data(), section.data());

        let table = CentroidTable::new(vec![target]);
        assert!(align_to_slice(&section, &table, 3, &cfg()).is_ok());
        assert!(matches!(
            align_to_slice(&section, &table, 4, &cfg()),
            Err(SectionError::MissingCentroid(4))
        ));
    }
}
