//! 背景校正后的单位面积均值.

use super::{QuantError, QuantResult, ResultsRow, RoiLabels};
use ndarray::ArrayView2;

/// 单个区域的指标: 均值高于背景时为 `(均值 - 背景) / 面积`, 否则为 0.
///
/// 面积为 0 (区域未绘制) 时为 NaN.
#[inline]
pub fn per_pixel_metric(mean: f64, background: f64, area: usize) -> f64 {
    if area == 0 {
        return f64::NAN;
    }
    if mean > background {
        (mean - background) / area as f64
    } else {
        0.0
    }
}

/// 计算一张对齐后切片的结果行.
///
/// `All_ROIs` 统计所有非零标签的像素; `schema` 中的每个区域按名字查找标签,
/// 未绘制的区域为 NaN. 绘制了但不在 `schema` 中的区域只计入 `All_ROIs`.
pub fn quantify(
    image_filename: &str,
    intensity: ArrayView2<f32>,
    rois: &RoiLabels,
    background: f64,
    schema: &[String],
) -> QuantResult<ResultsRow> {
    let labels = rois.labels();
    if intensity.dim() != labels.dim() {
        return Err(QuantError::ShapeMismatch {
            intensity: intensity.dim(),
            labels: labels.dim(),
        });
    }

    // 下标 0 为背景
    let n = rois.names().len();
    let mut sums = vec![0f64; n + 1];
    let mut areas = vec![0usize; n + 1];
    for (&l, &v) in labels.iter().zip(intensity.iter()) {
        sums[l as usize] += v as f64;
        areas[l as usize] += 1;
    }
    let metric = |sum: f64, area: usize| {
        let mean = if area == 0 { f64::NAN } else { sum / area as f64 };
        per_pixel_metric(mean, background, area)
    };

    let all_area: usize = areas[1..].iter().sum();
    let all_sum: f64 = sums[1..].iter().sum();
    let all_rois = metric(all_sum, all_area);

    for name in rois.names() {
        if !schema.contains(name) {
            log::warn!("{image_filename}: region {name} is not a result column, counted in All_ROIs only");
        }
    }
    let regions = schema
        .iter()
        .map(|name| {
            let value = match rois.label_of(name) {
                Some(k) => metric(sums[k as usize], areas[k as usize]),
                None => f64::NAN,
            };
            (name.clone(), value)
        })
        .collect();

    Ok(ResultsRow {
        image_filename: image_filename.to_string(),
        all_rois,
        regions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::rasterize_rois;
    use ndarray::Array2;

    fn square(x0: i32, y0: i32, side: i32) -> crate::vector::Polygon {
        vec![
            [x0, y0],
            [x0 + side, y0],
            [x0 + side, y0 + side],
            [x0, y0 + side],
            [x0, y0],
        ]
    }

    fn schema() -> Vec<String> {
        ["CB", "HIP", "TH"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quantify() {
        let mut img = Array2::<f32>::from_elem((20, 20), 10.0);
        // CB: 4x4 像素, 强度 30
        img.slice_mut(ndarray::s![0..4, 0..4]).fill(30.0);
        let shapes = vec![
            ("CB".to_string(), square(0, 0, 4)),
            ("TH".to_string(), square(10, 10, 2)),
        ];
        let rois = rasterize_rois(&shapes, (20, 20));
        let row = quantify("s_000.tif", img.view(), &rois, 10.0, &schema()).unwrap();

        assert_eq!(row.image_filename, "s_000.tif");
        // 全部: 面积 20, 均值 (16 * 30 + 4 * 10) / 20 = 26
        assert!((row.all_rois - 16.0 / 20.0).abs() < 1e-12);
        assert!((row.regions[0].1 - 20.0 / 16.0).abs() < 1e-12);
        // 未绘制的区域为 NaN
        assert_eq!(row.regions[1].0, "HIP");
        assert!(row.regions[1].1.is_nan());
        // 均值等于背景时为 0
        assert_eq!(row.regions[2].1, 0.0);
    }

    /// 背景扣除不会产生负值.
    #[test]
    fn test_background_floor() {
        let img = Array2::<f32>::from_elem((10, 10), 5.0);
        let rois = rasterize_rois(&[("CB".to_string(), square(1, 1, 3))], (10, 10));
        let row = quantify("a.tif", img.view(), &rois, 50.0, &schema()).unwrap();
        assert_eq!(row.all_rois, 0.0);
        assert_eq!(row.regions[0].1, 0.0);
        assert!(per_pixel_metric(1.0, 2.0, 7) >= 0.0);
    }

    #[test]
    fn test_nothing_drawn() {
        let img = Array2::<f32>::from_elem((6, 6), 5.0);
        let rois = rasterize_rois(&[], (6, 6));
        let row = quantify("a.tif", img.view(), &rois, 0.0, &schema()).unwrap();
        assert!(row.all_rois.is_nan());
        assert!(row.regions.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn test_shape_mismatch() {
        let img = Array2::<f32>::zeros((6, 6));
        let rois = rasterize_rois(&[], (5, 6));
        assert!(matches!(
            quantify("a.tif", img.view(), &rois, 0.0, &schema()),
            Err(QuantError::ShapeMismatch { .. })
        ));
    }
}
