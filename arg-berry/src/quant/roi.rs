//! 把带名字的多边形栅格化为区域标签图.

use crate::vector::{fill_polygon, Polygon};
use ndarray::{Array2, ArrayView2};

/// 区域标签图. 0 为背景, `k` 为第 `k` 个出现的区域名.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiLabels {
    names: Vec<String>,
    labels: Array2<u32>,
}

impl RoiLabels {
    /// 按标签顺序排列的区域名. `names()[k - 1]` 对应标签 `k`.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 标签图.
    #[inline]
    pub fn labels(&self) -> ArrayView2<'_, u32> {
        self.labels.view()
    }

    /// 区域名对应的标签, 未绘制时为 `None`.
    pub fn label_of(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32 + 1)
    }

    /// 是否没有任何区域.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 栅格化 `(区域名, 多边形)` 序列.
///
/// 每个多边形先得到各自的原始标签 (按像素中心, 奇偶规则; 后绘制的覆盖先绘制的),
/// 再按区域名合并: 同名的多边形共用一个标签, 标签按区域名首次出现的顺序从 1 开始编号.
/// 被完全覆盖的多边形不计入.
pub fn rasterize_rois(shapes: &[(String, Polygon)], shape: (usize, usize)) -> RoiLabels {
    let mut raw = Array2::<u32>::zeros(shape);
    for (i, (_, poly)) in shapes.iter().enumerate() {
        let label = i as u32 + 1;
        fill_polygon(poly, shape, |pos| raw[pos] = label);
    }

    let mut visible = vec![false; shapes.len() + 1];
    for &r in raw.iter() {
        visible[r as usize] = true;
    }

    let mut names: Vec<String> = Vec::new();
    let mut merged = vec![0u32; shapes.len() + 1];
    for (i, (name, _)) in shapes.iter().enumerate() {
        if !visible[i + 1] {
            log::debug!("shape #{i} ({name}) is fully covered");
            continue;
        }
        let k = match names.iter().position(|n| n == name) {
            Some(k) => k,
            None => {
                names.push(name.clone());
                names.len() - 1
            }
        };
        merged[i + 1] = k as u32 + 1;
    }
    raw.mapv_inplace(|r| merged[r as usize]);
    RoiLabels { names, labels: raw }
}
