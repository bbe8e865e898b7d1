//! 切片身份: 由玻片布局和切片在旋转后画面中的位置决定文件名与所属动物.

use crate::SectionId;
use serde::{Deserialize, Serialize};

/// 玻片上的动物.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animals {
    /// 一只动物, 切片以玻片名命名.
    Single,
    /// 两只动物, 左右两半各一只.
    Pair {
        /// 左半部分 (被旋转 180 度的部分) 的动物.
        left: String,
        /// 右半部分的动物.
        right: String,
    },
}

/// 一张扫描玻片的布局.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideLayout {
    /// 玻片名, 即图像文件名去掉扩展名.
    pub base: String,
    /// 玻片是否有两排切片. 为真时左半部分旋转 180 度后与右半部分拼接.
    pub two_rows: bool,
    /// 动物.
    pub animals: Animals,
}

/// 一个切片的完整身份.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionName {
    /// 所属动物. 单只动物时为 `None`.
    pub animal: Option<String>,
    /// 切片身份.
    pub id: SectionId,
}

/// 按标签顺序为切片命名.
///
/// `centroid_rows[i]` 为第 `i` 个切片在旋转后画面中的质心行坐标,
/// `split_row` 为旋转前拼接图宽度的一半.
/// 两排时行坐标小于 `split_row` 的切片来自右半部分; 左右计数器相互独立, 都从 0 开始.
pub fn name_sections(layout: &SlideLayout, centroid_rows: &[f64], split_row: usize) -> Vec<SectionName> {
    let (mut right, mut left) = (0, 0);
    let base = &layout.base;
    centroid_rows
        .iter()
        .enumerate()
        .map(|(i, &row)| {
            if !layout.two_rows {
                return SectionName {
                    animal: None,
                    id: SectionId::new(format!("{base}_{i:03}")),
                };
            }
            let is_right = row < split_row as f64;
            let counter = if is_right { &mut right } else { &mut left };
            let n = *counter;
            *counter += 1;
            match &layout.animals {
                Animals::Pair {
                    left: left_name,
                    right: right_name,
                } => {
                    let animal = if is_right { right_name } else { left_name };
                    SectionName {
                        animal: Some(animal.clone()),
                        id: SectionId::new(format!("{animal}_{n:03}")),
                    }
                }
                Animals::Single => SectionName {
                    animal: None,
                    id: SectionId::new(format!("{base}_{}_{n:03}", if is_right { 1 } else { 2 })),
                },
            }
        })
        .collect()
}
