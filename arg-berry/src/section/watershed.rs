//! 标记控制的分水岭 (4-连通, 优先级洪水填充).

use crate::morph::n4_positions;
use crate::{BinaryMask, Idx2d};
use binary_heap_plus::BinaryHeap;
use ndarray::{Array2, ArrayView2};

/// 从 `markers` 的非零种子出发, 按 `surface` 由低到高洪水填充 `mask` 内的像素.
///
/// 同一高度的像素先入堆者先出, 使结果与实现细节无关. 像素在入堆时即获得标签.
/// `mask` 外的像素保持为 0; 与任何种子都不连通的前景也保持为 0.
pub fn watershed(surface: ArrayView2<f64>, markers: ArrayView2<u32>, mask: &BinaryMask) -> Array2<u32> {
    let shape = surface.dim();
    let mut labels = Array2::<u32>::zeros(shape);

    // 堆顶为 (高度, 入堆序号) 最小者
    let mut heap: BinaryHeap<(f64, usize, Idx2d), _> =
        BinaryHeap::new_by(|a: &(f64, usize, Idx2d), b: &(f64, usize, Idx2d)| {
            b.0.total_cmp(&a.0).then(b.1.cmp(&a.1))
        });
    let mut age = 0;
    for (pos, &m) in markers.indexed_iter() {
        if m != 0 && mask[pos] {
            labels[pos] = m;
            heap.push((surface[pos], age, pos));
            age += 1;
        }
    }

    while let Some((_, _, pos)) = heap.pop() {
        let label = labels[pos];
        for n in n4_positions(pos, shape) {
            if labels[n] == 0 && mask[n] {
                labels[n] = label;
                heap.push((surface[n], age, n));
                age += 1;
            }
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph;

    /// 两个相接的圆盘在颈部被分开.
    #[test]
    fn test_split_touching_disks() {
        let mask = Array2::from_shape_fn((30, 50), |(r, c)| {
            let d1 = (r as f64 - 15.0).powi(2) + (c as f64 - 14.0).powi(2);
            let d2 = (r as f64 - 15.0).powi(2) + (c as f64 - 35.0).powi(2);
            d1 <= 100.0 || d2 <= 100.0
        });
        assert_eq!(morph::areas(mask.view()).len(), 1);
        let dist = morph::distance_transform_edt(mask.view());
        let mut markers = Array2::<u32>::zeros(mask.dim());
        markers[(15, 14)] = 1;
        markers[(15, 35)] = 2;
        let labels = watershed(dist.mapv(|d| -d).view(), markers.view(), &mask);

        assert!(labels.iter().zip(mask.iter()).all(|(&l, &m)| (l > 0) == m));
        assert_eq!(labels[(15, 5)], 1);
        assert_eq!(labels[(15, 44)], 2);
        // 颈部以左属于 1, 以右属于 2
        assert!((0..30).all(|r| labels[(r, 20)] != 2 && labels[(r, 29)] != 1));
    }

    #[test]
    fn test_unreached_foreground_stays_zero() {
        let mut mask = BinaryMask::from_elem((5, 9), false);
        mask.slice_mut(ndarray::s![.., 0..3]).fill(true);
        mask.slice_mut(ndarray::s![.., 6..9]).fill(true);
        let mut markers = Array2::<u32>::zeros((5, 9));
        markers[(2, 1)] = 7;
        let labels = watershed(Array2::zeros((5, 9)).view(), markers.view(), &mask);
        assert_eq!(labels.iter().filter(|&&l| l == 7).count(), 15);
        assert_eq!(labels[(2, 7)], 0);
    }
}
