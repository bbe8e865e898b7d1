use super::n4_positions;
use crate::{Area2d, Areas2d, Idx2d, Idx2dF};
use ndarray::{Array2, ArrayView2};
use std::collections::VecDeque;

/// 按照 4-相邻规则获取掩膜中所有前景区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
/// 当且仅当存在一条从 `p1` 到 `p2` 的 4-相邻路径, 且路径上的所有像素都是前景.
///
/// 区域按其第一个像素的行优先顺序排列; 区域内部的像素按 BFS 顺序排列.
pub fn areas(mask: ArrayView2<bool>) -> Areas2d {
    let &[h, w] = mask.shape() else {
        unreachable!()
    };
    let mut ans = Areas2d::with_capacity(1);
    let mut bfs_q = VecDeque::with_capacity(4);
    let mut visited = Array2::<bool>::from_elem((h, w), false);

    for (pos, &fg) in mask.indexed_iter() {
        if !fg || visited[pos] {
            continue;
        }
        visited[pos] = true;
        bfs_q.push_back(pos);
        let mut this_area = Area2d::with_capacity(1);
        while let Some(cur) = bfs_q.pop_front() {
            this_area.push(cur);
            for neigh in n4_positions(cur, (h, w)) {
                if mask[neigh] && !visited[neigh] {
                    visited[neigh] = true;
                    bfs_q.push_back(neigh);
                }
            }
        }
        ans.push(this_area);
    }
    ans
}

/// 连通域标记. 背景为 0, 区域按行优先的首次出现顺序从 1 开始编号.
///
/// 返回 `(标签图, 区域个数)`.
pub fn label(mask: ArrayView2<bool>) -> (Array2<u32>, usize) {
    let found = areas(mask);
    let mut labels = Array2::<u32>::zeros(mask.raw_dim());
    for (i, area) in found.iter().enumerate() {
        let id = (i + 1) as u32;
        area.iter().for_each(|&p| labels[p] = id);
    }
    (labels, found.len())
}

/// 像素集合的质心 `(行, 列)`. 空集合返回 `None`.
pub fn centroid(area: &[Idx2d]) -> Option<Idx2dF> {
    if area.is_empty() {
        return None;
    }
    let n = area.len() as f64;
    let (sh, sw) = area
        .iter()
        .fold((0.0, 0.0), |(a, b), &(h, w)| (a + h as f64, b + w as f64));
    Some((sh / n, sw / n))
}

/// 掩膜全部前景像素的质心 `(行, 列)`. 全背景时返回 `None`.
pub fn mask_centroid(mask: ArrayView2<bool>) -> Option<Idx2dF> {
    let mut n = 0usize;
    let (mut sh, mut sw) = (0.0, 0.0);
    for ((h, w), _) in mask.indexed_iter().filter(|&(_, &fg)| fg) {
        n += 1;
        sh += h as f64;
        sw += w as f64;
    }
    (n > 0).then(|| (sh / n as f64, sw / n as f64))
}
