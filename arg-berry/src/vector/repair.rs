//! 多边形有效性检查与修复.
//!
//! 追踪得到的环可能在鞍点处自接触 (同一角点出现两次). 修复相当于零距离缓冲:
//! 在重复角点处把环拆开, 按有向面积的符号重新归类为外环与洞, 丢弃退化的片段,
//! 最后把每个洞归属到包含它的最小外环.

use super::trace::signed_area;
use super::{CornerRing, GeometryError};
use ordered_float::OrderedFloat;
use std::collections::{HashMap, HashSet};

/// 带洞多边形, 角点坐标为 `(行, 列)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shape {
    pub exterior: CornerRing,
    pub holes: Vec<CornerRing>,
}

/// 环是否自接触.
fn is_pinched(ring: &[(i64, i64)]) -> bool {
    let mut seen = HashSet::with_capacity(ring.len());
    ring.iter().any(|v| !seen.insert(*v))
}

/// 在重复角点处把环拆成若干简单环.
fn split_pinched(ring: &[(i64, i64)]) -> Vec<CornerRing> {
    let mut pieces = Vec::new();
    let mut stack: Vec<(i64, i64)> = Vec::with_capacity(ring.len());
    let mut at: HashMap<(i64, i64), usize> = HashMap::with_capacity(ring.len());
    for &v in ring {
        if let Some(&i) = at.get(&v) {
            // stack[i..] 构成一个闭合子环, 起点与终点都是 v
            let piece: CornerRing = stack.drain(i..).collect();
            piece.iter().for_each(|p| {
                at.remove(p);
            });
            pieces.push(piece);
        }
        at.insert(v, stack.len());
        stack.push(v);
    }
    pieces.push(stack);
    pieces
}

/// 偶奇规则判断点 `(y, x)` 是否在环内.
pub(crate) fn contains(ring: &[(i64, i64)], (py, px): (f64, f64)) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (y0, x0) = (ring[i].0 as f64, ring[i].1 as f64);
        let (y1, x1) = (ring[(i + 1) % n].0 as f64, ring[(i + 1) % n].1 as f64);
        if (y0 > py) != (y1 > py) {
            let x = x0 + (py - y0) * (x1 - x0) / (y1 - y0);
            if px < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// 洞边界上的一个非角点探测点: 第一条边上距起点半个单位处.
fn probe(hole: &[(i64, i64)]) -> (f64, f64) {
    let (a, b) = (hole[0], hole[1 % hole.len()]);
    let (dy, dx) = ((b.0 - a.0).signum() as f64, (b.1 - a.1).signum() as f64);
    (a.0 as f64 + dy * 0.5, a.1 as f64 + dx * 0.5)
}

/// 把追踪得到的环组装成带洞多边形, 必要时修复自接触.
///
/// 输出的外环顺序与输入顺序一致.
pub(crate) fn assemble(rings: Vec<CornerRing>) -> Result<Vec<Shape>, GeometryError> {
    let mut pieces = Vec::with_capacity(rings.len());
    for ring in rings {
        if is_pinched(&ring) {
            log::debug!("repairing self-touching ring with {} vertices", ring.len());
            pieces.extend(split_pinched(&ring));
        } else {
            pieces.push(ring);
        }
    }

    let mut shells = Vec::new();
    let mut holes = Vec::new();
    for piece in pieces {
        let area = signed_area(&piece);
        if piece.len() < 3 || area == 0.0 {
            continue;
        }
        if area > 0.0 {
            shells.push((area, Shape { exterior: piece, holes: vec![] }));
        } else {
            holes.push(piece);
        }
    }

    for hole in holes {
        let pt = probe(&hole);
        let owner = shells
            .iter_mut()
            .filter(|(_, s)| contains(&s.exterior, pt))
            .min_by_key(|(area, _)| OrderedFloat(*area))
            .ok_or(GeometryError::OrphanHole { probe: pt })?;
        owner.1.holes.push(hole);
    }
    Ok(shells.into_iter().map(|(_, s)| s).collect())
}
