#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供基于小鼠脑图谱 (allen_mouse_100um) 的放射自显影 (ARG)
//! 切片区域定量的结构化信息与基础处理算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 图谱准备 (`atlas`) 是离线的一次性流程, 其产物是只读的静态表格.
//!   分析阶段 (`section`, `quant`, `session`) 只读取这些表格.
//! 2. 所有图像都使用 `(高, 宽)` 即 `(行, 列)` 的索引方式; 只有在输出多边形时
//!   才翻转为 `(x, y)`.
//! 3. 同一个结果文件不支持多个会话并发写入, 此时行为未定义.
//!
//! # 开发计划
//!
//! ### 图谱区域栅格化 ✅
//!
//! 二值化, 填洞, 去除小连通域, 腐蚀, 最近邻放大, 对称填充至画布,
//! 以及双侧区域的中线切分.
//!
//! 实现位于 `arg-berry/src/atlas/rasterize.rs`.
//!
//! ### 栅格转矢量 ✅
//!
//! 4-连通前景的像素边界追踪, 自接触环的修复, Douglas-Peucker 简化.
//!
//! 实现位于 `arg-berry/src/vector`.
//!
//! ### 图谱矢量化驱动 ✅
//!
//! 按切片并行处理所有区域, 结果按配置顺序汇合, 与任务完成顺序无关.
//! 产出区域颜色表, 切片质心表, 区域多边形表, 以及解剖参考体和区域叠加体.
//!
//! 实现位于 `arg-berry/src/atlas/driver.rs`.
//!
//! ### 玻片切分 ✅
//!
//! 中值滤波, Otsu 阈值, 形态学清理, 距离变换, 局部极大值种子,
//! 标记分水岭, 裁剪并填充到画布, 以及切片身份命名.
//!
//! 实现位于 `arg-berry/src/section`.
//!
//! ### 质心对齐 ✅
//!
//! 仅平移. 两个轴分别做循环移位, 两次移位都会生效.
//!
//! 实现位于 `arg-berry/src/section/align.rs`.
//!
//! ### ROI 栅格化, 定量与结果存储 ✅
//!
//! 1. 同名多边形合并为同一标签, 标签按首次出现顺序编号. ✅
//! 2. 背景校正后的单位面积均值, 不会出现负值. ✅
//! 3. 以 `image_filename` 为键的 upsert, 每次修改后同步落盘. ✅
//!
//! 实现位于 `arg-berry/src/quant`.
//!
//! ### 会话与命令 ✅
//!
//! 显式的会话上下文取代全局状态, 命令对象取代界面回调.
//!
//! 实现位于 `arg-berry/src/session.rs`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 高精度二维坐标, 按 `(行, 列)` 组织.
pub type Idx2dF = (f64, f64);

/// 二值掩膜. `true` 代表前景.
pub type BinaryMask = ndarray::Array2<bool>;

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;

pub mod consts;

pub mod data;

pub use data::{AtlasVolume, ImgWriteRaw, RegionKey, SectionId, SectionImage, Structure};

pub mod morph;

pub mod vector;

pub mod atlas;

pub mod section;

pub mod quant;

pub mod dataset;

pub mod session;

pub mod prelude;
