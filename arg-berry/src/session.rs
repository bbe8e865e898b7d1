//! 分析会话.
//!
//! 会话持有一次交互分析所需的全部状态: 图谱表格, 数据目录下的切片列表与当前位置,
//! 当前 (已对齐) 切片, 所选图谱切片, 背景均值, 以及结果表.
//! 界面 (或脚本) 通过 [`Command`] 驱动会话, 每条命令返回一个 [`CommandOutcome`].
//!
//! 命令失败时会话状态保持不变.

use crate::atlas::{AtlasTables, Rgba, TableError};
use crate::dataset::DataDir;
use crate::quant::{
    default_rect, measure_background, quantify, rasterize_rois, QuantError, Rect, ResultsRow,
    ResultsStore,
};
use crate::section::{align_to_slice, SectionError, SegmentConfig};
use crate::vector::{simplify_polygon, Polygon};
use crate::{data, SectionImage};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 会话错误.
#[derive(Debug, Error)]
pub enum SessionError {
    /// 图谱表格错误.
    #[error(transparent)]
    Table(#[from] TableError),

    /// 切片加载或对齐错误.
    #[error(transparent)]
    Section(#[from] SectionError),

    /// 定量或结果表错误.
    #[error(transparent)]
    Quant(#[from] QuantError),

    /// 图像读取错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// 文件系统错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 数据目录下没有切片.
    #[error("no section images in {0:?}")]
    NoSections(PathBuf),

    /// 数据目录下没有原始玻片, 无法测量背景.
    #[error("no slide image in {0:?}")]
    NoSlide(PathBuf),

    /// 图谱中没有该切片的多边形.
    #[error("atlas has no slice {0}")]
    UnknownSlice(usize),
}

/// 会话模块的返回类型.
pub type SessionResult<T> = Result<T, SessionError>;

/// 会话命令.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 在原始玻片上测量背景. `None` 表示默认矩形.
    MeasureBackground {
        /// 背景矩形.
        rect: Option<Rect>,
    },
    /// 选择图谱切片, 并把当前切片重新对齐到它.
    SelectSlice(usize),
    /// 取出所选图谱切片的区域多边形, 供编辑.
    LoadRois {
        /// 简化容差, 0 为不简化.
        simplification: f64,
    },
    /// 按编辑后的多边形定量当前切片, 并写入结果表.
    Analyze {
        /// `(区域名, 多边形)`, 后者覆盖前者.
        drawn: Vec<(String, Polygon)>,
    },
    /// 下一张切片. 已在末尾时无操作.
    NextImage,
    /// 上一张切片. 已在开头时无操作.
    PreviousImage,
}

/// 供编辑的区域多边形.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiShape {
    /// 区域名.
    pub name: String,
    /// 多边形.
    pub polygon: Polygon,
    /// 显示颜色.
    pub color: Rgba,
}

/// 命令的结果.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// 背景均值.
    Background(f64),
    /// 已选择切片, 附带新的平移量.
    SliceSelected {
        /// 图谱切片序号.
        slice: usize,
        /// 当前切片的平移量.
        offset: (isize, isize),
    },
    /// 区域多边形.
    Rois(Vec<RoiShape>),
    /// 已写入结果表的行.
    Analyzed(ResultsRow),
    /// 已加载另一张切片.
    ImageLoaded {
        /// 新的位置.
        cursor: usize,
        /// 该切片是否已有结果.
        analyzed: bool,
    },
    /// 无操作.
    Unchanged,
}

/// 分析会话.
#[derive(Debug)]
pub struct Session {
    tables: AtlasTables,
    schema: Vec<String>,
    config: SegmentConfig,
    data_dir: DataDir,
    section_paths: Vec<PathBuf>,
    cursor: usize,
    original: SectionImage,
    active: SectionImage,
    selected_slice: usize,
    background: Option<f64>,
    results: ResultsStore,
}

impl Session {
    /// 从图谱目录读取表格后创建会话.
    pub fn open<P: AsRef<Path>>(atlas_dir: P, data_dir: DataDir, config: SegmentConfig) -> SessionResult<Self> {
        let tables = AtlasTables::open(atlas_dir)?;
        Self::new(tables, data_dir, config)
    }

    /// 以给定表格创建会话.
    ///
    /// 初始选中质心表中的第一张图谱切片, 加载第一张切片并对齐.
    pub fn new(tables: AtlasTables, data_dir: DataDir, config: SegmentConfig) -> SessionResult<Self> {
        let section_paths = data_dir.section_paths()?;
        let Some(first) = section_paths.first() else {
            return Err(SessionError::NoSections(data_dir.sections()));
        };
        let selected_slice = tables
            .centroids
            .centroids()
            .first()
            .map(|c| c.slice_index)
            .ok_or(SectionError::MissingCentroid(0))?;
        let original = SectionImage::open(first)?;
        let active = align_to_slice(&original, &tables.centroids, selected_slice, &config)?;
        let schema: Vec<String> = tables.colors.names().map(str::to_string).collect();
        let results = ResultsStore::open(data_dir.results(), schema.clone())?;
        log::info!(
            "session on {:?}: {} sections, {} analyzed",
            data_dir.root(),
            section_paths.len(),
            results.rows().len()
        );
        Ok(Self {
            tables,
            schema,
            config,
            data_dir,
            section_paths,
            cursor: 0,
            original,
            active,
            selected_slice,
            background: None,
            results,
        })
    }

    /// 图谱表格.
    #[inline]
    pub fn tables(&self) -> &AtlasTables {
        &self.tables
    }

    /// 切片路径, 按文件名排序.
    #[inline]
    pub fn section_paths(&self) -> &[PathBuf] {
        &self.section_paths
    }

    /// 当前切片在 [`Self::section_paths`] 中的位置.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 当前已对齐的切片.
    #[inline]
    pub fn active(&self) -> &SectionImage {
        &self.active
    }

    /// 所选图谱切片.
    #[inline]
    pub fn selected_slice(&self) -> usize {
        self.selected_slice
    }

    /// 背景均值, 尚未测量时为 `None`.
    #[inline]
    pub fn background(&self) -> Option<f64> {
        self.background
    }

    /// 结果表.
    #[inline]
    pub fn results(&self) -> &ResultsStore {
        &self.results
    }

    /// 执行一条命令.
    pub fn execute(&mut self, command: Command) -> SessionResult<CommandOutcome> {
        match command {
            Command::MeasureBackground { rect } => self.measure_background(rect),
            Command::SelectSlice(slice) => self.select_slice(slice),
            Command::LoadRois { simplification } => self.load_rois(simplification),
            Command::Analyze { drawn } => self.analyze(&drawn),
            Command::NextImage => self.goto(self.cursor.checked_add(1)),
            Command::PreviousImage => self.goto(self.cursor.checked_sub(1)),
        }
    }

    fn measure_background(&mut self, rect: Option<Rect>) -> SessionResult<CommandOutcome> {
        let path = self
            .data_dir
            .slide_path()?
            .ok_or_else(|| SessionError::NoSlide(self.data_dir.tiff()))?;
        let slide: Array2<f32> = data::read_gray(&path)?;
        let rect = rect.unwrap_or_else(|| default_rect(slide.dim()));
        let mean = measure_background(slide.view(), &rect)?;
        self.background = Some(mean);
        Ok(CommandOutcome::Background(mean))
    }

    fn select_slice(&mut self, slice: usize) -> SessionResult<CommandOutcome> {
        if self.tables.shapes.slice(slice).is_none() {
            return Err(SessionError::UnknownSlice(slice));
        }
        let active = align_to_slice(&self.original, &self.tables.centroids, slice, &self.config)?;
        let offset = active.offset().unwrap_or((0, 0));
        self.active = active;
        self.selected_slice = slice;
        Ok(CommandOutcome::SliceSelected { slice, offset })
    }

    fn load_rois(&self, simplification: f64) -> SessionResult<CommandOutcome> {
        let slice = self
            .tables
            .shapes
            .slice(self.selected_slice)
            .ok_or(SessionError::UnknownSlice(self.selected_slice))?;
        let mut shapes = Vec::new();
        for (name, polys) in slice.iter() {
            let Some(def) = self.tables.colors.get(name) else {
                continue;
            };
            for poly in polys {
                let polygon = if simplification > 0.0 {
                    simplify_polygon(poly, simplification)
                } else {
                    poly.clone()
                };
                shapes.push(RoiShape {
                    name: name.to_string(),
                    polygon,
                    color: def.color,
                });
            }
        }
        log::debug!("slice {}: {} shapes", self.selected_slice, shapes.len());
        Ok(CommandOutcome::Rois(shapes))
    }

    fn analyze(&mut self, drawn: &[(String, Polygon)]) -> SessionResult<CommandOutcome> {
        let background = self.background.unwrap_or_else(|| {
            log::warn!("{}: background not measured, using 0", self.active.id());
            0.0
        });
        let rois = rasterize_rois(drawn, self.active.shape());
        let row = quantify(
            self.active.file_name(),
            self.active.data(),
            &rois,
            background,
            &self.schema,
        )?;
        self.results.add_row(row.clone())?;
        log::info!("{}: analyzed, All_ROIs = {}", row.image_filename, row.all_rois);
        Ok(CommandOutcome::Analyzed(row))
    }

    fn goto(&mut self, cursor: Option<usize>) -> SessionResult<CommandOutcome> {
        let Some(cursor) = cursor.filter(|&c| c < self.section_paths.len()) else {
            return Ok(CommandOutcome::Unchanged);
        };
        let original = SectionImage::open(&self.section_paths[cursor])?;
        let active = align_to_slice(&original, &self.tables.centroids, self.selected_slice, &self.config)?;
        let analyzed = self.results.image_is_analyzed(active.file_name());
        self.original = original;
        self.active = active;
        self.cursor = cursor;
        Ok(CommandOutcome::ImageLoaded { cursor, analyzed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::tests::sample_tables;
    use crate::ImgWriteRaw;
    use ndarray::s;
    use std::fs;

    fn config() -> SegmentConfig {
        SegmentConfig {
            median_size: 3,
            opening_size: 3,
            min_section_size: 20,
            ..SegmentConfig::default()
        }
    }

    /// 数据目录: 两张 40x40 切片 (背景 5, 10x10 的 100 方块) 和一张全为 5 的玻片.
    fn data_dir(root: &Path) -> DataDir {
        let data = DataDir::new(root);
        fs::create_dir_all(data.sections()).unwrap();
        fs::create_dir_all(data.tiff()).unwrap();
        for name in ["s_000", "s_001"] {
            let mut img = Array2::<f32>::from_elem((40, 40), 5.0);
            img.slice_mut(s![4..14, 6..16]).fill(100.0);
            img.save_raw(data.sections().join(format!("{name}.tif"))).unwrap();
        }
        Array2::<f32>::from_elem((60, 60), 5.0)
            .save_raw(data.tiff().join("slide.tif"))
            .unwrap();
        data
    }

    #[test]
    fn test_session_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let data = data_dir(tmp.path());
        let mut session = Session::new(sample_tables(), data.clone(), config()).unwrap();
        assert_eq!(session.selected_slice(), 1);
        assert_eq!(session.active().id().as_str(), "s_000");
        // 质心 (8.5, 10.5) -> (15, 15)
        assert_eq!(session.active().offset(), Some((7, 5)));

        let bg = session
            .execute(Command::MeasureBackground { rect: None })
            .unwrap();
        assert_eq!(bg, CommandOutcome::Background(5.0));

        let CommandOutcome::Rois(shapes) = session
            .execute(Command::LoadRois { simplification: 0.0 })
            .unwrap()
        else {
            panic!("expect rois");
        };
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].name, "CB");

        let drawn: Vec<_> = shapes.into_iter().map(|r| (r.name, r.polygon)).collect();
        let CommandOutcome::Analyzed(row) = session.execute(Command::Analyze { drawn }).unwrap() else {
            panic!("expect a row");
        };
        // 方块平移到 [11, 21) x [11, 21), 与 CB 方块 [10, 20) x [10, 20) 重叠 81 像素
        let expect = ((81.0 * 100.0 + 19.0 * 5.0) / 100.0 - 5.0) / 100.0;
        assert!((row.all_rois - expect).abs() < 1e-9);
        assert!((row.regions[0].1 - expect).abs() < 1e-9);
        assert!(row.regions[1].1.is_nan());
        assert!(session.results().image_is_analyzed("s_000.tif"));
        assert!(data.results().is_file());
    }

    /// 在两端翻页是无操作; 翻页后按所选切片重新对齐.
    #[test]
    fn test_navigation_clamps() {
        let tmp = tempfile::tempdir().unwrap();
        let data = data_dir(tmp.path());
        let mut session = Session::new(sample_tables(), data, config()).unwrap();

        assert_eq!(session.execute(Command::PreviousImage).unwrap(), CommandOutcome::Unchanged);
        assert_eq!(
            session.execute(Command::NextImage).unwrap(),
            CommandOutcome::ImageLoaded {
                cursor: 1,
                analyzed: false
            }
        );
        assert_eq!(session.active().id().as_str(), "s_001");
        assert_eq!(session.active().offset(), Some((7, 5)));
        assert_eq!(session.execute(Command::NextImage).unwrap(), CommandOutcome::Unchanged);
        assert_eq!(session.cursor(), 1);
    }

    /// 失败的命令不改变会话状态.
    #[test]
    fn test_select_slice_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let data = data_dir(tmp.path());
        let mut session = Session::new(sample_tables(), data, config()).unwrap();

        // 切片 0 有多边形但没有质心
        assert!(matches!(
            session.execute(Command::SelectSlice(0)),
            Err(SessionError::Section(SectionError::MissingCentroid(0)))
        ));
        assert!(matches!(
            session.execute(Command::SelectSlice(9)),
            Err(SessionError::UnknownSlice(9))
        ));
        assert_eq!(session.selected_slice(), 1);
        assert_eq!(
            session.execute(Command::SelectSlice(1)).unwrap(),
            CommandOutcome::SliceSelected {
                slice: 1,
                offset: (7, 5)
            }
        );
    }

    #[test]
    fn test_empty_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let data = DataDir::new(tmp.path());
        fs::create_dir_all(data.sections()).unwrap();
        assert!(matches!(
            Session::new(sample_tables(), data, config()),
            Err(SessionError::NoSections(_))
        ));
    }
}
