//! 数据目录布局.
//!
//! 一张玻片切分后的输出目录结构如下:
//!
//! ```text
//! <out>/<玻片>/                  (一只动物)
//! <out>/<玻片>/<动物>/           (两只动物, 每只一个)
//!     sections/<身份>.tif
//!     tiff/<玻片>.tif
//!     results.csv
//! ```
//!
//! 其中每个叶子目录称为一个数据目录, 分析会话在其上运行.

use crate::consts::results::RESULTS_FILE;
use crate::section::{Animals, SlideLayout};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

mod manifest;

pub use manifest::{ManifestEntry, ManifestError, SlideManifest, MANIFEST_FILE};

/// 获取 `{用户主目录}/.arg-berry/atlas` 目录.
pub fn home_atlas_dir() -> Option<PathBuf> {
    home_atlas_dir_with::<&str, _>([])
}

/// 获取 `{用户主目录}/.arg-berry/atlas` 目录下给定继续项组成的全路径.
pub fn home_atlas_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push(".arg-berry");
    ans.push("atlas");
    ans.extend(it);
    Some(ans)
}

/// 单个数据目录.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// 直接创建, 不检查目录是否存在.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// 根目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 切片目录.
    #[inline]
    pub fn sections(&self) -> PathBuf {
        self.root.join("sections")
    }

    /// 原始玻片目录.
    #[inline]
    pub fn tiff(&self) -> PathBuf {
        self.root.join("tiff")
    }

    /// 结果文件路径.
    #[inline]
    pub fn results(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    /// 切片目录下的所有 tiff, 按文件名排序.
    pub fn section_paths(&self) -> io::Result<Vec<PathBuf>> {
        tiffs_in(self.sections())
    }

    /// 原始玻片 (`tiff/` 下按文件名排序后的第一张), 没有时为 `None`.
    pub fn slide_path(&self) -> io::Result<Option<PathBuf>> {
        Ok(tiffs_in(self.tiff())?.into_iter().next())
    }
}

fn tiffs_in(dir: PathBuf) -> io::Result<Vec<PathBuf>> {
    let mut ans = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    ans.retain(|p| {
        p.is_file()
            && p.extension()
                .map_or(false, |e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
    });
    ans.sort();
    Ok(ans)
}

/// 一张玻片的输出目录.
#[derive(Debug, Clone)]
pub struct SlideDirs {
    root: PathBuf,
    animals: Vec<String>,
}

impl SlideDirs {
    /// 以 `out_dir/<玻片>` 为根创建.
    pub fn new<P: AsRef<Path>>(out_dir: P, layout: &SlideLayout) -> Self {
        let animals = match &layout.animals {
            Animals::Single => vec![],
            Animals::Pair { left, right } => vec![right.clone(), left.clone()],
        };
        Self {
            root: out_dir.as_ref().join(&layout.base),
            animals,
        }
    }

    /// 所有数据目录. 一只动物时只有根目录本身.
    pub fn data_dirs(&self) -> impl Iterator<Item = DataDir> + '_ {
        let single = self.animals.is_empty().then(|| DataDir::new(&self.root));
        single
            .into_iter()
            .chain(self.animals.iter().map(|a| DataDir::new(self.root.join(a))))
    }

    /// 给定动物的数据目录. `None` 为根目录.
    pub fn data_dir(&self, animal: Option<&str>) -> DataDir {
        match animal {
            Some(a) => DataDir::new(self.root.join(a)),
            None => DataDir::new(&self.root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(animals: Animals) -> SlideLayout {
        SlideLayout {
            base: "slide".into(),
            two_rows: true,
            animals,
        }
    }

    #[test]
    fn test_slide_dirs() {
        let dirs = SlideDirs::new("/out", &layout(Animals::Single));
        let all: Vec<_> = dirs.data_dirs().collect();
        assert_eq!(all, vec![DataDir::new("/out/slide")]);
        assert_eq!(dirs.data_dir(None).sections(), PathBuf::from("/out/slide/sections"));

        let dirs = SlideDirs::new(
            "/out",
            &layout(Animals::Pair {
                left: "ratL".into(),
                right: "ratR".into(),
            }),
        );
        let roots: Vec<_> = dirs.data_dirs().map(|d| d.root().to_path_buf()).collect();
        assert_eq!(
            roots,
            vec![PathBuf::from("/out/slide/ratR"), PathBuf::from("/out/slide/ratL")]
        );
        assert_eq!(
            dirs.data_dir(Some("ratL")).results(),
            PathBuf::from("/out/slide/ratL/results.csv")
        );
    }

    /// 只收集 tiff, 并按文件名排序.
    #[test]
    fn test_section_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let data = DataDir::new(tmp.path());
        fs::create_dir_all(data.sections()).unwrap();
        fs::create_dir_all(data.tiff()).unwrap();
        for name in ["b_001.tif", "a_000.tif", "notes.txt", "c.TIFF"] {
            fs::write(data.sections().join(name), b"").unwrap();
        }
        let names: Vec<_> = data
            .section_paths()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_000.tif", "b_001.tif", "c.TIFF"]);

        assert_eq!(data.slide_path().unwrap(), None);
        fs::write(data.tiff().join("slide.tif"), b"").unwrap();
        assert_eq!(data.slide_path().unwrap(), Some(data.tiff().join("slide.tif")));
    }

    #[test]
    fn test_home_atlas_dir() {
        if let Some(d) = home_atlas_dir() {
            assert!(d.ends_with(".arg-berry/atlas"));
            assert_eq!(home_atlas_dir_with(["x.json"]), Some(d.join("x.json")));
        }
    }
}
