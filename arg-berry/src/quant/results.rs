//! 结果表: 以 `image_filename` 为键的 CSV 文件.
//!
//! 表头固定为 `image_filename,All_ROIs,<区域...>`, 区域按配置顺序排列.
//! 每次修改后同步落盘: 先写同目录下的临时文件, 再替换原文件.
//! 同一文件不支持多个写入者.

use super::{QuantError, QuantResult};
use crate::consts::results::{ALL_ROIS, IMAGE_FILENAME};
use itertools::Itertools;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 一张切片的定量结果. 值可以为 NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsRow {
    /// 切片文件名, 即结果表的键.
    pub image_filename: String,
    /// 所有区域并集的指标.
    pub all_rois: f64,
    /// 各区域的指标, 按结果表的区域顺序.
    pub regions: Vec<(String, f64)>,
}

/// 按需为 CSV 字段加引号.
pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        v.to_string()
    }
}

fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        s.parse().ok()
    }
}

/// 把 CSV 文本拆成记录, 返回 `(起始行号, 字段)`. 引号内允许逗号与换行.
fn parse_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, (usize, String)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut line = 1;
    let mut start = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            '\n' if quoted => {
                line += 1;
                field.push(ch);
            }
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            '\r' if !quoted && chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push((start, std::mem::take(&mut fields)));
                line += 1;
                start = line;
            }
            _ => field.push(ch),
        }
    }
    if quoted {
        return Err((start, "unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((start, fields));
    }
    records.retain(|(_, f)| !(f.len() == 1 && f[0].is_empty()));
    Ok(records)
}

/// 结果表.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    path: PathBuf,
    schema: Vec<String>,
    rows: Vec<ResultsRow>,
}

impl ResultsStore {
    /// 打开 `path` 处的结果表, `schema` 为区域列.
    ///
    /// 文件不存在时为空表. 已有文件的列按名字对应, 列的顺序可以不同;
    /// 列集合与期望不一致时给出警告并从空表开始, 原文件在下一次写入时被覆盖.
    pub fn open<P: Into<PathBuf>>(path: P, schema: Vec<String>) -> QuantResult<Self> {
        let mut ans = Self {
            path: path.into(),
            schema,
            rows: Vec::new(),
        };
        if !ans.path.is_file() {
            return Ok(ans);
        }

        let text = fs::read_to_string(&ans.path)?;
        let parse_err = |line: usize, reason: String| QuantError::Parse {
            path: ans.path.clone(),
            line,
            reason,
        };
        let records = parse_records(&text).map_err(|(line, reason)| parse_err(line, reason))?;
        let mut records = records.into_iter();
        let Some((_, header)) = records.next() else {
            return Ok(ans);
        };
        // 期望的每一列在文件中的位置; 列集合相同即可, 顺序不限
        let expected = ans.header();
        let columns: Option<Vec<usize>> = expected
            .iter()
            .map(|c| header.iter().position(|h| h == c))
            .collect();
        let columns = match columns {
            Some(cols) if header.len() == expected.len() && header.iter().all_unique() => cols,
            _ => {
                log::warn!(
                    "{:?}: header {:?} differs from {:?}, starting a fresh table",
                    ans.path,
                    header,
                    expected
                );
                return Ok(ans);
            }
        };

        let mut rows = Vec::new();
        for (line, fields) in records {
            if fields.len() != header.len() {
                return Err(parse_err(
                    line,
                    format!("expect {} fields, found {}", header.len(), fields.len()),
                ));
            }
            let mut values = Vec::with_capacity(columns.len() - 1);
            for &i in &columns[1..] {
                let f = &fields[i];
                values.push(parse_value(f).ok_or_else(|| parse_err(line, format!("bad number {f:?}")))?);
            }
            rows.push(ResultsRow {
                image_filename: fields[columns[0]].clone(),
                all_rois: values[0],
                regions: ans.schema.iter().cloned().zip(values[1..].iter().copied()).collect(),
            });
        }
        log::debug!("{:?}: {} rows loaded", ans.path, rows.len());
        ans.rows = rows;
        Ok(ans)
    }

    /// 文件路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 区域列.
    #[inline]
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// 完整表头.
    pub fn header(&self) -> Vec<String> {
        [IMAGE_FILENAME, ALL_ROIS]
            .into_iter()
            .map(str::to_string)
            .chain(self.schema.iter().cloned())
            .collect()
    }

    /// 所有行, 按 `image_filename` 排序.
    #[inline]
    pub fn rows(&self) -> &[ResultsRow] {
        &self.rows
    }

    /// 按键查找.
    pub fn get(&self, image_filename: &str) -> Option<&ResultsRow> {
        self.rows.iter().find(|r| r.image_filename == image_filename)
    }

    /// 该切片是否已有结果.
    #[inline]
    pub fn image_is_analyzed(&self, image_filename: &str) -> bool {
        self.get(image_filename).is_some()
    }

    /// 插入或替换一行, 重新排序后写入文件.
    ///
    /// 行的区域列必须与结果表一致 (名字与顺序), 否则不做任何修改.
    pub fn add_row(&mut self, row: ResultsRow) -> QuantResult<()> {
        if !row.regions.iter().map(|(n, _)| n).eq(self.schema.iter()) {
            return Err(QuantError::SchemaMismatch {
                image: row.image_filename,
                expected: self.schema.clone(),
                found: row.regions.into_iter().map(|(n, _)| n).collect(),
            });
        }
        match self
            .rows
            .iter_mut()
            .find(|r| r.image_filename == row.image_filename)
        {
            Some(old) => *old = row,
            None => self.rows.push(row),
        }
        self.rows
            .sort_by(|a, b| a.image_filename.cmp(&b.image_filename));
        self.flush()
    }

    /// 把整个表写入文件.
    pub fn flush(&self) -> QuantResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let tmp = NamedTempFile::new_in(&parent)?;
        {
            let mut w = BufWriter::new(tmp.as_file());
            writeln!(w, "{}", self.header().iter().map(|h| csv_escape(h)).join(","))?;
            for row in &self.rows {
                let line = std::iter::once(csv_escape(&row.image_filename))
                    .chain(std::iter::once(format_value(row.all_rois)))
                    .chain(row.regions.iter().map(|(_, v)| format_value(*v)))
                    .join(",");
                writeln!(w, "{line}")?;
            }
            w.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        log::debug!("{:?}: {} rows written", self.path, self.rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<String> {
        vec!["CB".to_string(), "Isocortex".to_string()]
    }

    fn row(name: &str, all: f64, cb: f64, iso: f64) -> ResultsRow {
        ResultsRow {
            image_filename: name.to_string(),
            all_rois: all,
            regions: vec![("CB".to_string(), cb), ("Isocortex".to_string(), iso)],
        }
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_records() {
        let recs = parse_records("a,\"b,c\",\"d\"\"e\"\r\n\n1,2,3").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].1, vec!["a", "b,c", "d\"e"]);
        assert_eq!(recs[1], (3, vec!["1".to_string(), "2".to_string(), "3".to_string()]));
        assert!(parse_records("\"open").is_err());
    }

    /// 重复写入同一行, 表保持不变.
    #[test]
    fn test_idempotent_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut store = ResultsStore::open(&path, schema()).unwrap();
        store.add_row(row("b.tif", 1.5, f64::NAN, 0.0)).unwrap();
        store.add_row(row("a,1.tif", 2.0, 0.25, 3.0)).unwrap();
        let first = fs::read_to_string(&path).unwrap();

        store.add_row(row("b.tif", 1.5, f64::NAN, 0.0)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
        assert_eq!(store.rows().len(), 2);
        assert_eq!(
            first,
            "image_filename,All_ROIs,CB,Isocortex\n\"a,1.tif\",2,0.25,3\nb.tif,1.5,NaN,0\n"
        );

        // 替换而不是追加
        store.add_row(row("b.tif", 9.0, 1.0, 1.0)).unwrap();
        assert_eq!(store.rows().len(), 2);
        assert_eq!(store.get("b.tif").unwrap().all_rois, 9.0);
    }

    #[test]
    fn test_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut store = ResultsStore::open(&path, schema()).unwrap();
        store.add_row(row("x.tif", 0.5, f64::NAN, 2.0)).unwrap();

        let back = ResultsStore::open(&path, schema()).unwrap();
        assert!(back.image_is_analyzed("x.tif"));
        assert!(!back.image_is_analyzed("y.tif"));
        let r = back.get("x.tif").unwrap();
        assert_eq!(r.all_rois, 0.5);
        assert!(r.regions[0].1.is_nan());
        assert_eq!(r.regions[1], ("Isocortex".to_string(), 2.0));
    }

    /// 表头不一致时从空表开始.
    #[test]
    fn test_header_mismatch_starts_fresh() {
        // 其它测试可能已初始化
        let _ = simple_logger::init_with_level(log::Level::Warn);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, "image_filename,All_ROIs,HIP\nold.tif,1,1\n").unwrap();
        let mut store = ResultsStore::open(&path, schema()).unwrap();
        assert!(store.rows().is_empty());
        store.add_row(row("n.tif", 1.0, 1.0, 1.0)).unwrap();
        assert!(!fs::read_to_string(&path).unwrap().contains("old.tif"));
    }

    /// 列集合相同但顺序不同的文件按列名读取, 下次写入时恢复标准列序.
    #[test]
    fn test_reordered_header_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(
            &path,
            "CB,image_filename,Isocortex,All_ROIs\n0.5,old.tif,NaN,1.25\n",
        )
        .unwrap();
        let mut store = ResultsStore::open(&path, schema()).unwrap();
        assert_eq!(store.rows().len(), 1);
        let r = store.get("old.tif").unwrap();
        assert_eq!(r.all_rois, 1.25);
        assert_eq!(r.regions[0], ("CB".to_string(), 0.5));
        assert!(r.regions[1].1.is_nan());

        store.add_row(row("new.tif", 2.0, 1.0, 0.0)).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "image_filename,All_ROIs,CB,Isocortex\nnew.tif,2,1,0\nold.tif,1.25,0.5,NaN\n"
        );
    }

    #[test]
    fn test_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut store = ResultsStore::open(&path, schema()).unwrap();
        let mut bad = row("a.tif", 1.0, 1.0, 1.0);
        bad.regions.reverse();
        assert!(matches!(store.add_row(bad), Err(QuantError::SchemaMismatch { .. })));
        assert!(store.rows().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, "image_filename,All_ROIs,CB,Isocortex\na.tif,1,2\n").unwrap();
        assert!(matches!(
            ResultsStore::open(&path, schema()),
            Err(QuantError::Parse { line: 2, .. })
        ));
    }
}
