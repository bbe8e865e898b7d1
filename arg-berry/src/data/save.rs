//! 图像的读取与持久化存储.

use super::SectionImage;
use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, GenericImageView, ImageError, ImageResult};
use ndarray::{Array2, ArrayView2};
use std::path::Path;

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// 强度以 16-bit 单通道保存: 四舍五入并截断到 `[0, 65535]`.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径. 格式由扩展名决定.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

fn save_gray16<P: AsRef<Path>>(data: ArrayView2<f32>, path: P) -> ImageResult<()> {
    let (height, width) = data.dim();
    let mut buf = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::new(width as u32, height as u32);
    for ((h, w), &v) in data.indexed_iter() {
        let pix = v.round().clamp(0.0, u16::MAX as f32) as u16;
        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
    }
    buf.save(path)
}

/// 按原样存储为 16-bit 单通道图像.
impl ImgWriteRaw for SectionImage {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        save_gray16(self.data(), path)
    }
}

impl ImgWriteRaw for Array2<f32> {
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        save_gray16(self.view(), path)
    }
}

/// 读取单通道图像, 像素值按原样转换为 `f32`.
///
/// 8-bit 与 16-bit 灰度图保持原值; 其它格式先转换为 16-bit 灰度.
pub fn read_gray<P: AsRef<Path>>(path: P) -> ImageResult<Array2<f32>> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let raw: Vec<f32> = match img {
        DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(f32::from).collect(),
        DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(f32::from).collect(),
        other => other
            .into_luma16()
            .into_raw()
            .into_iter()
            .map(f32::from)
            .collect(),
    };
    Array2::from_shape_vec((h, w), raw).map_err(|_| {
        ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SectionId;

    /// 以 16-bit tiff 保存后再读取, 整数强度不变.
    #[test]
    fn test_tiff_keeps_intensity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.tif");
        let data = Array2::from_shape_fn((4, 6), |(r, c)| (r * 1000 + c) as f32);
        let s = SectionImage::new(SectionId::new("s"), data.clone());
        s.save_raw(&path).unwrap();

        let back = SectionImage::open(&path).unwrap();
        assert_eq!(back.id().as_str(), "s");
        assert_eq!(back.data(), data.view());
    }

    /// 加载后保留原文件名 (包括 `.tiff` 扩展名), 对齐后的副本也一样.
    #[test]
    fn test_open_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.tiff");
        let data = Array2::from_elem((3, 3), 7.0f32);
        SectionImage::new(SectionId::new("x"), data.clone())
            .save_raw(&path)
            .unwrap();

        let back = SectionImage::open(&path).unwrap();
        assert_eq!(back.id().as_str(), "x");
        assert_eq!(back.file_name(), "x.tiff");
        assert_eq!(back.aligned(data, (1, -1)).file_name(), "x.tiff");

        let fresh = SectionImage::new(SectionId::new("y"), Array2::zeros((2, 2)));
        assert_eq!(fresh.file_name(), "y.tif");
    }
}
