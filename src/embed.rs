use image::imageops::FilterType;

use crate::distance::normalize;
use crate::error::{DedupError, Result};

/// 图片特征提取器
///
/// 必须是确定性的：相同的输入总是得到相同的向量，且向量长度固定
pub trait Embedder: Send + Sync {
    /// 输出向量的维度
    fn dimension(&self) -> usize;

    /// 将图片字节转换为特征向量
    fn embed(&self, data: &[u8]) -> Result<Vec<f32>>;
}

/// 缩略图灰度方差的下限，低于该值视为纯色图片
const MIN_VARIANCE: f32 = 1e-8;

/// 缩略图特征提取器
///
/// 将图片转为灰度并缩放到 size x size，减去均值后归一化，
/// 得到 size² 维的向量。对缩放、重新编码等操作有一定的鲁棒性。
#[derive(Debug, Clone)]
pub struct ThumbnailEmbedder {
    size: u32,
}

impl ThumbnailEmbedder {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }
}

impl Embedder for ThumbnailEmbedder {
    fn dimension(&self) -> usize {
        (self.size * self.size) as usize
    }

    fn embed(&self, data: &[u8]) -> Result<Vec<f32>> {
        let img = image::load_from_memory(data).map_err(|e| DedupError::Decode(e.to_string()))?;
        let thumb = img.resize_exact(self.size, self.size, FilterType::Triangle).to_luma32f();

        let mut vector = thumb.into_raw();
        let mean = vector.iter().sum::<f32>() / vector.len() as f32;
        vector.iter_mut().for_each(|x| *x -= mean);
        // 纯色图片去均值后为零向量，与任何纯色图片的余弦距离都是 0
        let variance = vector.iter().map(|x| x * x).sum::<f32>() / vector.len() as f32;
        if variance < MIN_VARIANCE {
            return Err(DedupError::ExtractionFailure("图片没有可比较的内容（纯色图片）".to_owned()));
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};

    use super::*;
    use crate::distance::cosine;

    fn gradient(width: u32, height: u32, invert: bool) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + y) * 255 / (width + height)) as u8;
            let v = if invert { 255 - v } else { v };
            image::Rgb([v, v, v])
        });
        let mut buf = Cursor::new(vec![]);
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn deterministic() {
        let embedder = ThumbnailEmbedder::new(8);
        let data = gradient(64, 48, false);
        let a = embedder.embed(&data).unwrap();
        let b = embedder.embed(&data).unwrap();
        assert_eq!(a.len(), embedder.dimension());
        assert_eq!(a, b);
    }

    #[test]
    fn resized_copy_is_close() {
        let embedder = ThumbnailEmbedder::new(8);
        let a = embedder.embed(&gradient(128, 96, false)).unwrap();
        let b = embedder.embed(&gradient(64, 48, false)).unwrap();
        let c = embedder.embed(&gradient(64, 48, true)).unwrap();
        assert!(cosine(&a, &b) < 0.05);
        assert!(cosine(&a, &c) > 1.0);
    }

    #[test]
    fn solid_color_is_rejected() {
        let embedder = ThumbnailEmbedder::new(8);
        for v in [0, 128, 255] {
            let img = RgbImage::from_pixel(32, 32, image::Rgb([v, v, v]));
            let mut buf = Cursor::new(vec![]);
            img.write_to(&mut buf, ImageFormat::Png).unwrap();
            let err = embedder.embed(buf.get_ref()).unwrap_err();
            assert!(matches!(err, DedupError::ExtractionFailure(_)), "{v}");
        }
    }

    #[test]
    fn invalid_image() {
        let embedder = ThumbnailEmbedder::new(8);
        assert!(matches!(embedder.embed(b"not an image"), Err(DedupError::Decode(_))));
    }
}
