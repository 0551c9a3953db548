use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::error::{EncodingError, ImageFormatHint, LimitError, LimitErrorKind};
use image::imageops;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, ImageResult};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};
use std::io::Write;
use std::path::Path;

use crate::naming::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformCfg {
    pub width: u32,
    pub format: OutputFormat,
    /// Ignored for PNG output.
    pub jpeg_quality: u8,
}

impl TransformCfg {
    pub fn new(width: u32, format: OutputFormat, jpeg_quality: u8) -> Self {
        TransformCfg {
            width,
            format,
            jpeg_quality,
        }
    }
}

/// Height that keeps the source aspect ratio at `width`, rounded, never below 1.
pub fn target_height(width: u32, source_width: u32, source_height: u32) -> u32 {
    if source_width == 0 {
        return 1;
    }
    let height = (f64::from(width) * f64::from(source_height) / f64::from(source_width)).round();

    height.max(1.0) as u32
}

/// Decodes the image at `path`, sniffing the format from its content.
pub fn load(path: &Path) -> ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Drops any alpha channel (and widens anything JPEG can't take) to 8-bit RGB.
/// Grayscale 8-bit passes through untouched.
pub fn flatten(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Resizes `img` to `cfg.width` with Lanczos resampling and encodes it into `writer`.
pub fn transform<W: Write>(img: &DynamicImage, cfg: TransformCfg, writer: W) -> ImageResult<()> {
    let height = target_height(cfg.width, img.width(), img.height());
    let transformed_img = img.resize_exact(cfg.width, height, imageops::FilterType::Lanczos3);

    match cfg.format {
        OutputFormat::Png => transformed_img.write_with_encoder(PngEncoder::new_with_quality(
            writer,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        OutputFormat::Jpeg => encode_jpeg(&flatten(transformed_img), cfg.jpeg_quality, writer),
    }
}

/// Baseline JPEG with optimized Huffman tables. Expects a flattened image.
pub fn encode_jpeg<W: Write>(img: &DynamicImage, quality: u8, mut writer: W) -> ImageResult<()> {
    let rgb;
    let (data, color) = match img {
        DynamicImage::ImageLuma8(buf) => (buf.as_raw().as_slice(), ColorType::Luma),
        DynamicImage::ImageRgb8(buf) => (buf.as_raw().as_slice(), ColorType::Rgb),
        other => {
            rgb = other.to_rgb8();
            (rgb.as_raw().as_slice(), ColorType::Rgb)
        }
    };
    let (width, height) = match (u16::try_from(img.width()), u16::try_from(img.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ImageError::Limits(LimitError::from_kind(
                LimitErrorKind::DimensionError,
            )))
        }
    };

    let mut encoded = Vec::new();
    let mut encoder = JpegEncoder::new(&mut encoded, quality);
    encoder.set_optimized_huffman_tables(true);
    encoder.encode(data, width, height, color).map_err(|err| {
        ImageError::Encoding(EncodingError::new(
            ImageFormatHint::Exact(ImageFormat::Jpeg),
            err,
        ))
    })?;

    writer.write_all(&encoded)?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{encode_jpeg, flatten, target_height, transform, TransformCfg};
    use crate::naming::OutputFormat;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Encodes a synthetic gradient image in `format`.
    pub(crate) fn sample_image(
        width: u32,
        height: u32,
        alpha: bool,
        format: ImageFormat,
    ) -> Vec<u8> {
        let img = if alpha {
            DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, 128, 100])
            }))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, 64])
            }))
        };
        let mut data = Vec::new();

        img.write_to(&mut Cursor::new(&mut data), format).unwrap();

        data
    }

    #[test]
    fn height_follows_aspect_ratio() {
        assert_eq!(target_height(200, 400, 300), 150);
        assert_eq!(target_height(300, 1000, 333), 100);
        assert_eq!(target_height(200, 3, 2), 133);
        assert_eq!(target_height(200, 10_000, 1), 1);
    }

    #[test]
    fn png_stays_png() {
        let src = image::load_from_memory(&sample_image(64, 48, true, ImageFormat::Png)).unwrap();
        let mut out = Vec::new();

        transform(&src, TransformCfg::new(32, OutputFormat::Png, 70), &mut out).unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn alpha_is_flattened_before_jpeg() {
        let src = image::load_from_memory(&sample_image(40, 20, true, ImageFormat::Png)).unwrap();
        let mut out = Vec::new();

        transform(&src, TransformCfg::new(20, OutputFormat::Jpeg, 70), &mut out).unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn flatten_keeps_opaque_images() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));

        assert!(matches!(flatten(rgb), DynamicImage::ImageRgb8(_)));
        assert!(matches!(flatten(rgba), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn upscales_small_sources() {
        let src = image::load_from_memory(&sample_image(10, 5, false, ImageFormat::Jpeg)).unwrap();
        let mut out = Vec::new();

        transform(&src, TransformCfg::new(200, OutputFormat::Jpeg, 70), &mut out).unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn jpeg_uses_optimized_huffman_tables() {
        let src = sample_image(256, 192, false, ImageFormat::Png);
        let src = image::load_from_memory(&src).unwrap();
        let mut optimized = Vec::new();
        let mut standard = Vec::new();

        encode_jpeg(&src, 70, &mut optimized).unwrap();
        jpeg_encoder::Encoder::new(&mut standard, 70)
            .encode(src.as_bytes(), 256, 192, jpeg_encoder::ColorType::Rgb)
            .unwrap();

        let decoded = image::load_from_memory(&optimized).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (256, 192));
        assert!(optimized.len() <= standard.len());
    }
}
