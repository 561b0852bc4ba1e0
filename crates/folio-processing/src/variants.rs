//! Resolution variants
//!
//! Produces the fixed variant set for one normalized image: the original
//! bytes passed through, plus medium and thumbnail JPEGs bounded on their
//! longest edge. Output depends only on the input bytes and settings.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Cursor;

use crate::error::{ProcessingError, ProcessingResult};

pub const DEFAULT_MEDIUM_MAX_EDGE: u32 = 800;
pub const DEFAULT_THUMBNAIL_MAX_EDGE: u32 = 200;
pub const DEFAULT_VARIANT_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    Original,
    Medium,
    Thumbnail,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Medium => "medium",
            Variant::Thumbnail => "thumbnail",
        }
    }

    /// Object name inside the asset namespace. Derived variants are always JPEG.
    pub fn logical_name(&self, original_extension: &str) -> String {
        match self {
            Variant::Original => format!("original.{}", original_extension),
            Variant::Medium => "medium.jpg".to_string(),
            Variant::Thumbnail => "thumbnail.jpg".to_string(),
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedVariant {
    pub variant: Variant,
    pub data: Bytes,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct GeneratedVariants {
    /// Natural size of the source after EXIF orientation.
    pub width: u32,
    pub height: u32,
    pub variants: BTreeMap<Variant, GeneratedVariant>,
}

impl GeneratedVariants {
    pub fn get(&self, variant: Variant) -> Option<&GeneratedVariant> {
        self.variants.get(&variant)
    }

    /// Derived variants only (everything except the original).
    pub fn derived(&self) -> impl Iterator<Item = &GeneratedVariant> {
        self.variants
            .values()
            .filter(|v| v.variant != Variant::Original)
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionGenerator {
    medium_max_edge: u32,
    thumbnail_max_edge: u32,
    quality: u8,
}

impl Default for ResolutionGenerator {
    fn default() -> Self {
        Self {
            medium_max_edge: DEFAULT_MEDIUM_MAX_EDGE,
            thumbnail_max_edge: DEFAULT_THUMBNAIL_MAX_EDGE,
            quality: DEFAULT_VARIANT_QUALITY,
        }
    }
}

impl ResolutionGenerator {
    pub fn new(medium_max_edge: u32, thumbnail_max_edge: u32, quality: u8) -> Self {
        Self {
            medium_max_edge: medium_max_edge.max(1),
            thumbnail_max_edge: thumbnail_max_edge.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    /// Decode once and derive every variant on the blocking pool.
    ///
    /// A decode failure fails the whole set; no partial result is returned.
    pub async fn generate(&self, data: Bytes, mime_type: &str) -> ProcessingResult<GeneratedVariants> {
        if data.is_empty() {
            return Err(ProcessingError::Empty);
        }
        let generator = self.clone();
        let mime_type = mime_type.to_string();
        let start = std::time::Instant::now();

        let result =
            tokio::task::spawn_blocking(move || generator.generate_blocking(data, &mime_type))
                .await??;

        tracing::debug!(
            width = result.width,
            height = result.height,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Resolution variants generated"
        );

        Ok(result)
    }

    pub fn generate_blocking(
        &self,
        data: Bytes,
        mime_type: &str,
    ) -> ProcessingResult<GeneratedVariants> {
        let img = decode_oriented(&data)?;
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ProcessingError::Decode("image has zero dimensions".to_string()));
        }

        let mut variants = BTreeMap::new();
        variants.insert(
            Variant::Original,
            GeneratedVariant {
                variant: Variant::Original,
                data,
                mime_type: mime_type.to_string(),
                width,
                height,
            },
        );

        for (variant, max_edge) in [
            (Variant::Medium, self.medium_max_edge),
            (Variant::Thumbnail, self.thumbnail_max_edge),
        ] {
            let (w, h) = fit_within(width, height, max_edge);
            let resized = if (w, h) == (width, height) {
                img.clone()
            } else {
                img.resize_exact(w, h, select_filter(width, height, w, h))
            };
            variants.insert(
                variant,
                GeneratedVariant {
                    variant,
                    data: encode_jpeg(&resized, self.quality)?,
                    mime_type: "image/jpeg".to_string(),
                    width: w,
                    height: h,
                },
            );
        }

        Ok(GeneratedVariants {
            width,
            height,
            variants,
        })
    }
}

fn decode_oriented(data: &[u8]) -> ProcessingResult<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ProcessingError::Decode(
            "unrecognized image format".to_string(),
        ));
    }
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Largest size within `max_edge` on the longest side, preserving aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge {
        return (width, height);
    }
    let scale = max_edge as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_edge);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_edge);
    (w, h)
}

/// Cheaper filters for large reductions, Lanczos for small ones.
pub fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> ProcessingResult<Bytes> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 128]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(4000, 3000, 800), (800, 600));
        assert_eq!(fit_within(4000, 3000, 200), (200, 150));
        assert_eq!(fit_within(3000, 4000, 800), (600, 800));
        assert_eq!(fit_within(1000, 1, 200), (200, 1));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(120, 90, 800), (120, 90));
        assert_eq!(fit_within(800, 800, 800), (800, 800));
    }

    #[test]
    fn filter_selection_by_ratio() {
        assert_eq!(select_filter(4000, 3000, 800, 600), FilterType::Triangle);
        assert_eq!(select_filter(1000, 1000, 600, 600), FilterType::CatmullRom);
        assert_eq!(select_filter(1000, 1000, 900, 900), FilterType::Lanczos3);
    }

    #[tokio::test]
    async fn generates_bounded_variants() {
        let generator = ResolutionGenerator::default();
        let out = generator.generate(png(1600, 900), "image/png").await.unwrap();

        assert_eq!((out.width, out.height), (1600, 900));
        let medium = out.get(Variant::Medium).unwrap();
        let thumb = out.get(Variant::Thumbnail).unwrap();
        assert_eq!((medium.width, medium.height), (800, 450));
        assert_eq!((thumb.width, thumb.height), (200, 113));
        assert_eq!(medium.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&thumb.data).unwrap();
        assert_eq!(decoded.dimensions(), (200, 113));
        assert_eq!(out.derived().count(), 2);
    }

    #[tokio::test]
    async fn small_images_are_not_upscaled() {
        let generator = ResolutionGenerator::default();
        let out = generator.generate(png(150, 100), "image/png").await.unwrap();
        let medium = out.get(Variant::Medium).unwrap();
        let thumb = out.get(Variant::Thumbnail).unwrap();
        assert_eq!((medium.width, medium.height), (150, 100));
        assert_eq!((thumb.width, thumb.height), (150, 100));
    }

    #[tokio::test]
    async fn output_is_deterministic() {
        let generator = ResolutionGenerator::default();
        let input = png(640, 480);
        let a = generator.generate(input.clone(), "image/png").await.unwrap();
        let b = generator.generate(input, "image/png").await.unwrap();
        assert_eq!(
            a.get(Variant::Medium).unwrap().data,
            b.get(Variant::Medium).unwrap().data
        );
        assert_eq!(
            a.get(Variant::Thumbnail).unwrap().data,
            b.get(Variant::Thumbnail).unwrap().data
        );
    }

    #[tokio::test]
    async fn truncated_jpeg_fails_without_variants() {
        let generator = ResolutionGenerator::default();
        let truncated = Bytes::from_static(&[
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01,
        ]);
        let err = generator.generate(truncated, "image/jpeg").await.unwrap_err();
        assert!(matches!(err, ProcessingError::Decode(_)));
    }

    #[test]
    fn logical_names() {
        assert_eq!(Variant::Original.logical_name("png"), "original.png");
        assert_eq!(Variant::Medium.logical_name("png"), "medium.jpg");
        assert_eq!(Variant::Thumbnail.logical_name("png"), "thumbnail.jpg");
    }
}
