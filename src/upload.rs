//! Avatar and cover preparation: validate the picked file, crop it to the
//! preset's aspect ratio, rotate, shrink and re-encode as JPEG.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortalError, Result};

pub const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

const MIB: u64 = 1024 * 1024;

/// Which profile image is being replaced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UploadKind {
    Avatar,
    Cover,
}

/// Limits and output shape for one kind of upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadPreset {
    /// Width divided by height of the crop frame.
    pub aspect_ratio: f64,
    pub max_width: u32,
    pub max_height: u32,
    /// Largest accepted source file.
    pub max_bytes: u64,
    /// JPEG quality, 1 to 100.
    pub quality: u8,
}

impl UploadPreset {
    pub fn avatar() -> Self {
        Self {
            aspect_ratio: 1.0,
            max_width: 256,
            max_height: 256,
            max_bytes: 5 * MIB,
            quality: 90,
        }
    }

    pub fn cover() -> Self {
        Self {
            aspect_ratio: 4.0,
            max_width: 2000,
            max_height: 500,
            max_bytes: 10 * MIB,
            quality: 85,
        }
    }

    /// Reject presets that cannot produce an image, such as zero bounds
    /// from a bad config file.
    pub fn check(&self) -> Result<()> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(PortalError::Config(format!(
                "upload bounds must be non-zero, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(PortalError::Config(format!(
                "invalid upload aspect ratio {}",
                self.aspect_ratio
            )));
        }
        Ok(())
    }
}

/// A file the user picked, before any processing.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Check type and size of a picked file. Runs before anything is decoded or
/// sent.
pub fn validate_file(mime: &str, size: u64, preset: &UploadPreset) -> Result<()> {
    let mime = mime.trim().to_ascii_lowercase();
    if !ACCEPTED_TYPES.contains(&mime.as_str()) {
        return Err(PortalError::UnsupportedFileType { mime });
    }
    if size > preset.max_bytes {
        return Err(PortalError::FileTooLarge {
            size,
            limit: preset.max_bytes,
        });
    }
    Ok(())
}

/// A rectangle in source pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// The largest region with the given aspect ratio, centred in the source.
    /// This is where the crop frame starts.
    pub fn centered(source_width: u32, source_height: u32, aspect_ratio: f64) -> Self {
        let (sw, sh) = (f64::from(source_width), f64::from(source_height));
        let (width, height) = if sw / sh > aspect_ratio {
            ((sh * aspect_ratio).round(), sh)
        } else {
            (sw, (sw / aspect_ratio).round())
        };
        let width = (width as u32).clamp(1, source_width.max(1));
        let height = (height as u32).clamp(1, source_height.max(1));
        Self {
            x: source_width.saturating_sub(width) / 2,
            y: source_height.saturating_sub(height) / 2,
            width,
            height,
        }
    }

    fn check_within(&self, width: u32, height: u32) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PortalError::InvalidCrop("empty region".to_string()));
        }
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        if right > u64::from(width) || bottom > u64::from(height) {
            return Err(PortalError::InvalidCrop(format!(
                "{}x{}+{}+{} exceeds {width}x{height}",
                self.width, self.height, self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarters,
}

impl Rotation {
    /// Any multiple of 90, negative meaning counter-clockwise. Other angles
    /// are rejected.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Quarter,
            180 => Rotation::Half,
            _ => Rotation::ThreeQuarters,
        })
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarters => 270,
        }
    }

    /// The next quarter turn clockwise, as the rotate button does.
    pub fn turned(self) -> Self {
        match self {
            Rotation::None => Rotation::Quarter,
            Rotation::Quarter => Rotation::Half,
            Rotation::Half => Rotation::ThreeQuarters,
            Rotation::ThreeQuarters => Rotation::None,
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Quarter | Rotation::ThreeQuarters)
    }
}

/// Final JPEG ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Largest size with the same proportions that fits in the bounds. Never
/// upscales.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (max_width, max_height) = (max_width.max(1), max_height.max(1));
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = (f64::from(max_width) / f64::from(width)).min(f64::from(max_height) / f64::from(height));
    let w = (f64::from(width) * scale).round() as u32;
    let h = (f64::from(height) * scale).round() as u32;
    (w.clamp(1, max_width), h.clamp(1, max_height))
}

/// Crop, rotate and shrink an already decoded image.
pub fn transform(
    image: &DynamicImage,
    crop: CropRegion,
    rotation: Rotation,
    preset: &UploadPreset,
) -> Result<DynamicImage> {
    preset.check()?;
    crop.check_within(image.width(), image.height())?;
    let cropped = image.crop_imm(crop.x, crop.y, crop.width, crop.height);
    let rotated = match rotation {
        Rotation::None => cropped,
        Rotation::Quarter => cropped.rotate90(),
        Rotation::Half => cropped.rotate180(),
        Rotation::ThreeQuarters => cropped.rotate270(),
    };
    let (width, height) = fit_within(
        rotated.width(),
        rotated.height(),
        preset.max_width,
        preset.max_height,
    );
    if (width, height) == (rotated.width(), rotated.height()) {
        return Ok(rotated);
    }
    Ok(rotated.resize_exact(width, height, FilterType::Lanczos3))
}

/// Encode as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<EncodedImage> {
    let rgb = image.to_rgb8();
    let mut bytes = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(EncodedImage {
        bytes: bytes.into_inner(),
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Whole pipeline from picked file to upload-ready JPEG.
pub fn prepare(
    file: &SelectedFile,
    crop: CropRegion,
    rotation: Rotation,
    preset: &UploadPreset,
) -> Result<EncodedImage> {
    preset.check()?;
    validate_file(&file.mime, file.bytes.len() as u64, preset)?;
    let image = image::load_from_memory(&file.bytes)?;
    let transformed = transform(&image, crop, rotation, preset)?;
    let encoded = encode_jpeg(&transformed, preset.quality)?;
    debug!(
        file = %file.name,
        width = encoded.width,
        height = encoded.height,
        bytes = encoded.bytes.len(),
        rotation = rotation.degrees(),
        "prepared image for upload"
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn unbounded() -> UploadPreset {
        UploadPreset {
            max_width: 10_000,
            max_height: 10_000,
            ..UploadPreset::avatar()
        }
    }

    #[test]
    fn rejects_wrong_type_before_decoding() {
        let err = validate_file("image/svg+xml", 10, &UploadPreset::avatar()).unwrap_err();
        assert!(matches!(err, PortalError::UnsupportedFileType { .. }));
    }

    #[test]
    fn rejects_oversized_file() {
        let preset = UploadPreset::avatar();
        let err = validate_file("image/png", preset.max_bytes + 1, &preset).unwrap_err();
        assert!(matches!(err, PortalError::FileTooLarge { .. }));
        assert!(validate_file("IMAGE/PNG", preset.max_bytes, &preset).is_ok());
    }

    #[test]
    fn centered_crop_matches_aspect() {
        assert_eq!(
            CropRegion::centered(1000, 1000, 1.0),
            CropRegion { x: 0, y: 0, width: 1000, height: 1000 }
        );
        assert_eq!(
            CropRegion::centered(1600, 900, 1.0),
            CropRegion { x: 350, y: 0, width: 900, height: 900 }
        );
        assert_eq!(
            CropRegion::centered(1000, 1000, 4.0),
            CropRegion { x: 0, y: 375, width: 1000, height: 250 }
        );
    }

    #[test]
    fn rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Quarter));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::ThreeQuarters));
        assert_eq!(Rotation::from_degrees(720), Some(Rotation::None));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::ThreeQuarters.turned(), Rotation::None);
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(100, 50, 256, 256), (100, 50));
        assert_eq!(fit_within(1000, 1000, 256, 256), (256, 256));
        assert_eq!(fit_within(800, 1000, 256, 256), (205, 256));
    }

    #[test]
    fn zero_bounds_are_a_config_error() {
        assert_eq!(fit_within(1000, 1000, 0, 256), (1, 1));

        let preset = UploadPreset {
            max_width: 0,
            ..UploadPreset::avatar()
        };
        let image = image::load_from_memory(&png_bytes(64, 64)).unwrap();
        let crop = CropRegion::centered(64, 64, 1.0);
        let err = transform(&image, crop, Rotation::None, &preset).unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));

        let file = SelectedFile {
            name: "a.png".to_string(),
            mime: "image/png".to_string(),
            bytes: png_bytes(64, 64),
        };
        let err = prepare(&file, crop, Rotation::None, &preset).unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
    }

    #[test]
    fn quarter_turn_swaps_crop_dimensions() {
        let image = image::load_from_memory(&png_bytes(1000, 600)).unwrap();
        let crop = CropRegion { x: 100, y: 50, width: 400, height: 300 };
        let out = transform(&image, crop, Rotation::Quarter, &unbounded()).unwrap();
        assert_eq!((out.width(), out.height()), (300, 400));

        let out = transform(&image, crop, Rotation::Half, &unbounded()).unwrap();
        assert_eq!((out.width(), out.height()), (400, 300));
    }

    #[test]
    fn quarter_turn_moves_top_left_to_top_right() {
        let mut img = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let image = DynamicImage::ImageRgb8(img);
        let crop = CropRegion { x: 0, y: 0, width: 4, height: 2 };
        let out = transform(&image, crop, Rotation::Quarter, &unbounded())
            .unwrap()
            .to_rgb8();
        assert_eq!(out.dimensions(), (2, 4));
        assert_eq!(out.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn crop_outside_source_is_an_error() {
        let image = image::load_from_memory(&png_bytes(100, 100)).unwrap();
        let crop = CropRegion { x: 50, y: 50, width: 60, height: 10 };
        let err = transform(&image, crop, Rotation::None, &unbounded()).unwrap_err();
        assert!(matches!(err, PortalError::InvalidCrop(_)));
    }

    #[test]
    fn avatar_pipeline_produces_bounded_jpeg() {
        let file = SelectedFile {
            name: "me.png".to_string(),
            mime: "image/png".to_string(),
            bytes: png_bytes(1000, 1000),
        };
        let preset = UploadPreset::avatar();
        let crop = CropRegion::centered(1000, 1000, preset.aspect_ratio);
        let encoded = prepare(&file, crop, Rotation::Quarter, &preset).unwrap();
        assert_eq!((encoded.width, encoded.height), (256, 256));

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!(image::guess_format(&encoded.bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!((decoded.width(), decoded.height()), (256, 256));
    }

    #[test]
    fn undecodable_file_is_a_local_error() {
        let file = SelectedFile {
            name: "broken.png".to_string(),
            mime: "image/png".to_string(),
            bytes: b"definitely not a png".to_vec(),
        };
        let preset = UploadPreset::avatar();
        let crop = CropRegion { x: 0, y: 0, width: 1, height: 1 };
        assert!(matches!(
            prepare(&file, crop, Rotation::None, &preset),
            Err(PortalError::Image(_))
        ));
    }
}
